//! End-to-end tests over the record file, the aggregator and the file-backed
//! dismissal store.

use std::sync::Arc;

use chrono::NaiveDate;
use tempfile::TempDir;
use tsheet::aggregate::{aggregate, records_in_window};
use tsheet::dismissal::{dismissed_key, hash_key, DismissalTracker, JsonFileStore, KeyValueStore};
use tsheet::period::PeriodAnchor;
use tsheet::record::{RecordSet, TaskRecord};
use tsheet::threshold::violations;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn sample_records() -> RecordSet {
    RecordSet::from_json(
        r#"[
            {"id": 1, "a_date": "01-Jan-2025", "effort": "5", "project_code": " ALPHA ", "status": "s"},
            {"id": 2, "a_date": "01-Jan-2025", "effort": "6", "project_code": "BETA", "status": "a"},
            {"id": 3, "a_date": "32-Jan-2025", "effort": "4", "project_code": "ALPHA"},
            {"id": 4, "a_date": "02-Jan-2025", "effort": "abc", "project_code": "ALPHA", "status": "r"},
            {"id": 5, "a_date": "15-Jan-2025", "effort": "3", "project_code": "ALPHA"}
        ]"#,
    )
    .expect("sample records parse")
}

mod record_file_tests {
    use super::*;

    #[test]
    fn save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("records.json");

        let set = sample_records();
        set.save(&path).expect("save records");
        let loaded = RecordSet::load(&path).expect("load records");
        assert_eq!(loaded, set);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let loaded = RecordSet::load(&dir.path().join("absent.json")).unwrap();
        assert!(loaded.records.is_empty());
    }

    #[test]
    fn corrupt_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("records.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(RecordSet::load(&path).is_err());
    }
}

mod aggregation_tests {
    use super::*;

    #[test]
    fn week_summary_from_file_records() {
        let set = sample_records();
        let agg = aggregate(&set.records, &PeriodAnchor::week(d(2024, 12, 30)), d(2025, 1, 3));

        assert_eq!(agg.buckets.len(), 7);
        assert_eq!(agg.summary.total_hours, 11.0);
        assert_eq!(agg.summary.exceeding_days, vec!["2025-01-01".to_string()]);
        assert!(agg.summary.exceeds_limit);
        assert_eq!(agg.skipped, 1);

        let alpha = agg.summary.project_totals["ALPHA"];
        assert_eq!(alpha.hours, 5.0);
        assert_eq!(alpha.task_count, 2);

        let v = violations(&agg.summary);
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].label, "Wed, 01 Jan 2025");
    }

    #[test]
    fn current_month_is_clipped() {
        let set = sample_records();
        let agg = aggregate(&set.records, &PeriodAnchor::month(2025, 1), d(2025, 1, 10));
        // Latest valid record is 15 Jan, later than today.
        assert_eq!(agg.buckets.len(), 15);
        assert_eq!(agg.summary.total_hours, 14.0);
    }
}

mod dismissal_store_tests {
    use super::*;

    #[tokio::test]
    async fn json_store_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");

        let store = JsonFileStore::new(&path);
        store.set("a", "1").await.unwrap();
        store.set("b", "2").await.unwrap();
        store.remove("a").await.unwrap();

        let reopened = JsonFileStore::new(&path);
        assert_eq!(reopened.get("a").await.unwrap(), None);
        assert_eq!(reopened.get("b").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn corrupt_state_file_fails_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "[broken").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(store.get("anything").await.is_err());

        let tracker = DismissalTracker::new(Arc::new(store));
        let decision = tracker
            .evaluate("2024-12-30", &sample_records().records, true)
            .await
            .unwrap();
        assert!(decision.show);
    }

    #[tokio::test]
    async fn reset_repairs_corrupt_state_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "[broken").unwrap();

        let store = Arc::new(JsonFileStore::new(&path));
        let err = store.get("anything").await.unwrap_err().to_string();
        assert!(err.contains("state.json"), "{err}");

        let tracker = DismissalTracker::new(store.clone());
        tracker.reset("2024-12-30").await.unwrap();
        assert_eq!(store.get("anything").await.unwrap(), None);

        let records = sample_records().records;
        let decision = tracker.evaluate("2024-12-30", &records, true).await.unwrap();
        assert!(decision.show);
        tracker.acknowledge("2024-12-30", &records).await.unwrap();
        let decision = tracker.evaluate("2024-12-30", &records, true).await.unwrap();
        assert!(!decision.show);
    }

    #[tokio::test]
    async fn dismissal_survives_restart_until_records_change() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let anchor = PeriodAnchor::week(d(2024, 12, 30));
        let today = d(2025, 1, 3);

        let mut set = sample_records();
        let agg = aggregate(&set.records, &anchor, today);
        let window = agg.window.unwrap();
        let key = window.key();

        let tracker = DismissalTracker::new(Arc::new(JsonFileStore::new(&path)));
        let period_records = records_in_window(&set.records, &window);
        assert!(tracker.evaluate(&key, &period_records, true).await.unwrap().show);
        tracker.acknowledge(&key, &period_records).await.unwrap();

        // New process, same data: still dismissed.
        let tracker = DismissalTracker::new(Arc::new(JsonFileStore::new(&path)));
        let decision = tracker.evaluate(&key, &period_records, true).await.unwrap();
        assert!(decision.dismissed);
        assert!(!decision.show);

        // A record outside the week does not touch this week's dismissal.
        set.push(TaskRecord::new("6", "20-Jan-2025").with_effort("2")).unwrap();
        let period_records = records_in_window(&set.records, &window);
        assert!(!tracker.evaluate(&key, &period_records, true).await.unwrap().show);

        // A record inside the week brings the warning back.
        set.push(TaskRecord::new("7", "03-Jan-2025").with_effort("1")).unwrap();
        let agg = aggregate(&set.records, &anchor, today);
        let period_records = records_in_window(&set.records, &window);
        let decision = tracker
            .evaluate(&key, &period_records, agg.summary.exceeds_limit)
            .await
            .unwrap();
        assert!(decision.hash_changed);
        assert!(decision.show);

        let store = tracker.store();
        assert!(store.get(&dismissed_key(&key)).await.unwrap().is_none());
        assert!(store.get(&hash_key(&key)).await.unwrap().is_some());
    }
}
