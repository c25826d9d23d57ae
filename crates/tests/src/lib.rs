//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 配置 → Dispatcher → 文件输出的 e2e 测试
//! - 单写者并发测试

#[cfg(test)]
mod contract_tests {
    use contracts::{Delivery, SinkType};

    #[test]
    fn test_contracts_compile() {
        // 验证 contracts crate 可编译
        let _ = contracts::ConfigVersion::V1;
    }

    #[test]
    fn test_delivery_labels() {
        assert_eq!(Delivery::Delivered.as_str(), "delivered");
        assert_eq!(Delivery::OutsideWindow.as_str(), "outside_window");
        assert_eq!(Delivery::Unsupported.as_str(), "unsupported");
        assert_eq!(SinkType::File.required_params(), &["file_name", "mode"]);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::path::Path;
    use std::sync::Arc;

    use chrono::NaiveDateTime;
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        Delivery, SinkConfig, SinkOptions, SinkType, TimeOfDay, TimeWindow, TimedRecord,
    };
    use dispatcher::sinks::{QueueSinkConfig, WriteMode};
    use dispatcher::{
        create_dispatcher, DispatchReport, FileSink, MemoryProducer, QueueSink, SinkHandle,
    };
    use serde_json::{json, Value};
    use tempfile::tempdir;
    use tokio::sync::mpsc;

    fn record(value: Value, ts: &str) -> TimedRecord {
        TimedRecord::new(
            value.as_object().cloned().unwrap_or_default(),
            NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S").unwrap(),
        )
    }

    fn config(dir: &Path, mode: &str) -> String {
        format!(
            r#"
[[sinks]]
name = "archive_json"
sink_type = "file"
field_names = ["id", "val"]
[sinks.params]
file_name = "all.json"
mode = "{mode}"
output_dir = "{dir}"

[[sinks]]
name = "office_csv"
sink_type = "file"
field_names = ["id", "val"]
from_hour = "09:00"
to_hour = "17:00"
[sinks.params]
file_name = "office.csv"
mode = "{mode}"
output_dir = "{dir}"

[[sinks]]
name = "notes"
sink_type = "file"
field_names = []
[sinks.params]
file_name = "notes.txt"
mode = "{mode}"
output_dir = "{dir}"
"#,
            mode = mode,
            dir = dir.display().to_string().replace('\\', "/"),
        )
    }

    async fn run(toml: &str, items: Vec<TimedRecord>) -> DispatchReport {
        let blueprint = ConfigLoader::load_from_str(toml, ConfigFormat::Toml).unwrap();
        let (tx, rx) = mpsc::channel(8);
        let dispatcher = create_dispatcher(blueprint.sinks, rx).await.unwrap();
        let handle = dispatcher.spawn();

        for item in items {
            tx.send(item).await.unwrap();
        }
        drop(tx);

        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("dispatcher timed out")
            .unwrap()
    }

    fn snapshot<'a>(report: &'a DispatchReport, name: &str) -> &'a dispatcher::MetricsSnapshot {
        &report
            .sinks
            .iter()
            .find(|(n, _)| n == name)
            .unwrap_or_else(|| panic!("no sink named {name}"))
            .1
    }

    /// End-to-end: config -> Dispatcher -> JSON / CSV / unsupported outputs
    #[tokio::test]
    async fn test_e2e_file_outputs() {
        let dir = tempdir().unwrap();
        let report = run(
            &config(dir.path(), "w"),
            vec![
                record(json!({"id": 1, "val": "a"}), "2024-05-01 12:00:00"),
                record(json!({"id": 2, "val": "b"}), "2024-05-01 20:00:00"),
                record(json!({"id": 3, "extra": true}), "2024-05-01 09:00:00"),
            ],
        )
        .await;

        assert_eq!(report.records, 3);

        // JSON keeps every record in order, untouched
        let doc: Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("all.json")).unwrap())
                .unwrap();
        assert_eq!(
            doc,
            json!({"data": [
                {"id": 1, "val": "a"},
                {"id": 2, "val": "b"},
                {"id": 3, "extra": true}
            ]})
        );

        // CSV only receives the records inside 09:00-17:00, missing fields empty
        let csv = std::fs::read_to_string(dir.path().join("office.csv")).unwrap();
        assert_eq!(csv, "id,val\n1,a\n3,\n");
        let office = snapshot(&report, "office_csv");
        assert_eq!(office.write_count, 2);
        assert_eq!(office.skipped_count, 1);

        // Unsupported extension: reported, never written
        let notes = snapshot(&report, "notes");
        assert_eq!(notes.write_count, 0);
        assert_eq!(notes.skipped_count, 3);
        assert_eq!(notes.failure_count, 0);
        assert!(!dir.path().join("notes.txt").exists());
    }

    /// Append mode keeps earlier output and does not repeat the CSV header
    #[tokio::test]
    async fn test_e2e_append_mode() {
        let dir = tempdir().unwrap();
        run(
            &config(dir.path(), "w"),
            vec![record(json!({"id": 1, "val": "a"}), "2024-05-01 10:00:00")],
        )
        .await;
        run(
            &config(dir.path(), "a"),
            vec![record(json!({"id": 2, "val": "b"}), "2024-05-02 10:00:00")],
        )
        .await;

        let csv = std::fs::read_to_string(dir.path().join("office.csv")).unwrap();
        assert_eq!(csv, "id,val\n1,a\n2,b\n");

        let doc: Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("all.json")).unwrap())
                .unwrap();
        assert_eq!(doc["data"].as_array().map(Vec::len), Some(2));

        // overwrite resets
        run(&config(dir.path(), "w"), vec![]).await;
        let csv = std::fs::read_to_string(dir.path().join("office.csv")).unwrap();
        assert_eq!(csv, "id,val\n");
    }

    /// Overnight window on a queue sink, deliveries observed through the handle
    #[tokio::test]
    async fn test_queue_sink_overnight_window() {
        let config = SinkConfig::new("night", SinkType::Queue, vec![])
            .with_param("topic", "night-events")
            .with_param("bootstrap_server", "localhost:9092");
        let options = SinkOptions::new("night", vec![]).with_window(TimeWindow::new(
            TimeOfDay::from_hms(22, 0, 0).unwrap(),
            TimeOfDay::from_hms(6, 0, 0).unwrap(),
        ));
        let producer = MemoryProducer::new();
        let sink = QueueSink::with_producer(
            options,
            QueueSinkConfig::from_config(&config).unwrap(),
            Arc::new(producer.clone()),
        );
        let handle = SinkHandle::spawn(sink, 4);

        let late = handle
            .deliver(record(json!({"id": 1}), "2024-05-01 23:00:00"))
            .await
            .unwrap();
        let noon = handle
            .deliver(record(json!({"id": 2}), "2024-05-01 12:00:00"))
            .await
            .unwrap();
        let early = handle
            .deliver(record(json!({"id": 3}), "2024-05-02 05:59:59"))
            .await
            .unwrap();

        assert_eq!(late, Delivery::Delivered);
        assert_eq!(noon, Delivery::OutsideWindow);
        assert_eq!(early, Delivery::Delivered);
        handle.shutdown().await;

        let messages = producer.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|m| m.topic == "night-events"));
        let first: Value = serde_json::from_slice(&messages[0].payload).unwrap();
        assert_eq!(first, json!({"id": 1}));
    }

    /// Many concurrent callers, one JSON file, no lost records
    #[tokio::test]
    async fn test_concurrent_json_appends_are_serialized() {
        let dir = tempdir().unwrap();
        let config = SinkConfig::new("shared", SinkType::File, vec![])
            .with_param("file_name", "shared.json")
            .with_param("mode", "w")
            .with_param("output_dir", dir.path().to_string_lossy());
        assert_eq!(WriteMode::from_param("w"), WriteMode::Overwrite);

        let sink = FileSink::configure(&config).unwrap();
        let handle = Arc::new(SinkHandle::spawn(sink, 16));

        let mut tasks = Vec::new();
        for worker in 0..4 {
            let handle = Arc::clone(&handle);
            tasks.push(tokio::spawn(async move {
                for i in 0..10 {
                    let item = record(json!({"worker": worker, "i": i}), "2024-05-01 10:00:00");
                    handle.deliver(item).await.unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let handle = Arc::into_inner(handle).unwrap();
        assert_eq!(handle.metrics().write_count(), 40);
        handle.shutdown().await;

        let doc: Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("shared.json")).unwrap(),
        )
        .unwrap();
        let data = doc["data"].as_array().unwrap();
        assert_eq!(data.len(), 40);

        // per-caller order is preserved
        for worker in 0..4 {
            let seen: Vec<i64> = data
                .iter()
                .filter(|r| r["worker"] == worker)
                .filter_map(|r| r["i"].as_i64())
                .collect();
            assert_eq!(seen, (0..10).collect::<Vec<_>>());
        }
    }

    /// A sink whose configuration cannot be turned into a sink fails fast
    #[tokio::test]
    async fn test_bad_sink_fails_before_any_delivery() {
        let (_tx, rx) = mpsc::channel(1);
        let sinks = vec![SinkConfig::new("q", SinkType::Queue, vec![])
            .with_param("topic", "t")
            .with_param("bootstrap_server", " , ")];

        let err = create_dispatcher(sinks, rx).await.err().unwrap();
        assert!(err.to_string().contains("q"), "got: {err}");
    }
}
