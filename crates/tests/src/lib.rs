//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试 (JSON 线格式)
//! - 合成数据源 e2e 测试（数据源 → 路由 → 算子 → 分发 → 文件）
//! - 场景回放与故障注入

#[cfg(test)]
mod contract_tests {
    use contracts::{ChannelEvent, Message, Payload, TimeToDecision};

    #[test]
    fn test_contracts_compile() {
        // 验证 contracts crate 可编译
        let _ = contracts::ConfigVersion::V1;
    }

    #[test]
    fn test_event_wire_format() {
        let watermark: ChannelEvent<Payload> = ChannelEvent::new("pose", Message::watermark(7));
        assert_eq!(
            serde_json::to_value(&watermark).unwrap(),
            serde_json::json!({ "channel": "pose", "message": { "watermark": [7] } })
        );

        let data = Message::data(
            100,
            Payload::TimeToDecision(TimeToDecision {
                deadline_ms: 400.0,
                flagged: false,
            }),
        );
        let value = serde_json::to_value(&data).unwrap();
        assert_eq!(value["data"]["timestamp"], serde_json::json!([100]));
        assert_eq!(
            value["data"]["payload"]["time_to_decision"]["deadline_ms"],
            400.0
        );
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::path::Path;
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        ChannelEvent, LogicalTimestamp, Message, Obstacle, OperatorOutput, Payload,
        PipelineBlueprint, SinkConfig, SinkType, VehiclePose,
    };
    use dispatcher::{create_dispatcher, DispatchReport, OutputRecord};
    use ingestion::{
        join_writers, ChannelReport, ChannelRouter, IngestionPipeline, Scenario, SkippedPayload,
        SyntheticConfig, SyntheticSource,
    };
    use observability::CorrelationStatsAggregator;
    use operators::{
        DeadlineModel, ObstacleLocationFinder, TimeToDecisionOperator, OBSTACLE_LOCATION,
        TIME_TO_DECISION,
    };
    use sync_engine::{OperatorRunner, RunnerReport};
    use tempfile::tempdir;
    use tokio::sync::mpsc;

    const TIMEOUT: Duration = Duration::from_secs(5);

    struct RunOutcome {
        channels: Vec<ChannelReport>,
        runners: Vec<RunnerReport>,
        dispatch: DispatchReport,
    }

    enum Input {
        Synthetic(SyntheticConfig),
        Scenario(Scenario),
    }

    fn file_sink(dir: &Path) -> SinkConfig {
        SinkConfig {
            name: "file".to_string(),
            sink_type: SinkType::File,
            queue_capacity: 1000,
            params: HashMap::from([(
                "base_path".to_string(),
                dir.to_string_lossy().into_owned(),
            )]),
        }
    }

    /// Wire the enabled operators of `blueprint` like the CLI does and run
    /// `input` through them until it ends
    async fn run_pipeline(blueprint: &PipelineBlueprint, input: Input) -> RunOutcome {
        let mut ingestion = IngestionPipeline::new(32);
        let mut router = ChannelRouter::new();
        let (output_tx, output_rx) = mpsc::channel::<OperatorOutput>(32);
        let mut runners = Vec::new();

        if blueprint.operators.obstacle_location {
            let finder = ObstacleLocationFinder::from_blueprint(blueprint);
            let channels = finder.channels();
            ingestion.register_channels(channels.iter().cloned());
            let rx = router.subscribe(OBSTACLE_LOCATION, &channels, 32);
            let engine = finder.into_engine(&blueprint.engine).unwrap();
            runners.push(OperatorRunner::new(engine).spawn(rx, output_tx.clone()));
        }
        if blueprint.operators.time_to_decision {
            let channels = TimeToDecisionOperator::channels();
            ingestion.register_channels(channels.iter().cloned());
            let rx = router.subscribe(TIME_TO_DECISION, &channels, 32);
            let engine = TimeToDecisionOperator::new(DeadlineModel::new(blueprint.deadline.clone()))
                .into_engine(&blueprint.engine)
                .unwrap();
            runners.push(OperatorRunner::new(engine).spawn(rx, output_tx.clone()));
        }
        drop(output_tx);

        let dispatcher = create_dispatcher(blueprint.sinks.clone(), output_rx)
            .unwrap()
            .spawn();
        let router = router.spawn(ingestion.take_receiver().unwrap());

        let writers = match input {
            Input::Synthetic(config) => SyntheticSource::new(config).start(ingestion.take_senders()),
            Input::Scenario(scenario) => {
                ingestion.register_channels(scenario.channels());
                scenario.replay(&mut ingestion).unwrap()
            }
        };
        drop(ingestion);

        let channels = tokio::time::timeout(TIMEOUT, join_writers(writers))
            .await
            .expect("writers timed out")
            .unwrap();
        tokio::time::timeout(TIMEOUT, router)
            .await
            .expect("router timed out")
            .unwrap();

        let mut reports = Vec::new();
        for runner in runners {
            let report = tokio::time::timeout(TIMEOUT, runner.join())
                .await
                .expect("runner timed out")
                .unwrap();
            reports.push(report);
        }
        let dispatch = tokio::time::timeout(TIMEOUT, dispatcher)
            .await
            .expect("dispatcher timed out")
            .unwrap();

        RunOutcome {
            channels,
            runners: reports,
            dispatch,
        }
    }

    fn read_records(path: &Path) -> Vec<OutputRecord> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    /// Every data message is followed by the watermark of its timestamp, and
    /// timestamps strictly increase
    fn assert_data_watermark_pairs(records: &[OutputRecord]) -> Vec<LogicalTimestamp> {
        assert_eq!(records.len() % 2, 0, "unpaired output");
        let mut fired = Vec::new();
        for pair in records.chunks(2) {
            let ts = pair[0].message.timestamp().clone();
            assert!(!pair[0].message.is_watermark(), "expected data at {ts}");
            assert_eq!(pair[1].message, Message::watermark(ts.clone()));
            if let Some(previous) = fired.last() {
                assert!(&ts > previous, "timestamps must increase");
            }
            fired.push(ts);
        }
        fired
    }

    /// End-to-end: SyntheticSource → router → both operators → file sink
    #[tokio::test]
    async fn test_e2e_synthetic_pipeline() {
        let dir = tempdir().unwrap();
        let blueprint = PipelineBlueprint {
            sinks: vec![file_sink(dir.path())],
            ..Default::default()
        };
        let synthetic = SyntheticConfig {
            ticks: Some(8),
            camera: blueprint.camera.clone(),
            ..Default::default()
        };

        let outcome = run_pipeline(&blueprint, Input::Synthetic(synthetic)).await;

        assert_eq!(outcome.channels.len(), 3);
        assert!(outcome.channels.iter().all(|c| c.payloads == 8 && c.ticks == 8));
        assert_eq!(outcome.dispatch.data, 16);
        assert_eq!(outcome.dispatch.watermarks, 16);
        for report in &outcome.runners {
            assert_eq!(report.engine.fired, 8, "{}", report.operator);
            assert!(report.health.is_healthy());
            assert_eq!(report.teardown.payloads_discarded, 0);
        }

        let located = read_records(&dir.path().join("obstacle_location.jsonl"));
        let fired = assert_data_watermark_pairs(&located);
        assert_eq!(fired.first(), Some(&LogicalTimestamp::from(100)));
        assert_eq!(fired.last(), Some(&LogicalTimestamp::from(800)));
        for record in located.iter().step_by(2) {
            let Message::Data {
                payload: Payload::Obstacles(obstacles),
                ..
            } = &record.message
            else {
                panic!("expected obstacles, got {:?}", record.message);
            };
            assert_eq!(obstacles.len(), 3);
            assert!(obstacles.iter().all(|o| o.transform.is_some()));
        }

        let deadlines = read_records(&dir.path().join("time_to_decision.jsonl"));
        assert_eq!(assert_data_watermark_pairs(&deadlines).len(), 8);
    }

    /// A missing depth payload fails that timestamp for the obstacle operator
    /// only; the deadline operator keeps firing and later timestamps recover
    #[tokio::test]
    async fn test_e2e_missing_payload_is_isolated() {
        let dir = tempdir().unwrap();
        let blueprint = PipelineBlueprint {
            sinks: vec![file_sink(dir.path())],
            ..Default::default()
        };
        let synthetic = SyntheticConfig {
            ticks: Some(5),
            camera: blueprint.camera.clone(),
            skip_payloads: vec![SkippedPayload {
                channel: "depth".into(),
                tick: 2,
            }],
            ..Default::default()
        };

        let outcome = run_pipeline(&blueprint, Input::Synthetic(synthetic)).await;

        let location = outcome
            .runners
            .iter()
            .find(|r| r.operator == OBSTACLE_LOCATION)
            .unwrap();
        assert_eq!(location.engine.fired, 4);
        assert_eq!(location.engine.failed, 1);
        assert_eq!(location.stats.failures.get("empty_buffer"), Some(&1));
        assert!(location.health.is_healthy());

        let located = read_records(&dir.path().join("obstacle_location.jsonl"));
        let fired = assert_data_watermark_pairs(&located);
        let expected: Vec<LogicalTimestamp> =
            [100, 300, 400, 500].into_iter().map(LogicalTimestamp::from).collect();
        assert_eq!(fired, expected);

        let deadline = outcome
            .runners
            .iter()
            .find(|r| r.operator == TIME_TO_DECISION)
            .unwrap();
        assert_eq!(deadline.engine.fired, 5);
        assert_eq!(deadline.engine.failed, 0);

        let mut merged = CorrelationStatsAggregator::new();
        for report in &outcome.runners {
            merged.merge(&report.stats);
        }
        assert_eq!(merged.total_fired, 9);
        assert_eq!(merged.total_failed, 1);
    }

    /// Scenario replay through the deadline operator: values follow the
    /// affine model and implausible results are flagged, never altered
    #[tokio::test]
    async fn test_e2e_scenario_deadlines() {
        let dir = tempdir().unwrap();
        let mut blueprint = PipelineBlueprint {
            sinks: vec![file_sink(dir.path())],
            ..Default::default()
        };
        blueprint.operators.obstacle_location = false;

        let speeds = [10.0, 20.0, 0.0, 60.0, -70.0];
        let mut scenario = Scenario::default();
        for (i, speed) in speeds.iter().enumerate() {
            let ts = (i as u64 + 1) * 100;
            scenario.push(ChannelEvent::new(
                "pose",
                Message::data(
                    ts,
                    Payload::Pose(VehiclePose {
                        forward_speed: *speed,
                        ..Default::default()
                    }),
                ),
            ));
            scenario.push(ChannelEvent::new("pose", Message::watermark(ts)));
        }
        let path = dir.path().join("scenario.jsonl");
        scenario.save(&path).unwrap();

        let outcome = run_pipeline(&blueprint, Input::Scenario(Scenario::load(&path).unwrap())).await;
        assert_eq!(outcome.runners.len(), 1);
        assert_eq!(outcome.runners[0].engine.fired, 5);

        let records = read_records(&dir.path().join("time_to_decision.jsonl"));
        assert_data_watermark_pairs(&records);
        let deadlines: Vec<(f64, bool)> = records
            .iter()
            .filter_map(|r| match &r.message {
                Message::Data {
                    payload: Payload::TimeToDecision(ttd),
                    ..
                } => Some((ttd.deadline_ms, ttd.flagged)),
                _ => None,
            })
            .collect();
        assert_eq!(
            deadlines,
            vec![
                (400.0, false),
                (300.0, false),
                (500.0, false),
                (-100.0, true),
                (1200.0, true),
            ]
        );
    }

    /// Configuration with point clouds and the camera channel drives a
    /// four-channel obstacle operator
    #[tokio::test]
    async fn test_e2e_config_point_cloud_with_camera() {
        let dir = tempdir().unwrap();
        let toml = format!(
            r#"
[camera]
width = 160
height = 120
fov_deg = 90.0

[geolocation]
depth_source = "point_cloud"
validity_radius_px = 2.0

[operators]
time_to_decision = false
camera_channel = true

[[sinks]]
name = "file"
sink_type = "file"

[sinks.params]
base_path = "{}"
watermarks = "false"
"#,
            dir.path().display()
        );
        let blueprint = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();
        assert_eq!(
            blueprint.obstacle_location_channels(),
            vec!["obstacles", "depth", "pose", "camera"]
        );

        let synthetic = SyntheticConfig {
            ticks: Some(3),
            camera: blueprint.camera.clone(),
            depth_source: blueprint.geolocation.depth_source,
            ..Default::default()
        };
        let outcome = run_pipeline(&blueprint, Input::Synthetic(synthetic)).await;

        assert_eq!(outcome.channels.len(), 4);
        assert_eq!(outcome.runners[0].engine.fired, 3);

        // watermarks disabled on this sink
        let records = read_records(&dir.path().join("obstacle_location.jsonl"));
        assert_eq!(records.len(), 3);
        let located: Vec<&Obstacle> = records
            .iter()
            .filter_map(|r| match &r.message {
                Message::Data {
                    payload: Payload::Obstacles(obstacles),
                    ..
                } => Some(obstacles),
                _ => None,
            })
            .flatten()
            .collect();
        assert_eq!(located.len(), 9);
        assert!(located.iter().all(|o| o.transform.is_some()));
    }

    /// Dispatcher with multiple sink types
    #[tokio::test]
    async fn test_dispatcher_multiple_sinks() {
        let dir = tempdir().unwrap();
        let (tx, rx) = mpsc::channel::<OperatorOutput>(10);

        let sink_configs = vec![
            SinkConfig {
                name: "log1".to_string(),
                sink_type: SinkType::Log,
                queue_capacity: 50,
                params: HashMap::new(),
            },
            SinkConfig {
                name: "log2".to_string(),
                sink_type: SinkType::Log,
                queue_capacity: 50,
                params: HashMap::new(),
            },
            file_sink(dir.path()),
        ];

        let dispatcher = create_dispatcher(sink_configs, rx).unwrap();
        assert_eq!(dispatcher.sink_count(), 3);
        let handle = dispatcher.spawn();

        for ts in 1..=5u64 {
            tx.send(OperatorOutput {
                operator: OBSTACLE_LOCATION.to_string(),
                message: Message::data(ts, Payload::Obstacles(vec![])),
            })
            .await
            .unwrap();
            tx.send(OperatorOutput {
                operator: OBSTACLE_LOCATION.to_string(),
                message: Message::watermark(ts),
            })
            .await
            .unwrap();
        }
        drop(tx);

        let report = tokio::time::timeout(TIMEOUT, handle).await.unwrap().unwrap();
        assert_eq!(report.outputs(), 10);
        assert_eq!(report.sinks.len(), 3);
        assert!(report.sinks.iter().all(|(_, m)| m.written() == 10));
        assert_eq!(
            read_records(&dir.path().join("obstacle_location.jsonl")).len(),
            10
        );
    }
}
