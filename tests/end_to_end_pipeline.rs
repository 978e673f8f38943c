//! Pipeline Integration Tests
//!
//! Run the stdin pipeline end to end against a local collector endpoint.

mod common;

use common::spawn_collector;
use outflow::app::config::AppConfig;
use outflow::app::error::AppError;
use outflow::app::pipeline::run_pipeline;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

fn pipeline_config(endpoint: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.delivery.endpoint = endpoint.to_string();
    config.delivery.timeout = Duration::from_secs(2);
    config.queue.retry_base_interval = Duration::from_millis(10);
    config.queue.retry_max_interval = Some(Duration::from_millis(40));
    config.manager.idle_wait = Duration::from_millis(10);
    config.manager.stop_timeout = Duration::from_secs(2);
    config.pipeline.drain_timeout = Duration::from_secs(10);
    config.pipeline.stats_interval = Duration::ZERO;
    config
}

#[tokio::test]
async fn test_records_from_input_are_delivered() {
    let (url, received) = spawn_collector(200).await;
    let config = pipeline_config(&url);
    let input: &[u8] = b"{\"grams\": 12}\n\nplain text\n[1, 2]\n";

    let report = run_pipeline(BufReader::new(input), &config, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.accepted, 3);
    assert_eq!(report.dropped, 0);
    assert!(report.drained);
    assert_eq!(report.statistics.len(), 1);
    assert_eq!(report.statistics[0].queue_name, "outbound");
    assert_eq!(report.statistics[0].total_completed, 3);

    let mut bodies: Vec<serde_json::Value> = received
        .lock()
        .unwrap()
        .iter()
        .map(|body| serde_json::from_str(body).unwrap())
        .collect();
    bodies.sort_by_key(|body| body.to_string());
    assert_eq!(
        bodies,
        vec![
            serde_json::json!("plain text"),
            serde_json::json!([1, 2]),
            serde_json::json!({"grams": 12}),
        ]
    );
    println!("✓ Mixed JSON and plain records delivered");
}

#[tokio::test]
async fn test_batch_mode_posts_arrays() {
    let (url, received) = spawn_collector(200).await;
    let mut config = pipeline_config(&url);
    config.delivery.batch_mode = true;
    config.queue.batch_size = 4;
    config.queue.batch_timeout = Duration::from_millis(50);
    let input: &[u8] = b"1\n2\n3\n4\n5\n6\n";

    let report = run_pipeline(BufReader::new(input), &config, CancellationToken::new())
        .await
        .unwrap();

    assert!(report.drained);
    assert_eq!(report.statistics[0].total_completed, 6);
    let delivered: usize = received
        .lock()
        .unwrap()
        .iter()
        .map(|body| {
            serde_json::from_str::<Vec<serde_json::Value>>(body)
                .unwrap()
                .len()
        })
        .sum();
    assert_eq!(delivered, 6);
    println!("✓ Batch mode delivers every record inside JSON arrays");
}

#[tokio::test]
async fn test_rejecting_endpoint_dead_letters_records() {
    let (url, received) = spawn_collector(503).await;
    let mut config = pipeline_config(&url);
    config.queue.max_retries = 2;
    let input: &[u8] = b"\"a\"\n\"b\"\n";

    let report = run_pipeline(BufReader::new(input), &config, CancellationToken::new())
        .await
        .unwrap();

    let stats = &report.statistics[0];
    assert!(report.drained);
    assert_eq!(stats.total_completed, 0);
    assert_eq!(stats.dead_letter_count, 2);
    // First attempt plus two retries per record
    assert_eq!(received.lock().unwrap().len(), 6);
    println!("✓ Records dead-lettered after exhausting retries");
}

#[tokio::test]
async fn test_shutdown_stops_reading_input() {
    let (url, received) = spawn_collector(200).await;
    let config = pipeline_config(&url);
    let (mut writer, reader) = tokio::io::duplex(1024);
    let shutdown = CancellationToken::new();

    let pipeline = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { run_pipeline(BufReader::new(reader), &config, shutdown).await })
    };

    writer.write_all(b"{\"seq\": 1}\n").await.unwrap();
    for _ in 0..200 {
        if !received.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    shutdown.cancel();

    let report = tokio::time::timeout(Duration::from_secs(10), pipeline)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    // The writer is still open: only the shutdown request ended the input
    drop(writer);
    assert_eq!(report.accepted, 1);
    assert!(report.drained);
    assert_eq!(report.statistics[0].total_completed, 1);
    println!("✓ Shutdown request closes input and drains");
}

#[tokio::test]
async fn test_invalid_endpoint_fails_before_reading() {
    let config = pipeline_config("ftp://collector.example/ingest");
    let input: &[u8] = b"1\n";

    match run_pipeline(BufReader::new(input), &config, CancellationToken::new()).await {
        Err(AppError::Processor(e)) => assert!(e.to_string().contains("ftp://")),
        other => panic!("Expected processor error, got {:?}", other.map(|r| r.accepted)),
    }
    println!("✓ Invalid endpoint reported as a processor error");
}
