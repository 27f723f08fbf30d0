//! End-to-end pipeline test over the operator API: seed raw data, run the
//! clean stage, watch the chain trigger produce the aggregated dataset.

mod common;

use std::io::Write;

use reqwest::Client;
use tempfile::TempDir;

use common::{get_available_port, minimal_config, spawn_server, wait_for_server};

#[tokio::test]
async fn test_raw_data_flows_to_aggregated_via_api() {
    let temp = TempDir::new().unwrap();
    let port = get_available_port();

    // Seed raw data under the store root before the server starts.
    let raw_dir = temp.path().join("store").join("raw");
    std::fs::create_dir_all(&raw_dir).unwrap();
    std::fs::write(
        raw_dir.join("part-000.jsonl"),
        concat!(
            "{\"timestamp\": 0, \"device_id\": \"dev-a\", \"temperature\": 1.0, \"humidity\": 40}\n",
            "{\"timestamp\": 299, \"device_id\": \"dev-a\", \"temperature\": 3.0, \"humidity\": 42}\n",
            "{\"timestamp\": 300, \"device_id\": \"dev-a\", \"temperature\": 5.0, \"humidity\": 44}\n",
        ),
    )
    .unwrap();

    let config_path = temp.path().join("config.toml");
    let mut file = std::fs::File::create(&config_path).unwrap();
    write!(file, "{}", minimal_config(port, temp.path())).unwrap();

    let mut child = spawn_server(&config_path).await;
    assert!(wait_for_server(port, 100).await);

    let client = Client::new();
    let base = format!("http://127.0.0.1:{port}/api/v1");

    // Run the clean stage; the chain trigger starts the aggregate stage.
    let chain: serde_json::Value = client
        .post(format!("{base}/jobs/clean"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(chain["clean"]["status"], "succeeded");
    assert_eq!(chain["aggregate"]["status"], "succeeded");
    assert_eq!(chain["clean"]["report"]["records_out"], 3);
    assert_eq!(chain["aggregate"]["report"]["records_out"], 2);

    // Both aggregated encodings exist in the store.
    let objects: serde_json::Value = client
        .get(format!("{base}/store/objects?prefix=aggregated/"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let keys: Vec<&str> = objects["objects"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["key"].as_str().unwrap())
        .collect();
    assert!(keys.contains(&"aggregated/windows-00000.jsonl"));
    assert!(keys.contains(&"aggregated/windows-00000.arrow"));

    // The row encoding carries the two expected windows.
    let aggregated = std::fs::read_to_string(
        temp.path()
            .join("store")
            .join("aggregated")
            .join("windows-00000.jsonl"),
    )
    .unwrap();
    let rows: Vec<serde_json::Value> = aggregated
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["window_start"], 0);
    assert_eq!(rows[0]["temperature"]["avg"], 2.0);
    assert_eq!(rows[1]["window_start"], 300);
    assert_eq!(rows[1]["temperature"]["avg"], 5.0);

    // Both runs are visible in the job listing.
    let jobs: serde_json::Value = client
        .get(format!("{base}/jobs"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(jobs["total"], 2);

    child.kill().await.ok();
}

#[tokio::test]
async fn test_failed_clean_does_not_produce_aggregates() {
    let temp = TempDir::new().unwrap();
    let port = get_available_port();

    let raw_dir = temp.path().join("store").join("raw");
    std::fs::create_dir_all(&raw_dir).unwrap();
    std::fs::write(raw_dir.join("part-000.jsonl"), "not json at all\n").unwrap();

    let config_path = temp.path().join("config.toml");
    let mut file = std::fs::File::create(&config_path).unwrap();
    write!(file, "{}", minimal_config(port, temp.path())).unwrap();
    writeln!(file, "malformed_policy = \"abort\"").unwrap();

    let mut child = spawn_server(&config_path).await;
    assert!(wait_for_server(port, 100).await);

    let client = Client::new();
    let base = format!("http://127.0.0.1:{port}/api/v1");

    let chain: serde_json::Value = client
        .post(format!("{base}/jobs/clean"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(chain["clean"]["status"], "failed");
    assert!(chain.get("aggregate").is_none());

    let objects: serde_json::Value = client
        .get(format!("{base}/store/objects?prefix=aggregated/"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(objects["total"], 0);

    child.kill().await.ok();
}
