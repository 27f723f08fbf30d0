//! Stage 1: validate and normalize raw records.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::dataset::columnar::encode_clean_records;
use crate::dataset::{CleanRecord, RawRecord};
use crate::store::ObjectStore;

use super::types::{
    run_on_engine, MalformedPolicy, TransformError, TransformJob, TransformReport,
};

/// Key of the columnar output object, relative to the output prefix.
const OUTPUT_OBJECT: &str = "part-00000.arrow";

/// The clean transform reads every object under the raw prefix (JSON lines),
/// validates required fields, coerces measurement types, and writes one
/// columnar object under the clean prefix.
///
/// Re-running against the same input set overwrites the same output key with
/// equivalent content. Any store error aborts the job; output is written only
/// after the full input set parsed, so a failed run promotes nothing.
pub struct CleanTransform {
    policy: MalformedPolicy,
}

impl CleanTransform {
    pub fn new(policy: MalformedPolicy) -> Self {
        Self { policy }
    }

    /// Run the stage to completion.
    pub async fn run(
        &self,
        store: &dyn ObjectStore,
        job: &TransformJob,
    ) -> Result<TransformReport, TransformError> {
        let objects = store.list(&job.input_prefix).await?;
        info!(
            input = %job.input_prefix,
            objects = objects.len(),
            engine = job.engine.as_str(),
            "Starting clean stage"
        );

        let mut inputs = Vec::with_capacity(objects.len());
        for meta in &objects {
            let data = store.get(&meta.key).await?;
            inputs.push((meta.key.clone(), data));
        }

        let policy = self.policy;
        let (mut records, records_in, records_dropped) =
            run_on_engine(job.engine, move || parse_raw_objects(&inputs, policy)).await??;

        // Deterministic output: same input set, same bytes.
        records.sort_by(|a, b| {
            (a.timestamp, a.device_id.as_str()).cmp(&(b.timestamp, b.device_id.as_str()))
        });

        let encoded = {
            let records = records.clone();
            run_on_engine(job.engine, move || encode_clean_records(&records)).await??
        };

        let output_key = format!("{}{}", job.output_prefix, OUTPUT_OBJECT);
        store.put(&output_key, &encoded).await?;

        info!(
            output = %output_key,
            records_in,
            records_out = records.len(),
            records_dropped,
            "Clean stage completed"
        );

        Ok(TransformReport {
            records_in,
            records_out: records.len() as u64,
            records_dropped,
            output_keys: vec![output_key],
        })
    }
}

/// Parse JSON-lines objects into clean records according to the malformed
/// policy. Returns (records, records_in, records_dropped).
fn parse_raw_objects(
    inputs: &[(String, Vec<u8>)],
    policy: MalformedPolicy,
) -> Result<(Vec<CleanRecord>, u64, u64), TransformError> {
    let mut records = Vec::new();
    let mut records_in = 0u64;
    let mut records_dropped = 0u64;

    for (key, data) in inputs {
        let text = String::from_utf8_lossy(data);

        for (idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            records_in += 1;

            match parse_line(line) {
                Ok(record) => records.push(record),
                Err(reason) => match policy {
                    MalformedPolicy::Drop => {
                        records_dropped += 1;
                        debug!(key = %key, line = idx + 1, reason = %reason, "Dropped malformed record");
                    }
                    MalformedPolicy::Abort => {
                        warn!(key = %key, line = idx + 1, reason = %reason, "Aborting on malformed record");
                        return Err(TransformError::MalformedRecord {
                            key: key.clone(),
                            line: idx + 1,
                            reason,
                        });
                    }
                },
            }
        }
    }

    Ok((records, records_in, records_dropped))
}

fn parse_line(line: &str) -> Result<CleanRecord, String> {
    let raw: RawRecord =
        serde_json::from_str(line).map_err(|e| format!("invalid JSON: {e}"))?;

    let timestamp = coerce_i64(&raw.timestamp).ok_or("timestamp is not an integer")?;
    let device_id = coerce_device_id(&raw.device_id)?;
    let temperature = raw
        .temperature
        .as_ref()
        .and_then(coerce_f64)
        .ok_or("temperature is not a finite number")?;
    let humidity = raw
        .humidity
        .as_ref()
        .and_then(coerce_f64)
        .ok_or("humidity is not a finite number")?;

    Ok(CleanRecord {
        timestamp,
        device_id,
        temperature,
        humidity,
    })
}

fn coerce_device_id(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Ok(s.clone()),
        Value::String(_) => Err("device_id is empty".to_string()),
        other => Err(format!("device_id is not a string: {other}")),
    }
}

fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::columnar::decode_clean_records;
    use crate::store::FsObjectStore;
    use crate::transform::ExecutionEngine;
    use tempfile::TempDir;

    async fn store_with_raw(lines: &str) -> (FsObjectStore, TempDir) {
        let temp = TempDir::new().unwrap();
        let store = FsObjectStore::new(temp.path().join("store")).await.unwrap();
        store.put("raw/part-000.jsonl", lines.as_bytes()).await.unwrap();
        (store, temp)
    }

    fn job() -> TransformJob {
        TransformJob::new("raw/", "clean/").with_engine(ExecutionEngine::Inline)
    }

    #[tokio::test]
    async fn test_clean_valid_records() {
        let (store, _temp) = store_with_raw(concat!(
            r#"{"timestamp": 0, "device_id": "dev-a", "temperature": 1.0, "humidity": 40}"#,
            "\n",
            r#"{"timestamp": "299", "device_id": "dev-a", "temperature": "3.5", "humidity": 41}"#,
            "\n",
        ))
        .await;

        let transform = CleanTransform::new(MalformedPolicy::Drop);
        let report = transform.run(&store, &job()).await.unwrap();

        assert_eq!(report.records_in, 2);
        assert_eq!(report.records_out, 2);
        assert_eq!(report.records_dropped, 0);

        let data = store.get(&report.output_keys[0]).await.unwrap();
        let records = decode_clean_records(&data).unwrap();
        assert_eq!(records.len(), 2);
        // String-typed fields were coerced.
        assert_eq!(records[1].timestamp, 299);
        assert_eq!(records[1].temperature, 3.5);
    }

    #[tokio::test]
    async fn test_drop_policy_keeps_only_well_formed_records() {
        let (store, _temp) = store_with_raw(concat!(
            r#"{"timestamp": 10, "device_id": "dev-a", "temperature": 1, "humidity": 2}"#,
            "\n",
            "not even json\n",
            r#"{"timestamp": "later", "device_id": "dev-a", "temperature": 1, "humidity": 2}"#,
            "\n",
            r#"{"timestamp": 20, "device_id": "", "temperature": 1, "humidity": 2}"#,
            "\n",
            r#"{"timestamp": 30, "device_id": "dev-b", "humidity": 2}"#,
            "\n",
        ))
        .await;

        let transform = CleanTransform::new(MalformedPolicy::Drop);
        let report = transform.run(&store, &job()).await.unwrap();

        assert_eq!(report.records_in, 5);
        assert_eq!(report.records_out, 1);
        assert_eq!(report.records_dropped, 4);

        let data = store.get(&report.output_keys[0]).await.unwrap();
        let records = decode_clean_records(&data).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].device_id, "dev-a");
    }

    #[tokio::test]
    async fn test_abort_policy_fails_job_and_promotes_nothing() {
        let (store, _temp) = store_with_raw(concat!(
            r#"{"timestamp": 10, "device_id": "dev-a", "temperature": 1, "humidity": 2}"#,
            "\n",
            "garbage\n",
        ))
        .await;

        let transform = CleanTransform::new(MalformedPolicy::Abort);
        let result = transform.run(&store, &job()).await;

        assert!(matches!(
            result,
            Err(TransformError::MalformedRecord { line: 2, .. })
        ));

        // No partial output was promoted.
        let clean = store.list("clean/").await.unwrap();
        assert!(clean.is_empty());
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let (store, _temp) = store_with_raw(concat!(
            r#"{"timestamp": 5, "device_id": "dev-a", "temperature": 1, "humidity": 2}"#,
            "\n",
        ))
        .await;

        let transform = CleanTransform::new(MalformedPolicy::Drop);
        let first = transform.run(&store, &job()).await.unwrap();
        let first_bytes = store.get(&first.output_keys[0]).await.unwrap();

        let second = transform.run(&store, &job()).await.unwrap();
        let second_bytes = store.get(&second.output_keys[0]).await.unwrap();

        assert_eq!(first.output_keys, second.output_keys);
        assert_eq!(first_bytes, second_bytes);

        let clean = store.list("clean/").await.unwrap();
        assert_eq!(clean.len(), 1);
    }

    #[tokio::test]
    async fn test_blocking_engine_produces_same_output() {
        let (store, _temp) = store_with_raw(concat!(
            r#"{"timestamp": 5, "device_id": "dev-a", "temperature": 1, "humidity": 2}"#,
            "\n",
        ))
        .await;

        let transform = CleanTransform::new(MalformedPolicy::Drop);
        let job = TransformJob::new("raw/", "clean/").with_engine(ExecutionEngine::Blocking);
        let report = transform.run(&store, &job).await.unwrap();
        assert_eq!(report.records_out, 1);
    }

    #[test]
    fn test_coercions() {
        assert_eq!(coerce_i64(&serde_json::json!(42)), Some(42));
        assert_eq!(coerce_i64(&serde_json::json!(42.0)), Some(42));
        assert_eq!(coerce_i64(&serde_json::json!("42")), Some(42));
        assert_eq!(coerce_i64(&serde_json::json!(42.5)), None);
        assert_eq!(coerce_i64(&serde_json::json!(null)), None);

        assert_eq!(coerce_f64(&serde_json::json!(1.5)), Some(1.5));
        assert_eq!(coerce_f64(&serde_json::json!("1.5")), Some(1.5));
        assert_eq!(coerce_f64(&serde_json::json!("oops")), None);
    }
}
