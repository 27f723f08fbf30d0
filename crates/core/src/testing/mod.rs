//! Test doubles and fixtures shared by unit and integration tests.

mod mock_runtime;

pub use mock_runtime::{MockTrainingRuntime, RecordedDeploy, TrainingMode};

/// Shared fixtures for tests.
pub mod fixtures {
    use crate::dataset::CleanRecord;

    /// One well-formed raw JSON line.
    pub fn raw_line(timestamp: i64, device_id: &str, temperature: f64) -> String {
        format!(
            r#"{{"timestamp": {timestamp}, "device_id": "{device_id}", "temperature": {temperature}, "humidity": 50.0}}"#
        )
    }

    /// A raw JSON-lines document from (timestamp, device, temperature)
    /// triples.
    pub fn raw_jsonl(rows: &[(i64, &str, f64)]) -> String {
        let mut out = String::new();
        for (timestamp, device_id, temperature) in rows {
            out.push_str(&raw_line(*timestamp, device_id, *temperature));
            out.push('\n');
        }
        out
    }

    /// A clean record with a fixed humidity.
    pub fn clean_record(timestamp: i64, device_id: &str, temperature: f64) -> CleanRecord {
        CleanRecord {
            timestamp,
            device_id: device_id.to_string(),
            temperature,
            humidity: 50.0,
        }
    }
}
