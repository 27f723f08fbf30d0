//! Arrow IPC encodings for the clean and aggregated datasets.
//!
//! Both datasets have fixed schemas; encoding is a single record batch in
//! Arrow IPC stream format, which keeps objects self-describing and cheap to
//! scan column-wise.

use std::io::Cursor;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::ipc::reader::StreamReader;
use arrow::ipc::writer::StreamWriter;
use arrow::record_batch::RecordBatch;
use thiserror::Error;

use super::types::{AggregateRecord, CleanRecord, FieldSummary};

/// Errors raised by the columnar codec.
#[derive(Debug, Error)]
pub enum ColumnarError {
    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("unexpected schema: {0}")]
    Schema(String),
}

/// Schema of the clean dataset.
pub fn clean_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("timestamp", DataType::Int64, false),
        Field::new("device_id", DataType::Utf8, false),
        Field::new("temperature", DataType::Float64, false),
        Field::new("humidity", DataType::Float64, false),
    ]))
}

/// Schema of the aggregated dataset.
pub fn aggregate_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("window_start", DataType::Int64, false),
        Field::new("device_id", DataType::Utf8, false),
        Field::new("temperature_avg", DataType::Float64, false),
        Field::new("temperature_min", DataType::Float64, false),
        Field::new("temperature_max", DataType::Float64, false),
        Field::new("humidity_avg", DataType::Float64, false),
        Field::new("humidity_min", DataType::Float64, false),
        Field::new("humidity_max", DataType::Float64, false),
        Field::new("sample_count", DataType::UInt64, false),
    ]))
}

fn write_ipc(batch: &RecordBatch) -> Result<Vec<u8>, ColumnarError> {
    let mut buf = Vec::with_capacity(batch.get_array_memory_size() + 1024);
    let mut writer = StreamWriter::try_new(&mut buf, batch.schema().as_ref())?;
    writer.write(batch)?;
    writer.finish()?;
    Ok(buf)
}

fn read_ipc(bytes: &[u8]) -> Result<Vec<RecordBatch>, ColumnarError> {
    let reader = StreamReader::try_new(Cursor::new(bytes), None)?;
    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }
    Ok(batches)
}

fn column<'a, T: 'static>(
    batch: &'a RecordBatch,
    index: usize,
    name: &str,
) -> Result<&'a T, ColumnarError> {
    batch
        .column(index)
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| ColumnarError::Schema(format!("column {index} is not {name}")))
}

/// Encode clean records as a single Arrow IPC stream.
pub fn encode_clean_records(records: &[CleanRecord]) -> Result<Vec<u8>, ColumnarError> {
    let timestamps: Int64Array = records.iter().map(|r| r.timestamp).collect();
    let device_ids: StringArray = records.iter().map(|r| Some(r.device_id.as_str())).collect();
    let temperatures: Float64Array = records.iter().map(|r| r.temperature).collect();
    let humidities: Float64Array = records.iter().map(|r| r.humidity).collect();

    let columns: Vec<ArrayRef> = vec![
        Arc::new(timestamps),
        Arc::new(device_ids),
        Arc::new(temperatures),
        Arc::new(humidities),
    ];
    let batch = RecordBatch::try_new(clean_schema(), columns)?;
    write_ipc(&batch)
}

/// Decode an Arrow IPC stream of clean records.
pub fn decode_clean_records(bytes: &[u8]) -> Result<Vec<CleanRecord>, ColumnarError> {
    let mut records = Vec::new();

    for batch in read_ipc(bytes)? {
        if batch.num_columns() != clean_schema().fields().len() {
            return Err(ColumnarError::Schema(format!(
                "clean batch has {} columns",
                batch.num_columns()
            )));
        }

        let timestamps = column::<Int64Array>(&batch, 0, "Int64")?;
        let device_ids = column::<StringArray>(&batch, 1, "Utf8")?;
        let temperatures = column::<Float64Array>(&batch, 2, "Float64")?;
        let humidities = column::<Float64Array>(&batch, 3, "Float64")?;

        for i in 0..batch.num_rows() {
            records.push(CleanRecord {
                timestamp: timestamps.value(i),
                device_id: device_ids.value(i).to_string(),
                temperature: temperatures.value(i),
                humidity: humidities.value(i),
            });
        }
    }

    Ok(records)
}

/// Encode aggregate records as a single Arrow IPC stream.
pub fn encode_aggregate_records(records: &[AggregateRecord]) -> Result<Vec<u8>, ColumnarError> {
    let window_starts: Int64Array = records.iter().map(|r| r.window_start).collect();
    let device_ids: StringArray = records.iter().map(|r| Some(r.device_id.as_str())).collect();
    let t_avg: Float64Array = records.iter().map(|r| r.temperature.avg).collect();
    let t_min: Float64Array = records.iter().map(|r| r.temperature.min).collect();
    let t_max: Float64Array = records.iter().map(|r| r.temperature.max).collect();
    let h_avg: Float64Array = records.iter().map(|r| r.humidity.avg).collect();
    let h_min: Float64Array = records.iter().map(|r| r.humidity.min).collect();
    let h_max: Float64Array = records.iter().map(|r| r.humidity.max).collect();
    let counts: UInt64Array = records.iter().map(|r| r.sample_count).collect();

    let columns: Vec<ArrayRef> = vec![
        Arc::new(window_starts),
        Arc::new(device_ids),
        Arc::new(t_avg),
        Arc::new(t_min),
        Arc::new(t_max),
        Arc::new(h_avg),
        Arc::new(h_min),
        Arc::new(h_max),
        Arc::new(counts),
    ];
    let batch = RecordBatch::try_new(aggregate_schema(), columns)?;
    write_ipc(&batch)
}

/// Decode an Arrow IPC stream of aggregate records.
pub fn decode_aggregate_records(bytes: &[u8]) -> Result<Vec<AggregateRecord>, ColumnarError> {
    let mut records = Vec::new();

    for batch in read_ipc(bytes)? {
        if batch.num_columns() != aggregate_schema().fields().len() {
            return Err(ColumnarError::Schema(format!(
                "aggregate batch has {} columns",
                batch.num_columns()
            )));
        }

        let window_starts = column::<Int64Array>(&batch, 0, "Int64")?;
        let device_ids = column::<StringArray>(&batch, 1, "Utf8")?;
        let t_avg = column::<Float64Array>(&batch, 2, "Float64")?;
        let t_min = column::<Float64Array>(&batch, 3, "Float64")?;
        let t_max = column::<Float64Array>(&batch, 4, "Float64")?;
        let h_avg = column::<Float64Array>(&batch, 5, "Float64")?;
        let h_min = column::<Float64Array>(&batch, 6, "Float64")?;
        let h_max = column::<Float64Array>(&batch, 7, "Float64")?;
        let counts = column::<UInt64Array>(&batch, 8, "UInt64")?;

        for i in 0..batch.num_rows() {
            records.push(AggregateRecord {
                window_start: window_starts.value(i),
                device_id: device_ids.value(i).to_string(),
                temperature: FieldSummary {
                    avg: t_avg.value(i),
                    min: t_min.value(i),
                    max: t_max.value(i),
                },
                humidity: FieldSummary {
                    avg: h_avg.value(i),
                    min: h_min.value(i),
                    max: h_max.value(i),
                },
                sample_count: counts.value(i),
            });
        }
    }

    Ok(records)
}
