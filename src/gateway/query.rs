//! Placeholder query handling
//!
//! Historical queries are not backed by the streaming path. Each query is
//! validated and answered with a two-point frame spanning its time range.

use crate::error::Result;
use crate::frame::Frame;
use arrow_array::{Int64Array, RecordBatch, TimestampMillisecondArray};
use arrow_schema::{DataType, Field, Schema, TimeUnit};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Name of the frame returned for every successful query
pub const RESPONSE_FRAME: &str = "response";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// One query of a batch, keyed by a caller-chosen reference id
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQuery {
    pub ref_id: String,
    pub time_range: TimeRange,
    /// Editor-supplied query model
    #[serde(default = "empty_object")]
    pub json: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryDataRequest {
    pub queries: Vec<DataQuery>,
}

/// Query model sent by the query editor
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryModel {
    #[serde(default)]
    pub lower_limit: Option<f64>,
    #[serde(default)]
    pub upper_limit: Option<f64>,
    #[serde(default)]
    pub tick_interval: Option<f64>,
}

/// Answer to one query: frames, or an error with an HTTP-style status
#[derive(Debug, Clone, Default, Serialize)]
pub struct DataResponse {
    pub frames: Vec<Frame>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DataResponse {
    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            frames: Vec::new(),
            status: Some(status),
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryDataResponse {
    pub responses: BTreeMap<String, DataResponse>,
}

/// Answer every query independently
pub fn query_data(request: &QueryDataRequest) -> QueryDataResponse {
    let responses = request
        .queries
        .iter()
        .map(|q| (q.ref_id.clone(), query(q)))
        .collect();
    QueryDataResponse { responses }
}

fn query(query: &DataQuery) -> DataResponse {
    let model: QueryModel = match serde_json::from_value(query.json.clone()) {
        Ok(model) => model,
        Err(e) => return DataResponse::error(400, format!("json unmarshal: {}", e)),
    };
    debug!(ref_id = %query.ref_id, model = ?model, "Query");

    match placeholder_frame(&query.time_range) {
        Ok(frame) => DataResponse {
            frames: vec![frame],
            ..Default::default()
        },
        Err(e) => DataResponse::error(500, e.to_string()),
    }
}

fn placeholder_frame(range: &TimeRange) -> Result<Frame> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("time", DataType::Timestamp(TimeUnit::Millisecond, None), false),
        Field::new("values", DataType::Int64, false),
    ]));
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(TimestampMillisecondArray::from(vec![
                range.from.timestamp_millis(),
                range.to.timestamp_millis(),
            ])),
            Arc::new(Int64Array::from(vec![10, 20])),
        ],
    )?;
    Ok(Frame::new(RESPONSE_FRAME, batch))
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}
