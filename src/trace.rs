//! Serializable trace records of stream outputs.
//!
//! A [`TraceEntry`] is a timestamped, type-erased snapshot of one
//! [`Output`], suitable for writing to structured logs.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::output::{Data, Datum, Output};
use crate::Result;

/// What kind of data a traced output carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
    /// A value of the emitting stage's own type.
    Value,
    /// A value re-emitted from an upstream stage.
    Intermediate,
    /// A captured error.
    Error,
}

/// A timestamped snapshot of one output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Unix epoch timestamp in milliseconds when the output was observed.
    pub timestamp: u128,
    /// Label of the stream that produced the output.
    pub producer: String,
    /// Whether the output was a final result.
    #[serde(rename = "final")]
    pub is_final: bool,
    /// What the output carried.
    pub kind: TraceKind,
    /// The rendered data.
    pub data: String,
}

impl TraceEntry {
    /// Snapshot `output` with the current timestamp.
    #[must_use]
    pub fn new<T: Datum>(output: &Output<T>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default();
        let kind = match output.data {
            Data::Value(_) => TraceKind::Value,
            Data::Intermediate(_) => TraceKind::Intermediate,
            Data::Error(_) => TraceKind::Error,
        };
        Self {
            timestamp,
            producer: output.producer.clone(),
            is_final: output.is_final,
            kind,
            data: output.render(),
        }
    }

    /// Serialize this entry as a single JSON line.
    pub fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
