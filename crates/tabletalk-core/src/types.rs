//! Shared wire and persistence types.
//!
//! `ChartSuggestion` is the structured record the visualization classifier
//! extracts from answer text; `MessageRecord` is the on-disk shape of one
//! session history entry. Both serialize to the exact JSON the HTTP API and
//! the session files expose, so the serde attribute names here are load-bearing.

use serde::{Deserialize, Serialize};

/// Chart families the classifier may suggest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChartKind {
    #[serde(rename = "Bar Chart")]
    Bar,
    #[serde(rename = "Line Chart")]
    Line,
    #[serde(rename = "Pie Chart")]
    Pie,
    #[serde(rename = "Scatter Plot")]
    Scatter,
    #[serde(rename = "Histogram")]
    Histogram,
}

/// A structured chart description extracted from answer text.
///
/// Absent from the response whenever the answer is not chart-worthy or the
/// model's output fails to parse into this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSuggestion {
    #[serde(rename = "chartType")]
    pub chart_type: ChartKind,
    pub labels: Vec<String>,
    pub data: Vec<f64>,
    pub title: String,
}

/// Who produced a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Human,
    Ai,
}

/// Message payload inside a persisted session record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageBody {
    pub content: String,
}

/// One persisted session history entry: `{"type": ..., "data": {"content": ...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    #[serde(rename = "type")]
    pub role: Role,
    pub data: MessageBody,
}

impl MessageRecord {
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            data: MessageBody {
                content: content.into(),
            },
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self {
            role: Role::Ai,
            data: MessageBody {
                content: content.into(),
            },
        }
    }
}
