//! Streaming events emitted by chat-capable providers.

use serde::{Deserialize, Serialize};

use super::outcome::UsageInfo;

/// Unified streaming event enum.
///
/// Providers translate their native wire frames into this shape; the facade
/// only ever sees these.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum StreamEvent {
    /// Partial content delta (text streaming)
    #[serde(rename = "ContentDelta")]
    ContentDelta { content: String },

    /// Usage / finish metadata, typically the last meaningful frame.
    #[serde(rename = "Metadata")]
    Metadata {
        #[serde(skip_serializing_if = "Option::is_none")]
        usage: Option<UsageInfo>,
        #[serde(skip_serializing_if = "Option::is_none")]
        finish_reason: Option<String>,
    },

    /// Stream end
    #[serde(rename = "StreamEnd")]
    StreamEnd {
        #[serde(skip_serializing_if = "Option::is_none")]
        finish_reason: Option<String>,
    },
}
