//! Core type definitions shared across the orchestration layer.

pub mod events;
pub mod message;
pub mod options;
pub mod outcome;

pub use events::StreamEvent;
pub use message::{ContentBlock, ImageSource, Message, MessageContent, MessageRole};
pub use options::CallOptions;
pub use outcome::{
    AnalysisOutcome, ChatOutcome, MediaArtifact, MediaOutcome, SpeechOutcome, StreamOutcome,
    TranscriptOutcome, UsageInfo, VisionOutcome,
};
