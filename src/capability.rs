//! Capability and purpose vocabularies.
//!
//! `Capability` is the fixed set of AI functionality classes the registry
//! indexes providers by. `Purpose` is the vocabulary used by per-user model
//! preferences; the two are bijective.

use serde::{Deserialize, Serialize};

/// A class of AI functionality a provider can implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Chat,
    Embedding,
    Vision,
    ImageGeneration,
    VideoGeneration,
    SpeechToText,
    TextToSpeech,
    FileAnalysis,
}

impl Capability {
    /// All capabilities, in a stable order.
    pub const ALL: [Capability; 8] = [
        Capability::Chat,
        Capability::Embedding,
        Capability::Vision,
        Capability::ImageGeneration,
        Capability::VideoGeneration,
        Capability::SpeechToText,
        Capability::TextToSpeech,
        Capability::FileAnalysis,
    ];

    /// Canonical snake_case tag, as stored in the enablement map.
    pub fn tag(&self) -> &'static str {
        match self {
            Capability::Chat => "chat",
            Capability::Embedding => "embedding",
            Capability::Vision => "vision",
            Capability::ImageGeneration => "image_generation",
            Capability::VideoGeneration => "video_generation",
            Capability::SpeechToText => "speech_to_text",
            Capability::TextToSpeech => "text_to_speech",
            Capability::FileAnalysis => "file_analysis",
        }
    }

    /// Parse a tag as found in administrative configuration.
    ///
    /// Accepts the canonical tags plus the legacy purpose spellings some
    /// deployments still store ("vectorize", "pic2text", ...).
    pub fn parse_tag(tag: &str) -> Option<Capability> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "chat" => Some(Capability::Chat),
            "embedding" | "vectorize" => Some(Capability::Embedding),
            "vision" | "pic2text" => Some(Capability::Vision),
            "image_generation" | "text2pic" => Some(Capability::ImageGeneration),
            "video_generation" | "text2vid" => Some(Capability::VideoGeneration),
            "speech_to_text" | "sound2text" => Some(Capability::SpeechToText),
            "text_to_speech" | "text2sound" => Some(Capability::TextToSpeech),
            "file_analysis" | "analyze" => Some(Capability::FileAnalysis),
            _ => None,
        }
    }

    /// The preference purpose this capability serves.
    pub fn purpose(&self) -> Purpose {
        match self {
            Capability::Chat => Purpose::Chat,
            Capability::Embedding => Purpose::Vectorize,
            Capability::Vision => Purpose::Pic2Text,
            Capability::ImageGeneration => Purpose::Text2Pic,
            Capability::VideoGeneration => Purpose::Text2Vid,
            Capability::SpeechToText => Purpose::Sound2Text,
            Capability::TextToSpeech => Purpose::Text2Sound,
            Capability::FileAnalysis => Purpose::Analyze,
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Purpose keys used by per-user model configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Purpose {
    Chat,
    Vectorize,
    Pic2Text,
    Text2Pic,
    Text2Vid,
    Sound2Text,
    Text2Sound,
    Analyze,
}

impl Purpose {
    pub fn tag(&self) -> &'static str {
        match self {
            Purpose::Chat => "chat",
            Purpose::Vectorize => "vectorize",
            Purpose::Pic2Text => "pic2text",
            Purpose::Text2Pic => "text2pic",
            Purpose::Text2Vid => "text2vid",
            Purpose::Sound2Text => "sound2text",
            Purpose::Text2Sound => "text2sound",
            Purpose::Analyze => "analyze",
        }
    }

    /// The capability that fulfills this purpose.
    pub fn capability(&self) -> Capability {
        match self {
            Purpose::Chat => Capability::Chat,
            Purpose::Vectorize => Capability::Embedding,
            Purpose::Pic2Text => Capability::Vision,
            Purpose::Text2Pic => Capability::ImageGeneration,
            Purpose::Text2Vid => Capability::VideoGeneration,
            Purpose::Sound2Text => Capability::SpeechToText,
            Purpose::Text2Sound => Capability::TextToSpeech,
            Purpose::Analyze => Capability::FileAnalysis,
        }
    }
}

impl std::fmt::Display for Purpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_purpose_roundtrip() {
        for cap in Capability::ALL {
            assert_eq!(cap.purpose().capability(), cap);
        }
    }

    #[test]
    fn test_parse_canonical_tags() {
        for cap in Capability::ALL {
            assert_eq!(Capability::parse_tag(cap.tag()), Some(cap));
        }
    }

    #[test]
    fn test_parse_legacy_purpose_tags() {
        assert_eq!(Capability::parse_tag("vectorize"), Some(Capability::Embedding));
        assert_eq!(Capability::parse_tag("pic2text"), Some(Capability::Vision));
        assert_eq!(Capability::parse_tag("TEXT2PIC"), Some(Capability::ImageGeneration));
    }

    #[test]
    fn test_parse_unknown_tag() {
        assert_eq!(Capability::parse_tag("telepathy"), None);
    }

    #[test]
    fn test_serde_tags_match() {
        let json = serde_json::to_string(&Capability::SpeechToText).unwrap();
        assert_eq!(json, "\"speech_to_text\"");
    }
}
