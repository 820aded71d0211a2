//! Response Drafts and the Final Output Envelope
//!
//! Generators produce typed drafts; the finalizer maps a (intent, draft)
//! pair into the uniform `{type, content, metadata}` envelope consumed by
//! any transport layer. Draft fields are serde-defaulted so a partially
//! filled generator payload still parses and is scored by the evaluator
//! rather than treated as a structural failure.

use crate::intent::Intent;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// A dua draft. All five fields are required for a complete response;
/// missing fields deserialize as empty strings and lose rubric weight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DuaResponse {
    #[serde(default)]
    pub arabic: String,

    #[serde(default)]
    pub transliteration: String,

    #[serde(default)]
    pub translation: String,

    #[serde(default)]
    pub source: String,

    #[serde(default)]
    pub context: String,
}

/// A conversational companion answer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CompanionAnswer {
    #[serde(default)]
    pub text: String,
}

/// A single recommended video
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Video {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub channel: String,

    #[serde(default)]
    pub thumbnail: String,

    #[serde(default)]
    pub duration: String,
}

/// An ordered list of recommended videos
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct VideoList {
    #[serde(default)]
    pub videos: Vec<Video>,
}

/// Tagged union of generator outputs, one variant per intent
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseDraft {
    Dua(DuaResponse),
    Companion(CompanionAnswer),
    Videos(VideoList),
}

impl ResponseDraft {
    /// The intent this draft belongs to
    pub fn intent(&self) -> Intent {
        match self {
            ResponseDraft::Dua(_) => Intent::Dua,
            ResponseDraft::Companion(_) => Intent::CompanionAnswer,
            ResponseDraft::Videos(_) => Intent::VideoList,
        }
    }
}

/// Output type tag of the final envelope
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputType {
    DuaCard,
    VideoCard,
    Text,
}

impl OutputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputType::DuaCard => "dua_card",
            OutputType::VideoCard => "video_card",
            OutputType::Text => "text",
        }
    }
}

/// The uniform output envelope. Field names and type tags are the stable
/// contract with every transport layer and must not change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinalOutput {
    /// One of "dua_card", "video_card", "text"
    #[serde(rename = "type")]
    pub kind: OutputType,

    /// Short human-readable label, or the answer text itself
    pub content: String,

    /// Full typed payload plus the numeric quality score
    pub metadata: serde_json::Value,
}

impl FinalOutput {
    /// Map a finished draft and its quality score into the envelope
    pub fn from_draft(draft: &ResponseDraft, quality_score: f64) -> Self {
        match draft {
            ResponseDraft::Dua(dua) => {
                let mut metadata = serde_json::to_value(dua).unwrap_or_else(|_| json!({}));
                if let Some(map) = metadata.as_object_mut() {
                    map.insert("_quality_score".to_string(), json!(quality_score));
                }
                FinalOutput {
                    kind: OutputType::DuaCard,
                    content: "Here is a Dua:".to_string(),
                    metadata,
                }
            }
            ResponseDraft::Videos(list) => {
                let content = if list.videos.is_empty() {
                    "No videos."
                } else {
                    "Here are videos:"
                };
                FinalOutput {
                    kind: OutputType::VideoCard,
                    content: content.to_string(),
                    metadata: serde_json::to_value(&list.videos).unwrap_or_else(|_| json!([])),
                }
            }
            ResponseDraft::Companion(answer) => {
                let content = if answer.text.is_empty() {
                    "I'm here to help.".to_string()
                } else {
                    answer.text.clone()
                };
                FinalOutput {
                    kind: OutputType::Text,
                    content,
                    metadata: json!({ "_quality_score": quality_score }),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_intent_mapping() {
        assert_eq!(
            ResponseDraft::Dua(DuaResponse::default()).intent(),
            Intent::Dua
        );
        assert_eq!(
            ResponseDraft::Companion(CompanionAnswer::default()).intent(),
            Intent::CompanionAnswer
        );
        assert_eq!(
            ResponseDraft::Videos(VideoList::default()).intent(),
            Intent::VideoList
        );
    }

    #[test]
    fn test_partial_dua_parses() {
        let dua: DuaResponse =
            serde_json::from_str(r#"{"arabic": "نص", "source": "Quran 2:255"}"#).unwrap();
        assert_eq!(dua.arabic, "نص");
        assert_eq!(dua.source, "Quran 2:255");
        assert!(dua.translation.is_empty());
    }

    #[test]
    fn test_dua_envelope() {
        let dua = DuaResponse {
            arabic: "آية".to_string(),
            transliteration: "ayah".to_string(),
            translation: "a verse".to_string(),
            source: "Quran 2:255".to_string(),
            context: "recited for protection".to_string(),
        };
        let output = FinalOutput::from_draft(&ResponseDraft::Dua(dua), 0.85);

        assert_eq!(output.kind, OutputType::DuaCard);
        assert_eq!(output.content, "Here is a Dua:");
        assert_eq!(output.metadata["source"], "Quran 2:255");
        assert_eq!(output.metadata["_quality_score"], 0.85);

        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["type"], "dua_card");
    }

    #[test]
    fn test_video_envelope() {
        let list = VideoList {
            videos: vec![Video {
                title: "Understanding Surah Al-Fatiha in depth".to_string(),
                channel: "Bayyinah Institute".to_string(),
                thumbnail: "https://example.com/t.jpg".to_string(),
                duration: "12:30".to_string(),
            }],
        };
        let output = FinalOutput::from_draft(&ResponseDraft::Videos(list), 0.95);

        assert_eq!(output.kind, OutputType::VideoCard);
        assert_eq!(output.content, "Here are videos:");
        assert!(output.metadata.is_array());
        assert_eq!(output.metadata[0]["channel"], "Bayyinah Institute");
    }

    #[test]
    fn test_empty_video_envelope() {
        let output =
            FinalOutput::from_draft(&ResponseDraft::Videos(VideoList::default()), 0.0);
        assert_eq!(output.content, "No videos.");
        assert_eq!(output.metadata, json!([]));
    }

    #[test]
    fn test_text_envelope() {
        let answer = CompanionAnswer {
            text: "Patience is rewarded.".to_string(),
        };
        let output = FinalOutput::from_draft(&ResponseDraft::Companion(answer), 0.75);

        assert_eq!(output.kind, OutputType::Text);
        assert_eq!(output.content, "Patience is rewarded.");
        assert_eq!(output.metadata["_quality_score"], 0.75);
    }

    #[test]
    fn test_empty_text_envelope_placeholder() {
        let output =
            FinalOutput::from_draft(&ResponseDraft::Companion(CompanionAnswer::default()), 0.0);
        assert_eq!(output.content, "I'm here to help.");
    }
}
