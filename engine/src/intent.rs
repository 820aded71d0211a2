//! Query Intent Labels
//!
//! Every request is classified once into one of these intents. The intent
//! selects the generator state in the workflow and namespaces cache keys.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Intent tag produced by the classifier
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// A request for a specific supplication (dua)
    Dua,

    /// A conversational question answered by the companion persona
    CompanionAnswer,

    /// A request for video recommendations
    VideoList,
}

impl Intent {
    /// Wire label for this intent, also used as a cache namespace
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Dua => "dua",
            Intent::CompanionAnswer => "companion_answer",
            Intent::VideoList => "video_list",
        }
    }

    /// Parse a classifier label. Unknown labels return `None`;
    /// the workflow falls back to `CompanionAnswer` in that case.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "dua" => Some(Intent::Dua),
            "companion_answer" => Some(Intent::CompanionAnswer),
            "video_list" => Some(Intent::VideoList),
            _ => None,
        }
    }

    /// All intents, in classifier-prompt order
    pub fn all() -> [Intent; 3] {
        [Intent::Dua, Intent::CompanionAnswer, Intent::VideoList]
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_round_trip() {
        for intent in Intent::all() {
            assert_eq!(Intent::from_label(intent.as_str()), Some(intent));
        }
    }

    #[test]
    fn test_unknown_label() {
        assert_eq!(Intent::from_label("watch"), None);
        assert_eq!(Intent::from_label(""), None);
    }

    #[test]
    fn test_label_trimming() {
        assert_eq!(Intent::from_label(" dua \n"), Some(Intent::Dua));
    }

    #[test]
    fn test_serde_labels() {
        let json = serde_json::to_string(&Intent::CompanionAnswer).unwrap();
        assert_eq!(json, "\"companion_answer\"");
        let parsed: Intent = serde_json::from_str("\"video_list\"").unwrap();
        assert_eq!(parsed, Intent::VideoList);
    }
}
