//! Response Quality Evaluation
//!
//! Scores generator drafts against per-intent rubrics and decides whether
//! the workflow accepts, retries, or falls back. The rubric is a fixed,
//! inspectable heuristic: every component, weight, and partial credit is
//! part of the behavioral contract. Evaluation is pure and deterministic;
//! a missing or malformed field contributes zero or partial weight plus a
//! recorded issue string, never an error.

use crate::response::{CompanionAnswer, DuaResponse, ResponseDraft, Video, VideoList};
use regex::Regex;

/// Evidence markers that count as Islamic sourcing in a text answer
const EVIDENCE_MARKERS: [&str; 10] = [
    "quran", "hadith", "prophet", "pbuh", "allah", "surah", "verse", "sahih", "sunnah", "narrated",
];

/// Stop words removed from the query before the overlap check
const STOP_WORDS: [&str; 13] = [
    "what", "is", "the", "how", "can", "i", "a", "an", "in", "on", "to", "for", "of",
];

/// Greeting fragments expected near the start of a companion answer
const GREETINGS: [&str; 4] = ["assalamu", "salam", "dear brother", "dear sister"];

/// Verbs that make an answer actionable
const ACTION_VERBS: [&str; 11] = [
    "should", "can", "try", "practice", "recite", "perform", "remember", "avoid", "make", "pray",
    "read",
];

/// Named collections that make a dua source specific
const SOURCE_COLLECTIONS: [&str; 6] = ["quran", "hadith", "sahih", "sunan", "bukhari", "muslim"];

/// Placeholder titles that disqualify a video from the specificity credit
const GENERIC_TITLES: [&str; 3] = ["Islamic Video", "Watch This", "Must Watch"];

/// Channels on the approved-source allow-list (matched case-insensitively)
const APPROVED_CHANNELS: [&str; 6] = [
    "yaqeen institute",
    "bayyinah institute",
    "mufti menk",
    "omar suleiman",
    "nouman ali khan",
    "yasir qadhi",
];

/// Per-intent pass thresholds
#[derive(Debug, Clone, Copy)]
pub struct QualityThresholds {
    pub dua: f64,
    pub companion: f64,
    pub video: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            dua: 0.7,
            companion: 0.6,
            video: 0.5,
        }
    }
}

/// Outcome of scoring one draft
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Weighted score in [0, 1], rounded to two decimals
    pub score: f64,

    /// Threshold the score was compared against
    pub threshold: f64,

    /// `score >= threshold` (compared before rounding)
    pub passed: bool,

    /// Rubric components that lost weight, in evaluation order
    pub issues: Vec<String>,

    /// Human-readable quality band
    pub recommendation: String,
}

/// Quality evaluator with precompiled rubric patterns
pub struct Evaluator {
    thresholds: QualityThresholds,
    arabic_script: Regex,
    citation: Regex,
}

impl Evaluator {
    pub fn new(thresholds: QualityThresholds) -> Self {
        Self {
            thresholds,
            // Unicode block for Arabic script
            arabic_script: Regex::new(r"[\u{0600}-\u{06FF}]").expect("static regex"),
            // Pinpoint citations like "2:255" or "18.10"
            citation: Regex::new(r"\d+:\d+|\d+\.\d+").expect("static regex"),
        }
    }

    /// Score a draft against its intent's rubric
    pub fn evaluate(&self, draft: &ResponseDraft, query: &str) -> Evaluation {
        let (score, issues, threshold) = match draft {
            ResponseDraft::Dua(dua) => {
                let (s, i) = self.score_dua(dua);
                (s, i, self.thresholds.dua)
            }
            ResponseDraft::Companion(answer) => {
                let (s, i) = self.score_companion(answer, query);
                (s, i, self.thresholds.companion)
            }
            ResponseDraft::Videos(list) => {
                let (s, i) = self.score_videos(list);
                (s, i, self.thresholds.video)
            }
        };

        let passed = score >= threshold;
        let recommendation = if passed {
            if score >= 0.9 {
                "Excellent quality"
            } else if score >= 0.8 {
                "High quality"
            } else {
                "Acceptable quality"
            }
        } else {
            "Quality below threshold - consider retry"
        };

        Evaluation {
            score: (score * 100.0).round() / 100.0,
            threshold,
            passed,
            issues,
            recommendation: recommendation.to_string(),
        }
    }

    /// Dua rubric: fields-present 0.20, Arabic script+length 0.20,
    /// transliteration 0.15, translation 0.15, source 0.15, context 0.15
    fn score_dua(&self, dua: &DuaResponse) -> (f64, Vec<String>) {
        let mut score = 0.0;
        let mut issues = Vec::new();

        let fields: [(&str, &str); 5] = [
            ("arabic", &dua.arabic),
            ("transliteration", &dua.transliteration),
            ("translation", &dua.translation),
            ("source", &dua.source),
            ("context", &dua.context),
        ];
        let missing: Vec<&str> = fields
            .iter()
            .filter(|(_, v)| v.is_empty())
            .map(|(n, _)| *n)
            .collect();

        if missing.is_empty() {
            score += 0.20;
        } else {
            issues.push(format!("Missing fields: {}", missing.join(", ")));
        }

        if !dua.arabic.is_empty() {
            let has_arabic = self.arabic_script.is_match(&dua.arabic);
            let proper_length = dua.arabic.chars().count() >= 10;

            if has_arabic && proper_length {
                score += 0.20;
            } else if has_arabic {
                score += 0.10;
                issues.push("Arabic text too short".to_string());
            } else {
                issues.push("Arabic text missing or invalid".to_string());
            }
        }

        if !dua.transliteration.is_empty() {
            if dua.transliteration.chars().count() >= 10 && dua.transliteration.is_ascii() {
                score += 0.15;
            } else {
                score += 0.05;
                issues.push("Transliteration too short or contains non-ASCII".to_string());
            }
        }

        if !dua.translation.is_empty() {
            let word_count = dua.translation.split_whitespace().count();
            if word_count >= 15 {
                score += 0.15;
            } else if word_count >= 8 {
                score += 0.10;
                issues.push("Translation is brief".to_string());
            } else {
                score += 0.05;
                issues.push("Translation too short".to_string());
            }
        }

        if !dua.source.is_empty() {
            let source_lower = dua.source.to_lowercase();
            let has_reference = dua.source.chars().any(|c| c.is_ascii_digit())
                || SOURCE_COLLECTIONS.iter().any(|k| source_lower.contains(k));

            if has_reference && dua.source.chars().count() >= 8 {
                score += 0.15;
            } else if has_reference {
                score += 0.10;
                issues.push("Source could be more specific".to_string());
            } else {
                score += 0.05;
                issues.push("Source lacks specific reference".to_string());
            }
        }

        if !dua.context.is_empty() {
            let word_count = dua.context.split_whitespace().count();
            if word_count >= 20 {
                score += 0.15;
            } else if word_count >= 10 {
                score += 0.10;
                issues.push("Context could be more detailed".to_string());
            } else {
                score += 0.05;
                issues.push("Context too brief".to_string());
            }
        }

        (score, issues)
    }

    /// Companion rubric: has-text 0.10, length band 0.20, evidence 0.20,
    /// query overlap 0.20, structure 0.15, actionable advice 0.15
    fn score_companion(&self, answer: &CompanionAnswer, query: &str) -> (f64, Vec<String>) {
        if answer.text.is_empty() {
            return (0.0, vec!["No text content".to_string()]);
        }

        let text = &answer.text;
        let text_lower = text.to_lowercase();
        let mut score = 0.10;
        let mut issues = Vec::new();

        let word_count = text.split_whitespace().count();
        let char_count = text.chars().count();

        if (100..=400).contains(&word_count) {
            score += 0.20;
        } else if (50..100).contains(&word_count) {
            score += 0.15;
            issues.push("Response is brief".to_string());
        } else if word_count < 50 {
            score += 0.05;
            issues.push("Response too short".to_string());
        } else {
            score += 0.15;
            issues.push("Response very long".to_string());
        }

        let has_evidence = EVIDENCE_MARKERS.iter().any(|k| text_lower.contains(k));
        if has_evidence {
            if self.citation.is_match(text) {
                score += 0.20;
            } else {
                score += 0.15;
                issues.push("Could include specific citations".to_string());
            }
        } else {
            score += 0.05;
            issues.push("Lacks Islamic evidence/sources".to_string());
        }

        let query_lower = query.to_lowercase();
        let key_words: Vec<&str> = query_lower
            .split_whitespace()
            .filter(|w| !STOP_WORDS.contains(w))
            .collect();

        if key_words.is_empty() {
            score += 0.10; // Neutral when the query carries no key terms
        } else {
            let matched = key_words.iter().filter(|w| text_lower.contains(*w)).count();
            let ratio = matched as f64 / key_words.len() as f64;

            if ratio >= 0.6 {
                score += 0.20;
            } else if ratio >= 0.3 {
                score += 0.15;
                issues.push("Could address query more directly".to_string());
            } else {
                score += 0.05;
                issues.push("May not fully address the query".to_string());
            }
        }

        let head: String = text_lower.chars().take(100).collect();
        let has_greeting = GREETINGS.iter().any(|g| head.contains(g));
        let has_paragraphs = text.matches("\n\n").count() >= 1 || char_count > 200;

        if has_greeting && has_paragraphs {
            score += 0.15;
        } else if has_greeting || has_paragraphs {
            score += 0.10;
        } else {
            score += 0.05;
            issues.push("Could improve structure (greeting/paragraphs)".to_string());
        }

        if ACTION_VERBS.iter().any(|k| text_lower.contains(k)) {
            score += 0.15;
        } else {
            // Advice is not always expected, so this only tapers
            score += 0.08;
        }

        (score, issues)
    }

    /// Video rubric: has-array 0.20, count band 0.20, field completeness
    /// 0.20, title specificity 0.20, approved channels 0.20
    fn score_videos(&self, list: &VideoList) -> (f64, Vec<String>) {
        if list.videos.is_empty() {
            return (0.0, vec!["No videos returned".to_string()]);
        }

        let videos = &list.videos;
        let count = videos.len();
        let mut score = 0.20;
        let mut issues = Vec::new();

        if (2..=3).contains(&count) {
            score += 0.20;
        } else if count == 1 {
            score += 0.10;
            issues.push("Only 1 video returned".to_string());
        } else {
            score += 0.15;
            issues.push("More than 3 videos".to_string());
        }

        let mut complete = 0usize;
        for (i, video) in videos.iter().enumerate() {
            let missing = missing_video_fields(video);
            if missing.is_empty() {
                complete += 1;
            } else {
                issues.push(format!("Video {} missing: {}", i + 1, missing.join(", ")));
            }
        }

        if complete == count {
            score += 0.20;
        } else if complete as f64 >= count as f64 * 0.5 {
            score += 0.10;
        }

        let specific = videos
            .iter()
            .filter(|v| {
                !v.title.is_empty()
                    && v.title.chars().count() >= 20
                    && !GENERIC_TITLES.contains(&v.title.as_str())
            })
            .count();

        if specific == count {
            score += 0.20;
        } else if specific as f64 >= count as f64 * 0.5 {
            score += 0.10;
        } else {
            issues.push("Titles are too generic".to_string());
        }

        let approved = videos
            .iter()
            .filter(|v| {
                let channel = v.channel.to_lowercase();
                APPROVED_CHANNELS.iter().any(|a| channel.contains(a))
            })
            .count();

        if approved == count {
            score += 0.20;
        } else if approved as f64 >= count as f64 * 0.5 {
            score += 0.10;
        } else {
            issues.push("Some channels not from approved list".to_string());
        }

        (score, issues)
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(QualityThresholds::default())
    }
}

fn missing_video_fields(video: &Video) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if video.title.is_empty() {
        missing.push("title");
    }
    if video.channel.is_empty() {
        missing.push("channel");
    }
    if video.thumbnail.is_empty() {
        missing.push("thumbnail");
    }
    if video.duration.is_empty() {
        missing.push("duration");
    }
    missing
}
