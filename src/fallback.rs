//! Deterministic, network-free replies used whenever the live model path is unavailable.

use crate::types::UseCase;

pub const INVITATION: &str =
    "I'm here to support you. Please tell me more about what's on your mind today.";

pub const GENERIC: &str = "I'm listening. Tell me more about what's on your mind.";

pub const DAILY_INSIGHT: &str = "Checking in with yourself today is a real act of care. Every small moment of awareness adds up.";

pub const WEEKLY_SUMMARY: &str = "You showed up for yourself again this week, and that consistency matters. Each check-in builds a clearer picture of what helps you feel your best. Keep going at your own pace.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bucket {
    Sadness,
    Anxiety,
    Anger,
    Positive,
    Food,
    HelpSeeking,
}

struct KeywordBucket {
    bucket: Bucket,
    keywords: &'static [&'static str],
    reply: &'static str,
}

/// Tested in order; the first match wins. A trailing `*` marks a stem matched as a word
/// prefix, a space marks a phrase matched anywhere, anything else must be a whole word.
const BUCKETS: &[KeywordBucket] = &[
    KeywordBucket {
        bucket: Bucket::Sadness,
        keywords: &["sad", "sadness", "depress*", "down", "low", "lonel*", "hopeless*", "helpless*", "cry*", "cried"],
        reply: "I hear that you're feeling down right now. That's completely valid, and I'm here to listen. What's been weighing on your mind today?",
    },
    KeywordBucket {
        bucket: Bucket::Anxiety,
        keywords: &["anxi*", "worr*", "stress*", "panic*", "nervous*", "overwhelm*"],
        reply: "I can sense you're feeling anxious. Let's take this one step at a time. Can you tell me what's making you feel this way right now?",
    },
    KeywordBucket {
        bucket: Bucket::Anger,
        keywords: &["angry", "anger", "frustrat*", "furious", "irritat*", "annoy*", "mad"],
        reply: "It sounds like something has really frustrated you. Those feelings make sense. Would it help to talk through what happened?",
    },
    KeywordBucket {
        bucket: Bucket::Positive,
        keywords: &["happy", "happi*", "great", "grateful", "gratitude", "excit*", "proud", "calm*", "good"],
        reply: "That's wonderful to hear. Take a moment to notice what's contributing to this feeling. What's been going well for you?",
    },
    KeywordBucket {
        bucket: Bucket::Food,
        keywords: &["eat", "eating", "ate", "food*", "meal*", "hungry", "hunger", "snack*", "craving*"],
        reply: "Thanks for sharing how things are going with food. Let's approach it with curiosity rather than judgment. How were you feeling before and after eating?",
    },
    KeywordBucket {
        bucket: Bucket::HelpSeeking,
        keywords: &["help", "advice", "what should i"],
        reply: "I'm here to support you. What kind of help are you looking for today? I can help with processing emotions, mindful eating strategies, or stress management techniques.",
    },
];

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
}

fn matches(lowered: &str, keyword: &str) -> bool {
    if keyword.contains(' ') {
        lowered.contains(keyword)
    } else if let Some(stem) = keyword.strip_suffix('*') {
        words(lowered).any(|w| w.starts_with(stem))
    } else {
        words(lowered).any(|w| w == keyword)
    }
}

fn find_bucket(text: &str) -> Option<&'static KeywordBucket> {
    let lowered = text.to_lowercase();
    BUCKETS
        .iter()
        .find(|b| b.keywords.iter().any(|k| matches(&lowered, k)))
}

/// First bucket whose keywords appear in `text`, if any.
pub fn classify(text: &str) -> Option<Bucket> {
    find_bucket(text).map(|b| b.bucket)
}

/// Keyword-routed empathetic reply. Never empty.
pub fn respond(text: &str) -> &'static str {
    if text.trim().is_empty() {
        return INVITATION;
    }
    find_bucket(text).map(|b| b.reply).unwrap_or(GENERIC)
}

/// Free-text fallback for a use case. Insight and summary carry no user text to route on.
pub fn for_use_case(use_case: UseCase, text: Option<&str>) -> &'static str {
    match use_case {
        UseCase::DailyInsight => DAILY_INSIGHT,
        UseCase::WeeklySummary => WEEKLY_SUMMARY,
        _ => respond(text.unwrap_or_default()),
    }
}
