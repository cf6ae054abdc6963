//! Shared data contract: context, requests, and generated records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Mood recorded by a check-in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    VeryLow,
    Low,
    Neutral,
    Good,
    Excellent,
}

impl Mood {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::VeryLow => "very_low",
            Mood::Low => "low",
            Mood::Neutral => "neutral",
            Mood::Good => "good",
            Mood::Excellent => "excellent",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "very_low" => Ok(Mood::VeryLow),
            "low" => Ok(Mood::Low),
            "neutral" => Ok(Mood::Neutral),
            "good" => Ok(Mood::Good),
            "excellent" => Ok(Mood::Excellent),
            other => Err(format!("unknown mood '{}'", other)),
        }
    }
}

/// Behavioral context aggregated for one user. Built fresh per request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub recent_mood: Option<Mood>,
    /// Most frequent first, at most [`MAX_COMMON_EMOTIONS`].
    pub common_emotions: Vec<String>,
    pub dietary_patterns: Vec<String>,
    pub goals: Vec<String>,
}

pub const MAX_COMMON_EMOTIONS: usize = 5;

impl ConversationContext {
    pub fn is_empty(&self) -> bool {
        self.recent_mood.is_none()
            && self.common_emotions.is_empty()
            && self.dietary_patterns.is_empty()
            && self.goals.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UseCase {
    Chat,
    DailyInsight,
    JournalReflection,
    MealSuggestion,
    MindfulPractice,
    WeeklySummary,
}

impl UseCase {
    pub fn as_str(&self) -> &'static str {
        match self {
            UseCase::Chat => "chat",
            UseCase::DailyInsight => "daily_insight",
            UseCase::JournalReflection => "journal_reflection",
            UseCase::MealSuggestion => "meal_suggestion",
            UseCase::MindfulPractice => "mindful_practice",
            UseCase::WeeklySummary => "weekly_summary",
        }
    }

    /// Use cases that are meaningless without user-supplied text.
    pub fn requires_free_text(&self) -> bool {
        matches!(self, UseCase::Chat | UseCase::JournalReflection)
    }

    pub fn structured_hint(&self) -> Option<StructuredHint> {
        match self {
            UseCase::MealSuggestion => Some(StructuredHint::Meals),
            UseCase::MindfulPractice => Some(StructuredHint::Practices),
            _ => None,
        }
    }
}

impl fmt::Display for UseCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record schema the model output must conform to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuredHint {
    Meals,
    Practices,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GenerationRequest {
    pub use_case: UseCase,
    pub free_text: Option<String>,
    pub structured_hint: Option<StructuredHint>,
    /// Mood as typed by the caller (meal and practice suggestions).
    pub mood: Option<String>,
    /// 1..=5, meal suggestions only.
    pub energy_level: Option<u8>,
}

impl GenerationRequest {
    pub fn new(use_case: UseCase) -> Self {
        Self {
            use_case,
            free_text: None,
            structured_hint: use_case.structured_hint(),
            mood: None,
            energy_level: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.free_text = Some(text.into());
        self
    }

    pub fn with_mood(mut self, mood: Option<String>) -> Self {
        self.mood = mood.filter(|m| !m.trim().is_empty());
        self
    }

    pub fn with_energy(mut self, energy_level: Option<u8>) -> Self {
        self.energy_level = energy_level;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MealSuggestion {
    pub name: String,
    pub description: String,
    pub ingredients: Vec<String>,
    pub mood_benefit: String,
    #[serde(rename = "prep_time", alias = "prep_time_minutes")]
    pub prep_time_minutes: u32,
    pub difficulty: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MindfulPractice {
    pub name: String,
    pub description: String,
    #[serde(rename = "duration", alias = "duration_minutes")]
    pub duration_minutes: u32,
    pub difficulty: String,
    pub benefits: Vec<String>,
    pub instructions: Vec<String>,
}

/// Output of one generation. Text is never blank and record lists are never empty.
#[derive(Clone, Debug, PartialEq)]
pub enum GenerationResult {
    Text(String),
    Meals(Vec<MealSuggestion>),
    Practices(Vec<MindfulPractice>),
}

impl GenerationResult {
    pub fn into_text(self) -> Option<String> {
        match self {
            GenerationResult::Text(t) => Some(t),
            _ => None,
        }
    }
}

/// A persisted chat exchange.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: String,
    pub user_id: String,
    pub user_message: String,
    pub ai_response: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct Helpline {
    pub name: &'static str,
    pub number: &'static str,
    pub available: &'static str,
}

pub const HELPLINES: &[Helpline] = &[
    Helpline {
        name: "National Suicide Prevention Lifeline",
        number: "988",
        available: "24/7",
    },
    Helpline {
        name: "Crisis Text Line",
        number: "Text HOME to 741741",
        available: "24/7",
    },
    Helpline {
        name: "NAMI Helpline",
        number: "1-800-950-NAMI",
        available: "Mon-Fri 10am-10pm ET",
    },
];

pub const GROUNDING_TECHNIQUES: &[&str] = &[
    "5-4-3-2-1 technique: Name 5 things you see, 4 you can touch, 3 you hear, 2 you smell, 1 you taste",
    "Deep breathing: Inhale for 4, hold for 4, exhale for 6",
    "Progressive muscle relaxation: Tense and release each muscle group",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mood_parses_wire_names() {
        assert_eq!("very_low".parse::<Mood>(), Ok(Mood::VeryLow));
        assert_eq!(" Good ".parse::<Mood>(), Ok(Mood::Good));
        assert!("meh".parse::<Mood>().is_err());
    }

    #[test]
    fn structured_use_cases_carry_hint() {
        assert_eq!(
            GenerationRequest::new(UseCase::MealSuggestion).structured_hint,
            Some(StructuredHint::Meals)
        );
        assert_eq!(GenerationRequest::new(UseCase::Chat).structured_hint, None);
    }

    #[test]
    fn meal_serializes_with_wire_field_names() {
        let meal = MealSuggestion {
            name: "Soup".to_string(),
            description: String::new(),
            ingredients: vec![],
            mood_benefit: String::new(),
            prep_time_minutes: 12,
            difficulty: "easy".to_string(),
        };
        let json = serde_json::to_value(&meal).unwrap();
        assert_eq!(json["prep_time"], 12);
    }
}
