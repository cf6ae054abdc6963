//! Validation and repair of model output expected to be a JSON list of records.
//!
//! Missing fields are filled with defaults instead of rejecting the record. Anything
//! that cannot be read as a list of exactly [`STRUCTURED_ITEM_COUNT`] records is a
//! parse failure, and callers substitute the fixed fallback set.

use crate::prompts::STRUCTURED_ITEM_COUNT;
use crate::types::{MealSuggestion, MindfulPractice};
use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer};
use serde_json::{Number, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("output is not JSON: {0}")]
    NotJson(String),
    #[error("output has the wrong shape: {0}")]
    WrongShape(String),
    #[error("output list is empty")]
    Empty,
}

pub const DEFAULT_DIFFICULTY: &str = "easy";
pub const DEFAULT_PREP_TIME_MINUTES: u32 = 10;
pub const DEFAULT_DURATION_MINUTES: u32 = 5;

const DEFAULT_MEAL_NAME: &str = "Nourishing Meal";
const DEFAULT_PRACTICE_NAME: &str = "Mindful Practice";

/// Minutes as a whole number. Models often write `15.0`; fractional or negative values are rejected.
fn minutes<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(n) = Option::<Number>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Some(v) = n.as_u64() {
        return u32::try_from(v).map(Some).map_err(de::Error::custom);
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&f) => Ok(Some(f as u32)),
        _ => Err(de::Error::custom(format!("{} is not a whole number of minutes", n))),
    }
}

// Absent and null fields both read as None and take their defaults.
#[derive(Debug, Deserialize)]
struct MealRecord {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    ingredients: Option<Vec<String>>,
    #[serde(default)]
    mood_benefit: Option<String>,
    #[serde(default, alias = "prep_time_minutes", deserialize_with = "minutes")]
    prep_time: Option<u32>,
    #[serde(default)]
    difficulty: Option<String>,
}

impl From<MealRecord> for MealSuggestion {
    fn from(r: MealRecord) -> Self {
        Self {
            name: r.name.unwrap_or_else(|| DEFAULT_MEAL_NAME.to_string()),
            description: r.description.unwrap_or_default(),
            ingredients: r.ingredients.unwrap_or_default(),
            mood_benefit: r.mood_benefit.unwrap_or_default(),
            prep_time_minutes: r.prep_time.unwrap_or(DEFAULT_PREP_TIME_MINUTES),
            difficulty: r.difficulty.unwrap_or_else(|| DEFAULT_DIFFICULTY.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PracticeRecord {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, alias = "duration_minutes", deserialize_with = "minutes")]
    duration: Option<u32>,
    #[serde(default)]
    difficulty: Option<String>,
    #[serde(default)]
    benefits: Option<Vec<String>>,
    #[serde(default)]
    instructions: Option<Vec<String>>,
}

impl From<PracticeRecord> for MindfulPractice {
    fn from(r: PracticeRecord) -> Self {
        Self {
            name: r.name.unwrap_or_else(|| DEFAULT_PRACTICE_NAME.to_string()),
            description: r.description.unwrap_or_default(),
            duration_minutes: r.duration.unwrap_or(DEFAULT_DURATION_MINUTES),
            difficulty: r.difficulty.unwrap_or_else(|| DEFAULT_DIFFICULTY.to_string()),
            benefits: r.benefits.unwrap_or_default(),
            instructions: r.instructions.unwrap_or_default(),
        }
    }
}

/// Drops a surrounding Markdown code fence, if present.
fn strip_fence(text: &str) -> &str {
    let t = text.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return t;
    };
    // Skip the info string ("json") on the opening line.
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Reads the output as JSON, falling back to the outermost `[...]` span inside prose.
fn extract_value(text: &str) -> Result<Value, ParseError> {
    let body = strip_fence(text);
    match serde_json::from_str::<Value>(body) {
        Ok(v) => Ok(v),
        Err(first) => {
            let (Some(start), Some(end)) = (body.find('['), body.rfind(']')) else {
                return Err(ParseError::NotJson(first.to_string()));
            };
            if end <= start {
                return Err(ParseError::NotJson(first.to_string()));
            }
            serde_json::from_str(&body[start..=end]).map_err(|e| ParseError::NotJson(e.to_string()))
        }
    }
}

/// `{"meals": [...]}` is accepted as the list it wraps.
fn into_list(value: Value) -> Result<Vec<Value>, ParseError> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(map) if map.len() == 1 => match map.into_iter().next() {
            Some((_, Value::Array(items))) => Ok(items),
            _ => Err(ParseError::WrongShape("object does not wrap a list".to_string())),
        },
        other => Err(ParseError::WrongShape(format!("expected a list, got {}", kind(&other)))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn parse_records<R, T>(text: &str) -> Result<Vec<T>, ParseError>
where
    R: DeserializeOwned + Into<T>,
{
    let items = into_list(extract_value(text)?)?;
    if items.is_empty() {
        return Err(ParseError::Empty);
    }
    if items.len() < STRUCTURED_ITEM_COUNT {
        return Err(ParseError::WrongShape(format!(
            "expected {} records, got {}",
            STRUCTURED_ITEM_COUNT,
            items.len()
        )));
    }
    items
        .into_iter()
        .take(STRUCTURED_ITEM_COUNT)
        .map(|item| {
            if !item.is_object() {
                return Err(ParseError::WrongShape(format!("record is a {}", kind(&item))));
            }
            serde_json::from_value::<R>(item)
                .map(Into::into)
                .map_err(|e| ParseError::WrongShape(e.to_string()))
        })
        .collect()
}

pub fn parse_meals(text: &str) -> Result<Vec<MealSuggestion>, ParseError> {
    parse_records::<MealRecord, _>(text)
}

pub fn parse_practices(text: &str) -> Result<Vec<MindfulPractice>, ParseError> {
    parse_records::<PracticeRecord, _>(text)
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn fallback_meals() -> Vec<MealSuggestion> {
    vec![
        MealSuggestion {
            name: "Comfort Bowl".to_string(),
            description: "Warm, nourishing bowl with your favorite ingredients".to_string(),
            ingredients: strings(&["quinoa", "roasted vegetables", "avocado", "tahini"]),
            mood_benefit: "Balanced nutrition for steady energy and mood".to_string(),
            prep_time_minutes: 20,
            difficulty: "easy".to_string(),
        },
        MealSuggestion {
            name: "Mindful Smoothie".to_string(),
            description: "Nutrient-rich smoothie you can sip slowly".to_string(),
            ingredients: strings(&["banana", "berries", "spinach", "almond milk", "chia seeds"]),
            mood_benefit: "Easy to digest while providing steady energy".to_string(),
            prep_time_minutes: 5,
            difficulty: "easy".to_string(),
        },
    ]
}

pub fn fallback_practices() -> Vec<MindfulPractice> {
    vec![
        MindfulPractice {
            name: "3-Minute Breathing Space".to_string(),
            description: "Quick mindfulness reset for busy moments".to_string(),
            duration_minutes: 3,
            difficulty: "easy".to_string(),
            benefits: strings(&["reduces stress", "increases awareness"]),
            instructions: strings(&[
                "Sit comfortably and close your eyes",
                "Notice your breath without changing it",
                "When mind wanders, gently return to breath",
            ]),
        },
        MindfulPractice {
            name: "Body Check-In".to_string(),
            description: "Brief scan of physical sensations".to_string(),
            duration_minutes: 5,
            difficulty: "easy".to_string(),
            benefits: strings(&["increases body awareness", "releases tension"]),
            instructions: strings(&[
                "Start at the top of your head",
                "Slowly scan down through your body",
                "Notice any tension or sensations",
                "Breathe into areas that need attention",
            ]),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_MEALS: &str = r#"[
        {"name": "Oat Porridge", "description": "Warm oats", "ingredients": ["oats", "milk"],
         "mood_benefit": "Steady energy", "prep_time": 8, "difficulty": "easy"},
        {"name": "Lentil Soup", "ingredients": ["lentils"]}
    ]"#;

    #[test]
    fn missing_fields_take_defaults() {
        let meals = parse_meals(TWO_MEALS).unwrap();
        assert_eq!(meals.len(), 2);
        assert_eq!(meals[0].prep_time_minutes, 8);
        assert_eq!(meals[1].name, "Lentil Soup");
        assert_eq!(meals[1].prep_time_minutes, DEFAULT_PREP_TIME_MINUTES);
        assert_eq!(meals[1].difficulty, DEFAULT_DIFFICULTY);
        assert_eq!(meals[1].description, "");
    }

    #[test]
    fn null_fields_take_defaults() {
        let meals = parse_meals(
            r#"[{"name": "Soup", "description": null, "ingredients": null, "prep_time": null},
                {"name": "Toast", "difficulty": null}]"#,
        )
        .unwrap();
        assert_eq!(meals[0].description, "");
        assert!(meals[0].ingredients.is_empty());
        assert_eq!(meals[0].prep_time_minutes, DEFAULT_PREP_TIME_MINUTES);
        assert_eq!(meals[1].difficulty, DEFAULT_DIFFICULTY);

        let practices = parse_practices(r#"[{"name": null, "benefits": null}, {}]"#).unwrap();
        assert_eq!(practices[0].name, DEFAULT_PRACTICE_NAME);
        assert!(practices[0].benefits.is_empty());
    }

    #[test]
    fn whole_float_minutes_are_accepted() {
        let meals = parse_meals(r#"[{"name": "Soup", "prep_time": 15.0}, {"name": "Toast"}]"#).unwrap();
        assert_eq!(meals[0].prep_time_minutes, 15);

        let practices =
            parse_practices(r#"[{"duration_minutes": 3.0}, {"duration": 10}]"#).unwrap();
        assert_eq!(practices[0].duration_minutes, 3);
        assert_eq!(practices[1].duration_minutes, 10);

        assert!(matches!(
            parse_practices(r#"[{"duration": 2.5}, {}]"#),
            Err(ParseError::WrongShape(_))
        ));
    }

    #[test]
    fn fenced_and_wrapped_output_is_repaired() {
        let fenced = format!("Here you go!\n```json\n{}\n```", TWO_MEALS);
        assert_eq!(parse_meals(&fenced).unwrap().len(), 2);

        let only_fence = format!("```json\n{}\n```", TWO_MEALS);
        assert_eq!(parse_meals(&only_fence).unwrap().len(), 2);

        let wrapped = format!("{{\"meals\": {}}}", TWO_MEALS);
        assert_eq!(parse_meals(&wrapped).unwrap()[0].name, "Oat Porridge");
    }

    #[test]
    fn truncated_list_is_a_failure() {
        let truncated = r#"[{"name": "Oat Porridge", "prep_time": 8}, {"name": "Lent"#;
        assert!(matches!(parse_meals(truncated), Err(ParseError::NotJson(_))));
    }

    #[test]
    fn wrong_shapes_are_failures() {
        assert!(matches!(parse_meals("[]"), Err(ParseError::Empty)));
        assert!(matches!(parse_meals(r#"{"name": "x"}"#), Err(ParseError::WrongShape(_))));
        assert!(matches!(parse_meals(r#"[{"name": "x"}]"#), Err(ParseError::WrongShape(_))));
        assert!(matches!(parse_meals(r#"["a", "b"]"#), Err(ParseError::WrongShape(_))));
        assert!(matches!(
            parse_meals(r#"[{"prep_time": "soon"}, {}]"#),
            Err(ParseError::WrongShape(_))
        ));
        assert!(matches!(parse_meals("I'd suggest soup."), Err(ParseError::NotJson(_))));
    }

    #[test]
    fn longer_lists_are_cut_to_two() {
        let practices = parse_practices(
            r#"[{"name": "a", "duration": 2}, {"name": "b"}, {"name": "c"}]"#,
        )
        .unwrap();
        assert_eq!(practices.len(), 2);
        assert_eq!(practices[1].duration_minutes, DEFAULT_DURATION_MINUTES);
        assert!(practices[1].instructions.is_empty());
    }

    #[test]
    fn fallback_sets_have_two_items() {
        assert_eq!(fallback_meals().len(), STRUCTURED_ITEM_COUNT);
        assert_eq!(fallback_practices().len(), STRUCTURED_ITEM_COUNT);
        assert_eq!(fallback_practices()[0].name, "3-Minute Breathing Space");
    }
}
