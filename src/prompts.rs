//! Role-tagged prompt bundles per use case.

use crate::provider::ChatMessage;
use crate::types::{ConversationContext, GenerationRequest, UseCase};

/// Items requested from the model for structured use cases. Matches the fallback set size.
pub const STRUCTURED_ITEM_COUNT: usize = 2;

pub const NO_CONTEXT: &str = "No previous context available";

const CONTEXT_SEPARATOR: &str = " | ";

const PERSONA: &str = "You are a compassionate AI companion specializing in emotional wellbeing and mindful eating. You are not a clinician.";

const GUARDRAILS: &str = "Never provide medical, diagnostic, or therapeutic advice. Encourage professional help when appropriate.";

const MEAL_SCHEMA: &str = r#"[
  {
    "name": "Meal Name",
    "description": "Brief description",
    "ingredients": ["ingredient1", "ingredient2", "ingredient3"],
    "mood_benefit": "How this helps their current state",
    "prep_time": 15,
    "difficulty": "easy"
  }
]"#;

const PRACTICE_SCHEMA: &str = r#"[
  {
    "name": "Practice Name",
    "description": "What this practice involves",
    "duration": 5,
    "difficulty": "easy",
    "benefits": ["benefit1", "benefit2"],
    "instructions": ["step1", "step2", "step3"]
  }
]"#;

/// Joins the present context fields into one line.
pub fn context_summary(context: &ConversationContext) -> String {
    let mut parts = Vec::new();
    if let Some(mood) = context.recent_mood {
        parts.push(format!("Recent mood: {}", mood));
    }
    if !context.common_emotions.is_empty() {
        parts.push(format!("Common emotions: {}", context.common_emotions.join(", ")));
    }
    if !context.dietary_patterns.is_empty() {
        parts.push(format!("Eating patterns: {}", context.dietary_patterns.join(", ")));
    }
    if !context.goals.is_empty() {
        parts.push(format!("Goals: {}", context.goals.join(", ")));
    }
    if parts.is_empty() {
        NO_CONTEXT.to_string()
    } else {
        parts.join(CONTEXT_SEPARATOR)
    }
}

fn state_line(request: &GenerationRequest) -> String {
    let mut line = String::new();
    if let Some(mood) = &request.mood {
        line.push_str(&format!("Current mood: {}. ", mood.trim()));
    }
    if let Some(energy) = request.energy_level {
        line.push_str(&format!("Energy level: {}/5. ", energy));
    }
    if line.is_empty() {
        "General wellbeing".to_string()
    } else {
        line.trim_end().to_string()
    }
}

fn system_prompt(request: &GenerationRequest, context: &ConversationContext) -> String {
    match request.use_case {
        UseCase::Chat => format!(
            "{PERSONA} You provide empathetic, non-judgmental responses that help users process their emotions and develop healthier relationships with food and themselves.\n\n\
Key principles:\n\
- Always be empathetic and validating\n\
- {GUARDRAILS}\n\
- Focus on mindfulness, self-awareness, and gentle guidance\n\
- Use a warm, conversational tone\n\
- Keep responses concise but meaningful (2-3 short paragraphs max)\n\n\
User context: {}\n\n\
Respond to the user's message with care and understanding.",
            context_summary(context)
        ),
        UseCase::DailyInsight => format!(
            "{PERSONA} You are writing a brief, encouraging insight for someone who just completed their daily check-in.\n\
- Acknowledge their commitment to self-awareness\n\
- Highlight the value of consistent check-ins\n\
- Keep it positive and motivating\n\
- {GUARDRAILS}\n\
- 1-2 sentences maximum"
        ),
        UseCase::JournalReflection => format!(
            "{PERSONA} You are offering a compassionate reflection on someone's journal entry.\n\
- Validate their emotions and experiences\n\
- Offer gentle observations and highlight their strengths or growth\n\
- Encourage continued self-reflection\n\
- Never give advice, just reflect back what you observe\n\
- {GUARDRAILS}\n\
- Keep the response to 2-3 sentences"
        ),
        UseCase::MealSuggestion => format!(
            "{PERSONA} Acting as a mindful eating coach, suggest exactly {STRUCTURED_ITEM_COUNT} specific, simple meals that would be nourishing for someone with: {}\n\n\
Focus on meals that support emotional and physical wellbeing, simple ingredients and preparation, and practical, accessible options. {GUARDRAILS}\n\n\
Respond with only a JSON array of exactly {STRUCTURED_ITEM_COUNT} objects with this structure:\n{MEAL_SCHEMA}",
            state_line(request)
        ),
        UseCase::MindfulPractice => format!(
            "{PERSONA} Acting as a mindfulness instructor, suggest exactly {STRUCTURED_ITEM_COUNT} specific mindfulness practices for someone with: {}\n\n\
Focus on practices appropriate for their current emotional state, clear step-by-step instructions, realistic time commitments, and specific benefits. {GUARDRAILS}\n\n\
Respond with only a JSON array of exactly {STRUCTURED_ITEM_COUNT} objects with this structure:\n{PRACTICE_SCHEMA}",
            state_line(request)
        ),
        UseCase::WeeklySummary => format!(
            "{PERSONA} You are writing an encouraging weekly summary for someone who has been tracking their mood and eating habits.\n\
- Acknowledge their commitment to self-care\n\
- Highlight the value of consistent tracking\n\
- Encourage continued growth\n\
- {GUARDRAILS}\n\
- Keep it warm and supportive (2-3 sentences)"
        ),
    }
}

fn user_prompt(request: &GenerationRequest) -> String {
    let text = request.free_text.as_deref().map(str::trim).unwrap_or_default();
    match request.use_case {
        UseCase::Chat => text.to_string(),
        UseCase::DailyInsight => {
            "Generate an encouraging insight for someone who just completed their daily check-in."
                .to_string()
        }
        UseCase::JournalReflection => format!(
            "Please provide a gentle, validating reflection on this journal entry: {}",
            text
        ),
        UseCase::MealSuggestion => format!(
            "Suggest {} nourishing meals for this person's current state.",
            STRUCTURED_ITEM_COUNT
        ),
        UseCase::MindfulPractice => format!(
            "Suggest {} appropriate mindfulness practices for this person.",
            STRUCTURED_ITEM_COUNT
        ),
        UseCase::WeeklySummary => {
            "Create a positive weekly summary for someone committed to their wellbeing journey."
                .to_string()
        }
    }
}

/// System instruction followed by the user turn.
pub fn compose(request: &GenerationRequest, context: &ConversationContext) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(system_prompt(request, context)),
        ChatMessage::user(user_prompt(request)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Role;
    use crate::types::Mood;

    #[test]
    fn empty_context_uses_marker() {
        assert_eq!(context_summary(&ConversationContext::default()), NO_CONTEXT);
    }

    #[test]
    fn context_fields_joined_with_separator() {
        let ctx = ConversationContext {
            recent_mood: Some(Mood::Low),
            common_emotions: vec!["tired".into(), "hopeful".into()],
            dietary_patterns: vec![],
            goals: vec!["sleep more".into()],
        };
        assert_eq!(
            context_summary(&ctx),
            "Recent mood: low | Common emotions: tired, hopeful | Goals: sleep more"
        );
    }

    #[test]
    fn chat_embeds_context_and_trimmed_message() {
        let ctx = ConversationContext {
            recent_mood: Some(Mood::Good),
            ..Default::default()
        };
        let req = GenerationRequest::new(UseCase::Chat).with_text("  hello there \n");
        let messages = compose(&req, &ctx);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("User context: Recent mood: good"));
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "hello there");
    }

    #[test]
    fn structured_prompts_request_two_items_with_schema() {
        let req = GenerationRequest::new(UseCase::MealSuggestion)
            .with_mood(Some("tired".into()))
            .with_energy(Some(2));
        let messages = compose(&req, &ConversationContext::default());
        let system = &messages[0].content;
        assert!(system.contains("exactly 2"));
        assert!(system.contains("\"prep_time\": 15"));
        assert!(system.contains("Current mood: tired. Energy level: 2/5."));

        let req = GenerationRequest::new(UseCase::MindfulPractice);
        let messages = compose(&req, &ConversationContext::default());
        assert!(messages[0].content.contains("General wellbeing"));
        assert!(messages[0].content.contains("\"instructions\""));
    }

    #[test]
    fn every_use_case_carries_guardrails() {
        for use_case in [
            UseCase::Chat,
            UseCase::DailyInsight,
            UseCase::JournalReflection,
            UseCase::MealSuggestion,
            UseCase::MindfulPractice,
            UseCase::WeeklySummary,
        ] {
            let req = GenerationRequest::new(use_case).with_text("entry");
            let messages = compose(&req, &ConversationContext::default());
            assert!(messages[0].content.contains(GUARDRAILS), "{}", use_case);
            assert!(!messages[1].content.trim().is_empty(), "{}", use_case);
        }
    }
}
