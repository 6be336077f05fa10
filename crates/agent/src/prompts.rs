//! Fixed prompts and canned replies used by the pipeline.

pub const EXTRACTION_TEMPERATURE: f32 = 0.1;
pub const ENRICHMENT_TEMPERATURE: f32 = 0.2;
pub const ANSWER_TEMPERATURE: f32 = 0.1;

pub const NOT_FOUND_MESSAGE: &str = "I could not find relevant information in the SOP documents.";
pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred while processing your question.";

pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"Extract the task described in the user's request and reply with ONLY a JSON object.
Required fields: title, priority (low/medium/high), category, deadline_hint.
Allowed categories: equipment_purchase, software_subscription, travel_booking, meeting_scheduling, document_request, general.
Reply format: {"title": "...", "priority": "...", "category": "...", "deadline_hint": "..."}"#;

pub const ENRICHMENT_SYSTEM_PROMPT: &str = r#"You write task descriptions that carry SOP reminders.
Given a task and the relevant SOP excerpts, produce a clear description containing:
1. The main task
2. The applicable SOP guidelines as bullet points
Keep it concise and actionable."#;

pub const ANSWER_SYSTEM_PROMPT: &str = r#"You answer questions about SOP documentation.
Use only the provided context. Be concise and cite the SOP section when you can.
If the context does not contain the answer, say so explicitly."#;

pub fn enrichment_user_prompt(title: &str, context: &str) -> String {
    format!(
        "Task: {title}\n\nSOP Context:\n{context}\n\nCreate a task description with SOP reminders."
    )
}

pub fn answer_user_prompt(question: &str, context: &str) -> String {
    format!(
        "Question: {question}\n\nSOP Context:\n{context}\n\nAnswer the question based on the SOP context."
    )
}

#[cfg(test)]
mod tests {
    use super::{answer_user_prompt, enrichment_user_prompt, EXTRACTION_SYSTEM_PROMPT};

    #[test]
    fn extraction_prompt_lists_every_category() {
        for category in taskpilot_core::Category::ALL {
            assert!(EXTRACTION_SYSTEM_PROMPT.contains(category.as_str()));
        }
    }

    #[test]
    fn user_prompts_embed_context_verbatim() {
        let context = "Rule one.\n\nRule two.";
        assert!(enrichment_user_prompt("Buy MacBook", context).contains(context));
        assert!(answer_user_prompt("Which card?", context).starts_with("Question: Which card?"));
    }
}
