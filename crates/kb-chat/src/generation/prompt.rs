//! Prompt templates for grounded chat answers

use crate::types::{ChatMessage, Role};

/// Placeholder used when retrieval found nothing
pub const NO_CONTEXT: &str = "No relevant context found.";

/// Prompt builder for chat turns
pub struct PromptBuilder;

impl PromptBuilder {
    /// Join retrieved snippets into one context block
    pub fn build_context(snippets: &[String]) -> String {
        if snippets.is_empty() {
            return NO_CONTEXT.to_string();
        }

        snippets
            .iter()
            .map(|s| s.trim())
            .collect::<Vec<_>>()
            .join("\n\n---\n\n")
    }

    /// Render prior turns as `User:` / `Assistant:` lines
    pub fn format_history(history: &[ChatMessage]) -> String {
        history
            .iter()
            .map(|m| {
                let speaker = match m.role {
                    Role::User => "User",
                    Role::Assistant => "Assistant",
                };
                format!("{}: {}", speaker, m.content.trim())
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Build the full prompt for one question
    pub fn build_chat_prompt(question: &str, context: &str, history: &[ChatMessage]) -> String {
        let history = if history.is_empty() {
            "(no previous conversation)".to_string()
        } else {
            Self::format_history(history)
        };

        format!(
            r#"You are a helpful assistant answering questions about the organisation's knowledge base.
Answer using the context below. If the answer is not in the context, say "I don't have enough information to answer that."

CONTEXT:
{context}

CONVERSATION SO FAR:
{history}

QUESTION: {question}

ANSWER:"#,
            context = context,
            history = history,
            question = question.trim(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_empty_context_placeholder() {
        assert_eq!(PromptBuilder::build_context(&[]), NO_CONTEXT);
        let prompt = PromptBuilder::build_chat_prompt("What?", NO_CONTEXT, &[]);
        assert!(prompt.contains(NO_CONTEXT));
        assert!(prompt.contains("QUESTION: What?"));
    }

    #[test]
    fn test_history_is_rendered_in_order() {
        let now = Utc::now();
        let history = vec![
            ChatMessage::user("Hi", now),
            ChatMessage::assistant("Hello!", now),
        ];
        assert_eq!(PromptBuilder::format_history(&history), "User: Hi\nAssistant: Hello!");

        let prompt = PromptBuilder::build_chat_prompt("Next?", "ctx", &history);
        let user_at = prompt.find("User: Hi").unwrap();
        let question_at = prompt.find("QUESTION: Next?").unwrap();
        assert!(user_at < question_at);
    }

    #[test]
    fn test_context_joins_snippets() {
        let context = PromptBuilder::build_context(&["one ".to_string(), "two".to_string()]);
        assert_eq!(context, "one\n\n---\n\ntwo");
    }
}
