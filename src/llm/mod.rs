//! Reply generation for free conversation once a user is set up.
//!
//! `OllamaGenerator` streams a completion from a local Ollama server;
//! `FallbackReplies` answers from templates. `Responder` puts the two
//! together so the user always gets an answer.

pub mod fallback;
pub mod ollama;

pub use fallback::{FallbackReplies, ReplyCategory};
pub use ollama::OllamaGenerator;

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::LlmError;

/// What the generator knows about the user it is answering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationContext {
    pub user_name: String,
    pub water_goal: Option<Decimal>,
}

impl GenerationContext {
    pub fn new(user_name: impl Into<String>, water_goal: Option<Decimal>) -> Self {
        Self {
            user_name: user_name.into(),
            water_goal,
        }
    }

    pub fn display_name(&self) -> &str {
        let name = self.user_name.trim();
        if name.is_empty() { "friend" } else { name }
    }
}

/// Produces a reply to a free-text message.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, message: &str, context: &GenerationContext)
    -> Result<String, LlmError>;
}

/// Prompt sent to the model for one message.
pub fn build_prompt(message: &str, context: &GenerationContext) -> String {
    let goal = context
        .water_goal
        .map(|g| g.to_string())
        .unwrap_or_else(|| "2.5".to_string());
    format!(
        "You are a friendly, motivating fitness assistant specialized in hydration.\n\
         Reply naturally, briefly and encouragingly, without overdoing it.\n\
         Use emojis sparingly (💧 🚰 💪 😊).\n\n\
         User context:\n\
         Name: {}\n\
         Water goal: {goal} liters/day\n\n\
         IMPORTANT: at most 3-4 lines, this is a chat message.\n\n\
         User: {message}\n\
         Assistant:",
        context.display_name()
    )
}

/// Answers with the generator when it works and with templates when not.
pub struct Responder {
    generator: Option<Arc<dyn ReplyGenerator>>,
    fallback: FallbackReplies,
}

impl Responder {
    pub fn new(generator: Option<Arc<dyn ReplyGenerator>>, fallback: FallbackReplies) -> Self {
        Self {
            generator,
            fallback,
        }
    }

    /// Never fails: generator errors are logged and replaced.
    pub async fn reply(&self, message: &str, context: &GenerationContext) -> String {
        if let Some(generator) = &self.generator {
            match generator.generate(message, context).await {
                Ok(text) => return text,
                Err(e) => {
                    tracing::warn!(
                        generator = generator.name(),
                        error = %e,
                        "Reply generator unavailable, using fallback"
                    );
                }
            }
        }
        self.fallback.reply(message, context)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::messages::TemplatePicker;

    struct Fixed(Result<String, ()>);

    #[async_trait]
    impl ReplyGenerator for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn generate(
            &self,
            _message: &str,
            _context: &GenerationContext,
        ) -> Result<String, LlmError> {
            self.0.clone().map_err(|_| LlmError::EmptyResponse {
                provider: "fixed".into(),
            })
        }
    }

    fn fallback() -> FallbackReplies {
        FallbackReplies::new(Arc::new(TemplatePicker::seeded(1)))
    }

    #[test]
    fn prompt_carries_context() {
        let prompt = build_prompt("how much?", &GenerationContext::new("Ana", Some(dec!(3.10))));
        assert!(prompt.contains("Name: Ana"));
        assert!(prompt.contains("3.10 liters/day"));
        assert!(prompt.ends_with("User: how much?\nAssistant:"));

        let anonymous = build_prompt("hi", &GenerationContext::new("", None));
        assert!(anonymous.contains("Name: friend"));
        assert!(anonymous.contains("2.5 liters/day"));
    }

    #[tokio::test]
    async fn generator_output_is_used() {
        let responder = Responder::new(Some(Arc::new(Fixed(Ok("drink up".into())))), fallback());
        let ctx = GenerationContext::new("Ana", None);
        assert_eq!(responder.reply("hello", &ctx).await, "drink up");
    }

    #[tokio::test]
    async fn generator_error_falls_back() {
        let responder = Responder::new(Some(Arc::new(Fixed(Err(())))), fallback());
        let ctx = GenerationContext::new("Ana", None);
        let text = responder.reply("thanks", &ctx).await;
        assert!(!text.is_empty());
        assert_ne!(text, "drink up");
    }

    #[tokio::test]
    async fn no_generator_uses_fallback() {
        let responder = Responder::new(None, fallback());
        let ctx = GenerationContext::new("Ana", None);
        assert!(responder.reply("what?", &ctx).await.contains("/help"));
    }
}
