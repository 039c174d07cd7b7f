//! Canned replies for when the generator is unavailable.
//!
//! The message is classified with a few keyword patterns and answered with a
//! random template from that category.

use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::messages::TemplatePicker;

use super::GenerationContext;

/// Category of a free-text message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyCategory {
    Greeting,
    Thanks,
    Motivation,
    Default,
}

static GREETING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(hi|hello|hey|good (morning|afternoon|evening)|oi|olá|ola|e ai|eai)\b")
        .expect("static regex")
});

static THANKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(thank|thanks|thx|cheers|obrigad|valeu)").expect("static regex")
});

static MOTIVATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(motivat|let'?s go|come on|you can do it|força|animo|vamo|bora)")
        .expect("static regex")
});

/// Classify `message`. Later categories take precedence: motivation beats
/// thanks, which beats greeting.
pub fn classify(message: &str) -> ReplyCategory {
    let message = message.trim();
    let mut category = ReplyCategory::Default;
    if GREETING.is_match(message) {
        category = ReplyCategory::Greeting;
    }
    if THANKS.is_match(message) {
        category = ReplyCategory::Thanks;
    }
    if MOTIVATION.is_match(message) {
        category = ReplyCategory::Motivation;
    }
    category
}

fn templates(category: ReplyCategory) -> &'static [&'static str] {
    match category {
        ReplyCategory::Greeting => &[
            "Hi {name}! 👋 How can I help with your hydration today?",
            "Hello {name}! 💧 Ready to hydrate?",
            "Hey {name}! 🚰 Shall we take care of your health today?",
        ],
        ReplyCategory::Motivation => &[
            "{name}, remember: water is life! 💧",
            "Every sip counts for your health! 💪",
            "Keeping the focus on hydration! 🎯",
        ],
        ReplyCategory::Thanks => &[
            "You're welcome! I'm here to help! 😊",
            "Count on me anytime! 💪",
            "Happy to help you! 🚰",
        ],
        ReplyCategory::Default => &[
            "I'm here to help with your hydration! Send /help to see the commands 💧",
            "I can help you stay well hydrated! Type /help for more info 🚰",
            "Let's take care of your health together! Send /help to see how I can help 💪",
        ],
    }
}

pub struct FallbackReplies {
    picker: Arc<TemplatePicker>,
}

impl FallbackReplies {
    pub fn new(picker: Arc<TemplatePicker>) -> Self {
        Self { picker }
    }

    pub fn reply(&self, message: &str, context: &GenerationContext) -> String {
        let options = templates(classify(message));
        let template = self.picker.pick(options).copied().unwrap_or(options[0]);
        template.replace("{name}", context.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories() {
        assert_eq!(classify("hello there"), ReplyCategory::Greeting);
        assert_eq!(classify("Oi, tudo bem?"), ReplyCategory::Greeting);
        assert_eq!(classify("thanks a lot"), ReplyCategory::Thanks);
        assert_eq!(classify("valeu!"), ReplyCategory::Thanks);
        assert_eq!(classify("bora beber água"), ReplyCategory::Motivation);
        assert_eq!(classify("what's the weather"), ReplyCategory::Default);
    }

    #[test]
    fn greeting_must_lead() {
        assert_eq!(classify("they said hi"), ReplyCategory::Default);
        assert_eq!(classify("history"), ReplyCategory::Default);
    }

    #[test]
    fn later_categories_win() {
        assert_eq!(classify("hi, thanks!"), ReplyCategory::Thanks);
        assert_eq!(classify("hey thanks, let's go!"), ReplyCategory::Motivation);
    }

    #[test]
    fn reply_comes_from_the_category() {
        let replies = FallbackReplies::new(Arc::new(TemplatePicker::seeded(5)));
        let context = GenerationContext::new("Ana", None);
        for _ in 0..10 {
            let text = replies.reply("thank you", &context);
            assert!(templates(ReplyCategory::Thanks).contains(&text.as_str()));
        }
        let greeting = replies.reply("hello", &context);
        assert!(!greeting.contains("{name}"));
    }
}
