//! Hydrate Bot: a chat bot that onboards users, works out a daily water
//! goal and reminds them to drink during the day.

pub mod admin;
pub mod bot;
pub mod channels;
pub mod clock;
pub mod commands;
pub mod config;
pub mod error;
pub mod goal;
pub mod interactions;
pub mod llm;
pub mod messages;
pub mod onboarding;
pub mod reminders;
pub mod store;
