//! Onboarding: the question flow that turns a new contact into a configured
//! user with a daily goal and a reminder interval.
//!
//! `state` holds the pure step machine, `validate` the input parsers, `model`
//! the persisted record, and `manager` commits answers through the store.

pub mod manager;
pub mod model;
pub mod state;
pub mod validate;

pub use manager::{AnswerOutcome, OnboardingManager};
pub use model::{HistoryEntry, UserRecord};
pub use state::{Step, StepError, Transition};
