//! OnboardingManager: commits answers to the store and produces the replies.

use std::sync::Arc;

use crate::clock::Clock;
use crate::error::ValidationError;
use crate::messages;
use crate::store::UserStore;

use super::state::{self, StepError, Transition};

/// Result of feeding one message to the onboarding flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// The answer was valid and has been persisted.
    Accepted {
        transition: Transition,
        replies: Vec<String>,
    },
    /// The answer was rejected; nothing changed.
    Rejected(ValidationError),
    /// The stored record cannot support its own step.
    Inconsistent(StepError),
    /// The user has no pending question (or no record).
    NotPending,
}

impl AnswerOutcome {
    /// Messages to send back, in order. Empty when not pending.
    pub fn replies(&self) -> Vec<String> {
        match self {
            Self::Accepted { replies, .. } => replies.clone(),
            Self::Rejected(e) => vec![e.user_message()],
            Self::Inconsistent(_) => vec![
                "Something is off with your profile. Send /start to answer the questions again."
                    .to_string(),
            ],
            Self::NotPending => Vec::new(),
        }
    }
}

/// Drives the per-user question flow over the shared [`UserStore`].
pub struct OnboardingManager {
    store: Arc<UserStore>,
    clock: Arc<dyn Clock>,
    business_hours: (u32, u32),
}

impl OnboardingManager {
    pub fn new(store: Arc<UserStore>, clock: Arc<dyn Clock>, business_hours: (u32, u32)) -> Self {
        Self {
            store,
            clock,
            business_hours,
        }
    }

    /// Apply `text` as the answer to the user's pending question.
    ///
    /// Persist-then-acknowledge: replies are built only after the store
    /// accepted the new record.
    pub async fn handle_answer(&self, user_id: &str, text: &str) -> AnswerOutcome {
        let now = self.clock.now();
        let result = self
            .store
            .update(user_id, |record| {
                let transition = state::apply_input(record, text, now)?;
                Ok::<_, StepError>((transition, record.name.clone()))
            })
            .await;

        match result {
            Ok(Some((transition, name))) => {
                tracing::debug!(user_id = %user_id, ?transition, "Onboarding answer accepted");
                let replies = messages::transition_replies(&transition, &name, self.business_hours);
                AnswerOutcome::Accepted {
                    transition,
                    replies,
                }
            }
            Ok(None) | Err(StepError::NotAwaitingInput) => AnswerOutcome::NotPending,
            Err(StepError::Invalid(e)) => {
                tracing::debug!(user_id = %user_id, error = %e, "Onboarding answer rejected");
                AnswerOutcome::Rejected(e)
            }
            Err(e @ StepError::MissingField { .. }) => {
                tracing::warn!(user_id = %user_id, error = %e, "Stored record is inconsistent");
                AnswerOutcome::Inconsistent(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    use super::*;
    use crate::clock::ManualClock;
    use crate::onboarding::state::Step;
    use crate::store::MemoryBackend;

    async fn manager() -> (OnboardingManager, Arc<UserStore>, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        let store = Arc::new(UserStore::open(backend.clone()).await.unwrap());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 4, 1, 10, 0, 0).unwrap(),
        ));
        let manager = OnboardingManager::new(store.clone(), clock, (8, 22));
        (manager, store, backend)
    }

    #[tokio::test]
    async fn walks_through_every_question() {
        let (manager, store, backend) = manager().await;
        store
            .get_or_create("u1", "Ana", Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap())
            .await;

        for answer in ["25", "70", "2"] {
            assert!(matches!(
                manager.handle_answer("u1", answer).await,
                AnswerOutcome::Accepted { .. }
            ));
        }

        let outcome = manager.handle_answer("u1", " 30 ").await;
        assert_eq!(outcome.replies().len(), 2);

        let record = store.get("u1").await.unwrap();
        assert_eq!(record.step, Step::Idle);
        assert_eq!(record.water_goal, Some(dec!(3.10)));
        assert!(record.reminders_enabled);

        let persisted = &backend.saved()[0].1;
        assert_eq!(persisted, &record);
    }

    #[tokio::test]
    async fn rejected_answer_keeps_step_and_explains() {
        let (manager, store, backend) = manager().await;
        store
            .get_or_create("u1", "Ana", Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap())
            .await;
        let saves = backend.save_count();

        let outcome = manager.handle_answer("u1", "twenty").await;
        assert!(matches!(
            outcome,
            AnswerOutcome::Rejected(ValidationError::Age(_))
        ));
        assert_eq!(
            outcome.replies(),
            vec![ValidationError::Age(String::new()).user_message()]
        );
        assert_eq!(store.get("u1").await.unwrap().step, Step::AwaitingAge);
        assert_eq!(backend.save_count(), saves);
    }

    #[tokio::test]
    async fn unknown_or_idle_user_is_not_pending() {
        let (manager, store, _backend) = manager().await;
        assert_eq!(
            manager.handle_answer("nobody", "25").await,
            AnswerOutcome::NotPending
        );

        store
            .get_or_create("u1", "Ana", Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap())
            .await;
        store
            .update("u1", |r| {
                r.step = Step::Idle;
                Ok::<_, ()>(())
            })
            .await
            .unwrap();
        assert!(manager.handle_answer("u1", "hello").await.replies().is_empty());
    }
}
