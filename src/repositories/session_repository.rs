use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    errors::{AppError, AppResult},
    models::domain::QuizSession,
};

/// A change applied to a session while the store holds its write lock.
pub type SessionMutation<'a> = Box<dyn FnOnce(&mut QuizSession) + Send + 'a>;

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: QuizSession) -> AppResult<QuizSession>;
    async fn find_by_id(&self, id: &Uuid) -> AppResult<Option<QuizSession>>;
    /// Applies `mutation` atomically and returns a snapshot of the result.
    async fn modify(&self, id: &Uuid, mutation: SessionMutation<'_>) -> AppResult<QuizSession>;
    async fn delete(&self, id: &Uuid) -> AppResult<()>;
    async fn count(&self) -> AppResult<usize>;
}

/// Process-local session store. Sessions do not survive a restart.
#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<Uuid, QuizSession>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn session_not_found(id: &Uuid) -> AppError {
    AppError::NotFound(format!("Quiz session '{}' not found", id))
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn create(&self, session: QuizSession) -> AppResult<QuizSession> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id()) {
            return Err(AppError::Conflict(format!(
                "Quiz session '{}' already exists",
                session.id()
            )));
        }

        sessions.insert(session.id(), session.clone());
        Ok(session)
    }

    async fn find_by_id(&self, id: &Uuid) -> AppResult<Option<QuizSession>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(id).cloned())
    }

    async fn modify(&self, id: &Uuid, mutation: SessionMutation<'_>) -> AppResult<QuizSession> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(id).ok_or_else(|| session_not_found(id))?;

        mutation(session);
        Ok(session.clone())
    }

    async fn delete(&self, id: &Uuid) -> AppResult<()> {
        let mut sessions = self.sessions.write().await;
        sessions
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| session_not_found(id))
    }

    async fn count(&self) -> AppResult<usize> {
        Ok(self.sessions.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::domain::AnswerLabel;
    use crate::test_utils::fixtures::sample_session;

    #[tokio::test]
    async fn modify_applies_mutation_and_returns_snapshot() {
        let repo = InMemorySessionRepository::new();
        let session = repo.create(sample_session()).await.expect("create");

        let updated = repo
            .modify(
                &session.id(),
                Box::new(|s| {
                    s.select_answer(AnswerLabel::A).ok();
                }),
            )
            .await
            .expect("modify");

        assert_eq!(updated.answer_for(0), Some(AnswerLabel::A));
        let stored = repo
            .find_by_id(&session.id())
            .await
            .expect("find")
            .expect("session exists");
        assert_eq!(stored.answer_for(0), Some(AnswerLabel::A));
    }

    #[tokio::test]
    async fn modify_missing_session_is_not_found() {
        let repo = InMemorySessionRepository::new();
        let result = repo.modify(&Uuid::new_v4(), Box::new(|_| {})).await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_repository_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<InMemorySessionRepository>();
    }
}
