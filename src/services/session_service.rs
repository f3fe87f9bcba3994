use std::sync::Arc;

use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{
    errors::{AppError, AppResult},
    models::{
        domain::{
            document::{Document, GenerationRequest},
            question::AnswerLabel,
            quiz_session::{FetchOutcome, FetchTicket, QuizSession},
        },
        dto::response::SessionView,
    },
    repositories::SessionRepository,
    services::model_service::{generate_batch, QuestionGenerator},
};

/// Runs `mutation` on the stored session and hands back its output with the
/// updated snapshot.
async fn apply<R, F>(
    repository: &dyn SessionRepository,
    id: &Uuid,
    mutation: F,
) -> AppResult<(R, QuizSession)>
where
    R: Send,
    F: FnOnce(&mut QuizSession) -> R + Send,
{
    let mut output = None;
    let session = repository
        .modify(id, Box::new(|session| output = Some(mutation(session))))
        .await?;
    let output = output.ok_or_else(|| {
        AppError::InternalError(format!("mutation of session '{}' did not run", id))
    })?;
    Ok((output, session))
}

/// Generates batches until the session no longer wants one, or a fetch fails.
async fn fetch_in_background(
    repository: Arc<dyn SessionRepository>,
    generator: Arc<dyn QuestionGenerator>,
    id: Uuid,
    mut ticket: FetchTicket,
    mut request: GenerationRequest,
    avoid_repeats: bool,
) {
    loop {
        let batch = match generate_batch(generator.as_ref(), request).await {
            Ok(batch) => Some(batch),
            Err(e) => {
                log::warn!("Fetching more questions for session {} failed: {}", id, e);
                None
            }
        };

        let settled = apply(repository.as_ref(), &id, move |session| {
            let outcome = session.finish_fetch(ticket, batch);
            let next = match outcome {
                FetchOutcome::Appended { .. } | FetchOutcome::Stale => session
                    .begin_fetch()
                    .map(|t| (t, session.generation_request(avoid_repeats))),
                FetchOutcome::Failed => None,
            };
            (outcome, next)
        })
        .await;

        match settled {
            Ok(((outcome, next), _)) => {
                match outcome {
                    FetchOutcome::Appended { added, total } => log::info!(
                        "Appended {} questions to session {} ({} known)",
                        added,
                        id,
                        total
                    ),
                    FetchOutcome::Stale => {
                        log::info!("Discarded batch for session {} after reset", id)
                    }
                    FetchOutcome::Failed => {}
                }

                match next {
                    Some((next_ticket, next_request)) => {
                        ticket = next_ticket;
                        request = next_request;
                    }
                    None => break,
                }
            }
            Err(e) => {
                log::info!("Dropping batch for session {}: {}", id, e);
                break;
            }
        }
    }
}

pub struct SessionService {
    repository: Arc<dyn SessionRepository>,
    generator: Arc<dyn QuestionGenerator>,
    avoid_repeats: bool,
}

impl SessionService {
    pub fn new(
        repository: Arc<dyn SessionRepository>,
        generator: Arc<dyn QuestionGenerator>,
        avoid_repeats: bool,
    ) -> Self {
        Self {
            repository,
            generator,
            avoid_repeats,
        }
    }

    /// Generates the initial batch and opens a session over it. Nothing is
    /// stored when generation fails.
    pub async fn create_session(&self, document: Document) -> AppResult<SessionView> {
        let document = Arc::new(document);
        log::info!(
            "Generating initial questions for document {}",
            document.short_digest()
        );

        let batch = generate_batch(
            self.generator.as_ref(),
            GenerationRequest::new(Arc::clone(&document)),
        )
        .await?;

        let session = self
            .repository
            .create(QuizSession::new(document, batch))
            .await?;
        let id = session.id();
        log::info!("Created quiz session {}", id);

        self.maybe_fetch_more(&id).await?;
        self.get_session(&id).await
    }

    pub async fn get_session(&self, id: &Uuid) -> AppResult<SessionView> {
        let session = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Quiz session '{}' not found", id)))?;

        Ok(SessionView::from(&session))
    }

    pub async fn select_answer(&self, id: &Uuid, label: AnswerLabel) -> AppResult<SessionView> {
        let (outcome, session) =
            apply(self.repository.as_ref(), id, move |s| s.select_answer(label)).await?;
        let outcome = outcome?;

        log::debug!(
            "Session {} question {}: selected {}, correct {}",
            id,
            session.current_index() + 1,
            outcome.selected,
            outcome.correct_answer
        );
        Ok(SessionView::from(&session))
    }

    pub async fn next_question(&self, id: &Uuid) -> AppResult<SessionView> {
        let (advanced, _) = apply(self.repository.as_ref(), id, |s| s.advance()).await?;
        advanced?;

        self.maybe_fetch_more(id).await?;
        self.get_session(id).await
    }

    pub async fn toggle_explanation(&self, id: &Uuid) -> AppResult<SessionView> {
        let (toggled, session) =
            apply(self.repository.as_ref(), id, |s| s.toggle_explanation()).await?;
        toggled?;
        Ok(SessionView::from(&session))
    }

    pub async fn request_results(&self, id: &Uuid) -> AppResult<SessionView> {
        let (_, session) = apply(self.repository.as_ref(), id, |s| s.request_results()).await?;
        log::info!(
            "Session {} complete: {} of {} correct",
            id,
            session.score(),
            session.answered_count()
        );
        Ok(SessionView::from(&session))
    }

    pub async fn reset_session(&self, id: &Uuid) -> AppResult<SessionView> {
        let (_, session) = apply(self.repository.as_ref(), id, |s| s.reset()).await?;
        log::info!("Session {} reset to its initial questions", id);
        Ok(SessionView::from(&session))
    }

    /// Hands the session back to the upload step; the session is discarded.
    pub async fn clear_document(&self, id: &Uuid) -> AppResult<()> {
        self.repository.delete(id).await?;
        log::info!("Session {} cleared", id);
        Ok(())
    }

    /// Generates one more batch right away and waits for it. Fails if a fetch
    /// is already running or generation fails; a failure leaves the questions
    /// as they were.
    pub async fn request_more_questions(&self, id: &Uuid) -> AppResult<SessionView> {
        let avoid_repeats = self.avoid_repeats;
        let (started, _) = apply(self.repository.as_ref(), id, move |s| {
            s.try_begin_fetch()
                .map(|ticket| (ticket, s.generation_request(avoid_repeats)))
        })
        .await?;
        let (ticket, request) = started?;

        let (batch, failure) = match generate_batch(self.generator.as_ref(), request).await {
            Ok(batch) => (Some(batch), None),
            Err(e) => {
                log::warn!("Requested batch for session {} failed: {}", id, e);
                (None, Some(e))
            }
        };

        let (outcome, session) = apply(self.repository.as_ref(), id, move |s| {
            s.finish_fetch(ticket, batch)
        })
        .await?;

        if let Some(e) = failure {
            return Err(e);
        }
        if outcome == FetchOutcome::Stale {
            return Err(AppError::Conflict(
                "session was reset while questions were being generated".to_string(),
            ));
        }

        Ok(SessionView::from(&session))
    }

    /// Starts a background fetch when the session is near the end of its
    /// questions. At most one fetch per session runs at a time.
    pub async fn maybe_fetch_more(&self, id: &Uuid) -> AppResult<Option<JoinHandle<()>>> {
        let avoid_repeats = self.avoid_repeats;
        let (started, _) = apply(self.repository.as_ref(), id, move |s| {
            s.begin_fetch()
                .map(|ticket| (ticket, s.generation_request(avoid_repeats)))
        })
        .await?;

        let Some((ticket, request)) = started else {
            return Ok(None);
        };

        log::info!("Session {} is near the end of its questions; fetching more", id);
        let handle = tokio::spawn(fetch_in_background(
            Arc::clone(&self.repository),
            Arc::clone(&self.generator),
            *id,
            ticket,
            request,
            avoid_repeats,
        ));
        Ok(Some(handle))
    }
}
