use std::collections::BTreeMap;
use std::sync::Arc;

use async_graphql::SimpleObject;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::domain::document::{Document, GenerationRequest};
use crate::models::domain::question::{AnswerLabel, Question, QuestionBatch};

/// Another batch is requested once the user is this close to the end of the list.
pub const FETCH_AHEAD_THRESHOLD: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QuizError {
    #[error("the current question has not been answered yet")]
    NotAnswered,

    #[error("there are no further questions; request the results instead")]
    NoMoreQuestions,

    #[error("more questions are still being generated")]
    MoreQuestionsLoading,

    #[error("the quiz is already complete")]
    SessionComplete,

    #[error("more questions are already being generated")]
    FetchInProgress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    InProgress { index: usize, answered: bool },
    Complete,
}

/// Proof that a background fetch was started, tied to the session's reset epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    epoch: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Appended { added: usize, total: usize },
    Failed,
    /// The session was reset after the fetch started; the result was dropped.
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub selected: AnswerLabel,
    pub correct: bool,
    pub correct_answer: AnswerLabel,
    pub feedback: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, SimpleObject)]
pub struct ReviewRow {
    pub question_number: u32,
    pub question: String,
    pub selected: AnswerLabel,
    pub selected_text: String,
    pub correct_answer: AnswerLabel,
    pub correct_text: String,
    pub is_correct: bool,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, SimpleObject)]
pub struct QuizResults {
    pub score: u32,
    pub answered: u32,
    pub percentage: u32,
    pub review: Vec<ReviewRow>,
}

pub fn feedback_message(question: &Question, selected: AnswerLabel) -> String {
    if question.is_correct(selected) {
        "Correct!".to_string()
    } else {
        format!("Incorrect. The correct answer is {}.", question.answer)
    }
}

/// One user's progression through the quiz generated from a single document.
///
/// Every transition is synchronous; the session never performs I/O. Background
/// fetches are driven from outside through [`QuizSession::begin_fetch`] and
/// [`QuizSession::finish_fetch`].
#[derive(Debug, Clone)]
pub struct QuizSession {
    id: Uuid,
    document: Arc<Document>,
    initial_batch: QuestionBatch,
    questions: Vec<Question>,
    current_index: usize,
    answers: BTreeMap<usize, AnswerLabel>,
    score: usize,
    explanation_visible: bool,
    is_complete: bool,
    is_fetching_more: bool,
    epoch: u64,
    created_at: DateTime<Utc>,
}

impl QuizSession {
    pub fn new(document: Arc<Document>, initial_batch: QuestionBatch) -> Self {
        Self {
            id: Uuid::new_v4(),
            document,
            questions: initial_batch.questions.clone(),
            initial_batch,
            current_index: 0,
            answers: BTreeMap::new(),
            score: 0,
            explanation_visible: false,
            is_complete: false,
            is_fetching_more: false,
            epoch: 0,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_question(&self) -> &Question {
        &self.questions[self.current_index]
    }

    pub fn answer_for(&self, index: usize) -> Option<AnswerLabel> {
        self.answers.get(&index).copied()
    }

    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    pub fn is_current_answered(&self) -> bool {
        self.answers.contains_key(&self.current_index)
    }

    pub fn score(&self) -> usize {
        self.score
    }

    pub fn explanation_visible(&self) -> bool {
        self.explanation_visible
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    pub fn is_fetching_more(&self) -> bool {
        self.is_fetching_more
    }

    pub fn has_next_question(&self) -> bool {
        self.current_index + 1 < self.questions.len()
    }

    pub fn phase(&self) -> SessionPhase {
        if self.is_complete {
            SessionPhase::Complete
        } else {
            SessionPhase::InProgress {
                index: self.current_index,
                answered: self.is_current_answered(),
            }
        }
    }

    /// Fraction of the known questions already passed.
    pub fn progress(&self) -> f64 {
        self.current_index as f64 / self.questions.len() as f64
    }

    /// Records an answer for the current question. Once a question has an
    /// answer, later calls return the original outcome and change nothing.
    pub fn select_answer(&mut self, label: AnswerLabel) -> Result<AnswerOutcome, QuizError> {
        if self.is_complete {
            return Err(QuizError::SessionComplete);
        }

        let index = self.current_index;
        if let Some(existing) = self.answer_for(index) {
            return Ok(self.outcome_for(index, existing));
        }

        self.answers.insert(index, label);
        let outcome = self.outcome_for(index, label);
        if outcome.correct {
            self.score += 1;
        }
        Ok(outcome)
    }

    pub fn current_outcome(&self) -> Option<AnswerOutcome> {
        self.answer_for(self.current_index)
            .map(|label| self.outcome_for(self.current_index, label))
    }

    fn outcome_for(&self, index: usize, selected: AnswerLabel) -> AnswerOutcome {
        let question = &self.questions[index];
        AnswerOutcome {
            selected,
            correct: question.is_correct(selected),
            correct_answer: question.answer,
            feedback: feedback_message(question, selected),
        }
    }

    pub fn advance(&mut self) -> Result<(), QuizError> {
        if self.is_complete {
            return Err(QuizError::SessionComplete);
        }
        if !self.is_current_answered() {
            return Err(QuizError::NotAnswered);
        }
        if !self.has_next_question() {
            return Err(if self.is_fetching_more {
                QuizError::MoreQuestionsLoading
            } else {
                QuizError::NoMoreQuestions
            });
        }

        self.current_index += 1;
        self.explanation_visible = false;
        Ok(())
    }

    /// Flips the explanation panel for the current, already answered, question.
    pub fn toggle_explanation(&mut self) -> Result<bool, QuizError> {
        if self.is_complete {
            return Err(QuizError::SessionComplete);
        }
        if !self.is_current_answered() {
            return Err(QuizError::NotAnswered);
        }

        self.explanation_visible = !self.explanation_visible;
        Ok(self.explanation_visible)
    }

    pub fn request_results(&mut self) {
        self.is_complete = true;
        self.explanation_visible = false;
    }

    pub fn should_fetch_more(&self) -> bool {
        !self.is_complete
            && !self.is_fetching_more
            && self.current_index + FETCH_AHEAD_THRESHOLD >= self.questions.len()
    }

    /// Starts a background fetch if the user is close to the end of the list.
    pub fn begin_fetch(&mut self) -> Option<FetchTicket> {
        if !self.should_fetch_more() {
            return None;
        }
        self.try_begin_fetch().ok()
    }

    /// Starts a fetch regardless of position, as long as none is in flight.
    pub fn try_begin_fetch(&mut self) -> Result<FetchTicket, QuizError> {
        if self.is_complete {
            return Err(QuizError::SessionComplete);
        }
        if self.is_fetching_more {
            return Err(QuizError::FetchInProgress);
        }

        self.is_fetching_more = true;
        Ok(FetchTicket { epoch: self.epoch })
    }

    /// Settles a fetch started with `ticket`; `None` means generation failed.
    /// A ticket from before the last reset releases the fetch slot and its
    /// batch is dropped.
    pub fn finish_fetch(&mut self, ticket: FetchTicket, batch: Option<QuestionBatch>) -> FetchOutcome {
        self.is_fetching_more = false;
        if ticket.epoch != self.epoch {
            return FetchOutcome::Stale;
        }

        match batch {
            Some(batch) => {
                let added = batch.len();
                self.questions.extend(batch.into_questions());
                FetchOutcome::Appended {
                    added,
                    total: self.questions.len(),
                }
            }
            None => FetchOutcome::Failed,
        }
    }

    pub fn generation_request(&self, avoid_repeats: bool) -> GenerationRequest {
        let request = GenerationRequest::new(Arc::clone(&self.document));
        if avoid_repeats {
            request.excluding(self.questions.iter().map(|q| q.question.clone()).collect())
        } else {
            request
        }
    }

    /// Back to the first question of the initial batch; appended batches are
    /// dropped. A fetch in flight keeps its slot until it finishes as stale.
    pub fn reset(&mut self) {
        self.questions = self.initial_batch.questions.clone();
        self.current_index = 0;
        self.answers.clear();
        self.score = 0;
        self.explanation_visible = false;
        self.is_complete = false;
        self.epoch += 1;
    }

    /// Score and review over the questions that were actually answered.
    pub fn results(&self) -> QuizResults {
        let review: Vec<ReviewRow> = self
            .answers
            .iter()
            .map(|(&index, &selected)| {
                let question = &self.questions[index];
                ReviewRow {
                    question_number: (index + 1) as u32,
                    question: question.question.clone(),
                    selected,
                    selected_text: question.option_text(selected).to_string(),
                    correct_answer: question.answer,
                    correct_text: question.option_text(question.answer).to_string(),
                    is_correct: question.is_correct(selected),
                    explanation: question.explanation.clone(),
                }
            })
            .collect();

        let answered = review.len() as u32;
        let score = self.score as u32;
        let percentage = if answered == 0 {
            0
        } else {
            (f64::from(score) * 100.0 / f64::from(answered)).round() as u32
        };

        QuizResults {
            score,
            answered,
            percentage,
            review,
        }
    }
}
