use async_graphql::{Enum, SimpleObject};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::domain::{
    question::{AnswerLabel, Question},
    quiz_session::{QuizResults, QuizSession, SessionPhase},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Enum)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, SimpleObject)]
pub struct OptionView {
    pub label: AnswerLabel,
    pub text: String,
}

/// A question as shown before it is answered; the answer stays hidden.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, SimpleObject)]
pub struct QuestionView {
    pub text: String,
    pub options: Vec<OptionView>,
}

impl From<&Question> for QuestionView {
    fn from(question: &Question) -> Self {
        QuestionView {
            text: question.question.clone(),
            options: AnswerLabel::ALL
                .iter()
                .map(|&label| OptionView {
                    label,
                    text: question.option_text(label).to_string(),
                })
                .collect(),
        }
    }
}

/// Everything the quiz UI renders, derived from session state alone.
#[derive(Debug, Clone, PartialEq, Serialize, SimpleObject)]
pub struct SessionView {
    pub id: String,
    pub status: SessionStatus,
    /// 1-based position of the current question
    pub question_number: u32,
    pub total_questions: u32,
    /// current index / known questions, in [0, 1)
    pub progress: f64,
    pub score: u32,
    pub answered: u32,
    pub current_question: Option<QuestionView>,
    pub selected_answer: Option<AnswerLabel>,
    pub is_correct: Option<bool>,
    pub feedback: Option<String>,
    /// Present only while the explanation panel is open
    pub explanation: Option<String>,
    pub can_advance: bool,
    pub is_fetching_more: bool,
    pub results: Option<QuizResults>,
    pub created_at: DateTime<Utc>,
}

impl From<&QuizSession> for SessionView {
    fn from(session: &QuizSession) -> Self {
        let in_progress = matches!(session.phase(), SessionPhase::InProgress { .. });
        let question = session.current_question();
        let outcome = if in_progress {
            session.current_outcome()
        } else {
            None
        };

        SessionView {
            id: session.id().to_string(),
            status: if in_progress {
                SessionStatus::InProgress
            } else {
                SessionStatus::Complete
            },
            question_number: (session.current_index() + 1) as u32,
            total_questions: session.questions().len() as u32,
            progress: session.progress(),
            score: session.score() as u32,
            answered: session.answered_count() as u32,
            current_question: in_progress.then(|| QuestionView::from(question)),
            selected_answer: outcome.as_ref().map(|o| o.selected),
            is_correct: outcome.as_ref().map(|o| o.correct),
            feedback: outcome.map(|o| o.feedback),
            explanation: (in_progress && session.explanation_visible())
                .then(|| question.explanation.clone()),
            can_advance: in_progress && session.is_current_answered() && session.has_next_question(),
            is_fetching_more: session.is_fetching_more(),
            results: (!in_progress).then(|| session.results()),
            created_at: session.created_at(),
        }
    }
}

/// Body of `POST /api/sessions`
#[derive(Debug, Clone, Serialize)]
pub struct CreateSessionResponse {
    pub id: String,
    pub view: SessionView,
}

impl From<SessionView> for CreateSessionResponse {
    fn from(view: SessionView) -> Self {
        Self {
            id: view.id.clone(),
            view,
        }
    }
}
