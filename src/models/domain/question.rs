use std::fmt;

use async_graphql::Enum;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::errors::{AppError, AppResult};

pub const OPTIONS_PER_QUESTION: usize = 4;
pub const QUESTIONS_PER_BATCH: usize = 4;

/// Position of an option within a question, fixed for the question's lifetime.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, Enum, JsonSchema,
)]
pub enum AnswerLabel {
    A,
    B,
    C,
    D,
}

impl AnswerLabel {
    pub const ALL: [AnswerLabel; OPTIONS_PER_QUESTION] =
        [AnswerLabel::A, AnswerLabel::B, AnswerLabel::C, AnswerLabel::D];

    pub fn index(self) -> usize {
        match self {
            AnswerLabel::A => 0,
            AnswerLabel::B => 1,
            AnswerLabel::C => 2,
            AnswerLabel::D => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for AnswerLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            AnswerLabel::A => "A",
            AnswerLabel::B => "B",
            AnswerLabel::C => "C",
            AnswerLabel::D => "D",
        };
        f.write_str(letter)
    }
}

/// A single multiple-choice question as produced by the model.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema, Validate)]
#[serde(deny_unknown_fields)]
pub struct Question {
    /// The question prompt shown to the user
    #[validate(length(min = 1))]
    pub question: String,
    /// Exactly four options, labelled A to D in order
    #[validate(length(equal = 4), custom(function = "no_blank_options"))]
    pub options: Vec<String>,
    /// Label of the correct option
    pub answer: AnswerLabel,
    /// Why the correct option is correct
    pub explanation: String,
}

impl Question {
    pub fn option_text(&self, label: AnswerLabel) -> &str {
        self.options
            .get(label.index())
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn is_correct(&self, label: AnswerLabel) -> bool {
        self.answer == label
    }
}

fn no_blank_options(options: &[String]) -> Result<(), ValidationError> {
    if options.iter().any(|option| option.trim().is_empty()) {
        return Err(ValidationError::new("blank_option"));
    }
    Ok(())
}

/// The unit of one generation call: exactly four questions.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema, Validate)]
#[serde(deny_unknown_fields)]
pub struct QuestionBatch {
    #[validate(length(equal = 4), nested)]
    pub questions: Vec<Question>,
}

impl QuestionBatch {
    /// Builds a batch and rejects it as a whole if any question is malformed.
    pub fn new(questions: Vec<Question>) -> AppResult<Self> {
        let batch = Self { questions };
        batch.validate().map_err(|e| {
            AppError::GenerationError(format!("model output failed schema validation: {}", e))
        })?;
        Ok(batch)
    }

    /// Parses model output, accepting either `{"questions": [...]}` or a bare array.
    pub fn parse(raw: &str) -> AppResult<Self> {
        let questions = match serde_json::from_str::<QuestionBatch>(raw) {
            Ok(batch) => batch.questions,
            Err(object_err) => serde_json::from_str::<Vec<Question>>(raw).map_err(|_| {
                AppError::GenerationError(format!(
                    "model output is not a valid question batch: {}",
                    object_err
                ))
            })?,
        };
        Self::new(questions)
    }

    pub fn into_questions(self) -> Vec<Question> {
        self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}
