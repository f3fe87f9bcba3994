pub mod document;
pub mod question;
pub mod quiz_session;
pub use document::{Document, GenerationRequest};
pub use question::{AnswerLabel, Question, QuestionBatch};
pub use quiz_session::{QuizError, QuizSession};
