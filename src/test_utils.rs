#[cfg(test)]
pub mod fixtures {
    use std::sync::Arc;

    use crate::models::domain::{
        document::Document,
        question::{AnswerLabel, Question, QuestionBatch},
        quiz_session::QuizSession,
    };

    /// Creates a well-formed question numbered `n`
    pub fn sample_question(n: usize, answer: AnswerLabel) -> Question {
        Question {
            question: format!("Question {}?", n),
            options: AnswerLabel::ALL
                .iter()
                .map(|label| format!("Option {}{}", n, label))
                .collect(),
            answer,
            explanation: format!("Option {}{} is right.", n, answer),
        }
    }

    /// Creates a valid batch of questions numbered from `offset`
    pub fn sample_batch(offset: usize) -> QuestionBatch {
        let questions = (offset..offset + 4)
            .map(|n| sample_question(n, AnswerLabel::ALL[n % 4]))
            .collect();
        QuestionBatch::new(questions).expect("sample batch should be valid")
    }

    pub fn sample_document() -> Arc<Document> {
        Arc::new(
            Document::from_upload(b"%PDF-1.4 sample".to_vec(), 1024)
                .expect("sample document should be valid"),
        )
    }

    pub fn sample_session() -> QuizSession {
        QuizSession::new(sample_document(), sample_batch(0))
    }

    /// Any label other than `label`
    pub fn wrong_label(label: AnswerLabel) -> AnswerLabel {
        AnswerLabel::ALL[(label.index() + 1) % 4]
    }
}

#[cfg(test)]
pub mod test_helpers {
    use actix_web::http::StatusCode;
    use futures::stream;

    use crate::models::domain::question::QuestionBatch;
    use crate::services::model_service::{GenerationEvent, GenerationStream};

    /// A generation stream that completes with `batch` right away
    pub fn completed_stream(batch: QuestionBatch) -> GenerationStream {
        Box::pin(stream::iter(vec![Ok(GenerationEvent::Complete(batch))]))
    }

    /// Asserts that a status code represents an error (4xx or 5xx)
    pub fn assert_error_status(status: StatusCode) {
        assert!(
            status.is_client_error() || status.is_server_error(),
            "Expected error status, got: {}",
            status
        );
    }

    /// Asserts that a status code represents success (2xx)
    pub fn assert_success_status(status: StatusCode) {
        assert!(
            status.is_success(),
            "Expected success status, got: {}",
            status
        );
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use crate::models::domain::question::AnswerLabel;

    #[test]
    fn test_fixtures_sample_batch() {
        let batch = sample_batch(0);
        assert_eq!(batch.len(), 4);
        assert_eq!(batch.questions[0].answer, AnswerLabel::A);
        assert_eq!(batch.questions[1].answer, AnswerLabel::B);
    }

    #[test]
    fn test_fixtures_wrong_label_differs() {
        for label in AnswerLabel::ALL {
            assert_ne!(wrong_label(label), label);
        }
    }
}
