use std::sync::Arc;

use crate::{
    config::Config,
    repositories::InMemorySessionRepository,
    services::{
        model_service::{OpenAiQuestionGenerator, QuestionGenerator},
        session_service::SessionService,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub session_service: Arc<SessionService>,
    pub generator: Arc<dyn QuestionGenerator>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let generator = Arc::new(OpenAiQuestionGenerator::new(&config));
        Self::with_generator(config, generator)
    }

    pub fn with_generator(config: Config, generator: Arc<dyn QuestionGenerator>) -> Self {
        let session_repository = Arc::new(InMemorySessionRepository::new());
        let session_service = Arc::new(SessionService::new(
            session_repository,
            Arc::clone(&generator),
            config.avoid_repeats,
        ));

        Self {
            session_service,
            generator,
            config: Arc::new(config),
        }
    }
}
