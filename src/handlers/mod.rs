pub mod generation_handler;
pub mod graphql_handler;
pub mod health_handler;
pub mod session_handler;

use actix_web::web;

pub use generation_handler::generate_questions;
pub use health_handler::{health_check, health_check_live, health_check_ready};
pub use session_handler::{create_session, delete_session, get_session};

/// Registers every route of the server
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health_check)
        .service(health_check_live)
        .service(health_check_ready)
        .service(generate_questions)
        .service(create_session)
        .service(get_session)
        .service(delete_session)
        .configure(graphql_handler::configure);
}
