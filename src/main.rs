use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};

use pdf_quiz_server::{
    app_state::AppState, config::Config, graphql::create_schema, handlers,
    middleware::RequestIdMiddleware,
};

fn cors(allowed_origin: &str) -> Cors {
    if allowed_origin == "*" {
        return Cors::permissive();
    }

    Cors::default()
        .allowed_origin(allowed_origin)
        .allowed_methods(vec!["GET", "POST", "DELETE"])
        .allow_any_header()
        .expose_headers(vec!["x-request-id"])
        .max_age(3600)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env();
    if let Err(e) = config.validate_for_production() {
        log::error!("Invalid configuration: {}", e);
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
    }

    let host = config.web_server_host.clone();
    let port = config.web_server_port;
    // Bodies over this are refused with 413 before reaching a handler
    let payload_limit = config.max_document_bytes;
    let allowed_origin = config.cors_allowed_origin.clone();

    log::info!(
        "Using model {} at {} (timeout {}s)",
        config.model_name,
        config.model_api_base,
        config.model_timeout_secs
    );

    let app_state = AppState::new(config);
    let schema = create_schema(app_state.clone());

    log::info!("Starting HTTP server on http://{}:{}", host, port);
    log::info!("GraphiQL playground: http://{}:{}/graphiql", host, port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::Data::new(schema.clone()))
            .app_data(web::PayloadConfig::new(payload_limit))
            .wrap(cors(&allowed_origin))
            .wrap(Logger::default())
            .wrap(RequestIdMiddleware)
            .configure(handlers::configure)
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
