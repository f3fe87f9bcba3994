use std::convert::Infallible;
use std::sync::Arc;

use actix_web::{post, web, HttpRequest, HttpResponse};
use futures::StreamExt;

use crate::{
    app_state::AppState,
    errors::AppError,
    middleware::get_request_id,
    models::domain::document::{Document, GenerationRequest},
    services::http_helpers::{error_line, ndjson_line, NDJSON_CONTENT_TYPE},
};

/// One-shot generation without a session. Streams progress events as NDJSON;
/// a failure after the stream has started arrives as a final error line.
#[post("/api/generate")]
async fn generate_questions(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let request_id = get_request_id(&req).unwrap_or_default();
    let document = Document::from_upload(body.to_vec(), state.config.max_document_bytes)?;
    let digest = document.short_digest().to_string();
    log::info!("[{}] Streaming questions for document {}", request_id, digest);

    let events = state
        .generator
        .stream_batch(GenerationRequest::new(Arc::new(document)))
        .await?;

    let lines = events.map(move |event| {
        let line = match event.and_then(|e| ndjson_line(&e)) {
            Ok(line) => line,
            Err(err) => {
                log::warn!(
                    "[{}] Generation for document {} failed: {}",
                    request_id,
                    digest,
                    err
                );
                error_line(&err)
            }
        };
        Ok::<_, Infallible>(line)
    });

    Ok(HttpResponse::Ok()
        .content_type(NDJSON_CONTENT_TYPE)
        .streaming(lines))
}
