use actix_web::{delete, get, post, web, HttpRequest, HttpResponse};
use uuid::Uuid;

use crate::{
    app_state::AppState,
    errors::AppError,
    middleware::get_request_id,
    models::{domain::document::Document, dto::response::CreateSessionResponse},
};

/// Uploads a document and opens a quiz over its first batch.
#[post("/api/sessions")]
async fn create_session(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let request_id = get_request_id(&req).unwrap_or_default();
    let document = Document::from_upload(body.to_vec(), state.config.max_document_bytes)?;
    log::info!(
        "[{}] Creating session from {} byte document",
        request_id,
        document.len()
    );

    let view = state
        .session_service
        .create_session(document)
        .await
        .inspect_err(|e| log::warn!("[{}] Session creation failed: {}", request_id, e))?;
    Ok(HttpResponse::Created().json(CreateSessionResponse::from(view)))
}

#[get("/api/sessions/{id}")]
async fn get_session(
    state: web::Data<AppState>,
    id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let view = state.session_service.get_session(&id).await?;
    Ok(HttpResponse::Ok().json(view))
}

#[delete("/api/sessions/{id}")]
async fn delete_session(
    state: web::Data<AppState>,
    id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    state.session_service.clear_document(&id).await?;
    Ok(HttpResponse::NoContent().finish())
}
