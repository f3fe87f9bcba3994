use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actix_web::{http::StatusCode, test, web, App};
use async_trait::async_trait;
use futures::stream;

use pdf_quiz_server::{
    app_state::AppState,
    config::Config,
    errors::{AppError, AppResult},
    graphql::create_schema,
    handlers,
    middleware::RequestIdMiddleware,
    models::{
        domain::{AnswerLabel, Document, GenerationRequest, Question, QuestionBatch},
        dto::response::{SessionStatus, SessionView},
    },
    services::{
        model_service::{GenerationStream, QuestionGenerator},
        stream_parser::generation_stream,
    },
};

/// Replays pre-scripted model output, chunked the way a streaming model
/// sends it, and records every request.
#[derive(Default)]
struct ScriptedGenerator {
    script: Mutex<VecDeque<AppResult<String>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    fn new(script: Vec<AppResult<String>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }
}

#[async_trait]
impl QuestionGenerator for ScriptedGenerator {
    async fn stream_batch(&self, request: GenerationRequest) -> AppResult<GenerationStream> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        let next = self
            .script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .unwrap_or_else(|| Err(AppError::GenerationError("script exhausted".to_string())));

        let chunks: Vec<AppResult<String>> = next?
            .chars()
            .collect::<Vec<_>>()
            .chunks(40)
            .map(|c| Ok(c.iter().collect()))
            .collect();
        Ok(generation_stream(
            stream::iter(chunks),
            Duration::from_secs(5),
        ))
    }
}

fn question(n: usize, answer: AnswerLabel) -> Question {
    Question {
        question: format!("What does section {} describe?", n),
        options: AnswerLabel::ALL
            .iter()
            .map(|label| format!("Section {} choice {}", n, label))
            .collect(),
        answer,
        explanation: format!("Section {} explains it directly.", n),
    }
}

/// Batch of questions numbered from `offset`; question n's answer is ALL[n % 4]
fn batch(offset: usize) -> QuestionBatch {
    QuestionBatch::new(
        (offset..offset + 4)
            .map(|n| question(n, AnswerLabel::ALL[n % 4]))
            .collect(),
    )
    .expect("valid batch")
}

/// Model output for a valid batch
fn model_output(offset: usize) -> AppResult<String> {
    Ok(serde_json::to_string(&batch(offset)).expect("batch serializes"))
}

fn document() -> Document {
    Document::from_upload(b"%PDF-1.4 lecture notes".to_vec(), 1024 * 1024).expect("document")
}

fn answer_of(view: &SessionView) -> AnswerLabel {
    AnswerLabel::ALL[(view.question_number as usize - 1) % 4]
}

fn other_than(label: AnswerLabel) -> AnswerLabel {
    AnswerLabel::ALL[(label.index() + 1) % 4]
}

async fn wait_for_fetch(state: &AppState, id: &uuid::Uuid) -> SessionView {
    for _ in 0..100 {
        let view = state.session_service.get_session(id).await.expect("session");
        if !view.is_fetching_more {
            return view;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("background fetch did not finish");
}

#[tokio::test]
async fn quiz_scenario_fetches_more_and_scores_answered_questions() {
    let generator = ScriptedGenerator::new(vec![model_output(0), model_output(4)]);
    let state = AppState::with_generator(Config::test_config(), generator.clone());
    let service = &state.session_service;

    let view = service.create_session(document()).await.expect("session");
    let id: uuid::Uuid = view.id.parse().expect("uuid");
    assert_eq!(view.total_questions, 4);

    // Q1 right
    let view = service
        .select_answer(&id, answer_of(&view))
        .await
        .expect("answer q1");
    assert_eq!(view.feedback.as_deref(), Some("Correct!"));
    let view = service.next_question(&id).await.expect("advance");
    assert_eq!(view.question_number, 2);

    // Q2 wrong
    let view = service
        .select_answer(&id, other_than(answer_of(&view)))
        .await
        .expect("answer q2");
    assert_eq!(view.is_correct, Some(false));
    service.next_question(&id).await.expect("advance");

    let view = wait_for_fetch(&state, &id).await;
    assert_eq!(view.question_number, 3);
    assert!(view.total_questions >= 5);
    assert_eq!(generator.request_count(), 2);

    // Q3 right, then finish
    service
        .select_answer(&id, answer_of(&view))
        .await
        .expect("answer q3");
    let view = service.request_results(&id).await.expect("results");

    assert_eq!(view.status, SessionStatus::Complete);
    let results = view.results.expect("results");
    assert_eq!(results.score, 2);
    assert_eq!(results.answered, 3);
    assert_eq!(results.review.len(), 3);
    assert_eq!(results.percentage, 67);
}

#[tokio::test]
async fn failed_background_fetch_keeps_questions_and_reset_restarts() {
    let generator = ScriptedGenerator::new(vec![model_output(0)]);
    let state = AppState::with_generator(Config::test_config(), generator);
    let service = &state.session_service;

    let id: uuid::Uuid = service
        .create_session(document())
        .await
        .expect("session")
        .id
        .parse()
        .expect("uuid");

    for _ in 0..2 {
        let view = service.get_session(&id).await.expect("session");
        service
            .select_answer(&id, answer_of(&view))
            .await
            .expect("answer");
        service.next_question(&id).await.expect("advance");
    }

    // the script is exhausted, so the background fetch fails
    let view = wait_for_fetch(&state, &id).await;
    assert_eq!(view.total_questions, 4);

    let view = service.reset_session(&id).await.expect("reset");
    assert_eq!(view.question_number, 1);
    assert_eq!(view.score, 0);
    assert!(!view.is_fetching_more);
}

#[tokio::test]
async fn batch_with_three_option_question_creates_no_session() {
    let mut bad = batch(0);
    bad.questions[2].options.truncate(3);
    let output = serde_json::to_string(&bad).expect("batch serializes");

    let generator = ScriptedGenerator::new(vec![Ok(output)]);
    let state = AppState::with_generator(Config::test_config(), generator.clone());

    let result = state.session_service.create_session(document()).await;
    assert!(matches!(result, Err(AppError::GenerationError(_))));
    assert_eq!(generator.request_count(), 1);
}

#[tokio::test]
async fn fenced_model_output_is_accepted() {
    let output = format!(
        "```json\n{}\n```",
        serde_json::to_string(&batch(0)).expect("batch serializes")
    );
    let generator = ScriptedGenerator::new(vec![Ok(output)]);
    let state = AppState::with_generator(Config::test_config(), generator);

    let view = state
        .session_service
        .create_session(document())
        .await
        .expect("session");
    assert_eq!(view.total_questions, 4);
}

#[actix_rt::test]
async fn http_session_lifecycle() {
    let generator = ScriptedGenerator::new(vec![model_output(0)]);
    let state = AppState::with_generator(Config::test_config(), generator);
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .app_data(web::Data::new(create_schema(state)))
            .wrap(RequestIdMiddleware)
            .configure(handlers::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/sessions")
        .set_payload(&b"%PDF-1.4 lecture notes"[..])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert!(resp.headers().contains_key("x-request-id"));
    let created: serde_json::Value = test::read_body_json(resp).await;
    let id = created["id"].as_str().expect("id").to_string();

    let mutation = format!(
        r#"{{"query":"mutation {{ selectAnswer(id: \"{}\", label: A) {{ isCorrect feedback }} }}"}}"#,
        id
    );
    let req = test::TestRequest::post()
        .uri("/graphql")
        .insert_header(("content-type", "application/json"))
        .set_payload(mutation)
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["data"]["selectAnswer"]["isCorrect"], true);
    assert_eq!(resp["data"]["selectAnswer"]["feedback"], "Correct!");

    let req = test::TestRequest::get()
        .uri(&format!("/api/sessions/{}", id))
        .to_request();
    let view: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(view["score"], 1);
    assert_eq!(view["selected_answer"], "A");

    let req = test::TestRequest::delete()
        .uri(&format!("/api/sessions/{}", id))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NO_CONTENT
    );
}

#[actix_rt::test]
async fn http_create_session_failure_is_bad_gateway() {
    let generator = ScriptedGenerator::new(vec![Err(AppError::GenerationError(
        "model timed out".to_string(),
    ))]);
    let state = AppState::with_generator(Config::test_config(), generator);
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(handlers::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/sessions")
        .set_payload(&b"%PDF-1.4"[..])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 502);
}

#[actix_rt::test]
async fn http_generate_streams_progress_then_complete() {
    let generator = ScriptedGenerator::new(vec![model_output(0)]);
    let state = AppState::with_generator(Config::test_config(), generator);
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(handlers::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/generate")
        .set_payload(&b"%PDF-1.4"[..])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok()),
        Some("application/x-ndjson")
    );

    let body = test::read_body(resp).await;
    let types: Vec<String> = std::str::from_utf8(&body)
        .expect("utf8")
        .lines()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).expect("json line");
            value["type"].as_str().unwrap_or_default().to_string()
        })
        .collect();
    assert_eq!(types.first().map(String::as_str), Some("progress"));
    assert_eq!(types.last().map(String::as_str), Some("complete"));
    assert_eq!(types.iter().filter(|t| *t == "complete").count(), 1);
}
