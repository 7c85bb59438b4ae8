//! HTTP surface: chat, natural language queries, schema and health.

use std::sync::Arc;

use actix_web::http::Method;
use actix_web::http::header;
use actix_web::{HttpRequest, HttpResponse, Responder, get, middleware, post, web};
use actix_web_lab::sse::{self, Sse};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use crate::chat::{ChatReply, ChatRequest};
use crate::error::{ApiError, ErrorResponse};
use crate::executor::QueryResult;
use crate::intent::Intent;
use crate::processor::{QueryRequest, QueryResponse, SqlPipeline};
use crate::router::IntentRouter;
use crate::streaming::{Progress, process_question_stream};

const NO_DATA: &str = "No data provided";
const CHAT_FAILURE: &str = "An error occurred. Please try again later.";

/// Shared by every worker.
pub struct AppState {
    pub router: Arc<IntentRouter>,
    pub pipeline: Arc<SqlPipeline>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct SchemaResponse {
    pub schema: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct HealthResponse {
    pub status: String,
}

fn request_span(route: &str) -> tracing::Span {
    tracing::info_span!("request", route, request_id = %Uuid::new_v4())
}

// Mirrors the reply contract of the chat endpoint: an absent, unparsable or
// empty JSON object is "no data"; anything else without a usable message
// is a missing message.
fn parse_chat_body(body: &[u8]) -> Result<String, &'static str> {
    let value: serde_json::Value = serde_json::from_slice(body).map_err(|_| NO_DATA)?;
    match &value {
        serde_json::Value::Object(map) if !map.is_empty() => {}
        _ => return Err(NO_DATA),
    }

    let request: ChatRequest = serde_json::from_value(value).unwrap_or_default();
    request
        .message()
        .map(str::to_string)
        .map_err(|_| "Please provide a message.")
}

#[utoipa::path(
    post,
    path = "/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Reply from the matched intent handler", body = ChatReply),
        (status = 400, description = "Missing body or message", body = ChatReply),
        (status = 500, description = "Unexpected failure", body = ChatReply)
    )
)]
#[post("/chat")]
async fn chat(
    state: web::Data<AppState>,
    body: web::Bytes,
) -> HttpResponse {
    let message = match parse_chat_body(&body) {
        Ok(message) => message,
        Err(reply) => return HttpResponse::BadRequest().json(ChatReply::new(reply)),
    };

    let router = Arc::clone(&state.router);
    let span = request_span("/chat");
    // Handler failures are already apologies; only a crashed task lands here.
    let routed = tokio::spawn(async move { router.route(&message).await }.instrument(span)).await;

    match routed {
        Ok(reply) => HttpResponse::Ok().json(ChatReply::new(reply)),
        Err(e) => {
            tracing::error!("Chat task failed: {}", e);
            HttpResponse::InternalServerError().json(ChatReply::new(CHAT_FAILURE))
        }
    }
}

#[utoipa::path(
    post,
    path = "/query",
    request_body = QueryRequest,
    responses(
        (status = 200, description = "Generated SQL and its result", body = QueryResponse),
        (status = 400, description = "Missing question", body = ErrorResponse),
        (status = 500, description = "Generation or execution failed", body = ErrorResponse),
        (status = 502, description = "Language model unavailable", body = ErrorResponse),
        (status = 503, description = "Database unavailable", body = ErrorResponse)
    )
)]
#[post("/query")]
async fn query(
    state: web::Data<AppState>,
    body: web::Json<QueryRequest>,
) -> Result<web::Json<QueryResponse>, ApiError> {
    let question = body.question()?;
    let response = state.pipeline.answer(question).instrument(request_span("/query")).await?;
    Ok(web::Json(response))
}

#[utoipa::path(
    post,
    path = "/query/stream",
    request_body = QueryRequest,
    responses(
        (status = 200, description = "Stream of progress events", content_type = "text/event-stream", body = Progress),
        (status = 400, description = "Missing question", body = ErrorResponse)
    )
)]
#[post("/query/stream")]
async fn query_stream(
    state: web::Data<AppState>,
    body: web::Json<QueryRequest>,
) -> Result<impl Responder, ApiError> {
    let question = body.question()?.to_string();

    let stream = request_span("/query/stream").in_scope(|| {
        tracing::info!("Streaming answer for: {}", question);
        process_question_stream(Arc::clone(&state.pipeline), question)
    });
    let stream = stream
        .map(|progress| Ok::<_, actix_web::Error>(sse::Event::Data(sse::Data::new(progress.to_json()))));

    Ok(Sse::from_stream(stream))
}

#[utoipa::path(
    get,
    path = "/schema",
    responses(
        (status = 200, description = "Rendered database schema", body = SchemaResponse),
        (status = 503, description = "Database unavailable", body = ErrorResponse)
    )
)]
#[get("/schema")]
async fn schema(state: web::Data<AppState>) -> Result<web::Json<SchemaResponse>, ApiError> {
    let schema = state.pipeline.describe_schema().await?;
    Ok(web::Json(SchemaResponse {
        schema: schema.to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
#[get("/health")]
async fn health() -> web::Json<HealthResponse> {
    web::Json(HealthResponse {
        status: "ok".to_string(),
    })
}

// Answers CORS preflight; everything else unmatched is a 404.
async fn fallback(req: HttpRequest) -> HttpResponse {
    if req.method() == Method::OPTIONS {
        HttpResponse::NoContent()
            .insert_header((header::ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, OPTIONS"))
            .insert_header((header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"))
            .finish()
    } else {
        HttpResponse::NotFound().finish()
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(chat, query, query_stream, schema, health),
    components(schemas(
        ChatRequest,
        ChatReply,
        QueryRequest,
        QueryResponse,
        QueryResult,
        Progress,
        Intent,
        SchemaResponse,
        HealthResponse,
        ErrorResponse
    ))
)]
pub struct ApiDoc;

/// Permissive CORS: every response may be read from any origin.
#[must_use]
pub fn cors_headers() -> middleware::DefaultHeaders {
    middleware::DefaultHeaders::new().add((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
}

/// Registers every route plus Swagger UI at `/swagger-ui/`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(chat)
        .service(query)
        .service(query_stream)
        .service(schema)
        .service(health)
        .service(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .default_service(web::to(fallback));
}
