//! HTTP routes for the conversation, speech, and subscription APIs.

use axum::{
    body::Body,
    extract::{Multipart, Query, State},
    http::{header, HeaderValue, Response, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use echois_billing::{AppleNotification, AppleRenewalPayload, AppleTransactionPayload, BillingError};
use echois_core::{parse_history, system_message, ChatMessage, UsageRecord};
use echois_llm::ChatRequest;
use echois_speech::audio::wav_duration_seconds;
use echois_stream::{EventSink, StreamOrchestrator};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_stream::{wrappers::ReceiverStream, StreamExt};
use tracing::{error, info, warn};

use crate::state::AppState;

const EXTRACTION_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TTS_PROMPT: &str = "何か今日ありましたか？";

// Capacity of the per-request SSE channel. Synthesis is slower than token
// arrival, so a modest buffer is enough to keep the pipeline busy.
const SSE_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

fn error_response(status: StatusCode, error: &str, code: &str) -> axum::response::Response {
    let body = Json(ErrorResponse {
        error: error.to_string(),
        code: code.to_string(),
    });
    (status, body).into_response()
}

/// Create the HTTP router with all API routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/stream/messages", get(stream_messages_handler))
        .route("/api/tts", get(tts_handler))
        .route("/api/stt", post(stt_handler))
        .route("/api/expressions", post(expressions_handler))
        .route("/api/summarize", post(summarize_handler))
        .route("/api/subscription/status", get(subscription_status_handler))
        .route("/api/subscription/update", post(subscription_update_handler))
        .route(
            "/api/subscription/applewebhook",
            post(apple_webhook_handler),
        )
        .layer(tower_http::cors::CorsLayer::permissive())
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub messages: Option<String>,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    pub style: Option<String>,
    pub lang: Option<String>,
}

/// The conversational endpoint. Validation failures are plain JSON errors;
/// once the history parses, the response switches to an SSE stream and the
/// pipeline runs in a detached task feeding the body channel.
async fn stream_messages_handler(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> axum::response::Response {
    let Some(raw) = query.messages else {
        return error_response(StatusCode::BAD_REQUEST, "No messages provided.", "NO_MESSAGES");
    };
    let mut history = match parse_history(&raw) {
        Ok(history) => history,
        Err(e) => {
            warn!("Rejecting stream request with bad history: {}", e);
            return error_response(
                StatusCode::BAD_REQUEST,
                "Invalid messages parameter",
                "INVALID_MESSAGES",
            );
        }
    };

    let lang = query.lang.unwrap_or_else(|| "en".to_string());
    let style = query.style.unwrap_or_default();
    // Always leads the forwarded history, even when the client already
    // carries its own system message (a summary handed back earlier).
    history.insert(0, system_message(&lang, &style));
    let request = ChatRequest::new(history);

    let (sink, rx) = EventSink::channel(SSE_CHANNEL_CAPACITY);
    let orchestrator = StreamOrchestrator::new(state.tts.clone(), sink, state.pipeline.clone());
    let provider = state.provider.clone();
    let usage = state.usage.clone();
    let user_id = query.user_id;

    tokio::spawn(async move {
        let upstream = provider.chat_stream(request).await;
        let outcome = orchestrator.run(upstream).await;
        if let Some(user_id) = user_id {
            if outcome.chars > 0 {
                usage.record(UsageRecord::tokens(&user_id, outcome.chars as u32));
            }
        }
    });

    sse_response(rx)
}

/// Wrap the pre-framed SSE channel as a streaming response body.
fn sse_response(rx: mpsc::Receiver<String>) -> axum::response::Response {
    let stream = ReceiverStream::new(rx).map(Ok::<_, Infallible>);
    let mut response = Response::new(Body::from_stream(stream));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-transform"),
    );
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    response
}

#[derive(Debug, Deserialize)]
pub struct TtsQuery {
    pub text: Option<String>,
}

/// One-shot synthesis, returning base64 mp3 as plain text.
async fn tts_handler(
    State(state): State<AppState>,
    Query(query): Query<TtsQuery>,
) -> axum::response::Response {
    let text = query
        .text
        .unwrap_or_else(|| DEFAULT_TTS_PROMPT.to_string());

    match state.tts.synthesize(&text, &state.pipeline.voice).await {
        Ok(audio) => {
            let mut response = Response::new(Body::from(BASE64.encode(&audio)));
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
            response
        }
        Err(e) => {
            error!("TTS synthesis failed: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error generating TTS",
                "TTS_ERROR",
            )
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SttResponse {
    pub transcription: String,
    #[serde(rename = "durationInSeconds")]
    pub duration_in_seconds: u32,
}

/// Multipart upload transcription. The audio duration feeds usage
/// accounting; non-WAV uploads are still transcribed but bill zero seconds.
async fn stt_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> axum::response::Response {
    let mut upload: Option<(String, bytes::Bytes)> = None;
    let mut user_id: Option<String> = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => match field.name() {
                Some("file") => {
                    let file_name = field
                        .file_name()
                        .unwrap_or("upload.wav")
                        .to_string();
                    match field.bytes().await {
                        Ok(data) => upload = Some((file_name, data)),
                        Err(e) => {
                            warn!("Failed to read upload body: {}", e);
                            return error_response(
                                StatusCode::BAD_REQUEST,
                                "Malformed upload",
                                "BAD_UPLOAD",
                            );
                        }
                    }
                }
                Some("userId") => {
                    user_id = field.text().await.ok();
                }
                _ => {}
            },
            Ok(None) => break,
            Err(e) => {
                warn!("Malformed multipart request: {}", e);
                return error_response(StatusCode::BAD_REQUEST, "Malformed upload", "BAD_UPLOAD");
            }
        }
    }

    let Some((file_name, audio)) = upload else {
        return error_response(StatusCode::BAD_REQUEST, "No file uploaded", "NO_FILE");
    };
    let Some(user_id) = user_id else {
        return error_response(StatusCode::BAD_REQUEST, "User ID is required", "NO_USER_ID");
    };

    let duration = wav_duration_seconds(&audio).unwrap_or(0);
    match state.transcriber.transcribe(audio, &file_name).await {
        Ok(transcription) => {
            state.usage.record(UsageRecord::seconds(&user_id, duration));
            Json(SttResponse {
                transcription: transcription.text,
                duration_in_seconds: duration,
            })
            .into_response()
        }
        Err(e) => {
            error!("Transcription failed: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
                "STT_ERROR",
            )
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionsRequest {
    pub text: Option<String>,
    pub native_language: Option<String>,
    pub foreign_language: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExpressionPair {
    pub foreign: String,
    pub native: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExpressionList {
    pub expressions: Vec<ExpressionPair>,
}

/// Extract key expressions from a sentence as foreign/native pairs.
async fn expressions_handler(
    State(state): State<AppState>,
    Json(request): Json<ExpressionsRequest>,
) -> axum::response::Response {
    let Some(text) = request.text.filter(|t| !t.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'text' field", "NO_TEXT");
    };
    let native = request.native_language.unwrap_or_else(|| "ja".to_string());
    let foreign = request.foreign_language.unwrap_or_else(|| "en".to_string());

    let prompt = format!(
        "You are an assistant that extracts key expressions from a single sentence.\n\
         Return a JSON object of the form:\n\
         {{\"expressions\": [{{\"foreign\": \"...\", \"native\": \"...\"}}]}}\n\
         Use the language pair:\n - foreign: {foreign}\n - native: {native}"
    );

    let mut chat_request =
        ChatRequest::new(vec![ChatMessage::system(prompt), ChatMessage::user(text)])
            .with_json_object_response();
    chat_request.model = Some(EXTRACTION_MODEL.to_string());

    match state.provider.chat(chat_request).await {
        Ok(response) => match serde_json::from_str::<ExpressionList>(&response.content) {
            Ok(list) => Json(list).into_response(),
            Err(e) => {
                error!("Expression extraction returned unparseable JSON: {}", e);
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to extract expressions",
                    "EXTRACTION_ERROR",
                )
            }
        },
        Err(e) => {
            error!("Expression extraction failed: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to extract expressions",
                "EXTRACTION_ERROR",
            )
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeRequest {
    pub chats: Option<Vec<ChatMessage>>,
    pub previous_summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SummaryOutput {
    language: Option<String>,
    summarize: String,
}

/// Roll the conversation into an updated summary with language detection.
async fn summarize_handler(
    State(state): State<AppState>,
    Json(request): Json<SummarizeRequest>,
) -> axum::response::Response {
    let Some(chats) = request.chats else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Missing 'chats' in request body.",
            "NO_CHATS",
        );
    };

    let transcript = chats
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n");
    let previous = request.previous_summary.unwrap_or_default();

    let prompt = format!(
        "You are an assistant summarizing conversation.\n\n\
         **Previous Summary:**\n{previous}\n\n\
         **New Conversation Messages:**\n{transcript}\n\n\
         **Task:**\n\
         Summarize the updated context, combining the previous summary and new \
         conversation insights. Include language detection.\n\n\
         **Output Format (JSON):**\n\
         {{\"language\": \"ja\", \"summarize\": \"Updated summary combining the previous and new conversation.\"}}"
    );

    let mut chat_request = ChatRequest::new(vec![
        ChatMessage::system(
            "You are a helpful assistant that evaluates whether user prompts have been \
             answered based on conversation history. Please provide a JSON response as instructed.",
        ),
        ChatMessage::user(prompt),
    ])
    .with_json_object_response();
    chat_request.model = Some(EXTRACTION_MODEL.to_string());

    let output = match state.provider.chat(chat_request).await {
        Ok(response) => match serde_json::from_str::<SummaryOutput>(&response.content) {
            Ok(output) => output,
            Err(e) => {
                error!("Summarize returned unparseable JSON: {}", e);
                return error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "No structured output returned.",
                    "SUMMARIZE_ERROR",
                );
            }
        },
        Err(e) => {
            error!("Summarize request failed: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                "SUMMARIZE_ERROR",
            );
        }
    };

    let system_content = format!(
        "here's the updated summary:\n\n{}\n\nLet me know if there's anything else you'd like to explore.",
        output.summarize
    );
    Json(json!({
        "systemMessage": ChatMessage::system(system_content),
        "summarize": output.summarize,
        "language": output.language,
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

async fn subscription_status_handler(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> axum::response::Response {
    let Some(user_id) = query.user_id else {
        return error_response(StatusCode::BAD_REQUEST, "Missing userId", "NO_USER_ID");
    };

    let (status, record) = state.store.status_for_user(&user_id);
    match record {
        None => Json(json!({
            "success": true,
            "subscriptionStatus": status,
            "details": null,
        }))
        .into_response(),
        Some(record) => Json(json!({
            "success": true,
            "subscriptionStatus": status,
            "productId": record.product_id,
            "autoRenewStatus": record.auto_renew_status,
            "expiresDate": record.expires_date,
            "environment": record.environment,
        }))
        .into_response(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub user_id: String,
    pub new_receipt_data: String,
}

/// App-initiated receipt refresh: verify with Apple, then store the result.
/// The receipt's transaction id links the user to future webhook
/// notifications for the same subscription.
async fn subscription_update_handler(
    State(state): State<AppState>,
    Json(request): Json<UpdateRequest>,
) -> axum::response::Response {
    match state.receipts.verify(&request.new_receipt_data).await {
        Ok(outcome) => {
            state
                .store
                .apply_receipt(&request.user_id, outcome.active, outcome.expires_date);
            if let Some(ref transaction_id) = outcome.original_transaction_id {
                state.store.link_user(&request.user_id, transaction_id);
            }
            let status = if outcome.active { "active" } else { "expired" };
            info!(
                "Subscription refreshed for user {}: {}",
                request.user_id, status
            );
            Json(json!({
                "status": "success",
                "message": "Subscription updated",
                "subscriptionStatus": status,
                "expiresDate": outcome.expires_date,
            }))
            .into_response()
        }
        Err(e) => {
            error!("Receipt verification failed: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update subscription",
                "RECEIPT_ERROR",
            )
        }
    }
}

/// App Store Server Notification webhook. Apple retries on non-2xx, so
/// verification failures return 500 to request redelivery.
async fn apple_webhook_handler(
    State(state): State<AppState>,
    Json(notification): Json<AppleNotification>,
) -> axum::response::Response {
    let transaction: Option<AppleTransactionPayload> =
        match &notification.data.signed_transaction_info {
            Some(jws) => match state.jws_verifier.verify(jws).await {
                Ok(payload) => Some(payload),
                Err(e) => {
                    error!("signedTransactionInfo verification failed: {}", e);
                    return error_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "JWS verification failed",
                        "JWS_ERROR",
                    );
                }
            },
            None => None,
        };

    let renewal: Option<AppleRenewalPayload> = match &notification.data.signed_renewal_info {
        Some(jws) => match state.jws_verifier.verify(jws).await {
            Ok(payload) => Some(payload),
            Err(e) => {
                error!("signedRenewalInfo verification failed: {}", e);
                return error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "JWS verification failed",
                    "JWS_ERROR",
                );
            }
        },
        None => None,
    };

    match state.store.apply_notification(
        notification.notification_type,
        notification.subtype,
        transaction,
        renewal,
    ) {
        Ok(_) => Json(json!({
            "success": true,
            "message": "Subscription info updated.",
        }))
        .into_response(),
        Err(BillingError::MissingTransactionId) => error_response(
            StatusCode::BAD_REQUEST,
            "No originalTransactionId found.",
            "NO_TRANSACTION_ID",
        ),
        Err(e) => {
            error!("Failed to apply notification: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update subscription",
                "WEBHOOK_ERROR",
            )
        }
    }
}
