//! Request handling for the gateway endpoint
//!
//! Every request, whatever its path, goes through the same checks:
//! origin, rate accounting, method, token, body size, validation and
//! finally dispatch to the message sender.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap, Method};
use axum::response::{IntoResponse, Json, Response};
use axum::Router;
use futures::StreamExt;
use relay_protocol::{
    ForwardRequest, ForwardResponse, SendKind, API_TOKEN_HEADER, MAX_BODY_BYTES,
};

use crate::error::ApiError;
use crate::rate_limit::RateLimiter;
use crate::security::{self, SecurityEventKind, SecurityLog};
use crate::sender::MessageSender;
use crate::status::{self, ProcessStats};
use crate::validate::validate;

/// Shared state for the gateway handler
#[derive(Clone)]
pub struct AppState {
    pub api_token: Arc<str>,
    pub sender: Arc<dyn MessageSender>,
    pub limiter: Arc<RateLimiter>,
    pub security: Arc<SecurityLog>,
    pub stats: Arc<ProcessStats>,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(
        api_token: impl Into<Arc<str>>,
        sender: Arc<dyn MessageSender>,
        limiter: RateLimiter,
        security: SecurityLog,
    ) -> Self {
        Self {
            api_token: api_token.into(),
            sender,
            limiter: Arc::new(limiter),
            security: Arc::new(security),
            stats: Arc::new(ProcessStats::new()),
            max_body_bytes: MAX_BODY_BYTES,
        }
    }
}

/// Build the gateway router
///
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>()`;
/// requests without a known peer address are refused.
pub fn build_router(state: AppState) -> Router {
    security::harden(Router::new().fallback(handle).with_state(state))
}

async fn handle(State(state): State<AppState>, request: Request) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    match process(&state, peer, request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn process(
    state: &AppState,
    peer: Option<IpAddr>,
    request: Request,
) -> Result<Response, ApiError> {
    let ip = match peer {
        Some(ip) if security::is_loopback(ip) => ip,
        other => {
            state
                .security
                .record(
                    SecurityEventKind::RemoteAccessBlocked,
                    other,
                    "Access attempt from a non-local address",
                )
                .await;
            return Err(ApiError::Forbidden);
        }
    };

    if !state.limiter.check(ip) {
        state
            .security
            .record(
                SecurityEventKind::RateLimited,
                Some(ip),
                "Request limit per minute exceeded",
            )
            .await;
        return Err(ApiError::TooManyRequests);
    }

    let method = request.method().clone();
    match method {
        Method::GET => {
            authorize(state, ip, request.headers(), SecurityEventKind::InvalidStatusToken)
                .await?;
            Ok(Json(state.stats.snapshot(state.sender.is_ready())).into_response())
        }
        Method::POST => {
            authorize(state, ip, request.headers(), SecurityEventKind::InvalidToken).await?;
            let body = read_body(state, ip, request).await?;
            forward(state, ip, &body).await
        }
        method => {
            state
                .security
                .record(
                    SecurityEventKind::MethodNotAllowed,
                    Some(ip),
                    &format!("Method: {}", method),
                )
                .await;
            Err(ApiError::MethodNotAllowed)
        }
    }
}

async fn authorize(
    state: &AppState,
    ip: IpAddr,
    headers: &HeaderMap,
    kind: SecurityEventKind,
) -> Result<(), ApiError> {
    let presented = headers
        .get(API_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());

    // an unset token never authenticates anything
    if let Some(presented) = presented {
        if !state.api_token.is_empty() && presented.as_bytes() == state.api_token.as_bytes() {
            return Ok(());
        }
    }
    state
        .security
        .record(kind, Some(ip), "Missing or invalid API token")
        .await;
    Err(ApiError::Unauthorized)
}

/// Read the body, giving up as soon as it exceeds the size cap
async fn read_body(
    state: &AppState,
    ip: IpAddr,
    request: Request,
) -> Result<Vec<u8>, ApiError> {
    let limit = state.max_body_bytes;

    let declared = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit) {
        return Err(too_large(state, ip).await);
    }

    let mut body = Vec::new();
    let mut stream = request.into_body().into_data_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            tracing::debug!("Failed to read request body: {}", e);
            ApiError::BadRequest("Failed to read request body".to_string())
        })?;
        if body.len() + chunk.len() > limit {
            return Err(too_large(state, ip).await);
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

async fn too_large(state: &AppState, ip: IpAddr) -> ApiError {
    state
        .security
        .record(
            SecurityEventKind::PayloadTooLarge,
            Some(ip),
            "Request body too large",
        )
        .await;
    ApiError::PayloadTooLarge
}

async fn forward(state: &AppState, ip: IpAddr, body: &[u8]) -> Result<Response, ApiError> {
    tracing::debug!("Forward request received from {}", ip);

    let result = match validate(body) {
        Ok(request) => dispatch(state.sender.as_ref(), &request).await,
        Err(message) => Err(message),
    };

    match result {
        Ok(()) => Ok(Json(ForwardResponse::sent(
            "Message sent successfully",
            status::timestamp(),
        ))
        .into_response()),
        Err(message) => {
            tracing::error!("Failed to process request: {}", message);
            state
                .security
                .record(
                    SecurityEventKind::ProcessingError,
                    Some(ip),
                    &format!("Error: {}", message),
                )
                .await;
            Err(ApiError::BadRequest(message))
        }
    }
}

async fn dispatch(sender: &dyn MessageSender, request: &ForwardRequest) -> Result<(), String> {
    if !sender.is_ready() {
        return Err("Messaging client is not ready".to_string());
    }

    let sent = match (request.kind, &request.image_path) {
        (SendKind::Checkpoint, Some(path)) => {
            sender
                .send_media(&request.group_id, path, &request.message)
                .await
        }
        _ => sender.send_text(&request.group_id, &request.message).await,
    };
    sent.map_err(|e| ApiError::from(e).message().to_string())
}
