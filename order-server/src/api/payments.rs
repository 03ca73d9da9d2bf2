//! Payment endpoints
//!
//! POST /api/payments/webhook must receive the raw body so the gateway
//! signature can be checked before anything is parsed.

use axum::{
    Extension, Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use shared::error::{ApiResponse, AppError};
use shared::order::{ConfirmPaymentRequest, ConfirmPaymentResponse, WebhookAck};

use super::ApiResult;
use crate::auth::Principal;
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "stripe-signature";

/// POST /api/payments/webhook
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    let ack = state.engine.handle_webhook(&body, signature).await?;
    Ok(Json(ack))
}

/// POST /api/payments/confirm
pub async fn confirm_payment(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<ConfirmPaymentRequest>,
) -> ApiResult<ConfirmPaymentResponse> {
    let resp = state.engine.confirm_payment(&principal, req).await?;
    Ok(ApiResponse::success(resp))
}
