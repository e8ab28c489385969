//! Balance lookup against the simulated payment service.

use axum::Json;
use axum::extract::{Path, State};
use domain::Money;
use messaging::{InMemoryMessageBus, PaymentSimulator};
use serde::Serialize;

use crate::error::ApiError;

/// Payment simulator, absent when collaborators are not simulated.
pub type PaymentState = Option<PaymentSimulator<InMemoryMessageBus>>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub user_id: i64,
    pub balance: Money,
}

/// GET /payments/balance/{userId}: 404 for a user the payment service has
/// never seen.
#[tracing::instrument(skip(payment))]
pub async fn balance(
    State(payment): State<PaymentState>,
    Path(user_id): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let user_id: i64 = user_id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid user id: {user_id}")))?;

    let payment = payment
        .ok_or_else(|| ApiError::NotFound("Payment simulator is not running".to_string()))?;
    let balance = payment
        .known_balance(user_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("No balance for user {user_id}")))?;

    Ok(Json(BalanceResponse { user_id, balance }))
}
