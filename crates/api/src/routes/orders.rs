//! Order endpoints.
//!
//! Creating an order publishes `ORDER_CREATED`; the saga then runs in the
//! background and the order's status can be followed with `GET /orders/{id}`.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::OrderId;
use domain::{
    Aggregate, CancelOrder, CreateOrder, DomainEventPublisher, Money, Order, OrderService,
    OrderStatus,
};
use order_store::{OrderQuery, OrderStore};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Largest page `GET /orders` returns.
pub const MAX_PAGE_SIZE: usize = 100;

/// Shared application state accessible from all handlers.
pub struct AppState<S: OrderStore, P: DomainEventPublisher> {
    pub orders: OrderService<S, P>,
}

// -- Request types --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub user_id: i64,
    pub product_id: i64,
    pub amount: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOrdersParams {
    pub status: Option<String>,
    pub user_id: Option<i64>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

// -- Response types --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: OrderId,
    pub user_id: i64,
    pub product_id: i64,
    pub price: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id(),
            user_id: order.user_id().value(),
            product_id: order.product_id().value(),
            price: order.price(),
            status: order.status(),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
            version: order.version().as_i64(),
        }
    }
}

// -- Handlers --

/// POST /orders: validate, store, and start the saga.
#[tracing::instrument(skip(state, body))]
pub async fn create<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    body: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError>
where
    S: OrderStore + 'static,
    P: DomainEventPublisher + 'static,
{
    let Json(req) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let cmd = CreateOrder::from_request(req.user_id, req.product_id, req.amount)?;

    let result = state.orders.create_order(cmd).await?;

    Ok((
        StatusCode::CREATED,
        Json(OrderResponse::from(&result.aggregate)),
    ))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: OrderStore + 'static,
    P: DomainEventPublisher + 'static,
{
    let order_id = parse_order_id(&id)?;
    let order = state
        .orders
        .get_order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;

    Ok(Json(OrderResponse::from(&order)))
}

/// GET /orders: filter by `status` and `userId`, page with `limit`/`offset`.
#[tracing::instrument(skip(state, params))]
pub async fn list<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    params: Result<Query<ListOrdersParams>, QueryRejection>,
) -> Result<Json<Vec<OrderResponse>>, ApiError>
where
    S: OrderStore + 'static,
    P: DomainEventPublisher + 'static,
{
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let mut query = OrderQuery::new()
        .limit(params.limit.unwrap_or(MAX_PAGE_SIZE).min(MAX_PAGE_SIZE))
        .offset(params.offset.unwrap_or(0));
    if let Some(status) = params.status {
        let status = status
            .parse::<OrderStatus>()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        query = query.status(status.as_str());
    }
    if let Some(user_id) = params.user_id {
        query = query.user_id(user_id);
    }

    let orders = state.orders.list_orders(query).await?;
    Ok(Json(orders.iter().map(OrderResponse::from).collect()))
}

/// POST /orders/{id}/cancel: user cancellation, 409 once the order is final.
#[tracing::instrument(skip(state))]
pub async fn cancel<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: OrderStore + 'static,
    P: DomainEventPublisher + 'static,
{
    let order_id = parse_order_id(&id)?;
    let result = state.orders.cancel_order(CancelOrder::new(order_id)).await?;

    Ok(Json(OrderResponse::from(&result.aggregate)))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))
}
