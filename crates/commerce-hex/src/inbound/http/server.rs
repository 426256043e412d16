use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    serve, Json, Router,
};
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use super::extract::{AuthUser, JsonBody};
use crate::application::order_service::OrderQuery;
use crate::application::CommerceServices;
use crate::errors::AppError;
use commerce_types::domain::checkout::Checkout;
use commerce_types::domain::discount::{
    ApplyDiscountRequest, DiscountCode, DiscountPatch, DiscountQuote, NewDiscount,
};
use commerce_types::domain::order::{
    CancelRequest, ListResult, Order, OrderView, PaymentEvent, StatusUpdate,
};
use commerce_types::domain::order_status::OrderStatus;
use commerce_types::domain::product::{NewProduct, Product};
use commerce_types::ports::CommerceRepository;

#[derive(Clone)]
pub struct HttpServerConfig {
    pub port: String,
}

#[derive(Clone)]
pub struct HttpServer<R: CommerceRepository> {
    pub services: CommerceServices<R>,
    pub config: HttpServerConfig,
}

impl<R: CommerceRepository> HttpServer<R> {
    pub fn new(services: CommerceServices<R>, config: HttpServerConfig) -> Self {
        Self { services, config }
    }

    pub fn router(&self) -> Router {
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &axum::extract::Request<_>| {
                let uri = request.uri().to_string();
                let request_id = Uuid::new_v4();
                tracing::info_span!(
                    "http_request",
                    %request_id,
                    method = %request.method(),
                    uri
                )
            })
            .on_request(
                |request: &axum::extract::Request<_>, span: &tracing::Span| {
                    tracing::info!(
                        parent: span,
                        method = %request.method(),
                        uri = %request.uri(),
                        "request"
                    );
                },
            )
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &tracing::Span| {
                    tracing::info!(
                        parent: span,
                        status = %response.status(),
                        latency_ms = %latency.as_millis(),
                        "response"
                    );
                },
            );

        Router::new()
            .route("/health", get(health))
            .route("/order-statuses", get(list_statuses::<R>))
            .route(
                "/discounts",
                post(create_discount::<R>).get(list_discounts::<R>),
            )
            .route("/discounts/active", get(active_discounts::<R>))
            .route("/discounts/apply", post(apply_discount::<R>))
            .route(
                "/discounts/{id}",
                get(get_discount::<R>)
                    .patch(update_discount::<R>)
                    .delete(deactivate_discount::<R>),
            )
            .route(
                "/products",
                post(create_product::<R>).get(list_products::<R>),
            )
            .route("/products/{id}", get(get_product::<R>))
            .route("/orders", post(create_order::<R>).get(list_orders::<R>))
            .route("/orders/{id}", get(get_order::<R>))
            .route("/orders/{id}/status", put(update_status::<R>))
            .route("/orders/{id}/cancel", post(cancel_order::<R>))
            .route("/orders/{id}/payment", post(record_payment::<R>))
            .layer(trace_layer)
            .with_state(self.services.clone())
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let app = self.router();
        let addr: SocketAddr = format!("0.0.0.0:{}", self.config.port).parse()?;
        tracing::info!("starting server on {}", addr);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        serve(listener, app.into_make_service()).await?;
        Ok(())
    }
}

type Services<R> = State<CommerceServices<R>>;

fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|e| AppError::BadRequest(format!("invalid id `{raw}`: {e}")))
}

async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn list_statuses<R: CommerceRepository>(
    State(svc): Services<R>,
) -> Result<Json<Vec<OrderStatus>>, AppError> {
    Ok(Json(svc.statuses.list_statuses().await?))
}

async fn create_discount<R: CommerceRepository>(
    State(svc): Services<R>,
    AuthUser(principal): AuthUser,
    JsonBody(payload): JsonBody<NewDiscount>,
) -> Result<(StatusCode, Json<DiscountCode>), AppError> {
    let created = svc.discounts.create_discount(&principal, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_discounts<R: CommerceRepository>(
    State(svc): Services<R>,
    AuthUser(principal): AuthUser,
) -> Result<Json<Vec<DiscountCode>>, AppError> {
    Ok(Json(svc.discounts.list_discounts(&principal).await?))
}

async fn active_discounts<R: CommerceRepository>(
    State(svc): Services<R>,
) -> Result<Json<Vec<DiscountCode>>, AppError> {
    Ok(Json(svc.discounts.list_active().await?))
}

async fn apply_discount<R: CommerceRepository>(
    State(svc): Services<R>,
    JsonBody(payload): JsonBody<ApplyDiscountRequest>,
) -> Result<Json<DiscountQuote>, AppError> {
    let quote = svc
        .discounts
        .apply_discount(&payload.code, payload.order_total)
        .await?;
    Ok(Json(quote))
}

async fn get_discount<R: CommerceRepository>(
    State(svc): Services<R>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<DiscountCode>, AppError> {
    let id = parse_id(&id)?;
    Ok(Json(svc.discounts.get_discount(&principal, id).await?))
}

async fn update_discount<R: CommerceRepository>(
    State(svc): Services<R>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<DiscountPatch>,
) -> Result<Json<DiscountCode>, AppError> {
    let id = parse_id(&id)?;
    let updated = svc.discounts.update_discount(&principal, id, patch).await?;
    Ok(Json(updated))
}

async fn deactivate_discount<R: CommerceRepository>(
    State(svc): Services<R>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<DiscountCode>, AppError> {
    let id = parse_id(&id)?;
    let deactivated = svc.discounts.deactivate_discount(&principal, id).await?;
    Ok(Json(deactivated))
}

async fn create_product<R: CommerceRepository>(
    State(svc): Services<R>,
    AuthUser(principal): AuthUser,
    JsonBody(payload): JsonBody<NewProduct>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let created = svc.catalog.create_product(&principal, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_products<R: CommerceRepository>(
    State(svc): Services<R>,
) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(svc.catalog.list_products().await?))
}

async fn get_product<R: CommerceRepository>(
    State(svc): Services<R>,
    Path(id): Path<String>,
) -> Result<Json<Product>, AppError> {
    let id = parse_id(&id)?;
    Ok(Json(svc.catalog.get_product(id).await?))
}

async fn create_order<R: CommerceRepository>(
    State(svc): Services<R>,
    AuthUser(principal): AuthUser,
    JsonBody(checkout): JsonBody<Checkout>,
) -> Result<(StatusCode, Json<OrderView>), AppError> {
    let view = svc.orders.create_order(&principal, checkout).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn list_orders<R: CommerceRepository>(
    State(svc): Services<R>,
    AuthUser(principal): AuthUser,
    query: Result<Query<OrderQuery>, QueryRejection>,
) -> Result<Json<ListResult<Order>>, AppError> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    Ok(Json(svc.orders.list_orders(&principal, query).await?))
}

async fn get_order<R: CommerceRepository>(
    State(svc): Services<R>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OrderView>, AppError> {
    let id = parse_id(&id)?;
    Ok(Json(svc.orders.get_order(&principal, id).await?))
}

async fn update_status<R: CommerceRepository>(
    State(svc): Services<R>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
    JsonBody(update): JsonBody<StatusUpdate>,
) -> Result<Json<OrderView>, AppError> {
    let id = parse_id(&id)?;
    let view = svc.orders.update_status(&principal, id, update).await?;
    Ok(Json(view))
}

async fn cancel_order<R: CommerceRepository>(
    State(svc): Services<R>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<OrderView>, AppError> {
    let id = parse_id(&id)?;
    // The reason is optional, so is the body.
    let request: CancelRequest = if body.is_empty() {
        CancelRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::BadRequest(e.to_string()))?
    };
    let view = svc.orders.cancel_order(&principal, id, request).await?;
    Ok(Json(view))
}

async fn record_payment<R: CommerceRepository>(
    State(svc): Services<R>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
    JsonBody(event): JsonBody<PaymentEvent>,
) -> Result<Json<OrderView>, AppError> {
    let id = parse_id(&id)?;
    let view = svc.orders.record_payment(&principal, id, event).await?;
    Ok(Json(view))
}
