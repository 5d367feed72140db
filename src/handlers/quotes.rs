use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::{quote, quote_item};
use crate::errors::ServiceError;
use crate::handlers::common::StoreContext;
use crate::pricing::{CostBreakdown, QuoteCalculationRequest};
use crate::services::quotes::{QuoteWithItems, UpdateQuoteRequest};
use crate::{ApiResponse, ApiResult, AppState, ListQuery, PaginatedResponse};

/// Money rounds to display precision here and nowhere earlier; stored and
/// computed values keep full precision.
fn round_money(value: Decimal) -> Decimal {
    value.round_dp(2)
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuoteItemResponse {
    pub id: Uuid,
    pub material_id: Uuid,
    pub name: String,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub line_total: Decimal,
    pub unit_of_measure: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuoteResponse {
    pub id: Uuid,
    pub quote_number: String,
    pub client_id: Option<Uuid>,
    pub service_name: String,
    pub description: Option<String>,
    pub production_hours: Decimal,
    pub product_quantity: i32,
    pub material_cost: Decimal,
    pub labor_cost: Decimal,
    pub indirect_cost: Decimal,
    pub total_production_cost: Decimal,
    pub margin_percent: Decimal,
    pub margin_value: Decimal,
    pub subtotal_with_margin: Decimal,
    pub tax_percent: Decimal,
    pub tax_value: Decimal,
    pub final_price: Decimal,
    pub items: Vec<QuoteItemResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// List-view projection without line items
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuoteSummaryResponse {
    pub id: Uuid,
    pub quote_number: String,
    pub client_id: Option<Uuid>,
    pub service_name: String,
    pub total_production_cost: Decimal,
    pub final_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

fn map_item(model: &quote_item::Model) -> QuoteItemResponse {
    QuoteItemResponse {
        id: model.id,
        material_id: model.material_id,
        name: model.name.clone(),
        quantity: model.quantity,
        unit_cost: round_money(model.unit_cost),
        line_total: round_money(model.line_total),
        unit_of_measure: model.unit_of_measure.clone(),
    }
}

fn map_quote(result: &QuoteWithItems) -> QuoteResponse {
    let model = &result.quote;
    QuoteResponse {
        id: model.id,
        quote_number: model.quote_number.clone(),
        client_id: model.client_id,
        service_name: model.service_name.clone(),
        description: model.description.clone(),
        production_hours: model.production_hours,
        product_quantity: model.product_quantity,
        material_cost: round_money(model.material_cost),
        labor_cost: round_money(model.labor_cost),
        indirect_cost: round_money(model.indirect_cost),
        total_production_cost: round_money(model.total_production_cost),
        margin_percent: model.margin_percent,
        margin_value: round_money(model.margin_value),
        subtotal_with_margin: round_money(model.subtotal_with_margin),
        tax_percent: model.tax_percent,
        tax_value: round_money(model.tax_value),
        final_price: round_money(model.final_price),
        items: result.items.iter().map(map_item).collect(),
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

fn map_summary(model: &quote::Model) -> QuoteSummaryResponse {
    QuoteSummaryResponse {
        id: model.id,
        quote_number: model.quote_number.clone(),
        client_id: model.client_id,
        service_name: model.service_name.clone(),
        total_production_cost: round_money(model.total_production_cost),
        final_price: round_money(model.final_price),
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

/// Run the pricing engine and return the itemized breakdown without
/// persisting anything
#[utoipa::path(
    post,
    path = "/api/v1/quotes/calculate",
    request_body = QuoteCalculationRequest,
    responses(
        (status = 200, description = "Computed cost breakdown", body = ApiResponse<CostBreakdown>),
        (status = 400, description = "Malformed request or unknown reference", body = crate::errors::ErrorResponse),
        (status = 422, description = "Store cost settings incomplete", body = crate::errors::ErrorResponse)
    ),
    tag = "Quotes"
)]
pub async fn calculate_quote(
    State(state): State<AppState>,
    store: StoreContext,
    Json(request): Json<QuoteCalculationRequest>,
) -> ApiResult<CostBreakdown> {
    let breakdown = state
        .services
        .quotes
        .calculate(store.store_id, &request)
        .await?;
    Ok(Json(ApiResponse::success(breakdown.rounded())))
}

/// Price the request and persist it as a numbered quote with line items
#[utoipa::path(
    post,
    path = "/api/v1/quotes",
    request_body = QuoteCalculationRequest,
    responses(
        (status = 201, description = "Quote created", body = ApiResponse<QuoteResponse>),
        (status = 400, description = "Malformed request or unknown reference", body = crate::errors::ErrorResponse),
        (status = 409, description = "Quote numbering exhausted its retries", body = crate::errors::ErrorResponse),
        (status = 422, description = "Store cost settings incomplete", body = crate::errors::ErrorResponse)
    ),
    tag = "Quotes"
)]
pub async fn create_quote(
    State(state): State<AppState>,
    store: StoreContext,
    Json(request): Json<QuoteCalculationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<QuoteResponse>>), ServiceError> {
    let created = state
        .services
        .quotes
        .create_quote(store.store_id, request)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(map_quote(&created))),
    ))
}

/// Paginated, store-scoped quote listing
#[utoipa::path(
    get,
    path = "/api/v1/quotes",
    responses(
        (status = 200, description = "Page of quotes", body = ApiResponse<PaginatedResponse<QuoteSummaryResponse>>)
    ),
    tag = "Quotes"
)]
pub async fn list_quotes(
    State(state): State<AppState>,
    store: StoreContext,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<QuoteSummaryResponse>> {
    let page = query.page.max(1);
    let limit = query.limit.clamp(1, 100);

    let listing = state
        .services
        .quotes
        .list_quotes(store.store_id, page, limit, query.search.as_deref())
        .await?;

    let items: Vec<QuoteSummaryResponse> = listing.quotes.iter().map(map_summary).collect();
    let total_pages = listing.total.div_ceil(limit);

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items,
        total: listing.total,
        page: listing.page,
        limit: listing.per_page,
        total_pages,
    })))
}

/// Fetch one quote with its line items
#[utoipa::path(
    get,
    path = "/api/v1/quotes/{id}",
    params(("id" = Uuid, Path, description = "Quote id")),
    responses(
        (status = 200, description = "Quote with items", body = ApiResponse<QuoteResponse>),
        (status = 404, description = "Quote not found for this store", body = crate::errors::ErrorResponse)
    ),
    tag = "Quotes"
)]
pub async fn get_quote(
    State(state): State<AppState>,
    store: StoreContext,
    Path(id): Path<Uuid>,
) -> ApiResult<QuoteResponse> {
    let found = state.services.quotes.get_quote(store.store_id, id).await?;
    Ok(Json(ApiResponse::success(map_quote(&found))))
}

/// Update a quote. Cost-affecting fields recompute the breakdown and replace
/// every line item; otherwise only metadata is patched.
#[utoipa::path(
    put,
    path = "/api/v1/quotes/{id}",
    params(("id" = Uuid, Path, description = "Quote id")),
    request_body = UpdateQuoteRequest,
    responses(
        (status = 200, description = "Updated quote", body = ApiResponse<QuoteResponse>),
        (status = 400, description = "Malformed request or unknown reference", body = crate::errors::ErrorResponse),
        (status = 404, description = "Quote not found for this store", body = crate::errors::ErrorResponse),
        (status = 422, description = "Store cost settings incomplete", body = crate::errors::ErrorResponse)
    ),
    tag = "Quotes"
)]
pub async fn update_quote(
    State(state): State<AppState>,
    store: StoreContext,
    Path(id): Path<Uuid>,
    Json(update): Json<UpdateQuoteRequest>,
) -> ApiResult<QuoteResponse> {
    let updated = state
        .services
        .quotes
        .update_quote(store.store_id, id, update)
        .await?;
    Ok(Json(ApiResponse::success(map_quote(&updated))))
}

/// Remove a quote and its line items
#[utoipa::path(
    delete,
    path = "/api/v1/quotes/{id}",
    params(("id" = Uuid, Path, description = "Quote id")),
    responses(
        (status = 204, description = "Quote deleted"),
        (status = 404, description = "Quote not found for this store", body = crate::errors::ErrorResponse)
    ),
    tag = "Quotes"
)]
pub async fn delete_quote(
    State(state): State<AppState>,
    store: StoreContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state
        .services
        .quotes
        .delete_quote(store.store_id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn quote_routes() -> Router<AppState> {
    Router::new()
        .route("/calculate", post(calculate_quote))
        .route("/", post(create_quote).get(list_quotes))
        .route(
            "/:id",
            get(get_quote).put(update_quote).delete(delete_quote),
        )
}
