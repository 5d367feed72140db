use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Comunikapp API",
        version = "1.0.0",
        description = r#"
# Comunikapp Quote & Pricing API

Backend for visual-communication print shops: material catalogs, machine and
labor cost registries, and a quote builder backed by an auditable pricing
engine.

## Tenancy

Every request is scoped to one store. The authenticating edge forwards the
store identity in the `X-Store-Id` header; requests without it are rejected.
Data of other stores is indistinguishable from data that does not exist.

## Pricing

`POST /quotes/calculate` runs the cost-allocation chain (materials, labor,
machine, allocated overhead, margin, taxes) without persisting anything.
`POST /quotes` runs the same chain and stores the result as a numbered quote
with its line items. Money fields in responses are rounded to 2 decimal
places; stored values keep full precision.

## Error Handling

Errors use a consistent response format with appropriate HTTP status codes:

```json
{
  "error": "Unprocessable Entity",
  "message": "Invalid configuration: labor cost per hour is not set",
  "timestamp": "2026-01-01T00:00:00Z"
}
```

`422` means the store has not finished its cost settings and cannot quote
until they are completed.

## Pagination

List endpoints support `page`, `limit` and `search` query parameters.
        "#,
        contact(
            name = "Comunikapp Support",
            email = "suporte@comunikapp.com.br"
        ),
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "https://api.comunikapp.com.br/v1", description = "Production server"),
        (url = "http://localhost:8080/api/v1", description = "Local development")
    ),
    tags(
        (name = "Quotes", description = "Quote calculation and management endpoints"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        crate::handlers::quotes::calculate_quote,
        crate::handlers::quotes::create_quote,
        crate::handlers::quotes::list_quotes,
        crate::handlers::quotes::get_quote,
        crate::handlers::quotes::update_quote,
        crate::handlers::quotes::delete_quote,
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,
            crate::PaginatedResponse<serde_json::Value>,
            crate::ListQuery,

            // Pricing engine types
            crate::pricing::QuoteCalculationRequest,
            crate::pricing::MaterialLineInput,
            crate::pricing::MachineLineInput,
            crate::pricing::LaborLineInput,
            crate::pricing::CostBreakdown,
            crate::pricing::MaterialLineBreakdown,
            crate::pricing::MachineLineBreakdown,
            crate::pricing::LaborLineBreakdown,
            crate::pricing::AppliedRates,

            // Quote types
            crate::services::quotes::UpdateQuoteRequest,
            crate::handlers::quotes::QuoteResponse,
            crate::handlers::quotes::QuoteItemResponse,
            crate::handlers::quotes::QuoteSummaryResponse,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_includes_quote_paths() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string(&openapi).unwrap();
        assert!(json.contains("Comunikapp API"));
        assert!(json.contains("/api/v1/quotes/calculate"));
        assert!(json.contains("/api/v1/quotes/{id}"));
    }
}
