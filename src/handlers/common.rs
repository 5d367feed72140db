use crate::errors::ServiceError;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

/// Header carrying the tenant identity, set by the authenticating edge
pub const STORE_ID_HEADER: &str = "x-store-id";

/// Identity of the requesting store.
///
/// Session handling lives outside this service; by the time a request gets
/// here the edge has authenticated it and forwarded the store id in a
/// header. Handlers take this extractor and pass `store_id` down as a plain
/// argument, so services and the pricing engine stay free of ambient
/// request context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreContext {
    pub store_id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for StoreContext
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(STORE_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ServiceError::Unauthorized("missing X-Store-Id header".to_string()))?;

        let store_id = Uuid::parse_str(raw.trim())
            .map_err(|_| ServiceError::Unauthorized(format!("invalid store id: {raw}")))?;

        Ok(Self { store_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_header(value: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/v1/quotes");
        if let Some(value) = value {
            builder = builder.header(STORE_ID_HEADER, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn extracts_a_valid_store_id() {
        let store_id = Uuid::new_v4();
        let mut parts = parts_with_header(Some(&store_id.to_string()));

        let context = StoreContext::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(context.store_id, store_id);
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let mut parts = parts_with_header(None);
        let err = StoreContext::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn malformed_header_is_unauthorized() {
        let mut parts = parts_with_header(Some("not-a-uuid"));
        let err = StoreContext::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }
}
