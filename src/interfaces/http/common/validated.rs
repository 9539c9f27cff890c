//! Validated query extractor for Axum
//!
//! `ValidatedQuery<T>` works like `axum::extract::Query<T>`, but additionally
//! runs `validator::Validate::validate()` on the deserialized value.
//! On validation failure it returns a 422 response with field-level
//! details.

use axum::extract::rejection::QueryRejection;
use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use validator::Validate;

use super::ApiResponse;

/// An extractor that deserializes the query string and validates it.
///
/// ```ignore
/// #[derive(Deserialize, Validate)]
/// struct LotQuery {
///     #[validate(range(min = 1))]
///     selected: Option<u32>,
/// }
///
/// async fn handler(ValidatedQuery(query): ValidatedQuery<LotQuery>) {}
/// ```
pub struct ValidatedQuery<T>(pub T);

/// Error type for `ValidatedQuery` extraction failures.
pub enum ValidatedQueryRejection {
    /// Query string did not deserialize.
    QueryError(QueryRejection),
    /// Validation failed.
    ValidationError(validator::ValidationErrors),
}

impl IntoResponse for ValidatedQueryRejection {
    fn into_response(self) -> Response {
        match self {
            Self::QueryError(rejection) => {
                let body = ApiResponse::<()>::error(format!("Invalid query: {}", rejection));
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            Self::ValidationError(errors) => {
                let field_errors: Vec<String> = errors
                    .field_errors()
                    .iter()
                    .flat_map(|(field, errs)| {
                        errs.iter().map(move |e| {
                            let msg = e
                                .message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| format!("{:?}", e.code));
                            format!("{}: {}", field, msg)
                        })
                    })
                    .collect();

                let message = if field_errors.is_empty() {
                    "Validation failed".to_string()
                } else {
                    field_errors.join("; ")
                };

                let body = ApiResponse::<()>::error(message);
                (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response()
            }
        }
    }
}

impl<S, T> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ValidatedQueryRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(ValidatedQueryRejection::QueryError)?;

        value
            .validate()
            .map_err(ValidatedQueryRejection::ValidationError)?;

        Ok(ValidatedQuery(value))
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use serde::Deserialize;
    use validator::Validate;

    #[derive(Debug, Deserialize, Validate)]
    struct TestQuery {
        #[validate(range(min = 1, max = 100))]
        spot: Option<u32>,
    }

    async fn handler(ValidatedQuery(_q): ValidatedQuery<TestQuery>) -> &'static str {
        "ok"
    }

    async fn send(uri: &str) -> axum::http::Response<Body> {
        use tower::Service;
        let mut svc = Router::new().route("/test", get(handler)).into_service();
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        svc.call(req).await.unwrap()
    }

    #[tokio::test]
    async fn valid_query_returns_ok() {
        assert_eq!(send("/test?spot=5").await.status(), StatusCode::OK);
        assert_eq!(send("/test").await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn malformed_query_returns_400() {
        assert_eq!(send("/test?spot=abc").await.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn out_of_range_returns_422() {
        assert_eq!(
            send("/test?spot=0").await.status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
