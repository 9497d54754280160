//! Response envelope, error mapping, extractors and list pagination.
//!
//! Every response body is a JSON object carrying `status` and `message`
//! next to the endpoint's own fields. Errors add a `details` list of
//! rejection reasons.

use std::collections::HashMap;

use axum::async_trait;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Json, Query, Request};
use axum::http::request::Parts;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::error;

use ratewatch_common::{ErrorKind, RatewatchError, RejectionReason};

use crate::config::PaginationConfig;

/// A successful response: status plus endpoint fields.
#[derive(Debug)]
pub struct ApiResponse {
    status: StatusCode,
    fields: Map<String, Value>,
}

impl ApiResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            fields: Map::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Add one field.
    pub fn with(mut self, key: &str, value: impl Serialize) -> Result<Self, ApiError> {
        self.fields.insert(key.to_string(), to_json(&value)?);
        Ok(self)
    }

    /// Merge every field of a serializable struct.
    pub fn with_fields(mut self, value: &impl Serialize) -> Result<Self, ApiError> {
        match to_json(value)? {
            Value::Object(fields) => {
                self.fields.extend(fields);
                Ok(self)
            }
            other => Err(RatewatchError::InternalError(format!(
                "expected an object, got {}",
                other
            ))
            .into()),
        }
    }

    /// Add a list under `key`, sliced to one page when `page` is given.
    pub fn with_list<T: Serialize>(
        self,
        key: &str,
        items: Vec<T>,
        page: Option<PageRequest>,
    ) -> Result<Self, ApiError> {
        let Some(page) = page else {
            return self.with(key, items);
        };

        let page = Page::paginate(items, page)?;
        self.with("count", page.count)?
            .with("page", page.page)?
            .with("page_size", page.page_size)?
            .with("next", page.next)?
            .with("previous", page.previous)?
            .with(key, page.items)
    }
}

fn to_json(value: &impl Serialize) -> Result<Value, ApiError> {
    serde_json::to_value(value)
        .map_err(|e| RatewatchError::InternalError(format!("serialization failed: {}", e)).into())
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let mut body = Map::new();
        body.insert("status".to_string(), Value::from(self.status.as_u16()));
        body.insert(
            "message".to_string(),
            Value::from(self.status.canonical_reason().unwrap_or("Unknown")),
        );
        body.extend(self.fields);

        (self.status, Json(Value::Object(body))).into_response()
    }
}

/// Every way a request can fail.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] RatewatchError),

    /// Body or query string could not be read.
    #[error("Malformed request")]
    BadRequest(Vec<RejectionReason>),

    #[error("Method {0} not allowed")]
    MethodNotAllowed(Method),

    #[error("No such route")]
    RouteNotFound,

    #[error("Store unavailable")]
    Unavailable,
}

impl ApiError {
    /// Single-reason bad request.
    pub fn bad_request(reason: RejectionReason) -> Self {
        ApiError::BadRequest(vec![reason])
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Service(err) => match err.kind() {
                ErrorKind::Invalid | ErrorKind::Conflict => StatusCode::BAD_REQUEST,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::RouteNotFound => StatusCode::NOT_FOUND,
            ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn details(&self) -> Vec<RejectionReason> {
        match self {
            ApiError::Service(err) => err.rejection_reasons(),
            ApiError::BadRequest(reasons) => reasons.clone(),
            ApiError::MethodNotAllowed(method) => vec![RejectionReason::new(
                "METHOD_NOT_ALLOWED",
                format!("Method \"{}\" not allowed.", method),
            )],
            ApiError::RouteNotFound => vec![RejectionReason::new("NOT_FOUND", "Not found.")],
            ApiError::Unavailable => Vec::new(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        let details = serde_json::to_value(self.details()).unwrap_or_default();
        let mut fields = Map::new();
        fields.insert("details".to_string(), details);

        ApiResponse { status, fields }.into_response()
    }
}

/// Query string parameters, rejected through the envelope.
#[derive(Debug, Clone, Default)]
pub struct Params(pub HashMap<String, String>);

impl Params {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Params
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(params) = Query::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(|rejection: QueryRejection| {
                ApiError::bad_request(RejectionReason::new("PARSE_ERROR", rejection.body_text()))
            })?;
        Ok(Self(params))
    }
}

/// JSON request body, rejected through the envelope.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| {
                ApiError::bad_request(RejectionReason::new("PARSE_ERROR", rejection.body_text()))
            })?;
        Ok(Self(value))
    }
}

/// A requested page of a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: usize,
    pub page_size: usize,
}

impl PageRequest {
    /// Read `page` and `page_size`.
    ///
    /// Returns `None` when neither is given and no default size is
    /// configured, meaning the whole list is returned.
    pub fn from_params(params: &Params, config: &PaginationConfig) -> Result<Option<Self>, ApiError> {
        let page = positive_param(params, "page")?;
        let page_size = positive_param(params, "page_size")?;

        let size = match (page, page_size, config.default_page_size) {
            (None, None, None) => return Ok(None),
            (_, Some(size), _) => size,
            (_, None, Some(default)) => default,
            (Some(_), None, None) => config.max_page_size,
        };

        Ok(Some(Self {
            page: page.unwrap_or(1),
            page_size: size.min(config.max_page_size),
        }))
    }
}

fn positive_param(params: &Params, field: &str) -> Result<Option<usize>, ApiError> {
    let Some(raw) = params.get(field) else {
        return Ok(None);
    };
    match raw.trim().parse::<usize>() {
        Ok(value) if value > 0 => Ok(Some(value)),
        _ => Err(ApiError::bad_request(RejectionReason::with_field(
            "INVALID_INTEGER",
            "A positive integer is required.",
            field,
        ))),
    }
}

/// One page of a list with navigation links.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub count: usize,
    pub page: usize,
    pub page_size: usize,
    pub next: Option<usize>,
    pub previous: Option<usize>,
}

impl<T> Page<T> {
    /// Slice `items` to the requested page.
    ///
    /// An empty list still has a first page. Any page past the last is
    /// `NotFound`.
    pub fn paginate(items: Vec<T>, request: PageRequest) -> Result<Self, ApiError> {
        let count = items.len();
        let pages = count.div_ceil(request.page_size).max(1);
        if request.page > pages {
            return Err(RatewatchError::NotFound("Invalid page.".to_string()).into());
        }

        let start = (request.page - 1) * request.page_size;
        let items = items
            .into_iter()
            .skip(start)
            .take(request.page_size)
            .collect();

        Ok(Self {
            items,
            count,
            page: request.page,
            page_size: request.page_size,
            next: (request.page < pages).then_some(request.page + 1),
            previous: (request.page > 1).then(|| request.page - 1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Params {
        Params(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_error_status_mapping() {
        let conflict = ApiError::from(RatewatchError::Conflict("USD/EUR".into()));
        assert_eq!(conflict.status(), StatusCode::BAD_REQUEST);

        let missing = ApiError::from(RatewatchError::NotFound("USD/EUR".into()));
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let internal = ApiError::from(RatewatchError::DatabaseError("disk full".into()));
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(internal.details().is_empty());

        assert_eq!(
            ApiError::MethodNotAllowed(Method::PUT).status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
    }

    #[test]
    fn test_page_request_defaults() {
        let config = PaginationConfig::default();

        assert_eq!(PageRequest::from_params(&params(&[]), &config).unwrap(), None);

        let request = PageRequest::from_params(&params(&[("page_size", "5000")]), &config)
            .unwrap()
            .unwrap();
        assert_eq!(request, PageRequest { page: 1, page_size: 1000 });

        let configured = PaginationConfig {
            default_page_size: Some(10),
            ..PaginationConfig::default()
        };
        let request = PageRequest::from_params(&params(&[("page", "3")]), &configured)
            .unwrap()
            .unwrap();
        assert_eq!(request, PageRequest { page: 3, page_size: 10 });
    }

    #[test]
    fn test_page_request_rejects_bad_numbers() {
        let config = PaginationConfig::default();
        for bad in ["0", "-1", "two"] {
            let result = PageRequest::from_params(&params(&[("page", bad)]), &config);
            assert!(matches!(result, Err(ApiError::BadRequest(_))), "{bad}");
        }
    }

    #[test]
    fn test_paginate() {
        let request = PageRequest { page: 2, page_size: 2 };
        let page = Page::paginate(vec![1, 2, 3, 4, 5], request).unwrap();

        assert_eq!(page.items, vec![3, 4]);
        assert_eq!(page.count, 5);
        assert_eq!(page.next, Some(3));
        assert_eq!(page.previous, Some(1));

        let empty = Page::paginate(Vec::<i32>::new(), PageRequest { page: 1, page_size: 2 }).unwrap();
        assert!(empty.items.is_empty());
        assert_eq!(empty.next, None);

        let past_end = Page::paginate(vec![1], PageRequest { page: 2, page_size: 2 });
        assert!(matches!(
            past_end,
            Err(ApiError::Service(RatewatchError::NotFound(_)))
        ));
    }
}
