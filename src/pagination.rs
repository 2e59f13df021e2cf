use axum::{
    extract::FromRequestParts,
    http::{header::HOST, request::Parts, HeaderMap, StatusCode, Uri},
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use thiserror::Error;

use crate::errors::{impl_into_response, AppError, ErrorCategory, ErrorSeverity};
use crate::query::{clamp_per_page, QueryHelper};

const FORWARDED_PROTO: &str = "x-forwarded-proto";

#[derive(Error, Debug)]
pub enum PaginationError {
    #[error("request has no host to build page urls from")]
    MissingHost,

    #[error("request host header is not valid text")]
    InvalidHost,
}

impl AppError for PaginationError {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    fn user_message(&self) -> String {
        "A valid Host header is required".to_string()
    }

    fn error_code(&self) -> &'static str {
        match self {
            PaginationError::MissingHost => "PAGINATION_MISSING_HOST",
            PaginationError::InvalidHost => "PAGINATION_INVALID_HOST",
        }
    }

    fn error_category(&self) -> ErrorCategory {
        ErrorCategory::Request
    }

    fn error_severity(&self) -> ErrorSeverity {
        ErrorSeverity::Minor
    }
}

impl_into_response!(PaginationError);

/// The parts of an incoming request page urls are rebuilt from.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    headers: HeaderMap,
    uri: Uri,
    secure: bool,
}

impl RequestInfo {
    pub fn new(headers: HeaderMap, uri: Uri, secure: bool) -> Self {
        Self { headers, uri, secure }
    }

    /// Treats the request as encrypted when the uri says `https` or a proxy
    /// forwarded it with `X-Forwarded-Proto: https`.
    pub fn from_parts(parts: &Parts) -> Self {
        let forwarded_https = parts
            .headers
            .get(FORWARDED_PROTO)
            .and_then(|value| value.to_str().ok())
            .map(|proto| proto.trim().eq_ignore_ascii_case("https"))
            .unwrap_or(false);
        let secure = parts.uri.scheme_str() == Some("https") || forwarded_https;

        Self::new(parts.headers.clone(), parts.uri.clone(), secure)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn scheme(&self) -> &'static str {
        if self.secure {
            "https"
        } else {
            "http"
        }
    }

    pub fn host(&self) -> Result<&str, PaginationError> {
        match self.headers.get(HOST) {
            Some(value) => value.to_str().map_err(|_| PaginationError::InvalidHost),
            None => self
                .uri
                .authority()
                .map(|authority| authority.as_str())
                .ok_or(PaginationError::MissingHost),
        }
    }

    /// `scheme://host/path?query` exactly as requested.
    pub fn base_url(&self) -> Result<String, PaginationError> {
        let mut url = format!("{}://{}{}", self.scheme(), self.host()?, self.uri.path());
        if let Some(query) = self.uri.query() {
            url.push('?');
            url.push_str(query);
        }
        Ok(url)
    }

    /// The request url with only its `page` pair changed, appended when missing.
    pub fn url_with_page(&self, page: u64) -> Result<String, PaginationError> {
        let page = page.to_string();
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        let mut replaced = false;

        let query = self.uri.query().unwrap_or_default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if key == "page" {
                if !replaced {
                    serializer.append_pair("page", &page);
                    replaced = true;
                }
            } else {
                serializer.append_pair(&key, &value);
            }
        }
        if !replaced {
            serializer.append_pair("page", &page);
        }

        Ok(format!(
            "{}://{}{}?{}",
            self.scheme(),
            self.host()?,
            self.uri.path(),
            serializer.finish()
        ))
    }
}

impl<S> FromRequestParts<S> for RequestInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RequestInfo::from_parts(parts))
    }
}

/// Page navigation block sent next to a page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub total: u64,
    pub current_page: u64,
    pub last_page: u64,
    pub from: u64,
    pub to: u64,
    pub next_page_url: String,
    pub prev_page_url: String,
}

/// Build the navigation block for `count` total results.
///
/// `from` is `current_page * per_page + 1`, one page ahead of the conventional
/// 1-based start; clients rely on this value as is.
pub fn compose_pagination(
    helper: &QueryHelper,
    request: &RequestInfo,
    count: u64,
) -> Result<Pagination, PaginationError> {
    let per_page = clamp_per_page(helper.per_page());
    let current_page = helper.page();
    let last_page = count.div_ceil(per_page);

    let next_page_url = match current_page.checked_add(1) {
        Some(next) if next <= last_page => request.url_with_page(next)?,
        _ => String::new(),
    };
    let prev_page_url = if current_page == 1 {
        String::new()
    } else {
        request.url_with_page(current_page - 1)?
    };

    Ok(Pagination {
        total: count,
        current_page,
        last_page,
        from: current_page.saturating_mul(per_page).saturating_add(1),
        to: current_page.saturating_add(1).saturating_mul(per_page).min(count),
        next_page_url,
        prev_page_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn request(uri: &str, host: Option<&str>, secure: bool) -> RequestInfo {
        let mut headers = HeaderMap::new();
        if let Some(host) = host {
            headers.insert(HOST, HeaderValue::from_str(host).unwrap());
        }
        RequestInfo::new(headers, uri.parse().unwrap(), secure)
    }

    #[test]
    fn test_compose_pagination_middle_page() {
        let uri = "/query?name=A&sort=name:1&project=name:1&project=date:1&page=2&per_page=1";
        let helper = QueryHelper::parse(uri.split_once('?').unwrap().1);
        let pagination = compose_pagination(&helper, &request(uri, Some("mydomain"), false), 3).unwrap();

        assert_eq!(pagination.total, 3);
        assert_eq!(pagination.current_page, 2);
        assert_eq!(pagination.last_page, 3);
        assert_eq!(pagination.from, 3);
        assert_eq!(pagination.to, 3);

        let next: Uri = pagination.next_page_url.parse().unwrap();
        assert_eq!(next.scheme_str(), Some("http"));
        assert_eq!(next.host(), Some("mydomain"));
        assert_eq!(next.path(), "/query");

        let next_helper = QueryHelper::parse(next.query().unwrap());
        assert_eq!(next_helper.page(), 3);
        let option = next_helper.cursor_option();
        assert_eq!(option.sort, Some(mongodb::bson::doc! { "name": 1 }));
        assert_eq!(option.project, Some(mongodb::bson::doc! { "name": 1, "date": 1 }));
        assert_eq!(option.skip, 2);
        assert_eq!(option.limit, 1);

        let prev: Uri = pagination.prev_page_url.parse().unwrap();
        assert_eq!(QueryHelper::parse(prev.query().unwrap()).page(), 1);
    }

    #[test]
    fn test_last_page_has_no_next_url() {
        let uri = "/items?page=3&per_page=1";
        let helper = QueryHelper::parse("page=3&per_page=1");
        let pagination = compose_pagination(&helper, &request(uri, Some("example.com"), true), 3).unwrap();

        assert_eq!(pagination.last_page, 3);
        assert!(pagination.next_page_url.is_empty());
        assert!(pagination.prev_page_url.starts_with("https://example.com/items?"));
    }

    #[test]
    fn test_first_page_has_no_prev_url() {
        let helper = QueryHelper::parse("per_page=10");
        let pagination =
            compose_pagination(&helper, &request("/items?per_page=10", Some("example.com"), false), 25).unwrap();

        assert_eq!(pagination.current_page, 1);
        assert_eq!(pagination.last_page, 3);
        assert!(pagination.prev_page_url.is_empty());
        assert_eq!(pagination.next_page_url, "http://example.com/items?per_page=10&page=2");
    }

    #[test]
    fn test_empty_result_set() {
        let helper = QueryHelper::new();
        let pagination = compose_pagination(&helper, &request("/items", Some("example.com"), false), 0).unwrap();

        assert_eq!(pagination.last_page, 0);
        assert_eq!(pagination.to, 0);
        assert!(pagination.next_page_url.is_empty());
        assert!(pagination.prev_page_url.is_empty());
    }

    #[test]
    fn test_page_size_is_capped_like_the_cursor() {
        let helper = QueryHelper::parse("per_page=1000");
        let pagination = compose_pagination(&helper, &request("/items", Some("example.com"), false), 250).unwrap();
        assert_eq!(pagination.last_page, 3);
        assert_eq!(pagination.to, 200);
    }

    #[test]
    fn test_largest_page_number_saturates() {
        let uri = "/items?page=18446744073709551615";
        let helper = QueryHelper::parse("page=18446744073709551615");
        assert_eq!(helper.page(), u64::MAX);

        let pagination = compose_pagination(&helper, &request(uri, Some("example.com"), false), 5).unwrap();
        assert_eq!(pagination.current_page, u64::MAX);
        assert_eq!(pagination.last_page, 1);
        assert_eq!(pagination.from, u64::MAX);
        assert_eq!(pagination.to, 5);
        assert!(pagination.next_page_url.is_empty());
        assert_eq!(
            pagination.prev_page_url,
            "http://example.com/items?page=18446744073709551614"
        );
    }

    #[test]
    fn test_missing_host_is_an_error() {
        let helper = QueryHelper::parse("page=2");
        let result = compose_pagination(&helper, &request("/items?page=2", None, false), 30);
        assert!(matches!(result, Err(PaginationError::MissingHost)));
    }

    #[test]
    fn test_url_with_page_keeps_other_pairs_in_order() {
        let info = request("/items?b=2&page=5&a=1&page=9", Some("localhost:8000"), false);
        assert_eq!(info.url_with_page(6).unwrap(), "http://localhost:8000/items?b=2&page=6&a=1");
        assert_eq!(info.base_url().unwrap(), "http://localhost:8000/items?b=2&page=5&a=1&page=9");
    }

    #[test]
    fn test_from_parts_honours_forwarded_proto() {
        let (parts, _) = axum::http::Request::builder()
            .uri("/items")
            .header(HOST, "example.com")
            .header(FORWARDED_PROTO, "HTTPS")
            .body(())
            .unwrap()
            .into_parts();
        let info = RequestInfo::from_parts(&parts);
        assert!(info.is_secure());
        assert_eq!(info.base_url().unwrap(), "https://example.com/items");
    }
}
