use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use std::collections::{btree_map::Entry, BTreeMap};
use std::convert::Infallible;

use super::cursor::CursorOption;

pub const SORT_KEY: &str = "sort";
pub const PROJECT_KEY: &str = "project";
pub const PAGE_KEY: &str = "page";
pub const PER_PAGE_KEY: &str = "per_page";

pub const RESERVED_KEYS: [&str; 4] = [SORT_KEY, PROJECT_KEY, PAGE_KEY, PER_PAGE_KEY];

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_PER_PAGE: u64 = 10;

/// A raw query string value: a key given once or a key repeated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    Single(String),
    Many(Vec<String>),
}

impl QueryValue {
    /// Every raw string carried by this value, in query string order.
    pub fn values(&self) -> Vec<&str> {
        match self {
            QueryValue::Single(value) => vec![value.as_str()],
            QueryValue::Many(values) => values.iter().map(String::as_str).collect(),
        }
    }

    /// The first raw string, if any.
    pub fn first(&self) -> Option<&str> {
        match self {
            QueryValue::Single(value) => Some(value),
            QueryValue::Many(values) => values.first().map(String::as_str),
        }
    }

    /// Empty strings and empty arrays count as "not given".
    pub fn is_empty(&self) -> bool {
        match self {
            QueryValue::Single(value) => value.is_empty(),
            QueryValue::Many(values) => values.is_empty(),
        }
    }

    fn append(&mut self, value: String) {
        match self {
            QueryValue::Single(existing) => {
                *self = QueryValue::Many(vec![std::mem::take(existing), value]);
            }
            QueryValue::Many(values) => values.push(value),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Single(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Single(value)
    }
}

impl<S: Into<String>> From<Vec<S>> for QueryValue {
    fn from(values: Vec<S>) -> Self {
        QueryValue::Many(values.into_iter().map(Into::into).collect())
    }
}

/// Decoded query string of one request.
///
/// `sort`, `project`, `page` and `per_page` drive the cursor; every other key
/// is a filter field left for [`super::MongoQuery`] to pick up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryHelper {
    fields: BTreeMap<String, QueryValue>,
}

impl QueryHelper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a raw (form-urlencoded) query string. Repeated keys collect into
    /// an array and a trailing `[]` on a key is dropped.
    pub fn parse(query: &str) -> Self {
        let mut helper = Self::new();
        for (key, value) in url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            let key = key.strip_suffix("[]").unwrap_or(key.as_ref()).to_string();
            if key.is_empty() {
                continue;
            }
            helper.append(key, value.into_owned());
        }
        helper
    }

    /// Add a value under `key`, turning an existing single value into an array.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        match self.fields.entry(key.into()) {
            Entry::Occupied(mut entry) => entry.get_mut().append(value),
            Entry::Vacant(entry) => {
                entry.insert(QueryValue::Single(value));
            }
        }
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> &mut Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QueryValue)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Keys that are not reserved for sorting, projection or paging.
    pub fn filter_fields(&self) -> impl Iterator<Item = (&str, &QueryValue)> {
        self.iter().filter(|(key, _)| !RESERVED_KEYS.contains(key))
    }

    pub fn sort_tokens(&self) -> Vec<&str> {
        self.tokens(SORT_KEY)
    }

    pub fn project_tokens(&self) -> Vec<&str> {
        self.tokens(PROJECT_KEY)
    }

    /// 1-based page number; missing, zero or unparsable values give the default.
    pub fn page(&self) -> u64 {
        self.positive_number(PAGE_KEY).unwrap_or(DEFAULT_PAGE)
    }

    /// Requested page size before any capping.
    pub fn per_page(&self) -> u64 {
        self.positive_number(PER_PAGE_KEY).unwrap_or(DEFAULT_PER_PAGE)
    }

    pub fn cursor_option(&self) -> CursorOption {
        CursorOption::new(self.sort_tokens(), self.project_tokens(), self.page(), self.per_page())
    }

    fn tokens(&self, key: &str) -> Vec<&str> {
        self.fields.get(key).map(QueryValue::values).unwrap_or_default()
    }

    fn positive_number(&self, key: &str) -> Option<u64> {
        self.fields
            .get(key)
            .and_then(QueryValue::first)
            .and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|value| *value > 0)
    }
}

impl<S> FromRequestParts<S> for QueryHelper
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(QueryHelper::parse(parts.uri.query().unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repeated_keys_become_arrays() {
        let helper = QueryHelper::parse("sort=name:1&sort=date:-1&name=john&page=2");

        assert_eq!(helper.sort_tokens(), vec!["name:1", "date:-1"]);
        assert_eq!(helper.get("name"), Some(&QueryValue::Single("john".to_string())));
        assert_eq!(helper.page(), 2);
        assert_eq!(helper.per_page(), DEFAULT_PER_PAGE);
    }

    #[test]
    fn test_parse_bracket_keys_and_encoding() {
        let helper = QueryHelper::parse("?project[]=name:1&project[]=date:1&title=hello%20world");

        assert_eq!(helper.project_tokens(), vec!["name:1", "date:1"]);
        assert_eq!(helper.get("title").and_then(QueryValue::first), Some("hello world"));
    }

    #[test]
    fn test_page_and_per_page_fall_back_to_defaults() {
        let helper = QueryHelper::parse("page=0&per_page=abc");
        assert_eq!(helper.page(), DEFAULT_PAGE);
        assert_eq!(helper.per_page(), DEFAULT_PER_PAGE);

        let helper = QueryHelper::parse("page=-3&per_page=");
        assert_eq!(helper.page(), DEFAULT_PAGE);
        assert_eq!(helper.per_page(), DEFAULT_PER_PAGE);
    }

    #[test]
    fn test_filter_fields_skip_reserved_keys() {
        let helper = QueryHelper::parse("sort=a:1&project=a:1&page=1&per_page=5&name=ta&gender=male");
        let keys: Vec<&str> = helper.filter_fields().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["gender", "name"]);
    }
}
