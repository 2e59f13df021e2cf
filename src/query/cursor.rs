use mongodb::{
    bson::{Bson, Document},
    Collection, Cursor,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::helper::DEFAULT_PER_PAGE;

/// Hard ceiling on the page size, whatever the caller asks for.
pub const MAX_PER_PAGE: u64 = 100;

/// Parse `"field:direction"` tokens into an ordered sort or projection document.
///
/// Tokens that do not split into exactly two parts on `:`, or whose direction is
/// not an integer, are dropped. Returns `None` when nothing usable remains.
pub fn build_sort_or_project<I, S>(tokens: I) -> Option<Document>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut spec = Document::new();
    for token in tokens {
        let parts: Vec<&str> = token.as_ref().split(':').collect();
        let [field, direction] = parts.as_slice() else {
            continue;
        };
        if field.is_empty() {
            continue;
        }
        if let Ok(direction) = direction.trim().parse::<i32>() {
            spec.insert(field.to_string(), Bson::Int32(direction));
        }
    }

    if spec.is_empty() {
        None
    } else {
        Some(spec)
    }
}

/// Sort, projection and page window for one find.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorOption {
    pub sort: Option<Document>,
    pub project: Option<Document>,
    pub skip: u64,
    pub limit: i64,
}

impl Default for CursorOption {
    fn default() -> Self {
        Self::new(Vec::<&str>::new(), Vec::<&str>::new(), 1, DEFAULT_PER_PAGE)
    }
}

impl CursorOption {
    /// `page` is 1-based. `per_page` is clamped to `1..=MAX_PER_PAGE` before the
    /// window is computed, and `limit` is the page size, not an absolute bound.
    pub fn new<I, J, S, T>(sort: I, project: J, page: u64, per_page: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let per_page = clamp_per_page(per_page);
        let page = page.max(1);

        Self {
            sort: build_sort_or_project(sort),
            project: build_sort_or_project(project),
            skip: (page - 1).saturating_mul(per_page),
            limit: per_page as i64,
        }
    }
}

pub fn clamp_per_page(per_page: u64) -> u64 {
    per_page.clamp(1, MAX_PER_PAGE)
}

/// Open a lazy cursor: filter, then sort, projection, limit and skip, each only
/// when the option carries it.
pub async fn build_cursor<T>(
    collection: &Collection<T>,
    filter: Document,
    option: &CursorOption,
) -> mongodb::error::Result<Cursor<T>>
where
    T: DeserializeOwned + Send + Sync,
{
    let mut find = collection.find(filter);
    if let Some(sort) = &option.sort {
        find = find.sort(sort.clone());
    }
    if let Some(project) = &option.project {
        find = find.projection(project.clone());
    }
    if option.limit > 0 {
        find = find.limit(option.limit);
    }
    if option.skip > 0 {
        find = find.skip(option.skip);
    }
    find.await
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn test_build_sort_or_project() {
        let spec = build_sort_or_project(["name:1", "date:-1"]).unwrap();
        assert_eq!(spec, doc! { "name": 1, "date": -1 });
        let keys: Vec<&String> = spec.keys().collect();
        assert_eq!(keys, vec!["name", "date"]);
    }

    #[test]
    fn test_malformed_tokens_are_dropped() {
        let spec = build_sort_or_project(["name", "a:b:1", "date:-1", ":1", "age:up"]).unwrap();
        assert_eq!(spec, doc! { "date": -1 });
    }

    #[test]
    fn test_no_usable_tokens() {
        assert!(build_sort_or_project(Vec::<String>::new()).is_none());
        assert!(build_sort_or_project(["name"]).is_none());
        assert!(build_sort_or_project(Some("name:1")).is_some());
    }

    #[test]
    fn test_cursor_option_window() {
        let option = CursorOption::new(["name:1", "date:-1"], ["name:1", "date:1", "data:1"], 2, 11);

        assert_eq!(option.sort, Some(doc! { "name": 1, "date": -1 }));
        assert_eq!(option.project, Some(doc! { "name": 1, "date": 1, "data": 1 }));
        assert_eq!(option.skip, 11);
        assert_eq!(option.limit, 11);
    }

    #[test]
    fn test_cursor_option_caps_page_size() {
        let option = CursorOption::new(Vec::<&str>::new(), Vec::<&str>::new(), 3, 500);
        assert_eq!(option.limit, 100);
        assert_eq!(option.skip, 200);
        assert!(option.sort.is_none());
        assert!(option.project.is_none());
    }

    #[test]
    fn test_cursor_option_first_page() {
        let option = CursorOption::default();
        assert_eq!(option.skip, 0);
        assert_eq!(option.limit, 10);

        let option = CursorOption::new(Vec::<&str>::new(), Vec::<&str>::new(), 0, 0);
        assert_eq!(option.skip, 0);
        assert_eq!(option.limit, 1);
    }

    #[test]
    fn test_cursor_option_is_idempotent() {
        let first = CursorOption::new(["name:1"], ["name:1"], 4, 25);
        let second = CursorOption::new(["name:1"], ["name:1"], 4, 25);
        assert_eq!(first, second);
    }
}
