use mongodb::bson::{Bson, Document};

use super::helper::{QueryHelper, QueryValue};

impl From<&QueryValue> for Bson {
    fn from(value: &QueryValue) -> Self {
        match value {
            QueryValue::Single(value) => Bson::String(value.clone()),
            QueryValue::Many(values) => Bson::Array(values.iter().cloned().map(Bson::String).collect()),
        }
    }
}

/// Filter document built field by field from a decoded query string.
///
/// Keys missing from the query string, or given with an empty value, never
/// show up in the filter.
///
/// ```
/// use mongo_helper::query::{MongoQuery, QueryHelper};
/// use mongo_helper::bson::doc;
///
/// let helper = QueryHelper::parse("name=ta&gender=male");
/// let mut query = MongoQuery::new(&helper);
/// query
///     .update_key_with("name", |value| doc! { "$regex": value })
///     .update_key("gender")
///     .update_key("money");
///
/// assert_eq!(query.into_filter(), doc! { "name": { "$regex": "ta" }, "gender": "male" });
/// ```
#[derive(Debug, Clone)]
pub struct MongoQuery<'a> {
    source: &'a QueryHelper,
    filter: Document,
}

impl<'a> MongoQuery<'a> {
    pub fn new(source: &'a QueryHelper) -> Self {
        Self {
            source,
            filter: Document::new(),
        }
    }

    /// Copy the raw value of `key` into the filter.
    pub fn update_key(&mut self, key: &str) -> &mut Self {
        self.update_key_with(key, |value| value)
    }

    /// Set `filter[key] = transform(raw)` when `key` carries a value.
    pub fn update_key_with<F, B>(&mut self, key: &str, transform: F) -> &mut Self
    where
        F: FnOnce(Bson) -> B,
        B: Into<Bson>,
    {
        let source = self.source;
        if let Some(raw) = source.get(key).filter(|raw| !raw.is_empty()) {
            self.filter.insert(key, transform(Bson::from(raw)).into());
        }
        self
    }

    /// Copy every non-reserved key verbatim.
    pub fn all_filters(&mut self) -> &mut Self {
        let source = self.source;
        for (key, _) in source.filter_fields() {
            self.update_key(key);
        }
        self
    }

    pub fn filter(&self) -> &Document {
        &self.filter
    }

    pub fn into_filter(self) -> Document {
        self.filter
    }
}
