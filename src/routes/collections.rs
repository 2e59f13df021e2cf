use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use mongodb::{
    bson::{doc, oid::ObjectId, Bson, Document},
    options::{FindOneAndUpdateOptions, ReturnDocument},
    results::InsertOneResult,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    delegates::{self, record_storage_error, CallbackResponder, JsonResponder},
    errors::{ApiError, ErrorBuilder},
    pagination::{compose_pagination, RequestInfo},
    query::{MongoQuery, QueryHelper},
    AppState,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/{collection}", get(list_documents).post(create_document))
        .route("/{collection}/aggregate", post(aggregate_documents))
        .route(
            "/{collection}/{id}",
            get(get_document).put(update_document).delete(delete_document),
        )
}

/// Identifies the document a single-document route works on.
#[derive(Debug, Clone)]
pub struct DocumentTarget {
    pub id: Bson,
}

impl DocumentTarget {
    /// Ids that parse as an `ObjectId` are matched as one, anything else as a string.
    pub fn parse(id: &str) -> Self {
        let id = ObjectId::parse_str(id)
            .map(Bson::ObjectId)
            .unwrap_or_else(|_| Bson::String(id.to_string()));
        Self { id }
    }

    pub fn filter(&self) -> Document {
        doc! { "_id": self.id.clone() }
    }
}

pub fn validate_collection_name(name: &str) -> Result<&str, ApiError> {
    if name.is_empty() {
        return Err(ApiError::bad_request("Collection name must not be empty"));
    }
    if name.contains('$') || name.contains('\0') {
        return Err(ApiError::bad_request(format!("Invalid collection name '{}'", name)));
    }
    if name.starts_with("system.") {
        return Err(ApiError::bad_request("System collections are not accessible"));
    }
    Ok(name)
}

/// Every non-reserved query string key as an exact-match filter.
pub fn filter_from_query(query: &QueryHelper) -> Document {
    let mut filter = MongoQuery::new(query);
    filter.all_filters();
    filter.into_filter()
}

fn respond_one(outcome: Result<Option<Document>, ErrorBuilder>) -> Response {
    match outcome {
        Ok(Some(document)) => Json(document).into_response(),
        Ok(None) => ApiError::NotFound.into_response(),
        Err(errors) => errors.into_response(),
    }
}

fn respond_created(outcome: Result<Option<InsertOneResult>, ErrorBuilder>) -> Response {
    match outcome {
        Ok(Some(result)) => (
            StatusCode::CREATED,
            Json(json!({ "inserted_id": result.inserted_id })),
        )
            .into_response(),
        Ok(None) => ApiError::internal_server_error("insert returned no result").into_response(),
        Err(errors) => errors.into_response(),
    }
}

fn reject_empty(errors: &mut ErrorBuilder, fields: &Document) {
    if fields.is_empty() {
        errors.push("body", "document must contain at least one field");
    }
}

async fn list_documents(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    request: RequestInfo,
    query: QueryHelper,
) -> Response {
    let name = match validate_collection_name(&collection) {
        Ok(name) => name,
        Err(err) => return err.into_response(),
    };
    let collection = state.db.collection(name);

    let find = delegates::query_by_find(
        collection.clone(),
        |_: &mut ErrorBuilder, query: &QueryHelper, _: &()| filter_from_query(query),
        |_: &mut ErrorBuilder, query: &QueryHelper, _: &()| query.cursor_option(),
        CallbackResponder(|outcome: Result<Option<Vec<Document>>, ErrorBuilder>| outcome),
    );
    let documents = match find.run(ErrorBuilder::new(), &query, &()).await {
        Ok(documents) => documents.unwrap_or_default(),
        Err(errors) => return errors.into_response(),
    };

    let total = match collection.count_documents(filter_from_query(&query)).await {
        Ok(total) => total,
        Err(err) => {
            let mut errors = ErrorBuilder::new();
            record_storage_error(&mut errors, "count_documents", &err);
            return errors.into_response();
        }
    };

    let pagination = match compose_pagination(&query, &request, total) {
        Ok(pagination) => pagination,
        Err(err) => return err.into_response(),
    };

    debug!("Listed {} of {} documents from {}", documents.len(), total, name);
    Json(json!({ "data": documents, "pagination": pagination })).into_response()
}

async fn create_document(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    Json(body): Json<Document>,
) -> Response {
    let name = match validate_collection_name(&collection) {
        Ok(name) => name,
        Err(err) => return err.into_response(),
    };

    let create = delegates::create(
        state.db.collection(name),
        |errors: &mut ErrorBuilder, model: &Document, _: &()| {
            reject_empty(errors, model);
            model.clone()
        },
        |_: &mut ErrorBuilder, _: &Document, _: &()| None,
        CallbackResponder(respond_created),
    );

    info!("Creating document in {}", name);
    create.run(ErrorBuilder::new(), &body, &()).await
}

async fn get_document(
    State(state): State<Arc<AppState>>,
    Path((collection, id)): Path<(String, String)>,
) -> Response {
    let name = match validate_collection_name(&collection) {
        Ok(name) => name,
        Err(err) => return err.into_response(),
    };

    let get_one = delegates::get_one(
        state.db.collection(name),
        |_: &mut ErrorBuilder, _: &Document, target: &DocumentTarget| target.filter(),
        |_: &mut ErrorBuilder, _: &Document, _: &DocumentTarget| None,
        CallbackResponder(respond_one),
    );

    get_one
        .run(ErrorBuilder::new(), &Document::new(), &DocumentTarget::parse(&id))
        .await
}

async fn update_document(
    State(state): State<Arc<AppState>>,
    Path((collection, id)): Path<(String, String)>,
    Json(body): Json<Document>,
) -> Response {
    let name = match validate_collection_name(&collection) {
        Ok(name) => name,
        Err(err) => return err.into_response(),
    };

    let save = delegates::save(
        state.db.collection(name),
        |_: &mut ErrorBuilder, _: &Document, target: &DocumentTarget| target.filter(),
        |errors: &mut ErrorBuilder, model: &Document, _: &DocumentTarget| {
            let mut fields = model.clone();
            fields.remove("_id");
            reject_empty(errors, &fields);
            doc! { "$set": fields }
        },
        |_: &mut ErrorBuilder, _: &Document, _: &DocumentTarget| {
            let mut options = FindOneAndUpdateOptions::default();
            options.return_document = Some(ReturnDocument::After);
            Some(options)
        },
        CallbackResponder(respond_one),
    );

    info!("Updating document {} in {}", id, name);
    save.run(ErrorBuilder::new(), &body, &DocumentTarget::parse(&id)).await
}

async fn delete_document(
    State(state): State<Arc<AppState>>,
    Path((collection, id)): Path<(String, String)>,
) -> Response {
    let name = match validate_collection_name(&collection) {
        Ok(name) => name,
        Err(err) => return err.into_response(),
    };

    let delete = delegates::delete_one(
        state.db.collection(name),
        |_: &mut ErrorBuilder, _: &Document, target: &DocumentTarget| target.filter(),
        |_: &mut ErrorBuilder, _: &Document, _: &DocumentTarget| None,
        CallbackResponder(respond_one),
    );

    info!("Deleting document {} from {}", id, name);
    delete
        .run(ErrorBuilder::new(), &Document::new(), &DocumentTarget::parse(&id))
        .await
}

/// Runs the posted pipeline, followed by the `$skip`/`$limit` window of the
/// query string's `page` and `per_page`.
async fn aggregate_documents(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    query: QueryHelper,
    Json(pipeline): Json<Vec<Document>>,
) -> Response {
    let name = match validate_collection_name(&collection) {
        Ok(name) => name,
        Err(err) => return err.into_response(),
    };

    let aggregate = delegates::query_by_aggregate(
        state.db.collection(name),
        |errors: &mut ErrorBuilder, query: &QueryHelper, pipeline: &Vec<Document>| {
            if pipeline.is_empty() {
                errors.push("pipeline", "pipeline must contain at least one stage");
            }
            let option = query.cursor_option();
            let mut stages = pipeline.clone();
            match i64::try_from(option.skip) {
                Ok(skip) => stages.push(doc! { "$skip": skip }),
                Err(_) => {
                    errors.push("page", "page is too large");
                }
            }
            stages.push(doc! { "$limit": option.limit });
            stages
        },
        |_: &mut ErrorBuilder, _: &QueryHelper, _: &Vec<Document>| None,
        JsonResponder,
    );

    aggregate.run(ErrorBuilder::new(), &query, &pipeline).await
}
