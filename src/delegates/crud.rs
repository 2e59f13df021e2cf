use futures_util::TryStreamExt;
use mongodb::{
    bson::Document,
    options::{AggregateOptions, FindOneAndDeleteOptions, FindOneAndUpdateOptions, FindOneOptions, InsertOneOptions},
    results::InsertOneResult,
    Collection,
};
use tracing::debug;

use super::{record_storage_error, Builder, Model, Responder};
use crate::errors::ErrorBuilder;
use crate::query::{build_cursor, CursorOption, QueryHelper};

/// Clean the model, pushing an error when it is not a plain field map.
fn clean_model<M: Model + ?Sized>(errors: &mut ErrorBuilder, model: &M) -> Option<Document> {
    match model.clean() {
        Ok(document) => Some(document),
        Err(message) => {
            errors.push("model", message);
            None
        }
    }
}

/// Inserts the document produced by the data builder.
pub struct CreateDelegate<H, R> {
    collection: Collection<Document>,
    data: Builder<Document, H, Document>,
    options: Builder<Document, H, Option<InsertOneOptions>>,
    responder: R,
}

pub fn create<H, R, D, O>(collection: Collection<Document>, data: D, options: O, responder: R) -> CreateDelegate<H, R>
where
    D: Fn(&mut ErrorBuilder, &Document, &H) -> Document + Send + Sync + 'static,
    O: Fn(&mut ErrorBuilder, &Document, &H) -> Option<InsertOneOptions> + Send + Sync + 'static,
    R: Responder<InsertOneResult>,
{
    CreateDelegate {
        collection,
        data: Box::new(data),
        options: Box::new(options),
        responder,
    }
}

impl<H, R: Responder<InsertOneResult>> CreateDelegate<H, R> {
    pub async fn run<M: Model + ?Sized>(&self, mut errors: ErrorBuilder, model: &M, helper: &H) -> R::Output {
        let Some(model) = clean_model(&mut errors, model) else {
            return self.responder.respond(errors, None);
        };
        let data = (self.data)(&mut errors, &model, helper);
        let options = (self.options)(&mut errors, &model, helper);
        if errors.has_error(None) {
            debug!("create on {} skipped: validation failed", self.collection.name());
            return self.responder.respond(errors, None);
        }

        match self.collection.insert_one(data).with_options(options).await {
            Ok(result) => self.responder.respond(errors, Some(result)),
            Err(err) => {
                record_storage_error(&mut errors, "insert_one", &err);
                self.responder.respond(errors, None)
            }
        }
    }
}

/// Updates one document with `find_one_and_update`.
pub struct SaveDelegate<H, R> {
    collection: Collection<Document>,
    query: Builder<Document, H, Document>,
    data: Builder<Document, H, Document>,
    options: Builder<Document, H, Option<FindOneAndUpdateOptions>>,
    responder: R,
}

pub fn save<H, R, Q, D, O>(
    collection: Collection<Document>,
    query: Q,
    data: D,
    options: O,
    responder: R,
) -> SaveDelegate<H, R>
where
    Q: Fn(&mut ErrorBuilder, &Document, &H) -> Document + Send + Sync + 'static,
    D: Fn(&mut ErrorBuilder, &Document, &H) -> Document + Send + Sync + 'static,
    O: Fn(&mut ErrorBuilder, &Document, &H) -> Option<FindOneAndUpdateOptions> + Send + Sync + 'static,
    R: Responder<Document>,
{
    SaveDelegate {
        collection,
        query: Box::new(query),
        data: Box::new(data),
        options: Box::new(options),
        responder,
    }
}

impl<H, R: Responder<Document>> SaveDelegate<H, R> {
    pub async fn run<M: Model + ?Sized>(&self, mut errors: ErrorBuilder, model: &M, helper: &H) -> R::Output {
        let Some(model) = clean_model(&mut errors, model) else {
            return self.responder.respond(errors, None);
        };
        let query = (self.query)(&mut errors, &model, helper);
        let data = (self.data)(&mut errors, &model, helper);
        let options = (self.options)(&mut errors, &model, helper);
        if errors.has_error(None) {
            debug!("save on {} skipped: validation failed", self.collection.name());
            return self.responder.respond(errors, None);
        }

        match self
            .collection
            .find_one_and_update(query, data)
            .with_options(options)
            .await
        {
            Ok(result) => self.responder.respond(errors, result),
            Err(err) => {
                record_storage_error(&mut errors, "find_one_and_update", &err);
                self.responder.respond(errors, None)
            }
        }
    }
}

/// Fetches one document with `find_one`.
pub struct GetOneDelegate<H, R> {
    collection: Collection<Document>,
    query: Builder<Document, H, Document>,
    options: Builder<Document, H, Option<FindOneOptions>>,
    responder: R,
}

pub fn get_one<H, R, Q, O>(collection: Collection<Document>, query: Q, options: O, responder: R) -> GetOneDelegate<H, R>
where
    Q: Fn(&mut ErrorBuilder, &Document, &H) -> Document + Send + Sync + 'static,
    O: Fn(&mut ErrorBuilder, &Document, &H) -> Option<FindOneOptions> + Send + Sync + 'static,
    R: Responder<Document>,
{
    GetOneDelegate {
        collection,
        query: Box::new(query),
        options: Box::new(options),
        responder,
    }
}

impl<H, R: Responder<Document>> GetOneDelegate<H, R> {
    pub async fn run<M: Model + ?Sized>(&self, mut errors: ErrorBuilder, model: &M, helper: &H) -> R::Output {
        let Some(model) = clean_model(&mut errors, model) else {
            return self.responder.respond(errors, None);
        };
        let query = (self.query)(&mut errors, &model, helper);
        let options = (self.options)(&mut errors, &model, helper);
        if errors.has_error(None) {
            debug!("get_one on {} skipped: validation failed", self.collection.name());
            return self.responder.respond(errors, None);
        }

        match self.collection.find_one(query).with_options(options).await {
            Ok(result) => self.responder.respond(errors, result),
            Err(err) => {
                record_storage_error(&mut errors, "find_one", &err);
                self.responder.respond(errors, None)
            }
        }
    }
}

/// Runs a paged `find` built from the decoded query string.
pub struct QueryByFindDelegate<H, R> {
    collection: Collection<Document>,
    query: Builder<QueryHelper, H, Document>,
    options: Builder<QueryHelper, H, CursorOption>,
    responder: R,
}

pub fn query_by_find<H, R, Q, O>(
    collection: Collection<Document>,
    query: Q,
    options: O,
    responder: R,
) -> QueryByFindDelegate<H, R>
where
    Q: Fn(&mut ErrorBuilder, &QueryHelper, &H) -> Document + Send + Sync + 'static,
    O: Fn(&mut ErrorBuilder, &QueryHelper, &H) -> CursorOption + Send + Sync + 'static,
    R: Responder<Vec<Document>>,
{
    QueryByFindDelegate {
        collection,
        query: Box::new(query),
        options: Box::new(options),
        responder,
    }
}

impl<H, R: Responder<Vec<Document>>> QueryByFindDelegate<H, R> {
    pub async fn run(&self, mut errors: ErrorBuilder, query_helper: &QueryHelper, helper: &H) -> R::Output {
        let filter = (self.query)(&mut errors, query_helper, helper);
        let option = (self.options)(&mut errors, query_helper, helper);
        if errors.has_error(None) {
            debug!("find on {} skipped: validation failed", self.collection.name());
            return self.responder.respond(errors, None);
        }

        let documents = match build_cursor(&self.collection, filter, &option).await {
            Ok(cursor) => cursor.try_collect::<Vec<Document>>().await,
            Err(err) => Err(err),
        };
        match documents {
            Ok(documents) => self.responder.respond(errors, Some(documents)),
            Err(err) => {
                record_storage_error(&mut errors, "find", &err);
                self.responder.respond(errors, None)
            }
        }
    }
}

/// Runs an aggregation pipeline built from the decoded query string.
pub struct QueryByAggregateDelegate<H, R> {
    collection: Collection<Document>,
    pipeline: Builder<QueryHelper, H, Vec<Document>>,
    options: Builder<QueryHelper, H, Option<AggregateOptions>>,
    responder: R,
}

pub fn query_by_aggregate<H, R, P, O>(
    collection: Collection<Document>,
    pipeline: P,
    options: O,
    responder: R,
) -> QueryByAggregateDelegate<H, R>
where
    P: Fn(&mut ErrorBuilder, &QueryHelper, &H) -> Vec<Document> + Send + Sync + 'static,
    O: Fn(&mut ErrorBuilder, &QueryHelper, &H) -> Option<AggregateOptions> + Send + Sync + 'static,
    R: Responder<Vec<Document>>,
{
    QueryByAggregateDelegate {
        collection,
        pipeline: Box::new(pipeline),
        options: Box::new(options),
        responder,
    }
}

impl<H, R: Responder<Vec<Document>>> QueryByAggregateDelegate<H, R> {
    pub async fn run(&self, mut errors: ErrorBuilder, query_helper: &QueryHelper, helper: &H) -> R::Output {
        let pipeline = (self.pipeline)(&mut errors, query_helper, helper);
        let options = (self.options)(&mut errors, query_helper, helper);
        if errors.has_error(None) {
            debug!("aggregate on {} skipped: validation failed", self.collection.name());
            return self.responder.respond(errors, None);
        }

        let documents = match self.collection.aggregate(pipeline).with_options(options).await {
            Ok(cursor) => cursor.try_collect::<Vec<Document>>().await,
            Err(err) => Err(err),
        };
        match documents {
            Ok(documents) => self.responder.respond(errors, Some(documents)),
            Err(err) => {
                record_storage_error(&mut errors, "aggregate", &err);
                self.responder.respond(errors, None)
            }
        }
    }
}

/// Removes one document with `find_one_and_delete`.
pub struct DeleteOneDelegate<H, R> {
    collection: Collection<Document>,
    query: Builder<Document, H, Document>,
    options: Builder<Document, H, Option<FindOneAndDeleteOptions>>,
    responder: R,
}

pub fn delete_one<H, R, Q, O>(
    collection: Collection<Document>,
    query: Q,
    options: O,
    responder: R,
) -> DeleteOneDelegate<H, R>
where
    Q: Fn(&mut ErrorBuilder, &Document, &H) -> Document + Send + Sync + 'static,
    O: Fn(&mut ErrorBuilder, &Document, &H) -> Option<FindOneAndDeleteOptions> + Send + Sync + 'static,
    R: Responder<Document>,
{
    DeleteOneDelegate {
        collection,
        query: Box::new(query),
        options: Box::new(options),
        responder,
    }
}

impl<H, R: Responder<Document>> DeleteOneDelegate<H, R> {
    pub async fn run<M: Model + ?Sized>(&self, mut errors: ErrorBuilder, model: &M, helper: &H) -> R::Output {
        let Some(model) = clean_model(&mut errors, model) else {
            return self.responder.respond(errors, None);
        };
        let query = (self.query)(&mut errors, &model, helper);
        let options = (self.options)(&mut errors, &model, helper);
        if errors.has_error(None) {
            debug!("delete_one on {} skipped: validation failed", self.collection.name());
            return self.responder.respond(errors, None);
        }

        match self.collection.find_one_and_delete(query).with_options(options).await {
            Ok(result) => self.responder.respond(errors, result),
            Err(err) => {
                record_storage_error(&mut errors, "find_one_and_delete", &err);
                self.responder.respond(errors, None)
            }
        }
    }
}
