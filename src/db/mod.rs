use mongodb::{
    bson::{doc, Document},
    options::{Acknowledgment, ClientOptions, WriteConcern},
    Client, Collection,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::{config::Config, errors::DatabaseError};

/// Process-wide storage handle.
///
/// Created once at startup and handed to whoever needs a collection; the
/// driver client pools connections internally so clones are cheap.
#[derive(Clone)]
pub struct Database {
    db: mongodb::Database,
    name: String,
    ready: Arc<watch::Sender<bool>>,
}

impl Database {
    /// Build the client from the configured url. No round trip to the server
    /// happens here; call [`Database::connect`] to verify the connection and
    /// flip the readiness signal.
    pub async fn new(config: &Config) -> Result<Self, DatabaseError> {
        if config.mongodb_url.trim().is_empty() {
            return Err(DatabaseError::MissingUrl);
        }

        let mut options = ClientOptions::parse(&config.mongodb_url).await?;
        options.write_concern = Some(
            WriteConcern::builder()
                .w(Acknowledgment::Majority)
                .journal(config.journal)
                .w_timeout(Duration::from_millis(config.write_timeout_ms))
                .build(),
        );
        options.max_pool_size = Some(config.max_pool_size);

        let name = database_name_from_url(&config.mongodb_url)
            .or_else(|| options.default_database.clone())
            .ok_or_else(|| DatabaseError::MissingDatabaseName {
                url: config.mongodb_url.clone(),
            })?;

        let client = Client::with_options(options)?;
        let db = client.database(&name);
        let (ready, _) = watch::channel(false);

        Ok(Self {
            db,
            name,
            ready: Arc::new(ready),
        })
    }

    /// Ping the server and signal readiness once it answers.
    pub async fn connect(&self) -> Result<(), DatabaseError> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        info!("connected to database {}", self.name);
        self.ready.send_replace(true);
        Ok(())
    }

    pub async fn connect_with_config(config: &Config) -> Result<Self, DatabaseError> {
        let db = Self::new(config).await?;
        db.connect().await?;
        Ok(db)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> &mongodb::Database {
        &self.db
    }

    pub fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection::<Document>(name)
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Subscribe to the readiness signal.
    pub fn ready(&self) -> watch::Receiver<bool> {
        self.ready.subscribe()
    }

    /// Resolves once [`Database::connect`] has succeeded.
    pub async fn wait_ready(&self) {
        let mut receiver = self.ready();
        // The sender lives as long as `self`, so this only fails if it was dropped.
        let _ = receiver.wait_for(|ready| *ready).await;
    }

    /// Drop every collection in the database. Used to clean up after tests.
    pub async fn drop_all_collections(&self) -> Result<usize, DatabaseError> {
        let names = self.db.list_collection_names().await?;
        for name in &names {
            debug!("Dropping collection {}.{}", self.name, name);
            self.db.collection::<Document>(name).drop().await?;
        }
        Ok(names.len())
    }
}

/// Database name taken from the path segment of a `mongodb://` url.
pub fn database_name_from_url(url: &str) -> Option<String> {
    let rest = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let (_, path) = rest.split_once('/')?;
    let name = path.split(['?', '/']).next().unwrap_or_default();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
