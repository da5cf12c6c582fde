//! Stats repository - MongoDB storage for ingested heartbeats
//!
//! One document per ingested heartbeat, append-only. The reporting pass
//! reads a single sorted window per invocation; nothing here is ever
//! updated or deleted.

use futures::TryStreamExt;
use mongodb::{bson::doc, options::ClientOptions, Client, Collection};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// One persisted datapoint.
///
/// Field names double as the collection schema; `carousels_count` and
/// `carousels_status` keep their historical column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsDocument {
    /// Receiving IP address.
    pub ip: String,
    /// ISO-3166-1 alpha-2 country code, lower case, if resolvable.
    pub location: Option<String>,
    pub client_id: Uuid,
    pub signal_lock: bool,
    pub service_lock: bool,
    pub signal_strength: u8,
    pub bitrate: u64,
    pub snr: f64,
    /// Service verdict computed at ingest.
    pub service_ok: bool,
    pub tuner_vendor: String,
    pub tuner_model: String,
    pub tuner_preset: u8,
    pub carousels_count: u8,
    pub carousels_status: Vec<bool>,
    /// Heartbeat time at the client, seconds since epoch.
    pub timestamp: f64,
    /// Server wall clock at insert, seconds since epoch.
    pub reported: f64,
}

/// Repository errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),
}

/// MongoDB repository for the `stats` collection
#[derive(Clone)]
pub struct StatsRepository {
    collection: Collection<StatsDocument>,
}

impl StatsRepository {
    /// Connect to MongoDB and return a repository instance
    pub async fn connect(uri: &str, database: &str) -> Result<Self, StorageError> {
        let options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(options)?;

        // Test connection
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;

        info!(uri = uri, database = database, "Connected to MongoDB");

        let collection = client.database(database).collection::<StatsDocument>("stats");
        Ok(Self { collection })
    }

    /// Append one datapoint.
    pub async fn insert(&self, doc: &StatsDocument) -> Result<(), StorageError> {
        self.collection.insert_one(doc).await?;
        Ok(())
    }

    /// Datapoints reported within the last `window_secs` seconds that had
    /// signal lock, sorted by `(tuner_preset, client_id, timestamp)`.
    ///
    /// Unlocked rows are excluded on purpose: without a lock nothing can be
    /// assumed about the signal, so an unlocked sample must not count
    /// against a client.
    pub async fn recent_datapoints(
        &self,
        window_secs: u64,
        now: f64,
    ) -> Result<Vec<StatsDocument>, StorageError> {
        let cutoff = now - window_secs as f64;
        let cursor = self
            .collection
            .find(doc! {
                "reported": { "$gte": cutoff },
                "signal_lock": true,
            })
            .sort(doc! { "tuner_preset": 1, "client_id": 1, "timestamp": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }
}
