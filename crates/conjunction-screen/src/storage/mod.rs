//! Catalog and alert persistence
//!
//! The screening core talks to storage through two traits; `SqliteStore`
//! implements both.

mod database;

pub use database::{SqliteStore, StoreStats};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::types::{
    Alert, CandidatePair, CatalogEntry, ConjunctionEvent, ObjectId, ObjectMetadata, RiskLevel,
};

/// Read access to the current catalog
pub trait CatalogStore: Send + Sync {
    /// Every object with a current orbital state
    fn current_entries(&self) -> Result<Vec<CatalogEntry>>;

    /// One object with its current state
    fn current_entry(&self, id: ObjectId) -> Result<Option<CatalogEntry>>;

    /// Object metadata regardless of state availability
    fn object(&self, id: ObjectId) -> Result<Option<ObjectMetadata>>;
}

/// Alert and conjunction-event persistence
///
/// Writes are idempotent on their natural keys and safe to call concurrently.
pub trait AlertStore: Send + Sync {
    /// Look up the alert for an (unordered pair, TCA) key
    fn find_alert(&self, pair: CandidatePair, tca: DateTime<Utc>) -> Result<Option<Alert>>;

    /// Insert `alert` unless its key already exists; returns the stored alert
    fn insert_alert_if_absent(&self, alert: &Alert) -> Result<Alert>;

    /// Unresolved alerts, optionally limited to one severity, ordered by TCA
    fn list_unresolved(&self, level: Option<RiskLevel>) -> Result<Vec<Alert>>;

    /// Mark an alert resolved
    fn resolve_alert(&self, id: Uuid, at: DateTime<Utc>) -> Result<Alert>;

    /// Insert `event` unless (primary, secondary, TCA) already exists; returns the stored event
    fn record_event(&self, event: &ConjunctionEvent) -> Result<ConjunctionEvent>;

    /// Events for `primary` with TCA in `[from, to]`, closest miss first
    fn upcoming_events(
        &self,
        primary: ObjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ConjunctionEvent>>;

    /// HIGH and CRITICAL events for `primary` with TCA after `now`, soonest first
    fn high_risk_events(&self, primary: ObjectId, now: DateTime<Utc>)
        -> Result<Vec<ConjunctionEvent>>;

    /// Delete events whose TCA precedes `cutoff`; returns the number removed
    fn purge_events_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}
