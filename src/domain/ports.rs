use super::catalog::{Category, CategoryId, Event, EventId, Nominee, NomineeId};
use super::gateway::{InitiatePayment, Initiation, Verification};
use super::payment::{PaymentRecord, PaymentStats};
use super::session::{Level, Session, SessionKey};
use super::vote::{Settlement, VoteRecord};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Durable USSD session state.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &SessionKey) -> Result<Option<Session>>;
    /// Inserts the session, replacing any existing one under the same key.
    async fn create(&self, session: Session) -> Result<()>;
    /// Writes `session` only if the stored copy is still at `expected`.
    ///
    /// Returns `VoteError::Conflict` when another turn got there first or the
    /// session has been swept.
    async fn update(&self, session: Session, expected: Level) -> Result<()>;
    /// Removes sessions created before `cutoff`, returning how many were removed.
    async fn expire_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
    async fn level_counts(&self) -> Result<BTreeMap<Level, usize>>;
    async fn count_since(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

/// Read access to nominees and their pricing.
#[async_trait]
pub trait NomineeLedger: Send + Sync {
    async fn get_by_code(&self, code: &str) -> Result<Option<Nominee>>;
    async fn get_by_id(&self, id: NomineeId) -> Result<Option<Nominee>>;
    async fn category(&self, id: CategoryId) -> Result<Option<Category>>;
    async fn event(&self, id: EventId) -> Result<Option<Event>>;
    async fn upsert_event(&self, event: Event) -> Result<()>;
    async fn upsert_category(&self, category: Category) -> Result<()>;
    /// Inserts or renames a nominee. An existing vote tally is preserved.
    async fn upsert_nominee(&self, nominee: Nominee) -> Result<()>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Fails with `VoteError::Conflict` if the reference is already known.
    async fn insert(&self, record: PaymentRecord) -> Result<()>;
    async fn get(&self, reference: &str) -> Result<Option<PaymentRecord>>;
    async fn pending(&self) -> Result<Vec<PaymentRecord>>;
    async fn statistics(&self) -> Result<PaymentStats>;
}

/// The only writer of nominee tallies and vote records.
#[async_trait]
pub trait VoteStore: Send + Sync {
    /// Applies a settlement atomically: confirm the payment (if any), credit the
    /// nominee, append the record. Either all of it persists or none of it does.
    ///
    /// Errors: `NotFound` for an unknown nominee or payment, `Conflict` when the
    /// payment was already confirmed.
    async fn commit(&self, settlement: Settlement) -> Result<VoteRecord>;
    async fn votes_for(&self, nominee_id: NomineeId) -> Result<Vec<VoteRecord>>;
    async fn by_reference(&self, reference: &str) -> Result<Option<VoteRecord>>;
}

/// External payment provider speaking an initiate / verify protocol.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initiate(&self, request: InitiatePayment) -> std::result::Result<Initiation, GatewayError>;
    async fn verify(&self, reference: &str) -> std::result::Result<Verification, GatewayError>;
}

pub type SharedSessionStore = Arc<dyn SessionStore>;
pub type SharedNomineeLedger = Arc<dyn NomineeLedger>;
pub type SharedPaymentStore = Arc<dyn PaymentStore>;
pub type SharedVoteStore = Arc<dyn VoteStore>;
pub type SharedPaymentGateway = Arc<dyn PaymentGateway>;
