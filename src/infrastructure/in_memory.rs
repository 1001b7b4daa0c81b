use crate::domain::catalog::{
    Category, CategoryId, Event, EventId, Nominee, NomineeId, normalize_code,
};
use crate::domain::payment::{PaymentRecord, PaymentStats, PaymentStatus};
use crate::domain::ports::{NomineeLedger, PaymentStore, SessionStore, VoteStore};
use crate::domain::session::{Level, Session, SessionKey};
use crate::domain::vote::{Settlement, VoteRecord};
use crate::error::{Result, VoteError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for USSD sessions.
///
/// Uses `Arc<RwLock<HashMap<SessionKey, Session>>>`; the conditional update runs
/// its compare and its write under the same write guard.
#[derive(Default, Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<SessionKey, Session>>>,
}

impl InMemorySessionStore {
    /// Creates a new, empty in-memory session store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, key: &SessionKey) -> Result<Option<Session>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(key).cloned())
    }

    async fn create(&self, session: Session) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.key.clone(), session);
        Ok(())
    }

    async fn update(&self, session: Session, expected: Level) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        match sessions.get(&session.key) {
            Some(stored) if stored.level == expected => {
                sessions.insert(session.key.clone(), session);
                Ok(())
            }
            Some(stored) => Err(VoteError::Conflict(format!(
                "session {} moved to level {} (expected {})",
                session.key, stored.level, expected
            ))),
            None => Err(VoteError::Conflict(format!(
                "session {} no longer exists",
                session.key
            ))),
        }
    }

    async fn expire_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_older_than(cutoff));
        Ok(before - sessions.len())
    }

    async fn level_counts(&self) -> Result<BTreeMap<Level, usize>> {
        let sessions = self.sessions.read().await;
        let mut counts = BTreeMap::new();
        for session in sessions.values() {
            *counts.entry(session.level).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn count_since(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .values()
            .filter(|session| !session.is_older_than(cutoff))
            .count())
    }
}

#[derive(Default)]
struct LedgerState {
    events: HashMap<EventId, Event>,
    categories: HashMap<CategoryId, Category>,
    nominees: HashMap<NomineeId, Nominee>,
    codes: HashMap<String, NomineeId>,
    payments: HashMap<String, PaymentRecord>,
    votes: Vec<VoteRecord>,
}

/// In-memory nominee ledger, payment records and vote records behind one lock.
///
/// Sharing a single `RwLock` is what makes [`VoteStore::commit`] atomic here:
/// the payment confirmation, the tally increment and the vote append all
/// happen under one write guard, after every check has passed.
#[derive(Default, Clone)]
pub struct InMemoryLedger {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NomineeLedger for InMemoryLedger {
    async fn get_by_code(&self, code: &str) -> Result<Option<Nominee>> {
        let state = self.state.read().await;
        Ok(state
            .codes
            .get(&normalize_code(code))
            .and_then(|id| state.nominees.get(id))
            .cloned())
    }

    async fn get_by_id(&self, id: NomineeId) -> Result<Option<Nominee>> {
        let state = self.state.read().await;
        Ok(state.nominees.get(&id).cloned())
    }

    async fn category(&self, id: CategoryId) -> Result<Option<Category>> {
        let state = self.state.read().await;
        Ok(state.categories.get(&id).cloned())
    }

    async fn event(&self, id: EventId) -> Result<Option<Event>> {
        let state = self.state.read().await;
        Ok(state.events.get(&id).cloned())
    }

    async fn upsert_event(&self, event: Event) -> Result<()> {
        let mut state = self.state.write().await;
        state.events.insert(event.id, event);
        Ok(())
    }

    async fn upsert_category(&self, category: Category) -> Result<()> {
        let mut state = self.state.write().await;
        state.categories.insert(category.id, category);
        Ok(())
    }

    async fn upsert_nominee(&self, mut nominee: Nominee) -> Result<()> {
        let mut state = self.state.write().await;
        let code = normalize_code(&nominee.code);
        if let Some(owner) = state.codes.get(&code)
            && *owner != nominee.id
        {
            return Err(VoteError::Conflict(format!(
                "nominee code {code} already belongs to nominee {owner}"
            )));
        }
        if let Some(existing) = state.nominees.get(&nominee.id) {
            nominee.votes = existing.votes;
            let old_code = normalize_code(&existing.code);
            state.codes.remove(&old_code);
        }
        nominee.code = code.clone();
        state.codes.insert(code, nominee.id);
        state.nominees.insert(nominee.id, nominee);
        Ok(())
    }
}

#[async_trait]
impl PaymentStore for InMemoryLedger {
    async fn insert(&self, record: PaymentRecord) -> Result<()> {
        let mut state = self.state.write().await;
        if state.payments.contains_key(&record.reference) {
            return Err(VoteError::Conflict(format!(
                "payment reference {} already exists",
                record.reference
            )));
        }
        state.payments.insert(record.reference.clone(), record);
        Ok(())
    }

    async fn get(&self, reference: &str) -> Result<Option<PaymentRecord>> {
        let state = self.state.read().await;
        Ok(state.payments.get(reference).cloned())
    }

    async fn pending(&self) -> Result<Vec<PaymentRecord>> {
        let state = self.state.read().await;
        let mut pending: Vec<PaymentRecord> = state
            .payments
            .values()
            .filter(|payment| payment.status == PaymentStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|payment| payment.created_at);
        Ok(pending)
    }

    async fn statistics(&self) -> Result<PaymentStats> {
        let state = self.state.read().await;
        Ok(state.payments.values().collect())
    }
}

#[async_trait]
impl VoteStore for InMemoryLedger {
    async fn commit(&self, settlement: Settlement) -> Result<VoteRecord> {
        let mut state = self.state.write().await;
        let LedgerState {
            nominees,
            payments,
            votes,
            ..
        } = &mut *state;

        let nominee = nominees.get_mut(&settlement.nominee_id).ok_or_else(|| {
            VoteError::NotFound(format!("nominee {}", settlement.nominee_id))
        })?;
        let payment = match settlement.payment_reference() {
            Some(reference) => {
                let payment = payments
                    .get_mut(reference)
                    .ok_or_else(|| VoteError::NotFound(format!("payment {reference}")))?;
                if payment.is_confirmed() {
                    return Err(VoteError::Conflict(format!(
                        "payment {reference} is already confirmed"
                    )));
                }
                Some(payment)
            }
            None => None,
        };

        // All checks passed; nothing below can fail.
        if let Some(payment) = payment {
            payment.confirm()?;
        }
        nominee.credit(settlement.votes);
        let id = votes.len() as u64 + 1;
        let record = settlement.into_record(id, Utc::now());
        votes.push(record.clone());
        Ok(record)
    }

    async fn votes_for(&self, nominee_id: NomineeId) -> Result<Vec<VoteRecord>> {
        let state = self.state.read().await;
        Ok(state
            .votes
            .iter()
            .filter(|vote| vote.nominee_id == nominee_id)
            .cloned()
            .collect())
    }

    async fn by_reference(&self, reference: &str) -> Result<Option<VoteRecord>> {
        let state = self.state.read().await;
        Ok(state
            .votes
            .iter()
            .find(|vote| vote.transaction_reference() == Some(reference))
            .cloned())
    }
}
