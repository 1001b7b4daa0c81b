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
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const CF_SESSIONS: &str = "sessions";
pub const CF_EVENTS: &str = "events";
pub const CF_CATEGORIES: &str = "categories";
pub const CF_NOMINEES: &str = "nominees";
/// Nominee code -> nominee id.
pub const CF_NOMINEE_CODES: &str = "nominee_codes";
pub const CF_PAYMENTS: &str = "payments";
pub const CF_VOTES: &str = "votes";
/// Transaction reference -> vote id.
pub const CF_VOTE_REFERENCES: &str = "vote_references";
pub const CF_META: &str = "meta";

const ALL_CFS: [&str; 9] = [
    CF_SESSIONS,
    CF_EVENTS,
    CF_CATEGORIES,
    CF_NOMINEES,
    CF_NOMINEE_CODES,
    CF_PAYMENTS,
    CF_VOTES,
    CF_VOTE_REFERENCES,
    CF_META,
];

const NEXT_VOTE_ID: &[u8] = b"next_vote_id";

/// A persistent store implementing every storage port on top of RocksDB.
///
/// Each entity type lives in its own column family, serialized as JSON.
/// Read-check-write sequences (conditional session updates, settlements) are
/// serialized through `write_lock` and land in a single `WriteBatch`, so a
/// settlement is either fully on disk or not at all.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path, creating any
    /// missing column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect::<Vec<_>>();
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| VoteError::Persistence(format!("column family {name} not found")))
    }

    fn read<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        match self.db.get_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf: &str) -> Result<Vec<(Box<[u8]>, T)>> {
        let mut items = Vec::new();
        for item in self.db.iterator_cf(self.cf(cf)?, IteratorMode::Start) {
            let (key, value) = item?;
            items.push((key, serde_json::from_slice(&value)?));
        }
        Ok(items)
    }

    fn stage<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf: &str,
        key: &[u8],
        value: &T,
    ) -> Result<()> {
        batch.put_cf(self.cf(cf)?, key, serde_json::to_vec(value)?);
        Ok(())
    }

    fn next_vote_id(&self) -> Result<u64> {
        let current = self
            .db
            .get_cf(self.cf(CF_META)?, NEXT_VOTE_ID)?
            .map(|bytes| {
                <[u8; 8]>::try_from(bytes.as_slice())
                    .map(u64::from_be_bytes)
                    .map_err(|_| VoteError::Persistence("corrupt vote id counter".to_string()))
            })
            .transpose()?;
        Ok(current.unwrap_or(1))
    }
}

fn session_key(key: &SessionKey) -> Vec<u8> {
    format!("{}\u{0}{}", key.session_id, key.msisdn).into_bytes()
}

#[async_trait]
impl SessionStore for RocksDBStore {
    async fn get(&self, key: &SessionKey) -> Result<Option<Session>> {
        self.read(CF_SESSIONS, &session_key(key))
    }

    async fn create(&self, session: Session) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let value = serde_json::to_vec(&session)?;
        self.db
            .put_cf(self.cf(CF_SESSIONS)?, session_key(&session.key), value)?;
        Ok(())
    }

    async fn update(&self, session: Session, expected: Level) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let key = session_key(&session.key);
        match self.read::<Session>(CF_SESSIONS, &key)? {
            Some(stored) if stored.level == expected => {
                let value = serde_json::to_vec(&session)?;
                self.db.put_cf(self.cf(CF_SESSIONS)?, key, value)?;
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
        let _guard = self.write_lock.lock().await;
        let cf = self.cf(CF_SESSIONS)?;
        let mut batch = WriteBatch::default();
        let mut removed = 0;
        for (key, session) in self.scan::<Session>(CF_SESSIONS)? {
            if session.is_older_than(cutoff) {
                batch.delete_cf(cf, key);
                removed += 1;
            }
        }
        self.db.write(batch)?;
        Ok(removed)
    }

    async fn level_counts(&self) -> Result<BTreeMap<Level, usize>> {
        let mut counts = BTreeMap::new();
        for (_, session) in self.scan::<Session>(CF_SESSIONS)? {
            *counts.entry(session.level).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn count_since(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        Ok(self
            .scan::<Session>(CF_SESSIONS)?
            .into_iter()
            .filter(|(_, session)| !session.is_older_than(cutoff))
            .count())
    }
}

#[async_trait]
impl NomineeLedger for RocksDBStore {
    async fn get_by_code(&self, code: &str) -> Result<Option<Nominee>> {
        let Some(id) = self.read::<NomineeId>(CF_NOMINEE_CODES, normalize_code(code).as_bytes())?
        else {
            return Ok(None);
        };
        self.read(CF_NOMINEES, &id.to_be_bytes())
    }

    async fn get_by_id(&self, id: NomineeId) -> Result<Option<Nominee>> {
        self.read(CF_NOMINEES, &id.to_be_bytes())
    }

    async fn category(&self, id: CategoryId) -> Result<Option<Category>> {
        self.read(CF_CATEGORIES, &id.to_be_bytes())
    }

    async fn event(&self, id: EventId) -> Result<Option<Event>> {
        self.read(CF_EVENTS, &id.to_be_bytes())
    }

    async fn upsert_event(&self, event: Event) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let value = serde_json::to_vec(&event)?;
        self.db
            .put_cf(self.cf(CF_EVENTS)?, event.id.to_be_bytes(), value)?;
        Ok(())
    }

    async fn upsert_category(&self, category: Category) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let value = serde_json::to_vec(&category)?;
        self.db
            .put_cf(self.cf(CF_CATEGORIES)?, category.id.to_be_bytes(), value)?;
        Ok(())
    }

    async fn upsert_nominee(&self, mut nominee: Nominee) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let code = normalize_code(&nominee.code);
        if let Some(owner) = self.read::<NomineeId>(CF_NOMINEE_CODES, code.as_bytes())?
            && owner != nominee.id
        {
            return Err(VoteError::Conflict(format!(
                "nominee code {code} already belongs to nominee {owner}"
            )));
        }

        let id_key = nominee.id.to_be_bytes();
        let mut batch = WriteBatch::default();
        if let Some(existing) = self.read::<Nominee>(CF_NOMINEES, &id_key)? {
            nominee.votes = existing.votes;
            batch.delete_cf(
                self.cf(CF_NOMINEE_CODES)?,
                normalize_code(&existing.code).as_bytes(),
            );
        }
        nominee.code = code;
        self.stage(&mut batch, CF_NOMINEE_CODES, nominee.code.as_bytes(), &nominee.id)?;
        self.stage(&mut batch, CF_NOMINEES, &id_key, &nominee)?;
        self.db.write(batch)?;
        Ok(())
    }
}

#[async_trait]
impl PaymentStore for RocksDBStore {
    async fn insert(&self, record: PaymentRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let key = record.reference.as_bytes();
        if self.db.get_pinned_cf(self.cf(CF_PAYMENTS)?, key)?.is_some() {
            return Err(VoteError::Conflict(format!(
                "payment reference {} already exists",
                record.reference
            )));
        }
        let value = serde_json::to_vec(&record)?;
        self.db.put_cf(self.cf(CF_PAYMENTS)?, key, value)?;
        Ok(())
    }

    async fn get(&self, reference: &str) -> Result<Option<PaymentRecord>> {
        self.read(CF_PAYMENTS, reference.as_bytes())
    }

    async fn pending(&self) -> Result<Vec<PaymentRecord>> {
        let mut pending: Vec<PaymentRecord> = self
            .scan::<PaymentRecord>(CF_PAYMENTS)?
            .into_iter()
            .map(|(_, payment)| payment)
            .filter(|payment| payment.status == PaymentStatus::Pending)
            .collect();
        pending.sort_by_key(|payment| payment.created_at);
        Ok(pending)
    }

    async fn statistics(&self) -> Result<PaymentStats> {
        let payments = self.scan::<PaymentRecord>(CF_PAYMENTS)?;
        Ok(payments.iter().map(|(_, payment)| payment).collect())
    }
}

#[async_trait]
impl VoteStore for RocksDBStore {
    async fn commit(&self, settlement: Settlement) -> Result<VoteRecord> {
        let _guard = self.write_lock.lock().await;
        let nominee_key = settlement.nominee_id.to_be_bytes();
        let mut nominee = self
            .read::<Nominee>(CF_NOMINEES, &nominee_key)?
            .ok_or_else(|| VoteError::NotFound(format!("nominee {}", settlement.nominee_id)))?;

        let mut batch = WriteBatch::default();
        if let Some(reference) = settlement.payment_reference() {
            let mut payment = self
                .read::<PaymentRecord>(CF_PAYMENTS, reference.as_bytes())?
                .ok_or_else(|| VoteError::NotFound(format!("payment {reference}")))?;
            payment.confirm()?;
            self.stage(&mut batch, CF_PAYMENTS, reference.as_bytes(), &payment)?;
        }

        nominee.credit(settlement.votes);
        self.stage(&mut batch, CF_NOMINEES, &nominee_key, &nominee)?;

        let id = self.next_vote_id()?;
        batch.put_cf(self.cf(CF_META)?, NEXT_VOTE_ID, (id + 1).to_be_bytes());
        let record = settlement.into_record(id, Utc::now());
        if let Some(reference) = record.transaction_reference() {
            self.stage(&mut batch, CF_VOTE_REFERENCES, reference.as_bytes(), &id)?;
        }
        self.stage(&mut batch, CF_VOTES, &id.to_be_bytes(), &record)?;

        self.db.write(batch)?;
        Ok(record)
    }

    async fn votes_for(&self, nominee_id: NomineeId) -> Result<Vec<VoteRecord>> {
        Ok(self
            .scan::<VoteRecord>(CF_VOTES)?
            .into_iter()
            .map(|(_, vote)| vote)
            .filter(|vote| vote.nominee_id == nominee_id)
            .collect())
    }

    async fn by_reference(&self, reference: &str) -> Result<Option<VoteRecord>> {
        let Some(id) = self.read::<u64>(CF_VOTE_REFERENCES, reference.as_bytes())? else {
            return Ok(None);
        };
        self.read(CF_VOTES, &id.to_be_bytes())
    }
}
