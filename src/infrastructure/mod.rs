//! Storage backends and the payment provider adapter.

pub mod in_memory;
pub mod paystack;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;

use crate::domain::ports::{
    NomineeLedger, PaymentStore, SharedNomineeLedger, SharedPaymentStore, SharedSessionStore,
    SharedVoteStore, SessionStore, VoteStore,
};
use in_memory::{InMemoryLedger, InMemorySessionStore};
use std::sync::Arc;

/// Shared handles onto one storage backend, one per port.
///
/// The ledger, payment and vote handles must point at the same backend, since
/// a settlement commit touches all three.
#[derive(Clone)]
pub struct Stores {
    pub sessions: SharedSessionStore,
    pub ledger: SharedNomineeLedger,
    pub payments: SharedPaymentStore,
    pub votes: SharedVoteStore,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemorySessionStore::new()),
            Arc::new(InMemoryLedger::new()),
        )
    }

    pub fn new<S, L>(sessions: Arc<S>, ledger: Arc<L>) -> Self
    where
        S: SessionStore + 'static,
        L: NomineeLedger + PaymentStore + VoteStore + 'static,
    {
        Self {
            sessions,
            ledger: ledger.clone(),
            payments: ledger.clone(),
            votes: ledger,
        }
    }

    #[cfg(feature = "storage-rocksdb")]
    pub fn rocksdb(store: rocksdb::RocksDBStore) -> Self {
        let store = Arc::new(store);
        Self::new(store.clone(), store)
    }
}
