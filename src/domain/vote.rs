use super::catalog::NomineeId;
use super::money::VoteCount;
use super::payment::PaymentRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type VoteId = u64;

/// Where a batch of votes came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum VoteOrigin {
    /// Recorded directly by an organizer, no payment involved.
    Organizer {
        phone_number: Option<String>,
        email: Option<String>,
    },
    /// Credited on a confirmed gateway payment.
    Payment {
        transaction_reference: String,
        phone_number: String,
    },
}

/// Immutable, append-only fact that `vote_count` votes went to a nominee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub id: VoteId,
    pub nominee_id: NomineeId,
    pub vote_count: VoteCount,
    #[serde(flatten)]
    pub origin: VoteOrigin,
    pub created_at: DateTime<Utc>,
}

impl VoteRecord {
    pub fn transaction_reference(&self) -> Option<&str> {
        match &self.origin {
            VoteOrigin::Payment {
                transaction_reference,
                ..
            } => Some(transaction_reference),
            VoteOrigin::Organizer { .. } => None,
        }
    }
}

/// A unit of work handed to [`VoteStore::commit`](super::ports::VoteStore::commit).
///
/// Committing a settlement credits the nominee and appends the vote record in one
/// step. A payment settlement additionally flips its payment record to confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub nominee_id: NomineeId,
    pub votes: VoteCount,
    pub origin: VoteOrigin,
}

impl Settlement {
    pub fn for_payment(payment: &PaymentRecord) -> Self {
        Self {
            nominee_id: payment.nominee_id,
            votes: payment.votes,
            origin: VoteOrigin::Payment {
                transaction_reference: payment.reference.clone(),
                phone_number: payment.msisdn.clone(),
            },
        }
    }

    pub fn manual(
        nominee_id: NomineeId,
        votes: VoteCount,
        phone_number: Option<String>,
        email: Option<String>,
    ) -> Self {
        Self {
            nominee_id,
            votes,
            origin: VoteOrigin::Organizer {
                phone_number,
                email,
            },
        }
    }

    /// Payment reference whose status must be confirmed by this settlement, if any.
    pub fn payment_reference(&self) -> Option<&str> {
        match &self.origin {
            VoteOrigin::Payment {
                transaction_reference,
                ..
            } => Some(transaction_reference),
            VoteOrigin::Organizer { .. } => None,
        }
    }

    pub fn into_record(self, id: VoteId, now: DateTime<Utc>) -> VoteRecord {
        VoteRecord {
            id,
            nominee_id: self.nominee_id,
            vote_count: self.votes,
            origin: self.origin,
            created_at: now,
        }
    }
}
