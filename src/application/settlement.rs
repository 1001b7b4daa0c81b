use crate::domain::catalog::NomineeId;
use crate::domain::money::VoteCount;
use crate::domain::payment::PaymentRecord;
use crate::domain::ports::{
    SharedNomineeLedger, SharedPaymentGateway, SharedPaymentStore, SharedVoteStore,
};
use crate::domain::vote::{Settlement, VoteRecord};
use crate::error::{Result, VoteError};
use crate::infrastructure::Stores;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Result of a verification-driven settlement attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// This call credited the votes.
    Settled(VoteRecord),
    /// Votes were credited earlier, possibly by a concurrent call.
    AlreadySettled,
    /// The gateway does not (yet) report the payment as successful.
    NotPaid {
        raw_status: String,
        message: Option<String>,
    },
}

impl SettlementOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, SettlementOutcome::NotPaid { .. })
    }

    pub fn message(&self) -> String {
        match self {
            SettlementOutcome::Settled(_) => "Payment verified successfully".to_string(),
            SettlementOutcome::AlreadySettled => "Payment already verified".to_string(),
            SettlementOutcome::NotPaid {
                raw_status,
                message,
            } => match message {
                Some(message) => format!("Payment not successful ({raw_status}): {message}"),
                None => format!("Payment not successful ({raw_status})"),
            },
        }
    }
}

/// Votes recorded directly by an organizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualVote {
    pub nominee_id: NomineeId,
    pub votes: u32,
    pub phone_number: Option<String>,
    pub email: Option<String>,
}

/// Tally held on the nominee next to the sum of its vote records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub nominee_id: NomineeId,
    pub counter: u64,
    pub recorded: u64,
}

impl Reconciliation {
    pub fn is_consistent(&self) -> bool {
        self.counter == self.recorded
    }
}

/// The only component that credits votes.
///
/// Payment settlement is idempotent per reference: a confirmed record short
/// circuits, and the store's compare-and-set on the payment status decides the
/// winner when two verifications race. The manual path has no such key.
#[derive(Clone)]
pub struct SettlementEngine {
    ledger: SharedNomineeLedger,
    payments: SharedPaymentStore,
    votes: SharedVoteStore,
    gateway: SharedPaymentGateway,
}

impl SettlementEngine {
    pub fn new(stores: &Stores, gateway: SharedPaymentGateway) -> Self {
        Self {
            ledger: stores.ledger.clone(),
            payments: stores.payments.clone(),
            votes: stores.votes.clone(),
            gateway,
        }
    }

    /// Verifies `reference` with the gateway and, if paid, credits its votes.
    ///
    /// Safe to call any number of times, concurrently or not. Gateway and storage
    /// failures leave the payment pending.
    pub async fn settle_by_payment(&self, reference: &str) -> Result<SettlementOutcome> {
        let payment = self
            .payments
            .get(reference)
            .await?
            .ok_or_else(|| VoteError::NotFound(format!("payment reference {reference}")))?;

        if payment.is_confirmed() {
            debug!(reference, "payment already confirmed");
            return Ok(SettlementOutcome::AlreadySettled);
        }

        let verification = self.gateway.verify(reference).await.inspect_err(|error| {
            warn!(reference, %error, "payment verification failed");
        })?;
        if !verification.success {
            debug!(reference, status = %verification.raw_status, "payment not successful yet");
            return Ok(SettlementOutcome::NotPaid {
                raw_status: verification.raw_status,
                message: verification.message,
            });
        }

        match self.votes.commit(Settlement::for_payment(&payment)).await {
            Ok(record) => {
                info!(
                    reference,
                    nominee_id = record.nominee_id,
                    votes = record.vote_count.get(),
                    vote_id = record.id,
                    "payment settled"
                );
                Ok(SettlementOutcome::Settled(record))
            }
            Err(VoteError::Conflict(reason)) => {
                debug!(reference, %reason, "settlement race lost");
                Ok(SettlementOutcome::AlreadySettled)
            }
            Err(error) => {
                warn!(reference, %error, "settlement rolled back");
                Err(error)
            }
        }
    }

    /// Credits votes recorded by an organizer. Resubmitting counts them again.
    pub async fn settle_manually(&self, vote: ManualVote) -> Result<VoteRecord> {
        let votes = VoteCount::new(vote.votes)?;
        if self.ledger.get_by_id(vote.nominee_id).await?.is_none() {
            return Err(VoteError::NotFound(format!("nominee {}", vote.nominee_id)));
        }

        let record = self
            .votes
            .commit(Settlement::manual(
                vote.nominee_id,
                votes,
                non_empty(vote.phone_number),
                non_empty(vote.email),
            ))
            .await?;
        info!(
            nominee_id = record.nominee_id,
            votes = votes.get(),
            vote_id = record.id,
            "manual votes recorded"
        );
        Ok(record)
    }

    pub async fn reconcile(&self, nominee_id: NomineeId) -> Result<Reconciliation> {
        let nominee = self
            .ledger
            .get_by_id(nominee_id)
            .await?
            .ok_or_else(|| VoteError::NotFound(format!("nominee {nominee_id}")))?;
        let recorded = self
            .votes
            .votes_for(nominee_id)
            .await?
            .iter()
            .map(|vote| u64::from(vote.vote_count))
            .sum();
        Ok(Reconciliation {
            nominee_id,
            counter: nominee.votes,
            recorded,
        })
    }

    pub async fn pending(&self) -> Result<Vec<PaymentRecord>> {
        self.payments.pending().await
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
