use super::catalog::NomineeId;
use super::money::VoteCount;
use crate::error::VoteError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PaymentStatus {
    Pending = 0,
    Confirmed = 1,
}

impl TryFrom<u8> for PaymentStatus {
    type Error = VoteError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PaymentStatus::Pending),
            1 => Ok(PaymentStatus::Confirmed),
            other => Err(VoteError::Validation(format!("Unknown payment status {other}"))),
        }
    }
}

impl From<PaymentStatus> for u8 {
    fn from(status: PaymentStatus) -> Self {
        status as u8
    }
}

/// One payment attempt, keyed by the gateway-issued reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub reference: String,
    pub nominee_id: NomineeId,
    pub msisdn: String,
    pub votes: VoteCount,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

impl PaymentRecord {
    pub fn pending(
        reference: impl Into<String>,
        nominee_id: NomineeId,
        msisdn: impl Into<String>,
        votes: VoteCount,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            reference: reference.into(),
            nominee_id,
            msisdn: msisdn.into(),
            votes,
            status: PaymentStatus::Pending,
            created_at: now,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == PaymentStatus::Confirmed
    }

    /// The one irreversible transition. Fails if the record was already confirmed.
    pub fn confirm(&mut self) -> Result<(), VoteError> {
        if self.is_confirmed() {
            return Err(VoteError::Conflict(format!(
                "payment {} is already confirmed",
                self.reference
            )));
        }
        self.status = PaymentStatus::Confirmed;
        Ok(())
    }
}

/// Aggregate figures over payment records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PaymentStats {
    pub total_transactions: u64,
    pub successful_transactions: u64,
    pub pending_transactions: u64,
    pub total_votes: u64,
    pub successful_votes: u64,
}

impl PaymentStats {
    pub fn record(&mut self, payment: &PaymentRecord) {
        let votes = u64::from(payment.votes);
        self.total_transactions += 1;
        self.total_votes += votes;
        match payment.status {
            PaymentStatus::Pending => self.pending_transactions += 1,
            PaymentStatus::Confirmed => {
                self.successful_transactions += 1;
                self.successful_votes += votes;
            }
        }
    }
}

impl<'a> FromIterator<&'a PaymentRecord> for PaymentStats {
    fn from_iter<I: IntoIterator<Item = &'a PaymentRecord>>(iter: I) -> Self {
        let mut stats = PaymentStats::default();
        for payment in iter {
            stats.record(payment);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(reference: &str, votes: u32) -> PaymentRecord {
        PaymentRecord::pending(
            reference,
            7,
            "233541234567",
            VoteCount::new(votes).unwrap(),
            Utc::now(),
        )
    }

    #[test]
    fn test_confirm_only_once() {
        let mut payment = record("REF1", 5);
        payment.confirm().unwrap();
        assert!(payment.is_confirmed());
        assert!(matches!(payment.confirm(), Err(VoteError::Conflict(_))));
        assert_eq!(payment.status, PaymentStatus::Confirmed);
    }

    #[test]
    fn test_stats_tally() {
        let mut confirmed = record("REF1", 5);
        confirmed.confirm().unwrap();
        let pending = record("REF2", 3);

        let stats: PaymentStats = [&confirmed, &pending].into_iter().collect();
        assert_eq!(stats.total_transactions, 2);
        assert_eq!(stats.successful_transactions, 1);
        assert_eq!(stats.pending_transactions, 1);
        assert_eq!(stats.total_votes, 8);
        assert_eq!(stats.successful_votes, 5);
    }

    #[test]
    fn test_status_serializes_as_integer() {
        let json = serde_json::to_value(record("REF1", 1)).unwrap();
        assert_eq!(json["status"], 0);
    }
}
