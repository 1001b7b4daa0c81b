use super::catalog::NomineeId;
use super::channel::Channel;
use super::money::VoteCount;
use serde::{Deserialize, Serialize};

/// Context attached to a payment so the gateway dashboard can trace it back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMetadata {
    pub nominee_id: NomineeId,
    pub votes: VoteCount,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiatePayment {
    pub email: String,
    /// Amount in the gateway's minor unit.
    pub amount_minor: u64,
    pub phone: String,
    pub channel: Channel,
    pub callback_url: String,
    pub metadata: PaymentMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Initiation {
    pub reference: String,
    pub authorization_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub success: bool,
    /// Provider status string as reported, e.g. `success`, `failed`, `abandoned`.
    pub raw_status: String,
    pub message: Option<String>,
}

pub const STATUS_SUCCESS: &str = "success";

impl Verification {
    /// Only the provider's `success` status counts as paid.
    pub fn from_status(raw_status: impl Into<String>, message: Option<String>) -> Self {
        let raw_status = raw_status.into();
        Self {
            success: raw_status == STATUS_SUCCESS,
            raw_status,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_success_status_is_paid() {
        assert!(Verification::from_status("success", None).success);
        for status in ["failed", "abandoned", "pending", "Success", ""] {
            let verification = Verification::from_status(status, Some("Declined".into()));
            assert!(!verification.success, "{status}");
            assert_eq!(verification.raw_status, status);
        }
    }
}
