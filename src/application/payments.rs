use crate::domain::catalog::NomineeId;
use crate::domain::channel::ChannelRouter;
use crate::domain::gateway::{InitiatePayment, Initiation, PaymentMetadata};
use crate::domain::money::VoteCount;
use crate::domain::payment::PaymentRecord;
use crate::domain::ports::{SharedNomineeLedger, SharedPaymentGateway, SharedPaymentStore};
use crate::error::{Result, VoteError};
use crate::infrastructure::Stores;
use chrono::Utc;
use tracing::{info, warn};

/// A request to buy `votes` votes for a nominee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub nominee_id: NomineeId,
    pub votes: u32,
    pub email: String,
    pub phone: String,
}

impl PaymentRequest {
    fn validate(&self) -> Result<VoteCount> {
        let mut errors = Vec::new();
        let votes = VoteCount::new(self.votes);
        if votes.is_err() {
            errors.push(("votes", "must be at least 1"));
        }
        if !is_email(&self.email) {
            errors.push(("email", "must be a valid email address"));
        }
        let phone = self.phone.trim().trim_start_matches('+');
        if phone.is_empty() || !phone.chars().all(|c| c.is_ascii_digit()) {
            errors.push(("phone", "must contain digits only"));
        }
        match votes {
            Ok(votes) if errors.is_empty() => Ok(votes),
            _ => Err(VoteError::fields(errors)),
        }
    }
}

fn is_email(value: &str) -> bool {
    match value.trim().split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

/// Starts gateway payments and records them as pending.
#[derive(Clone)]
pub struct PaymentService {
    ledger: SharedNomineeLedger,
    payments: SharedPaymentStore,
    gateway: SharedPaymentGateway,
    router: ChannelRouter,
    callback_url: String,
}

impl PaymentService {
    pub fn new(stores: &Stores, gateway: SharedPaymentGateway, callback_url: impl Into<String>) -> Self {
        Self {
            ledger: stores.ledger.clone(),
            payments: stores.payments.clone(),
            gateway,
            router: ChannelRouter::default(),
            callback_url: callback_url.into(),
        }
    }

    /// Prices the request, asks the gateway to start a collection and persists a
    /// pending record under the returned reference.
    ///
    /// Nothing is persisted when the gateway fails.
    pub async fn initiate(&self, request: PaymentRequest) -> Result<Initiation> {
        let votes = request.validate()?;
        let nominee = self
            .ledger
            .get_by_id(request.nominee_id)
            .await?
            .ok_or_else(|| VoteError::NotFound(format!("nominee {}", request.nominee_id)))?;
        let event = self
            .ledger
            .event(nominee.event_id)
            .await?
            .ok_or_else(|| VoteError::NotFound(format!("event {}", nominee.event_id)))?;

        let amount_minor = event.cost.times(votes).to_minor_units()?;
        let phone = request.phone.trim().to_string();
        let channel = self.router.route(&phone);

        let initiation = self
            .gateway
            .initiate(InitiatePayment {
                email: request.email.trim().to_string(),
                amount_minor,
                phone: phone.clone(),
                channel,
                callback_url: self.callback_url.clone(),
                metadata: PaymentMetadata {
                    nominee_id: nominee.id,
                    votes,
                    phone: phone.clone(),
                },
            })
            .await
            .inspect_err(|error| {
                warn!(nominee_id = nominee.id, %error, "payment initiation failed");
            })?;

        self.payments
            .insert(PaymentRecord::pending(
                initiation.reference.clone(),
                nominee.id,
                phone,
                votes,
                Utc::now(),
            ))
            .await?;

        info!(
            reference = %initiation.reference,
            nominee_id = nominee.id,
            votes = votes.get(),
            amount_minor,
            %channel,
            "payment initiated"
        );
        Ok(initiation)
    }
}
