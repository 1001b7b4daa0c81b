//! USSD voting conversation.
//!
//! [`advance`] interprets one turn against the session's level and says what
//! should happen next. [`UssdService`] loads and persists the session around it
//! and carries out the payment action.

use super::payments::{PaymentRequest, PaymentService};
use crate::domain::catalog::{Category, Event, Nominee, NomineeId};
use crate::domain::money::VoteCount;
use crate::domain::ports::{NomineeLedger, SharedNomineeLedger, SharedSessionStore};
use crate::domain::session::{Level, Session, SessionKey};
use crate::error::{Result, VoteError};
use crate::infrastructure::Stores;
use chrono::{TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

pub mod prompts {
    use crate::domain::catalog::{Category, Event, Nominee};
    use crate::domain::money::{Money, VoteCount};

    pub const WELCOME: &str = "Hello Welcome to AllVotesGh.\nPlease Enter Nominee's code";
    pub const NOMINEE_NOT_FOUND: &str = "Nominee not found. Please enter a valid nominee code.";
    pub const INVALID_VOTES: &str =
        "Invalid number of votes. Please enter a valid number of votes:";
    pub const INVALID_OPTION: &str = "Invalid option. Please enter 1 to confirm or 2 to cancel:";
    pub const CANCELLED: &str = "Vote cancelled.";
    pub const PROCESSING: &str =
        "Processing payment...\nApprove the mobile money prompt on your phone to complete your vote.";
    pub const PAYMENT_FAILED: &str =
        "Payment could not be initiated. Please try again.\n1: Confirm\n2: Cancel";
    pub const AWAITING_PAYMENT: &str = "Your payment is being processed.";
    pub const BUSY: &str = "Your request is already being processed. Please try again.";
    pub const UNAVAILABLE: &str = "We could not process your request. Please try again.";

    pub fn nominee_found(nominee: &Nominee, event: &Event) -> String {
        format!(
            "Nominee {} found.\nPlease Enter Number of Votes.\nCost per Vote: Ghc {}",
            nominee.name, event.cost
        )
    }

    pub fn confirm(
        votes: VoteCount,
        total: Money,
        nominee: &Nominee,
        category: &Category,
        event: &Event,
    ) -> String {
        format!(
            "Approve {votes} Votes at Ghc {total} for\n{}\n{}\n{}\n1: Confirm\n2: Cancel",
            nominee.name, category.name, event.name
        )
    }
}

/// Side effect the caller must carry out after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    InitiatePayment {
        nominee_id: NomineeId,
        votes: VoteCount,
        msisdn: String,
    },
}

/// Outcome of one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub prompt: String,
    pub next_level: Level,
    pub terminal: bool,
    pub action: Option<Action>,
    /// Session state to persist, if the turn changed it.
    pub update: Option<Session>,
}

impl Transition {
    fn stay(session: &Session, prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            next_level: session.level,
            terminal: false,
            action: None,
            update: None,
        }
    }

    fn end(session: &Session, prompt: impl Into<String>) -> Self {
        Self {
            terminal: true,
            ..Self::stay(session, prompt)
        }
    }

    fn to(session: Session, prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            next_level: session.level,
            terminal: false,
            action: None,
            update: Some(session),
        }
    }
}

struct NomineeDetails {
    nominee: Nominee,
    category: Category,
    event: Event,
}

async fn details(ledger: &dyn NomineeLedger, nominee: Nominee) -> Result<NomineeDetails> {
    let category = ledger
        .category(nominee.category_id)
        .await?
        .ok_or_else(|| VoteError::NotFound(format!("category {}", nominee.category_id)))?;
    let event = ledger
        .event(nominee.event_id)
        .await?
        .ok_or_else(|| VoteError::NotFound(format!("event {}", nominee.event_id)))?;
    Ok(NomineeDetails {
        nominee,
        category,
        event,
    })
}

fn session_nominee(session: &Session) -> Result<NomineeId> {
    session.nominee_id.ok_or_else(|| {
        VoteError::NotFound(format!("session {} has no nominee", session.key))
    })
}

/// Interprets `input` against the session's current level.
///
/// Bad input never fails: it re-prompts at the same level. Errors only come from
/// the ledger, or from a session whose stored state refers to missing data.
pub async fn advance(
    ledger: &dyn NomineeLedger,
    session: &Session,
    input: &str,
) -> Result<Transition> {
    let input = input.trim();
    match session.level {
        Level::CodeEntry => {
            let Some(nominee) = ledger.get_by_code(input).await? else {
                return Ok(Transition::stay(session, prompts::NOMINEE_NOT_FOUND));
            };
            let details = details(ledger, nominee).await?;
            let prompt = prompts::nominee_found(&details.nominee, &details.event);
            let next = session.clone().with_nominee(details.nominee.id)?;
            Ok(Transition::to(next, prompt))
        }
        Level::VoteEntry => {
            let Some(votes) = VoteCount::parse(input) else {
                return Ok(Transition::stay(session, prompts::INVALID_VOTES));
            };
            let nominee_id = session_nominee(session)?;
            let nominee = ledger
                .get_by_id(nominee_id)
                .await?
                .ok_or_else(|| VoteError::NotFound(format!("nominee {nominee_id}")))?;
            let details = details(ledger, nominee).await?;
            let total = details.event.cost.times(votes);
            let prompt = prompts::confirm(
                votes,
                total,
                &details.nominee,
                &details.category,
                &details.event,
            );
            Ok(Transition::to(session.clone().with_votes(votes)?, prompt))
        }
        Level::Confirmation => match input {
            "1" => {
                let nominee_id = session_nominee(session)?;
                let votes = session.votes.ok_or_else(|| {
                    VoteError::NotFound(format!("session {} has no vote count", session.key))
                })?;
                Ok(Transition {
                    prompt: prompts::PROCESSING.to_string(),
                    next_level: Level::AwaitingPayment,
                    terminal: false,
                    action: Some(Action::InitiatePayment {
                        nominee_id,
                        votes,
                        msisdn: session.key.msisdn.clone(),
                    }),
                    update: None,
                })
            }
            "2" => Ok(Transition::end(session, prompts::CANCELLED)),
            _ => Ok(Transition::stay(session, prompts::INVALID_OPTION)),
        },
        Level::AwaitingPayment => Ok(Transition::end(session, prompts::AWAITING_PAYMENT)),
    }
}

/// One inbound USSD request as delivered by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UssdRequest {
    pub session_id: String,
    pub msisdn: String,
    #[serde(default)]
    pub network: String,
    #[serde(default)]
    pub new_session: bool,
    #[serde(default)]
    pub user_data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UssdResponse {
    pub message: String,
    #[serde(rename = "continueSession")]
    pub continue_session: bool,
}

impl UssdResponse {
    fn prompt(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            continue_session: true,
        }
    }

    fn end(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            continue_session: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub active_sessions: usize,
    pub level_counts: BTreeMap<Level, usize>,
}

/// Handles USSD turns end to end.
pub struct UssdService {
    sessions: SharedSessionStore,
    ledger: SharedNomineeLedger,
    payments: PaymentService,
    email_domain: String,
}

impl UssdService {
    pub fn new(stores: &Stores, payments: PaymentService, email_domain: impl Into<String>) -> Self {
        Self {
            sessions: stores.sessions.clone(),
            ledger: stores.ledger.clone(),
            payments,
            email_domain: email_domain.into(),
        }
    }

    /// Always produces a response; failures turn into a retry prompt.
    pub async fn handle_turn(&self, request: UssdRequest) -> UssdResponse {
        let session_id = request.session_id.clone();
        match self.try_handle_turn(request).await {
            Ok(response) => response,
            Err(err) => {
                error!(%session_id, error = %err, "USSD turn failed");
                UssdResponse::prompt(prompts::UNAVAILABLE)
            }
        }
    }

    pub async fn try_handle_turn(&self, request: UssdRequest) -> Result<UssdResponse> {
        let key = SessionKey::new(request.session_id, request.msisdn);
        let existing = if request.new_session {
            None
        } else {
            self.sessions.get(&key).await?
        };

        let Some(session) = existing else {
            info!(session = %key, network = %request.network, "session started");
            self.sessions
                .create(Session::new(key, request.network, Utc::now()))
                .await?;
            return Ok(UssdResponse::prompt(prompts::WELCOME));
        };

        let transition = advance(self.ledger.as_ref(), &session, &request.user_data).await?;
        debug!(
            session = %session.key,
            from = %session.level,
            to = %transition.next_level,
            "USSD turn"
        );

        if let Some(Action::InitiatePayment {
            nominee_id,
            votes,
            msisdn,
        }) = transition.action
        {
            return self.start_payment(session, nominee_id, votes, msisdn).await;
        }

        if let Some(next) = transition.update
            && let Err(err) = self.sessions.update(next, session.level).await
        {
            return match err {
                VoteError::Conflict(reason) => {
                    warn!(session = %session.key, %reason, "concurrent turn rejected");
                    Ok(UssdResponse::prompt(prompts::BUSY))
                }
                other => Err(other),
            };
        }

        Ok(if transition.terminal {
            UssdResponse::end(transition.prompt)
        } else {
            UssdResponse::prompt(transition.prompt)
        })
    }

    /// Claims the session (level 3 to 4) before anything leaves the process, so
    /// a duplicate confirm loses the compare-and-set and starts no payment.
    async fn start_payment(
        &self,
        session: Session,
        nominee_id: NomineeId,
        votes: VoteCount,
        msisdn: String,
    ) -> Result<UssdResponse> {
        let claimed = session.claim_payment()?;
        if let Err(err) = self.sessions.update(claimed.clone(), Level::Confirmation).await {
            return match err {
                VoteError::Conflict(reason) => {
                    warn!(session = %claimed.key, %reason, "duplicate confirm rejected");
                    Ok(UssdResponse::prompt(prompts::BUSY))
                }
                other => Err(other),
            };
        }

        let request = PaymentRequest {
            nominee_id,
            votes: votes.get(),
            email: format!("{msisdn}@{}", self.email_domain),
            phone: msisdn,
        };
        let initiation = match self.payments.initiate(request).await {
            Ok(initiation) => initiation,
            Err(err) => {
                self.release(&claimed).await?;
                return match err {
                    VoteError::Gateway(err) => {
                        warn!(session = %claimed.key, error = %err, "payment not started, staying at confirmation");
                        Ok(UssdResponse::prompt(prompts::PAYMENT_FAILED))
                    }
                    other => Err(other),
                };
            }
        };

        let key = claimed.key.clone();
        let next = claimed.with_reference(initiation.reference.clone())?;
        match self.sessions.update(next, Level::AwaitingPayment).await {
            Ok(()) => {}
            // Swept meanwhile; the payment still settles by reference.
            Err(VoteError::Conflict(reason)) => {
                warn!(session = %key, reference = %initiation.reference, %reason, "session gone before reference was stored");
            }
            Err(err) => return Err(err),
        }
        Ok(UssdResponse::prompt(prompts::PROCESSING))
    }

    async fn release(&self, claimed: &Session) -> Result<()> {
        let released = claimed.clone().release_payment()?;
        match self.sessions.update(released, Level::AwaitingPayment).await {
            Ok(()) => Ok(()),
            Err(VoteError::Conflict(reason)) => {
                warn!(session = %claimed.key, %reason, "claimed session changed before release");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    pub async fn statistics(&self, days: i64) -> Result<SessionStats> {
        let cutoff = TimeDelta::try_days(days)
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .ok_or_else(|| {
                VoteError::Validation(format!("statistics window of {days} days is out of range"))
            })?;
        Ok(SessionStats {
            active_sessions: self.sessions.count_since(cutoff).await?,
            level_counts: self.sessions.level_counts().await?,
        })
    }
}
