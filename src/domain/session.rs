use super::catalog::NomineeId;
use super::money::VoteCount;
use crate::error::VoteError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a USSD conversation in the voting menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Level {
    CodeEntry = 1,
    VoteEntry = 2,
    Confirmation = 3,
    AwaitingPayment = 4,
}

impl Level {
    pub const ALL: [Level; 4] = [
        Level::CodeEntry,
        Level::VoteEntry,
        Level::Confirmation,
        Level::AwaitingPayment,
    ];

    pub fn number(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Level {
    type Error = VoteError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Level::CodeEntry),
            2 => Ok(Level::VoteEntry),
            3 => Ok(Level::Confirmation),
            4 => Ok(Level::AwaitingPayment),
            other => Err(VoteError::Validation(format!("Unknown session level {other}"))),
        }
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> Self {
        level.number()
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.number().fmt(f)
    }
}

/// Canonical identity of a session: the provider's session id together with the
/// phone number driving it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey {
    pub session_id: String,
    pub msisdn: String,
}

impl SessionKey {
    pub fn new(session_id: impl Into<String>, msisdn: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            msisdn: msisdn.into(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.session_id, self.msisdn)
    }
}

/// Externalised state of one USSD conversation.
///
/// Sessions only move forward one level at a time. The transition helpers below
/// consume the session and refuse to run from any level but their source level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub key: SessionKey,
    pub level: Level,
    pub nominee_id: Option<NomineeId>,
    pub votes: Option<VoteCount>,
    /// Network hint supplied by the USSD provider.
    pub network: String,
    /// Gateway reference, once a payment was initiated from this session.
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(key: SessionKey, network: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            key,
            level: Level::CodeEntry,
            nominee_id: None,
            votes: None,
            network: network.into(),
            reference: None,
            created_at: now,
        }
    }

    pub fn with_nominee(self, nominee_id: NomineeId) -> Result<Self, VoteError> {
        self.expect_level(Level::CodeEntry)?;
        Ok(Self {
            level: Level::VoteEntry,
            nominee_id: Some(nominee_id),
            ..self
        })
    }

    pub fn with_votes(self, votes: VoteCount) -> Result<Self, VoteError> {
        self.expect_level(Level::VoteEntry)?;
        Ok(Self {
            level: Level::Confirmation,
            votes: Some(votes),
            ..self
        })
    }

    /// Moves a confirmed session to level 4 before any payment exists, so only
    /// one turn can go on to start the payment.
    pub fn claim_payment(self) -> Result<Self, VoteError> {
        self.expect_level(Level::Confirmation)?;
        Ok(Self {
            level: Level::AwaitingPayment,
            reference: None,
            ..self
        })
    }

    /// Hands a claimed session back to confirmation after the payment could not
    /// be started.
    pub fn release_payment(self) -> Result<Self, VoteError> {
        self.expect_level(Level::AwaitingPayment)?;
        if let Some(reference) = &self.reference {
            return Err(VoteError::Conflict(format!(
                "session {} already holds payment {reference}",
                self.key
            )));
        }
        Ok(Self {
            level: Level::Confirmation,
            ..self
        })
    }

    pub fn with_reference(self, reference: impl Into<String>) -> Result<Self, VoteError> {
        self.expect_level(Level::AwaitingPayment)?;
        Ok(Self {
            reference: Some(reference.into()),
            ..self
        })
    }

    pub fn is_older_than(&self, cutoff: DateTime<Utc>) -> bool {
        self.created_at < cutoff
    }

    fn expect_level(&self, level: Level) -> Result<(), VoteError> {
        if self.level == level {
            Ok(())
        } else {
            Err(VoteError::Conflict(format!(
                "session {} is at level {}, expected {}",
                self.key, self.level, level
            )))
        }
    }
}
