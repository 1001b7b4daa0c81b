use super::money::{Money, VoteCount};
use serde::{Deserialize, Serialize};

pub type EventId = u64;
pub type CategoryId = u64;
pub type NomineeId = u64;

/// An organizer's event. Every vote for any of its nominees costs `cost`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub name: String,
    pub cost: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub event_id: EventId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nominee {
    pub id: NomineeId,
    /// Short code voters type in a USSD session.
    pub code: String,
    pub name: String,
    pub category_id: CategoryId,
    #[serde(alias = "organizer_id")]
    pub event_id: EventId,
    /// Running tally. Only ever incremented through a settlement.
    #[serde(default)]
    pub votes: u64,
}

impl Nominee {
    pub fn credit(&mut self, votes: VoteCount) {
        self.votes = self.votes.saturating_add(u64::from(votes));
    }
}

/// Normalises a nominee code for lookup: trimmed, upper case.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nominee_accepts_organizer_id_alias() {
        let json = r#"{"id":7,"code":"AB12CD","name":"Ama","category_id":3,"organizer_id":1}"#;
        let nominee: Nominee = serde_json::from_str(json).unwrap();
        assert_eq!(nominee.event_id, 1);
        assert_eq!(nominee.votes, 0);
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("  ab12cd "), "AB12CD");
    }
}
