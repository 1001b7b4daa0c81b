use crate::domain::catalog::{Category, Event, Nominee};
use crate::domain::ports::NomineeLedger;
use crate::error::{Result, VoteError};
use serde::Deserialize;
use std::collections::HashSet;
use std::io::Read;

/// Events, categories and nominees to load into the ledger, as JSON.
///
/// ```json
/// {
///   "events": [{ "id": 1, "name": "Awards", "cost": "2.00" }],
///   "categories": [{ "id": 3, "event_id": 1, "name": "Artiste of the Year" }],
///   "nominees": [{ "id": 7, "code": "AB12CD", "name": "Ama", "category_id": 3, "event_id": 1 }]
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub nominees: Vec<Nominee>,
}

impl Catalog {
    pub fn from_reader<R: Read>(source: R) -> Result<Self> {
        let catalog: Catalog = serde_json::from_reader(source)?;
        catalog.check_references()?;
        Ok(catalog)
    }

    fn check_references(&self) -> Result<()> {
        let events: HashSet<_> = self.events.iter().map(|event| event.id).collect();
        let categories: HashSet<_> = self.categories.iter().map(|c| c.id).collect();

        let mut errors = Vec::new();
        for category in &self.categories {
            if !events.contains(&category.event_id) {
                errors.push((
                    format!("category {}", category.id),
                    format!("unknown event {}", category.event_id),
                ));
            }
        }
        for nominee in &self.nominees {
            if !events.contains(&nominee.event_id) {
                errors.push((
                    format!("nominee {}", nominee.id),
                    format!("unknown event {}", nominee.event_id),
                ));
            }
            if !categories.contains(&nominee.category_id) {
                errors.push((
                    format!("nominee {}", nominee.id),
                    format!("unknown category {}", nominee.category_id),
                ));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(VoteError::fields(errors))
        }
    }

    /// Upserts everything into `ledger`, returning the number of nominees loaded.
    /// Existing vote tallies are left untouched.
    pub async fn seed(self, ledger: &dyn NomineeLedger) -> Result<usize> {
        for event in self.events {
            ledger.upsert_event(event).await?;
        }
        for category in self.categories {
            ledger.upsert_category(category).await?;
        }
        let count = self.nominees.len();
        for nominee in self.nominees {
            ledger.upsert_nominee(nominee).await?;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::in_memory::InMemoryLedger;

    const CATALOG: &str = r#"{
        "events": [{ "id": 1, "name": "Awards", "cost": "2.00" }],
        "categories": [{ "id": 3, "event_id": 1, "name": "Artiste of the Year" }],
        "nominees": [{ "id": 7, "code": "ab12cd", "name": "Ama", "category_id": 3, "organizer_id": 1 }]
    }"#;

    #[tokio::test]
    async fn test_seed_catalog() {
        let catalog = Catalog::from_reader(CATALOG.as_bytes()).unwrap();
        let ledger = InMemoryLedger::new();
        assert_eq!(catalog.seed(&ledger).await.unwrap(), 1);

        let nominee = ledger.get_by_code("AB12CD").await.unwrap().unwrap();
        assert_eq!(nominee.id, 7);
        assert_eq!(ledger.event(1).await.unwrap().unwrap().cost.to_string(), "2.00");
    }

    #[test]
    fn test_dangling_references_rejected() {
        let json = r#"{ "nominees": [{ "id": 7, "code": "X", "name": "Ama", "category_id": 3, "event_id": 1 }] }"#;
        let err = Catalog::from_reader(json.as_bytes()).unwrap_err();
        assert!(matches!(err, VoteError::Validation(_)));
        assert!(err.to_string().contains("unknown category 3"));
    }

    #[test]
    fn test_non_positive_cost_rejected() {
        let json = r#"{ "events": [{ "id": 1, "name": "Free", "cost": "0" }] }"#;
        assert!(Catalog::from_reader(json.as_bytes()).is_err());
    }
}
