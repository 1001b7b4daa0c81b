//! Transactional core of a pay-per-vote system: USSD voting sessions, gateway
//! payments and exactly-once crediting of votes.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
