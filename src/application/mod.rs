//! Application layer: the USSD conversation, payment initiation, settlement
//! and periodic maintenance.
//!
//! Every service holds shared handles onto the storage ports and keeps no state
//! of its own between calls, so any instance can serve any request.

pub mod payments;
pub mod settlement;
pub mod sweeper;
pub mod ussd;
