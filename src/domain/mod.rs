//! Domain types and the ports the application layer drives.
//!
//! Nothing in here performs I/O; storage and the payment provider sit behind the
//! traits in [`ports`].

pub mod catalog;
pub mod channel;
pub mod gateway;
pub mod money;
pub mod payment;
pub mod ports;
pub mod session;
pub mod vote;
