//! Event Courier - Transactional Outbox Engine
//!
//! Reliable event publication: domain mutations and the outbox records
//! describing their events commit in one database transaction, and a
//! background relay delivers the records to the message broker with
//! bounded retries and quarantine.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
