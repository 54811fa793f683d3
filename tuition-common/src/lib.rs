//! # Tuition Common Library
//!
//! Shared code for the tuition payment ledger including:
//! - Month model and selectable-month derivation
//! - Roster reconciliation and report computation
//! - Database schema and queries
//! - Roster file storage
//! - Configuration loading
//! - Admin credential checks
//! - Remote repository sync queue

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod month;
pub mod roster;
pub mod sync;

pub use error::{Error, Result};
pub use ledger::{Ledger, PaymentStatus, RemainingPolicy};
pub use month::Month;
