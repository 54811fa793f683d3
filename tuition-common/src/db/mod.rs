//! Database schema and queries

pub mod init;
pub mod payments;
pub mod settings;

pub use init::*;
