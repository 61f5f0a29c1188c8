/// Pyth Hermes price client.
pub mod hermes;

/// Ledger backed by the tournament program.
pub mod ledger;

pub use self::{hermes::HermesClient, ledger::ProgramLedger};
