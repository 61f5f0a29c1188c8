#![deny(missing_docs)]
#![deny(unreachable_pub)]

//! # Arena Solana Utils

/// Error type.
pub mod error;

/// Program trait.
pub mod program_trait;

/// Client traits.
pub mod client_traits;

/// Utils.
pub mod utils;

pub use crate::{
    error::Error,
    program_trait::{InstructionBuilder, Program, ProgramExt},
};

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;

pub use solana_rpc_client_api;
pub use solana_sdk;
