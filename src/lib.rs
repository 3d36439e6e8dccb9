pub mod actions;
pub mod config;
pub mod encounter;
pub mod error;
pub mod events;
pub mod executor;
pub mod ledger;
pub mod overrides;
pub mod replica;
pub mod sync;
pub mod types;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use crate::{
    actions::{
        GameClient,
        ThrowOutcome,
    },
    config::ClientConfig,
    error::Error,
};

pub type Result<T> = core::result::Result<T, Error>;
