//! Veridian State - Key-value substrate and governance storage
//!
//! The `Storage` trait models the contract-scoped key-value store supplied by
//! the host; `EpochStore` layers the governance data model (epochs,
//! proposals, votes, consensus-sign records) on top of it.

pub mod epoch_store;
pub mod error;
pub mod storage;

pub use epoch_store::EpochStore;
pub use error::StateError;
pub use storage::{MemoryStorage, Storage};
