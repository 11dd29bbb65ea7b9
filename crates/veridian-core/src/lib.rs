//! Veridian Core - Core types, cryptography, and serialization
//!
//! This crate provides the foundational types for the Veridian validator
//! governance contract: content hashes, validator keys and addresses, and
//! the epoch / peer / consensus-sign data model.

pub mod crypto;
pub mod error;
pub mod serialize;
pub mod types;

pub use crypto::{hash_blake3, Address, Hash, KeyPair, PublicKey, SecretKey};
pub use error::CoreError;
pub use types::*;
