use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid public key")]
    InvalidPublicKey,

    #[error("Public key does not derive address {0}")]
    AddressMismatch(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Invalid hash length")]
    InvalidHashLength,

    #[error("Invalid address length")]
    InvalidAddressLength,

    #[error("Hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}
