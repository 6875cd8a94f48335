use thiserror::Error;

/// Coarse classification of every runtime failure.
///
/// Module errors stay specific; callers that only need to decide how to
/// report a failure match on the kind instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A provider, proof or account does not exist.
    NotFound,
    /// The entity was already registered, submitted, verified or claimed.
    Conflict,
    /// Malformed address, out-of-range value or invalid parameter set.
    InvalidArgument,
    /// The caller is not allowed to perform the operation.
    Unauthorized,
    /// Store corruption or a failing collaborator. Never caused by user input.
    Internal,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Corrupted value under key {key}: {reason}")]
    Decode { key: String, reason: String },
}

impl StoreError {
    pub fn decode(key: &[u8], err: codec::Error) -> Self {
        StoreError::Decode {
            key: hex::encode(key),
            reason: err.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Internal
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Address cannot be empty")]
    Empty,

    #[error("Address is {0} bytes long, maximum is 255")]
    TooLong(usize),

    #[error("Address contains invalid character {0:?}")]
    InvalidCharacter(char),
}

impl AddressError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidArgument
    }
}
