use std::{fmt, str::FromStr};

use codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::error::AddressError;

const MAX_ADDRESS_LEN: usize = 255;

/// An already-authenticated account address.
///
/// Accepts ASCII letters, digits, `_` and `-`, up to 255 bytes.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn new(raw: impl Into<String>) -> Result<Self, AddressError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(AddressError::Empty);
        }
        if raw.len() > MAX_ADDRESS_LEN {
            return Err(AddressError::TooLong(raw.len()));
        }
        if let Some(c) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        {
            return Err(AddressError::InvalidCharacter(c));
        }
        Ok(Address(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length-prefixed key segment, so that an address followed by another
    /// key component can never be confused with a longer address.
    pub fn key_segment(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.0.len() + 1);
        out.push(self.0.len() as u8);
        out.extend_from_slice(self.0.as_bytes());
        out
    }

    /// Inverse of [`Address::key_segment`]: the address and the remaining bytes.
    pub fn from_key_segment(bytes: &[u8]) -> Option<(Address, &[u8])> {
        let (&len, rest) = bytes.split_first()?;
        let len = len as usize;
        if rest.len() < len {
            return None;
        }
        let raw = std::str::from_utf8(&rest[..len]).ok()?;
        Some((Address(raw.to_owned()), &rest[len..]))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::new(s)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Address::new(value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}
