//! Change tokens (ETags).
//!
//! A token is the SHA-224 hex digest of the compact JSON form of a value.
//! All hashed values use sorted maps, so equal content always serializes to
//! the same bytes and therefore to the same token.

use crate::error::{OneconfError, Result};
use serde::Serialize;
use sha2::{Digest, Sha224};

pub fn checksum_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha224::digest(bytes))
}

pub fn checksum_of<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let canonical = serde_json::to_vec(value)
        .map_err(|e| OneconfError::SerializationError(format!("Checksum input: {}", e)))?;
    Ok(checksum_bytes(&canonical))
}
