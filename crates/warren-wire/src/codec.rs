//! Bincode encoding helpers for wire messages.

use serde::{de::DeserializeOwned, Serialize};

use crate::Result;

/// Serialize a message for network transmission.
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(msg)?)
}

/// Deserialize a message received from the network.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}
