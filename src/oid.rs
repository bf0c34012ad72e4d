//! ObjectId

use std::fmt;
use std::hash::{Hash, Hasher};

use hex::FromHexError;

/// Errors that can occur when parsing an [`ObjectId`] from a hex string.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The provided hex string does not decode to 12 bytes.
    #[error("ObjectId strings must be 12-byte hexadecimal strings")]
    InvalidLength,

    /// An error occurred parsing the hex string.
    #[error(transparent)]
    FromHex(#[from] FromHexError),
}

/// A wrapper around a raw 12-byte ObjectId:
///
/// * a 4-byte timestamp, seconds since the Unix epoch,
/// * a 5-byte random value,
/// * a 3-byte incrementing counter, initialized to a random value.
///
/// While BSON itself is little-endian, the timestamp and counter are
/// big-endian, most significant bytes first.
///
/// Equality compares all 12 bytes. Hashing uses only the trailing 8 bytes
/// (the random value and counter), which carry nearly all of the entropy;
/// the leading timestamp bytes are almost constant within one workload.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ObjectId {
    id: [u8; 12],
}

impl Hash for ObjectId {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut tail = [0u8; 8];
        tail.copy_from_slice(&self.id[4..12]);
        state.write_u64(u64::from_le_bytes(tail));
    }
}

impl ObjectId {
    /// Constructs an ObjectId from its raw byte representation.
    pub const fn from_bytes(bytes: [u8; 12]) -> ObjectId {
        ObjectId { id: bytes }
    }

    /// Creates an ObjectId from a 24-character hexadecimal string.
    pub fn parse_str(s: impl AsRef<str>) -> Result<ObjectId, Error> {
        let bytes: Vec<u8> = hex::decode(s.as_ref())?;
        let id: [u8; 12] = bytes.try_into().map_err(|_| Error::InvalidLength)?;
        Ok(ObjectId::from_bytes(id))
    }

    /// Returns the raw byte representation.
    pub const fn bytes(&self) -> [u8; 12] {
        self.id
    }

    /// Converts the ObjectId to its lowercase hex representation.
    pub fn to_hex(self) -> String {
        hex::encode(self.id)
    }
}

impl From<[u8; 12]> for ObjectId {
    fn from(bytes: [u8; 12]) -> Self {
        Self::from_bytes(bytes)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}
