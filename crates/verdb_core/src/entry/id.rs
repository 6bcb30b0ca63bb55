//! Entry identifier.

use crate::error::{CoreError, CoreResult};
use rand::RngCore;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Crockford base32 alphabet: ascending ASCII, so string order matches
/// numeric order.
const ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Length of the rendered identity string.
const ENCODED_LEN: usize = 26;

/// Unique identifier for an entry.
///
/// Entry IDs are 128-bit values with a 48-bit millisecond timestamp in the
/// high-order bits and 80 random bits below it, rendered as a fixed-length
/// 26-character Crockford base32 string. They are:
/// - Globally unique (collision probability negligible at 80 random bits)
/// - Immutable once assigned and never reused
/// - Time-sortable: ids whose time components come from a nondecreasing
///   source, such as a [`MonotonicClock`](crate::MonotonicClock) reading,
///   compare lexicographically in mint order, so sort-by-id approximates
///   sort-by-creation-time
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId([u8; 16]);

impl EntryId {
    /// Creates an entry ID from raw bytes.
    #[inline]
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Creates a new entry ID from the current wall-clock time.
    ///
    /// The wall clock can step backwards, so ids from consecutive calls
    /// are not guaranteed to sort in mint order; mint through
    /// [`EntryId::from_timestamp_ms`] with a monotonic reading where that
    /// matters.
    ///
    /// Panics only on catastrophic entropy-source failure, which is
    /// treated as fatal.
    #[must_use]
    pub fn new() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self::from_timestamp_ms(millis)
    }

    /// Creates an entry ID with an explicit millisecond timestamp.
    ///
    /// The random bits are still fresh; only the time component is fixed.
    /// Used for deterministic tests and for minting ids whose time
    /// component matches a monotonic clock reading.
    #[must_use]
    pub fn from_timestamp_ms(millis: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0] = (millis >> 40) as u8;
        bytes[1] = (millis >> 32) as u8;
        bytes[2] = (millis >> 24) as u8;
        bytes[3] = (millis >> 16) as u8;
        bytes[4] = (millis >> 8) as u8;
        bytes[5] = millis as u8;
        rand::thread_rng().fill_bytes(&mut bytes[6..]);
        Self(bytes)
    }

    /// Parses an entry ID from its 26-character base32 form.
    ///
    /// Decoding is case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::MalformedIdentity` if the input is not exactly
    /// 26 characters of the Crockford alphabet, or would overflow 128 bits.
    pub fn parse(input: &str) -> CoreResult<Self> {
        if input.len() != ENCODED_LEN {
            return Err(CoreError::malformed_identity(input));
        }
        let mut value: u128 = 0;
        for (i, c) in input.bytes().enumerate() {
            let digit = decode_char(c).ok_or_else(|| CoreError::malformed_identity(input))?;
            // 26 chars carry 130 bits; the first char may only use 3.
            if i == 0 && digit > 7 {
                return Err(CoreError::malformed_identity(input));
            }
            value = (value << 5) | u128::from(digit);
        }
        Ok(Self(value.to_be_bytes()))
    }

    /// Returns the raw bytes.
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Returns the millisecond timestamp encoded in the high 48 bits.
    #[must_use]
    pub fn timestamp_ms(&self) -> u64 {
        let mut millis = 0u64;
        for byte in &self.0[..6] {
            millis = (millis << 8) | u64::from(*byte);
        }
        millis
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_char(c: u8) -> Option<u8> {
    let c = c.to_ascii_uppercase();
    ALPHABET.iter().position(|&a| a == c).map(|p| p as u8)
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = u128::from_be_bytes(self.0);
        let mut out = [0u8; ENCODED_LEN];
        for (i, slot) in out.iter_mut().enumerate() {
            let shift = 5 * (ENCODED_LEN - 1 - i);
            *slot = ALPHABET[((value >> shift) & 0x1f) as usize];
        }
        // The alphabet is ASCII, so this cannot fail.
        f.write_str(std::str::from_utf8(&out).map_err(|_| fmt::Error)?)
    }
}

impl fmt::Debug for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryId({self})")
    }
}

impl Serialize for EntryId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntryId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(|_| D::Error::custom(format!("malformed entry id: {s:?}")))
    }
}
