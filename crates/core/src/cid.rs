//! Content identifier parsing.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length of a base58btc CIDv0 (`Qm...`).
const CID_V0_LEN: usize = 46;

/// Shortest CIDv1 we accept (multibase prefix + version + codec + a tiny multihash).
const CID_V1_MIN_LEN: usize = 8;

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// A content identifier in its textual form.
///
/// Only the multibase envelope is validated; decoding the multihash is left to
/// the network client. Two CIDs are equal iff their strings are identical.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Cid(String);

impl Cid {
    /// Parse and validate a CID string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(crate::Error::InvalidCid("CID cannot be empty".to_string()));
        }

        if s.starts_with("Qm") {
            if s.len() != CID_V0_LEN {
                return Err(crate::Error::InvalidCid(format!(
                    "CIDv0 must be {CID_V0_LEN} chars, got {}",
                    s.len()
                )));
            }
            check_alphabet(s, |c| BASE58_ALPHABET.contains(c))?;
            return Ok(Self(s.to_string()));
        }

        if s.len() < CID_V1_MIN_LEN {
            return Err(crate::Error::InvalidCid(format!("CID too short: {s}")));
        }

        let mut chars = s.chars();
        let prefix = chars.next().unwrap_or_default();
        let body = chars.as_str();
        match prefix {
            'b' => check_alphabet(body, |c| matches!(c, 'a'..='z' | '2'..='7'))?,
            'B' => check_alphabet(body, |c| matches!(c, 'A'..='Z' | '2'..='7'))?,
            'z' => check_alphabet(body, |c| BASE58_ALPHABET.contains(c))?,
            'f' => check_alphabet(body, |c| matches!(c, '0'..='9' | 'a'..='f'))?,
            'F' => check_alphabet(body, |c| matches!(c, '0'..='9' | 'A'..='F'))?,
            'k' => check_alphabet(body, |c| matches!(c, '0'..='9' | 'a'..='z'))?,
            'K' => check_alphabet(body, |c| matches!(c, '0'..='9' | 'A'..='Z'))?,
            other => {
                return Err(crate::Error::InvalidCid(format!(
                    "unsupported multibase prefix: {other}"
                )));
            }
        }

        Ok(Self(s.to_string()))
    }

    /// Get the CID string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is a legacy CIDv0.
    pub fn is_v0(&self) -> bool {
        self.0.starts_with("Qm")
    }
}

fn check_alphabet(body: &str, valid: impl Fn(char) -> bool) -> crate::Result<()> {
    match body.chars().find(|c| !valid(*c)) {
        Some(c) => Err(crate::Error::InvalidCid(format!(
            "invalid character in CID: {c}"
        ))),
        None => Ok(()),
    }
}

impl FromStr for Cid {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for Cid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cid({self})")
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
