use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::CoreError;

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(Uuid::from_bytes(bytes))
            }

            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), &self.0.to_string()[..8])
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(RecordId);
uuid_id!(UserId);

/// Catalog key for a part type: an uppercase alphabetic prefix followed by a
/// seven-digit sequence number, e.g. `PN0000123`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartId(String);

impl PartId {
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let candidate = raw.trim().to_ascii_uppercase();
        let prefix_len = candidate.chars().take_while(|c| c.is_ascii_alphabetic()).count();
        let digits = &candidate[prefix_len..];
        if prefix_len < 2 || digits.len() != 7 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoreError::InvalidPartId(raw.to_string()));
        }
        Ok(Self(candidate))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn split(&self) -> (&str, u32) {
        let prefix_len = self.0.chars().take_while(|c| c.is_ascii_alphabetic()).count();
        let seq = self.0[prefix_len..].parse().unwrap_or(0);
        (&self.0[..prefix_len], seq)
    }

    /// Lowest unused sequence number among `existing`, formatted with this
    /// id's prefix. Fills gaps before extending past the maximum.
    pub fn next_sequential(prefix: &str, existing: &[PartId]) -> Result<PartId, CoreError> {
        let mut seqs: Vec<u32> = existing
            .iter()
            .filter(|p| p.split().0 == prefix)
            .map(|p| p.split().1)
            .collect();
        seqs.sort_unstable();
        seqs.dedup();
        let mut next = 1u32;
        for seq in seqs {
            if seq > next {
                break;
            }
            next = seq + 1;
        }
        PartId::parse(&format!("{prefix}{next:07}"))
    }
}

impl fmt::Debug for PartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PartId({})", self.0)
    }
}

impl fmt::Display for PartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unit serial number. Trimmed, never empty.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Serial(String);

impl Serial {
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidSerial(raw.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse a newline-separated serial sheet: trim each line, collapse
    /// runs of commas and spaces, drop blanks and duplicates, keeping
    /// first-seen order.
    pub fn parse_batch(sheet: &str) -> Vec<Serial> {
        let mut seen = Vec::new();
        for line in sheet.lines() {
            let collapsed = line
                .split([',', ' '])
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            if collapsed.is_empty() {
                continue;
            }
            let serial = Serial(collapsed);
            if !seen.contains(&serial) {
                seen.push(serial);
            }
        }
        seen
    }
}

impl fmt::Debug for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Serial({})", self.0)
    }
}

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tag of an asset or pallet a unit can be attached to. Same shape as a
/// part id: uppercase prefix plus a seven-digit sequence.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContainerTag(String);

impl ContainerTag {
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let candidate = raw.trim().to_ascii_uppercase();
        let prefix_len = candidate.chars().take_while(|c| c.is_ascii_alphabetic()).count();
        let digits = &candidate[prefix_len..];
        if prefix_len < 2 || digits.len() != 7 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoreError::InvalidContainerTag(raw.to_string()));
        }
        Ok(Self(candidate))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ContainerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContainerTag({})", self.0)
    }
}

impl fmt::Display for ContainerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
