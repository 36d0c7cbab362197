use std::cmp::Ordering;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::CoreError;

/// Returns the current wall-clock time as milliseconds since Unix epoch.
pub fn physical_now() -> Result<u64, CoreError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .map_err(|_| CoreError::InvalidData("system clock before epoch".into()))
}

/// A 12-byte transition timestamp: 8 bytes wall_ms (big-endian u64) followed
/// by 4 bytes sequence (big-endian u32). All records written by one logical
/// transition share a single stamp, so history replay can group on exact
/// equality; the sequence disambiguates transitions within one millisecond.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct Stamp {
    wall_ms: u64,
    seq: u32,
}

impl Stamp {
    pub fn new(wall_ms: u64, seq: u32) -> Self {
        Self { wall_ms, seq }
    }

    pub fn wall_ms(&self) -> u64 {
        self.wall_ms
    }

    pub fn seq(&self) -> u32 {
        self.seq
    }

    pub fn to_bytes(&self) -> [u8; 12] {
        let mut buf = [0u8; 12];
        let (wall, seq) = buf.split_at_mut(8);
        wall.copy_from_slice(&self.wall_ms.to_be_bytes());
        seq.copy_from_slice(&self.seq.to_be_bytes());
        buf
    }

    pub fn from_bytes(bytes: &[u8; 12]) -> Self {
        let (wall, seq) = bytes.split_at(8);
        Self {
            wall_ms: u64::from_be_bytes(wall.try_into().unwrap()),
            seq: u32::from_be_bytes(seq.try_into().unwrap()),
        }
    }
}

impl Ord for Stamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_bytes().cmp(&other.to_bytes())
    }
}

impl PartialOrd for Stamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for Stamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.to_bytes())
    }
}

impl<'de> Deserialize<'de> for Stamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes: Vec<u8> = Deserialize::deserialize(deserializer)?;
        let arr: [u8; 12] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| serde::de::Error::invalid_length(v.len(), &"12 bytes"))?;
        Ok(Stamp::from_bytes(&arr))
    }
}

/// A clock that generates strictly increasing stamps, one per logical
/// transition. If the wall clock stalls or steps backwards, the sequence
/// counter keeps stamps distinct and ordered.
pub struct StampClock {
    wall_ms: u64,
    seq: u32,
}

impl StampClock {
    pub fn new() -> Self {
        Self { wall_ms: 0, seq: 0 }
    }

    pub fn tick(&mut self) -> Result<Stamp, CoreError> {
        let now = physical_now()?;

        let stamp = if now > self.wall_ms {
            Stamp::new(now, 0)
        } else {
            Stamp::new(self.wall_ms, self.seq + 1)
        };

        self.wall_ms = stamp.wall_ms;
        self.seq = stamp.seq;
        Ok(stamp)
    }
}

impl Default for StampClock {
    fn default() -> Self {
        Self::new()
    }
}
