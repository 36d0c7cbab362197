use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;
use crate::ids::{ContainerTag, PartId, RecordId, Serial, UserId};
use crate::stamp::Stamp;

/// Symbolic place a unit sits at: a named kiosk, a fixed shelf, a holder's
/// inventory, or (for retired units) the terminal location matching the
/// disposition. Kiosk names are dynamic, so this stays an open string type
/// with constants for the fixed places.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location(String);

impl Location {
    pub const TECH_INVENTORY: &'static str = "Tech Inventory";
    pub const CHECK_IN_QUEUE: &'static str = "Check In Queue";
    pub const ALL_TECHS: &'static str = "All Techs";
    pub const TESTING_CENTER: &'static str = "Testing Center";
    pub const DRIVE_WIPE_SHELF: &'static str = "Drive Wipe Shelf";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn tech_inventory() -> Self {
        Self(Self::TECH_INVENTORY.into())
    }

    pub fn check_in_queue() -> Self {
        Self(Self::CHECK_IN_QUEUE.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Location({})", self.0)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who holds a unit: a specific user, or one of the shared pools.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Holder {
    User(UserId),
    AllTechs,
    Testing,
}

impl Holder {
    pub fn encode(&self) -> String {
        match self {
            Self::User(id) => id.to_string(),
            Self::AllTechs => "all".into(),
            Self::Testing => "testing".into(),
        }
    }

    pub fn decode(s: &str) -> Result<Self, CoreError> {
        match s {
            "all" => Ok(Self::AllTechs),
            "testing" => Ok(Self::Testing),
            other => other
                .parse()
                .map(|u| Self::User(UserId::from_uuid(u)))
                .map_err(|_| CoreError::InvalidData(format!("bad holder: {other}"))),
        }
    }

    pub fn as_user(&self) -> Option<UserId> {
        match self {
            Self::User(id) => Some(*id),
            _ => None,
        }
    }
}

/// Terminal exit from the trackable population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Disposition {
    Consumed,
    Sold,
    Lost,
    Broken,
    Deleted,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Consumed => "consumed",
            Self::Sold => "sold",
            Self::Lost => "lost",
            Self::Broken => "broken",
            Self::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "consumed" => Ok(Self::Consumed),
            "sold" => Ok(Self::Sold),
            "lost" => Ok(Self::Lost),
            "broken" => Ok(Self::Broken),
            "deleted" => Ok(Self::Deleted),
            other => Err(CoreError::InvalidData(format!("unknown disposition: {other}"))),
        }
    }
}

/// The forward link of a record. `Open` is the active state; `Replaced`
/// points at the successor record; `Retired` marks permanent exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Succession {
    Open,
    Replaced(RecordId),
    Retired(Disposition),
}

impl Succession {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    pub fn successor(&self) -> Option<RecordId> {
        match self {
            Self::Replaced(id) => Some(*id),
            _ => None,
        }
    }
}

/// One link in a unit's chain. Immutable after creation except for the
/// close write (`next`, `next_owner`, `replaced_at`).
#[derive(Debug, Clone)]
pub struct PartRecord {
    pub record_id: RecordId,
    pub part_id: PartId,
    pub serial: Option<Serial>,
    pub location: Location,
    pub building: u32,
    pub owner: Option<Holder>,
    pub container: Option<ContainerTag>,
    pub order_ref: Option<String>,
    pub prev: Option<RecordId>,
    pub next: Succession,
    pub next_owner: Option<Holder>,
    pub created_at: Stamp,
    pub replaced_at: Option<Stamp>,
    pub actor: UserId,
}

impl PartRecord {
    pub fn is_active(&self) -> bool {
        self.next.is_open()
    }
}

/// Insert shape of a record. The id is generated by the caller so a
/// predecessor can be closed against it before the insert lands.
/// `born_retired` covers consumables, whose successor records exit the
/// population at creation time.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub record_id: RecordId,
    pub part_id: PartId,
    pub serial: Option<Serial>,
    pub location: Location,
    pub building: u32,
    pub owner: Option<Holder>,
    pub container: Option<ContainerTag>,
    pub order_ref: Option<String>,
    pub prev: Option<RecordId>,
    pub born_retired: Option<Disposition>,
    pub created_at: Stamp,
    pub actor: UserId,
}

impl NewRecord {
    pub fn introduced(
        part_id: PartId,
        location: Location,
        building: u32,
        created_at: Stamp,
        actor: UserId,
    ) -> Self {
        Self {
            record_id: RecordId::new(),
            part_id,
            serial: None,
            location,
            building,
            owner: None,
            container: None,
            order_ref: None,
            prev: None,
            born_retired: None,
            created_at,
            actor,
        }
    }
}
