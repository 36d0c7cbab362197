use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ids::{PartId, UserId};
use crate::stamp::Stamp;

/// Type-level definition of a part. Records reference this by `part_id`;
/// the `serialized` and `consumable` flags steer how transitions treat
/// units of the type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub part_id: PartId,
    pub manufacturer: String,
    pub name: String,
    pub serialized: bool,
    pub consumable: bool,
    pub shelf_location: Option<String>,
    pub detail: CategoryDetail,
    pub notes: String,
    pub created_by: UserId,
    pub created_at: Stamp,
    pub audited_at: Option<Stamp>,
}

/// Category-specific attributes. Each category carries only the fields
/// that apply to it; the whole variant is stored as one msgpack payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CategoryDetail {
    Memory {
        frequency_mhz: u32,
        capacity_gb: u32,
        memory_type: String,
        generation: String,
        rank: Option<String>,
    },
    Cpu {
        socket: Vec<String>,
        frequency_mhz: Option<u32>,
    },
    Motherboard {
        socket: Vec<String>,
        generation: String,
        chipset: Option<String>,
    },
    PeripheralCard {
        peripheral_type: String,
        mainboard_connector: String,
        num_ports: u32,
        port_type: Option<String>,
    },
    Storage {
        storage_type: String,
        interface: String,
        form_factor: String,
        capacity: u32,
        capacity_unit: String,
    },
    Backplane {
        port_type: String,
        num_ports: u32,
    },
    Cable {
        end1: String,
        end2: String,
    },
    Heatsink {
        socket: Vec<String>,
        size: String,
        active: bool,
    },
    Optic {
        end1: String,
    },
    Other {
        category: String,
    },
}

impl CategoryDetail {
    /// Category name used for storage/indexing.
    pub fn category_name(&self) -> &str {
        match self {
            Self::Memory { .. } => "Memory",
            Self::Cpu { .. } => "CPU",
            Self::Motherboard { .. } => "Motherboard",
            Self::PeripheralCard { .. } => "Peripheral Card",
            Self::Storage { .. } => "Storage",
            Self::Backplane { .. } => "Backplane",
            Self::Cable { .. } => "Cable",
            Self::Heatsink { .. } => "Heatsink",
            Self::Optic { .. } => "Optic",
            Self::Other { category } => category,
        }
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>, CoreError> {
        rmp_serde::to_vec(self).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, CoreError> {
        rmp_serde::from_slice(bytes).map_err(|e| CoreError::Serialization(e.to_string()))
    }
}
