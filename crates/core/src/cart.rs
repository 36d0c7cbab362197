use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ids::{PartId, Serial};
use crate::record::PartRecord;

/// One line of a desired state: a serialized unit or a bulk quantity.
/// Ephemeral value exchanged between callers and the difference engine,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub part_id: PartId,
    pub payload: CartPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartPayload {
    Bulk { quantity: u32 },
    Serialized { serial: Serial },
}

impl CartItem {
    pub fn bulk(part_id: PartId, quantity: u32) -> Self {
        Self {
            part_id,
            payload: CartPayload::Bulk { quantity },
        }
    }

    pub fn serialized(part_id: PartId, serial: Serial) -> Self {
        Self {
            part_id,
            payload: CartPayload::Serialized { serial },
        }
    }

    pub fn serial(&self) -> Option<&Serial> {
        match &self.payload {
            CartPayload::Serialized { serial } => Some(serial),
            CartPayload::Bulk { .. } => None,
        }
    }

    pub fn quantity(&self) -> Option<u32> {
        match &self.payload {
            CartPayload::Bulk { quantity } => Some(*quantity),
            CartPayload::Serialized { .. } => None,
        }
    }
}

/// Transfer request line: bulk count plus explicit serial lists. `serials`
/// names units already serialized in the source inventory; `new_serials`
/// grants serials to previously-bulk units at transition time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub part_id: PartId,
    pub unserialized: u32,
    pub serials: Vec<Serial>,
    pub new_serials: Vec<Serial>,
}

impl InventoryEntry {
    pub fn bulk(part_id: PartId, unserialized: u32) -> Self {
        Self {
            part_id,
            unserialized,
            serials: Vec::new(),
            new_serials: Vec::new(),
        }
    }

    pub fn serialized(part_id: PartId, serials: Vec<Serial>) -> Self {
        Self {
            part_id,
            unserialized: 0,
            serials,
            new_serials: Vec::new(),
        }
    }
}

/// Collapse a set of records into cart items: every serialized record maps
/// to its own item, bulk records of one part collapse into a single item
/// carrying the count.
pub fn records_to_cart_items(records: &[PartRecord]) -> Vec<CartItem> {
    let mut bulk = BTreeMap::<PartId, u32>::new();
    let mut items = Vec::new();
    for record in records {
        match &record.serial {
            Some(serial) => items.push(CartItem::serialized(record.part_id.clone(), serial.clone())),
            None => *bulk.entry(record.part_id.clone()).or_insert(0) += 1,
        }
    }
    for (part_id, quantity) in bulk {
        items.push(CartItem::bulk(part_id, quantity));
    }
    items
}
