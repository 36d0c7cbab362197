use stocktrail_core::{CartItem, Holder, Location, PartId, records_to_cart_items};
use stocktrail_storage::{LedgerStore, RecordQuery};

use crate::diff::diff_records;
use crate::error::LedgerError;

/// Raw filtered count of active records: the bulk stock check.
pub fn stock_count(store: &dyn LedgerStore, query: &RecordQuery) -> Result<u64, LedgerError> {
    Ok(store.count_active(query)?)
}

/// Grouped snapshot of the active records matching a filter: bulk records
/// collapse into per-part quantities, serialized records stay one item per
/// unit.
pub fn snapshot(store: &dyn LedgerStore, query: &RecordQuery) -> Result<Vec<CartItem>, LedgerError> {
    let records = store.find_active(query)?;
    Ok(records_to_cart_items(&records))
}

/// Current holdings of a user or pool.
pub fn holder_inventory(
    store: &dyn LedgerStore,
    holder: &Holder,
) -> Result<Vec<CartItem>, LedgerError> {
    snapshot(store, &RecordQuery::new().held_by(holder.clone()))
}

/// Whether the holder currently has everything in `wanted`: nothing is
/// "added" when the wanted list is diffed against the holdings.
pub fn holder_has(
    store: &dyn LedgerStore,
    holder: &Holder,
    wanted: &[CartItem],
) -> Result<bool, LedgerError> {
    let records = store.find_active(&RecordQuery::new().held_by(holder.clone()))?;
    let d = diff_records(wanted, &records);
    Ok(!d.malformed && d.added.is_empty())
}

/// Per-kiosk active quantity of one part in a building.
pub fn kiosk_quantities(
    store: &dyn LedgerStore,
    part_id: &PartId,
    building: u32,
    kiosks: &[Location],
) -> Result<Vec<(Location, u64)>, LedgerError> {
    let mut counts = Vec::with_capacity(kiosks.len());
    for kiosk in kiosks {
        let count = store.count_active(
            &RecordQuery::new()
                .part(part_id.clone())
                .at(kiosk.clone())
                .in_building(building),
        )?;
        counts.push((kiosk.clone(), count));
    }
    Ok(counts)
}
