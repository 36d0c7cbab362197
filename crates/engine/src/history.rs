use stocktrail_core::{
    CartItem, ContainerTag, Disposition, Holder, Location, PartRecord, Stamp, Succession, UserId,
    records_to_cart_items,
};
use stocktrail_storage::{CheckoutLogQuery, LedgerStore, UnitKey};

use crate::error::LedgerError;

#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    /// 1-based page number.
    pub page_num: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page_num: u32, page_size: u32) -> Self {
        Self { page_num, page_size }
    }

    fn skip(&self) -> usize {
        (self.page_size as usize) * (self.page_num.max(1) as usize - 1)
    }
}

/// One reconstructed transition of a unit: what appeared, what left, and
/// what was already there at that stamp.
#[derive(Debug, Clone)]
pub struct HistoryEvent {
    pub stamp: Stamp,
    pub actor: Option<Holder>,
    pub added: Vec<CartItem>,
    pub removed: Vec<CartItem>,
    pub existing: Vec<CartItem>,
    /// No parts changed at this stamp (pure metadata edit), or the stamp is
    /// the container's own creation.
    pub info_updated: bool,
}

#[derive(Debug, Clone)]
pub struct HistoryPage {
    /// Distinct stamp count across the unit's whole history, independent of
    /// the page size.
    pub total: u64,
    pub pages: u32,
    pub events: Vec<HistoryEvent>,
}

/// The container's own chain data, supplied by the external collaborator
/// that persists asset/pallet documents.
#[derive(Debug, Clone)]
pub struct ContainerMeta {
    pub tag: ContainerTag,
    pub actor: UserId,
    pub created_stamps: Vec<Stamp>,
    pub replaced_stamps: Vec<Stamp>,
}

/// Reconstruct the chronological timeline of a unit by enumerating every
/// distinct transition stamp and re-querying state as of each one.
pub fn timeline(
    store: &dyn LedgerStore,
    unit: &UnitKey,
    container: Option<&ContainerMeta>,
    page: PageRequest,
) -> Result<HistoryPage, LedgerError> {
    let mut stamps = store.distinct_stamps(unit)?;
    if let Some(meta) = container {
        stamps.extend(meta.created_stamps.iter().copied());
        stamps.extend(meta.replaced_stamps.iter().copied());
        stamps.sort_unstable_by(|a, b| b.cmp(a));
        stamps.dedup();
    }

    let total = stamps.len() as u64;
    let pages = total.div_ceil(page.page_size.max(1) as u64) as u32;
    let selected: Vec<Stamp> = stamps
        .into_iter()
        .skip(page.skip())
        .take(page.page_size as usize)
        .collect();

    let mut events = Vec::with_capacity(selected.len());
    for stamp in selected {
        events.push(event_at(store, unit, container, stamp)?);
    }

    Ok(HistoryPage { total, pages, events })
}

fn event_at(
    store: &dyn LedgerStore,
    unit: &UnitKey,
    container: Option<&ContainerMeta>,
    stamp: Stamp,
) -> Result<HistoryEvent, LedgerError> {
    // Records born straight into the deleted state are bookkeeping for
    // removals, not arrivals.
    let added_records: Vec<PartRecord> = store
        .created_at(unit, stamp)?
        .into_iter()
        .filter(|r| r.next != Succession::Retired(Disposition::Deleted))
        .collect();
    let removed_records = store.replaced_at(unit, stamp)?;
    let existing_records = store.existing_at(unit, stamp)?;

    let actor = resolve_actor(store, container, stamp, &added_records, &removed_records)?;
    let is_container_creation = container
        .map(|meta| meta.created_stamps.contains(&stamp))
        .unwrap_or(false);
    let info_updated =
        (added_records.is_empty() && removed_records.is_empty()) || is_container_creation;

    Ok(HistoryEvent {
        stamp,
        actor,
        added: records_to_cart_items(&added_records),
        removed: records_to_cart_items(&removed_records),
        existing: records_to_cart_items(&existing_records),
        info_updated,
    })
}

/// Find who acted at a stamp: the creator of an added record, else the
/// destination holder of a removed record, else the container's own actor
/// at its creation, else walk the removed records' successor chains to a
/// terminal record with a resolvable holder.
fn resolve_actor(
    store: &dyn LedgerStore,
    container: Option<&ContainerMeta>,
    stamp: Stamp,
    added: &[PartRecord],
    removed: &[PartRecord],
) -> Result<Option<Holder>, LedgerError> {
    if let Some(record) = added.first() {
        return Ok(Some(Holder::User(record.actor)));
    }
    if let Some(holder) = removed.iter().find_map(|r| r.next_owner.clone()) {
        return Ok(Some(holder));
    }
    if let Some(meta) = container {
        if meta.created_stamps.contains(&stamp) {
            return Ok(Some(Holder::User(meta.actor)));
        }
    }
    for record in removed {
        let mut cursor = record.next.successor();
        while let Some(next_id) = cursor {
            let Some(next) = store.get(next_id)? else {
                break;
            };
            match next.next {
                Succession::Replaced(id) => cursor = Some(id),
                _ => {
                    return Ok(Some(
                        next.owner.clone().unwrap_or(Holder::User(next.actor)),
                    ));
                }
            }
        }
    }
    Ok(container.map(|meta| Holder::User(meta.actor)))
}

/// One checkout batch: everything handed to a holder from one location at
/// one stamp.
#[derive(Debug, Clone)]
pub struct CheckoutBatch {
    pub stamp: Stamp,
    pub location: Location,
    pub holder: Holder,
    pub parts: Vec<CartItem>,
}

#[derive(Debug, Clone)]
pub struct CheckoutLogPage {
    pub total: u64,
    pub checkouts: Vec<CheckoutBatch>,
}

/// Derive the checkout log from closed records: every record replaced by a
/// real successor that handed the unit to a holder, grouped per
/// (stamp, source location, holder), newest first.
pub fn checkout_log(
    store: &dyn LedgerStore,
    query: &CheckoutLogQuery,
    page: PageRequest,
) -> Result<CheckoutLogPage, LedgerError> {
    let rows = store.closed_in_range(query)?;

    let mut batches: Vec<(Stamp, Location, Holder, Vec<PartRecord>)> = Vec::new();
    for row in rows {
        let Some(stamp) = row.replaced_at else { continue };
        let Some(holder) = row.next_owner.clone() else { continue };
        let position = batches
            .iter()
            .position(|(s, l, h, _)| *s == stamp && *l == row.location && *h == holder);
        match position {
            Some(i) => batches[i].3.push(row),
            None => batches.push((stamp, row.location.clone(), holder, vec![row])),
        }
    }
    batches.sort_by(|a, b| b.0.cmp(&a.0));

    let total = batches.len() as u64;
    let checkouts = batches
        .into_iter()
        .skip(page.skip())
        .take(page.page_size as usize)
        .map(|(stamp, location, holder, records)| CheckoutBatch {
            stamp,
            location,
            holder,
            parts: records_to_cart_items(&records),
        })
        .collect();

    Ok(CheckoutLogPage { total, checkouts })
}
