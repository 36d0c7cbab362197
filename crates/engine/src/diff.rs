use std::collections::BTreeMap;

use stocktrail_core::{CartItem, CartPayload, PartId, PartRecord, Serial};

/// Result of comparing a requested state against an observed one.
/// `malformed` means the request itself was unusable: nothing is added or
/// removed and the caller must reject the whole operation.
#[derive(Debug, Clone, Default)]
pub struct Diff {
    pub added: Vec<CartItem>,
    pub removed: Vec<CartItem>,
    pub malformed: bool,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    fn malformed() -> Self {
        Self {
            malformed: true,
            ..Self::default()
        }
    }
}

type SerialPair = (PartId, Serial);
type BulkMap = BTreeMap<PartId, u32>;

/// Split a cart into serialized pairs and a bulk quantity map. `None` when
/// any bulk entry has a zero quantity.
fn partition_cart(items: &[CartItem]) -> Option<(Vec<SerialPair>, BulkMap)> {
    let mut pairs = Vec::new();
    let mut bulk = BulkMap::new();
    for item in items {
        match &item.payload {
            CartPayload::Serialized { serial } => {
                pairs.push((item.part_id.clone(), serial.clone()));
            }
            CartPayload::Bulk { quantity } => {
                if *quantity == 0 {
                    return None;
                }
                bulk.insert(item.part_id.clone(), *quantity);
            }
        }
    }
    Some((pairs, bulk))
}

/// Split records the same way; counts accumulate per part.
fn partition_records(records: &[PartRecord]) -> (Vec<SerialPair>, BulkMap) {
    let mut pairs = Vec::new();
    let mut bulk = BulkMap::new();
    for record in records {
        match &record.serial {
            Some(serial) => pairs.push((record.part_id.clone(), serial.clone())),
            None => *bulk.entry(record.part_id.clone()).or_insert(0) += 1,
        }
    }
    (pairs, bulk)
}

/// Push pairs present in `from` but absent from `against`.
fn push_serial_difference(from: &[SerialPair], against: &[SerialPair], dest: &mut Vec<CartItem>) {
    for pair in from {
        if !against.contains(pair) {
            dest.push(CartItem::serialized(pair.0.clone(), pair.1.clone()));
        }
    }
}

/// Push per-part surpluses of `from` over `against`; a part missing from
/// `against` contributes its full quantity.
fn push_bulk_difference(from: &BulkMap, against: &BulkMap, dest: &mut Vec<CartItem>) {
    for (part_id, quantity) in from {
        match against.get(part_id) {
            Some(other) => {
                if quantity > other {
                    dest.push(CartItem::bulk(part_id.clone(), quantity - other));
                }
            }
            None => dest.push(CartItem::bulk(part_id.clone(), *quantity)),
        }
    }
}

fn diff_partitioned(
    requested: (Vec<SerialPair>, BulkMap),
    current: (Vec<SerialPair>, BulkMap),
) -> Diff {
    let (req_pairs, req_bulk) = requested;
    let (cur_pairs, cur_bulk) = current;
    let mut diff = Diff::default();
    push_serial_difference(&cur_pairs, &req_pairs, &mut diff.removed);
    push_serial_difference(&req_pairs, &cur_pairs, &mut diff.added);
    push_bulk_difference(&cur_bulk, &req_bulk, &mut diff.removed);
    push_bulk_difference(&req_bulk, &cur_bulk, &mut diff.added);
    diff
}

/// Compare a requested cart against the current active records of the same
/// scope.
pub fn diff_records(requested: &[CartItem], current: &[PartRecord]) -> Diff {
    let Some(req) = partition_cart(requested) else {
        return Diff::malformed();
    };
    diff_partitioned(req, partition_records(current))
}

/// Compare two carts.
pub fn diff(requested: &[CartItem], current: &[CartItem]) -> Diff {
    let Some(req) = partition_cart(requested) else {
        return Diff::malformed();
    };
    let Some(cur) = partition_cart(current) else {
        return Diff::malformed();
    };
    diff_partitioned(req, cur)
}

/// Serial-blind comparison: every serialized entry counts as one bulk unit
/// of its part. Used by flows that only track counts per part.
pub fn diff_ignore_serials(requested: &[CartItem], current: &[PartRecord]) -> Diff {
    let mut req_bulk = BulkMap::new();
    for item in requested {
        match &item.payload {
            CartPayload::Serialized { .. } => {
                *req_bulk.entry(item.part_id.clone()).or_insert(0) += 1;
            }
            CartPayload::Bulk { quantity } => {
                if *quantity == 0 {
                    return Diff::malformed();
                }
                *req_bulk.entry(item.part_id.clone()).or_insert(0) += quantity;
            }
        }
    }
    let mut cur_bulk = BulkMap::new();
    for record in current {
        *cur_bulk.entry(record.part_id.clone()).or_insert(0) += 1;
    }
    diff_partitioned((Vec::new(), req_bulk), (Vec::new(), cur_bulk))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(n: u32) -> PartId {
        PartId::parse(&format!("PN{n:07}")).unwrap()
    }

    fn serial(s: &str) -> Serial {
        Serial::parse(s).unwrap()
    }

    #[test]
    fn identical_carts_diff_empty() {
        let cart = vec![
            CartItem::bulk(part(1), 4),
            CartItem::serialized(part(2), serial("S1")),
        ];
        let d = diff(&cart, &cart);
        assert!(!d.malformed);
        assert!(d.is_empty());
    }

    #[test]
    fn bulk_quantities_land_on_one_side_only() {
        let requested = vec![CartItem::bulk(part(1), 5), CartItem::bulk(part(2), 1)];
        let current = vec![CartItem::bulk(part(1), 2), CartItem::bulk(part(2), 3)];
        let d = diff(&requested, &current);
        assert_eq!(d.added, vec![CartItem::bulk(part(1), 3)]);
        assert_eq!(d.removed, vec![CartItem::bulk(part(2), 2)]);
    }

    #[test]
    fn part_absent_from_request_is_fully_removed() {
        let requested = vec![];
        let current = vec![CartItem::bulk(part(1), 3)];
        let d = diff(&requested, &current);
        assert!(d.added.is_empty());
        assert_eq!(d.removed, vec![CartItem::bulk(part(1), 3)]);
    }

    #[test]
    fn serial_sets_are_disjoint() {
        let requested = vec![
            CartItem::serialized(part(1), serial("A")),
            CartItem::serialized(part(1), serial("B")),
        ];
        let current = vec![
            CartItem::serialized(part(1), serial("B")),
            CartItem::serialized(part(1), serial("C")),
        ];
        let d = diff(&requested, &current);
        assert_eq!(d.added, vec![CartItem::serialized(part(1), serial("A"))]);
        assert_eq!(d.removed, vec![CartItem::serialized(part(1), serial("C"))]);
        // No pair appears in both sets.
        for item in &d.added {
            assert!(!d.removed.contains(item));
        }
    }

    #[test]
    fn same_serial_different_part_is_distinct() {
        let requested = vec![CartItem::serialized(part(1), serial("A"))];
        let current = vec![CartItem::serialized(part(2), serial("A"))];
        let d = diff(&requested, &current);
        assert_eq!(d.added.len(), 1);
        assert_eq!(d.removed.len(), 1);
    }

    #[test]
    fn zero_quantity_is_malformed() {
        let requested = vec![CartItem::bulk(part(1), 0)];
        let current = vec![CartItem::bulk(part(1), 2)];
        let d = diff(&requested, &current);
        assert!(d.malformed);
        assert!(d.added.is_empty());
        assert!(d.removed.is_empty());
    }

    #[test]
    fn ignore_serials_counts_serialized_as_one() {
        use stocktrail_core::{Location, NewRecord, Stamp, UserId};
        let mk = |serial_no: Option<&str>| {
            let new = NewRecord::introduced(
                part(1),
                Location::new("Kiosk"),
                1,
                Stamp::new(1, 0),
                UserId::new(),
            );
            stocktrail_core::PartRecord {
                record_id: new.record_id,
                part_id: new.part_id,
                serial: serial_no.map(|s| serial(s)),
                location: new.location,
                building: new.building,
                owner: None,
                container: None,
                order_ref: None,
                prev: None,
                next: stocktrail_core::Succession::Open,
                next_owner: None,
                created_at: new.created_at,
                replaced_at: None,
                actor: new.actor,
            }
        };
        let current = vec![mk(Some("A")), mk(None), mk(None)];
        let requested = vec![CartItem::bulk(part(1), 2)];
        let d = diff_ignore_serials(&requested, &current);
        assert!(d.added.is_empty());
        assert_eq!(d.removed, vec![CartItem::bulk(part(1), 1)]);
    }
}
