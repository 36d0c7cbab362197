use std::collections::BTreeMap;

use stocktrail_core::{
    CartItem, CartPayload, ContainerTag, Disposition, Holder, Location, NewRecord, PartId,
    PartRecord, RecordId, Serial, Stamp, StampClock, UserId,
};
use stocktrail_storage::{LedgerStore, RecordQuery};

/// Field template for the destination side of a transition: every record a
/// commit creates copies these fields.
#[derive(Debug, Clone)]
pub struct DestSpec {
    pub location: Location,
    pub building: u32,
    pub owner: Option<Holder>,
    pub container: Option<ContainerTag>,
    pub order_ref: Option<String>,
    /// Terminal state stamped onto the successor at creation (sold/lost/
    /// broken/deleted destinations).
    pub born_retired: Option<Disposition>,
}

impl DestSpec {
    pub fn new(location: Location, building: u32) -> Self {
        Self {
            location,
            building,
            owner: None,
            container: None,
            order_ref: None,
            born_retired: None,
        }
    }

    pub fn owned_by(mut self, owner: Holder) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn in_container(mut self, tag: ContainerTag) -> Self {
        self.container = Some(tag);
        self
    }

    pub fn retired(mut self, disposition: Disposition) -> Self {
        self.born_retired = Some(disposition);
        self
    }
}

/// A validated transition, ready to commit. Produced by the fallible
/// `prepare_*` half of each operation; `commit` is the infallible half.
#[derive(Debug, Clone)]
pub struct TransitionPlan {
    pub dest: DestSpec,
    /// Search template for source records; part id and serial are filled in
    /// per item at commit time.
    pub source: RecordQuery,
    pub items: Vec<CartItem>,
    /// Serials granted to previously-bulk units, consumed in order per part.
    pub new_serials: BTreeMap<PartId, Vec<Serial>>,
    /// Create standalone records (no predecessor) instead of transitioning
    /// source records; used for imports and initial stock.
    pub migrated: bool,
    /// Whether successors of consumable parts are born consumed. Checkout
    /// and container paths set this; check-in paths do not.
    pub consume_consumables: bool,
}

impl TransitionPlan {
    pub fn new(dest: DestSpec, source: RecordQuery, items: Vec<CartItem>) -> Self {
        Self {
            dest,
            source,
            items,
            new_serials: BTreeMap::new(),
            migrated: false,
            consume_consumables: false,
        }
    }
}

/// Outcome of a commit. Skips are per unit and already logged; callers that
/// pre-validated through the quantity resolver should see zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub created: u32,
    pub skipped: u32,
}

/// Apply a plan to the ledger. This is the phase that cannot fail the
/// request: every per-unit problem (source vanished, concurrent close,
/// store error) is logged and counted as a skip. All records created by
/// one commit share a single stamp.
pub fn commit(
    store: &mut dyn LedgerStore,
    clock: &mut StampClock,
    actor: UserId,
    plan: &TransitionPlan,
) -> CommitReport {
    let stamp = match clock.tick() {
        Ok(stamp) => stamp,
        Err(e) => {
            tracing::error!("commit aborted, clock unavailable: {e}");
            return CommitReport {
                created: 0,
                skipped: plan.items.len() as u32,
            };
        }
    };
    commit_at(store, stamp, actor, plan)
}

/// Commit against a caller-supplied stamp, letting several plans of one
/// logical operation share a transition time.
pub fn commit_at(
    store: &mut dyn LedgerStore,
    stamp: Stamp,
    actor: UserId,
    plan: &TransitionPlan,
) -> CommitReport {
    let mut report = CommitReport::default();
    let mut consumable_cache = BTreeMap::<PartId, bool>::new();

    for item in &plan.items {
        let consumable = if plan.consume_consumables {
            part_is_consumable(store, &mut consumable_cache, &item.part_id)
        } else {
            false
        };
        let born_retired = plan
            .dest
            .born_retired
            .or(consumable.then_some(Disposition::Consumed));

        match &item.payload {
            CartPayload::Serialized { serial } => {
                commit_serialized(store, plan, item, serial, born_retired, stamp, actor, &mut report);
            }
            CartPayload::Bulk { quantity } => {
                commit_bulk(store, plan, item, *quantity, born_retired, stamp, actor, &mut report);
            }
        }
    }
    report
}

fn part_is_consumable(
    store: &dyn LedgerStore,
    cache: &mut BTreeMap<PartId, bool>,
    part_id: &PartId,
) -> bool {
    if let Some(known) = cache.get(part_id) {
        return *known;
    }
    let consumable = match store.get_part(part_id) {
        Ok(entry) => entry.map(|e| e.consumable).unwrap_or(false),
        Err(e) => {
            tracing::error!("catalog lookup failed for {part_id}: {e}");
            false
        }
    };
    cache.insert(part_id.clone(), consumable);
    consumable
}

#[allow(clippy::too_many_arguments)]
fn commit_serialized(
    store: &mut dyn LedgerStore,
    plan: &TransitionPlan,
    item: &CartItem,
    serial: &Serial,
    born_retired: Option<Disposition>,
    stamp: Stamp,
    actor: UserId,
    report: &mut CommitReport,
) {
    if plan.migrated {
        // Exact-match duplicate detection only: an already-active serial is
        // skipped, not an error.
        match store.find_one_active(
            &RecordQuery::new()
                .part(item.part_id.clone())
                .with_serial(serial.clone()),
        ) {
            Ok(Some(_)) => {
                tracing::debug!("serial already active, skipping import: {}: {serial}", item.part_id);
                report.skipped += 1;
            }
            Ok(None) => {
                insert_standalone(store, plan, item, Some(serial.clone()), born_retired, stamp, actor, report);
            }
            Err(e) => {
                tracing::error!("serial lookup failed for {}: {e}", item.part_id);
                report.skipped += 1;
            }
        }
        return;
    }

    let query = plan
        .source
        .clone()
        .part(item.part_id.clone())
        .with_serial(serial.clone());
    match store.find_one_active(&query) {
        Ok(Some(source)) => {
            transition(store, plan, &source, Some(serial.clone()), born_retired, stamp, actor, report);
        }
        Ok(None) => {
            tracing::warn!("source serial unavailable, item skipped: {}: {serial}", item.part_id);
            report.skipped += 1;
        }
        Err(e) => {
            tracing::error!("source lookup failed for {}: {e}", item.part_id);
            report.skipped += 1;
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn commit_bulk(
    store: &mut dyn LedgerStore,
    plan: &TransitionPlan,
    item: &CartItem,
    quantity: u32,
    born_retired: Option<Disposition>,
    stamp: Stamp,
    actor: UserId,
    report: &mut CommitReport,
) {
    if plan.migrated {
        for _ in 0..quantity {
            insert_standalone(store, plan, item, None, born_retired, stamp, actor, report);
        }
        return;
    }

    let query = plan.source.clone().part(item.part_id.clone()).bulk_only();
    let sources = match store.find_active(&query) {
        Ok(sources) => sources,
        Err(e) => {
            tracing::error!("source lookup failed for {}: {e}", item.part_id);
            report.skipped += quantity;
            return;
        }
    };
    if (sources.len() as u32) < quantity {
        tracing::warn!(
            "insufficient source records for {} ({} < {quantity}), item skipped",
            item.part_id,
            sources.len()
        );
        report.skipped += quantity;
        return;
    }

    let grants = plan.new_serials.get(&item.part_id);
    for (i, source) in sources.iter().take(quantity as usize).enumerate() {
        let granted = grants
            .and_then(|serials| serials.get(i))
            .filter(|serial| serial_is_free(store, &item.part_id, serial))
            .cloned();
        transition(store, plan, source, granted, born_retired, stamp, actor, report);
    }
}

/// Whether a serial grant can be honored: no active record carries it.
fn serial_is_free(store: &dyn LedgerStore, part_id: &PartId, serial: &Serial) -> bool {
    match store.find_one_active(
        &RecordQuery::new()
            .part(part_id.clone())
            .with_serial(serial.clone()),
    ) {
        Ok(existing) => existing.is_none(),
        Err(e) => {
            tracing::error!("serial lookup failed for {part_id}: {e}");
            false
        }
    }
}

/// Close the source against a pre-generated successor id, then insert the
/// successor. Closing first keeps the race loser from leaving an orphan:
/// a lost close means the unit was consumed by a concurrent caller and the
/// item is treated as unavailable.
#[allow(clippy::too_many_arguments)]
fn transition(
    store: &mut dyn LedgerStore,
    plan: &TransitionPlan,
    source: &PartRecord,
    serial: Option<Serial>,
    born_retired: Option<Disposition>,
    stamp: Stamp,
    actor: UserId,
    report: &mut CommitReport,
) {
    let new_id = RecordId::new();
    match store.close(
        source.record_id,
        stocktrail_core::Succession::Replaced(new_id),
        plan.dest.owner.as_ref(),
        stamp,
    ) {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(
                "source record {} closed by a concurrent transition, unit skipped",
                source.record_id
            );
            report.skipped += 1;
            return;
        }
        Err(e) => {
            tracing::error!("close failed for {}: {e}", source.record_id);
            report.skipped += 1;
            return;
        }
    }

    let record = NewRecord {
        record_id: new_id,
        part_id: source.part_id.clone(),
        serial: serial.or_else(|| source.serial.clone()),
        location: plan.dest.location.clone(),
        building: plan.dest.building,
        owner: plan.dest.owner.clone(),
        container: plan.dest.container.clone(),
        order_ref: plan.dest.order_ref.clone(),
        prev: Some(source.record_id),
        born_retired,
        created_at: stamp,
        actor,
    };
    match store.insert(&record) {
        Ok(()) => report.created += 1,
        Err(e) => {
            // The predecessor now points at a record that never landed.
            tracing::error!("successor insert failed for {}: {e}", source.record_id);
            report.skipped += 1;
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn insert_standalone(
    store: &mut dyn LedgerStore,
    plan: &TransitionPlan,
    item: &CartItem,
    serial: Option<Serial>,
    born_retired: Option<Disposition>,
    stamp: Stamp,
    actor: UserId,
    report: &mut CommitReport,
) {
    let record = NewRecord {
        record_id: RecordId::new(),
        part_id: item.part_id.clone(),
        serial,
        location: plan.dest.location.clone(),
        building: plan.dest.building,
        owner: plan.dest.owner.clone(),
        container: plan.dest.container.clone(),
        order_ref: plan.dest.order_ref.clone(),
        prev: None,
        born_retired,
        created_at: stamp,
        actor,
    };
    match store.insert(&record) {
        Ok(()) => report.created += 1,
        Err(e) => {
            tracing::error!("record insert failed for {}: {e}", item.part_id);
            report.skipped += 1;
        }
    }
}
