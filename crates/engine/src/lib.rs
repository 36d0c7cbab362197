pub mod diff;
pub mod directory;
pub mod error;
pub mod executor;
pub mod history;
pub mod resolve;

pub use diff::{Diff, diff, diff_ignore_serials, diff_records};
pub use directory::{Directory, TransferAuth};
pub use error::LedgerError;
pub use executor::{CommitReport, DestSpec, TransitionPlan};
pub use history::{
    CheckoutBatch, CheckoutLogPage, ContainerMeta, HistoryEvent, HistoryPage, PageRequest,
};

use std::collections::BTreeMap;

use stocktrail_core::{
    CartItem, CartPayload, CatalogEntry, ContainerTag, Disposition, Holder, InventoryEntry,
    Location, PartId, PartRecord, RecordId, Serial, Stamp, StampClock, Succession, UserId,
};
use stocktrail_storage::{
    CheckoutLogQuery, LedgerStore, RecordQuery, SqliteStore, UnitKey,
};

/// How stock enters the ledger: a bulk quantity or a batch of serials.
#[derive(Debug, Clone)]
pub enum StockIntake {
    Bulk { quantity: u32 },
    Serialized { serials: Vec<Serial> },
}

/// Where a transfer sends inventory. Terminal classes retire the units.
#[derive(Debug, Clone)]
pub enum TransferDestination {
    User(UserId),
    AllTechs,
    TestingCenter,
    DriveWipe,
    BuildingTransfer { building: u32, shelf: Location },
    Sold { order_ref: String },
    Lost,
    Broken,
    Deleted,
}

/// A pending check-in batch awaiting approval.
#[derive(Debug, Clone)]
pub struct CheckinBatch {
    pub stamp: Stamp,
    pub returned_by: UserId,
    pub parts: Vec<CartItem>,
}

/// Per-item verdict when processing a queued check-in. Serialized items use
/// `approved`; bulk items use `approved_count` (the remainder is denied).
/// Approved units need a kiosk destination.
#[derive(Debug, Clone)]
pub struct CheckinDecision {
    pub item: CartItem,
    pub approved: Option<bool>,
    pub approved_count: Option<u32>,
    pub kiosk: Option<Location>,
}

/// The two halves of a container update: units pulled from the holder's
/// inventory onto the container, and units handed back.
#[derive(Debug, Clone)]
pub struct ContainerUpdatePlan {
    pub add: Option<TransitionPlan>,
    pub remove: Option<TransitionPlan>,
}

/// The ledger orchestrator: owns the record store and the transition clock.
/// Every operation splits into a fallible `prepare_*` (validation, can
/// reject the request) and an infallible `commit` (logs and skips, never
/// fails); callers that need the fire-and-forget shape run the two halves
/// themselves.
pub struct Ledger {
    store: SqliteStore,
    clock: StampClock,
}

impl Ledger {
    pub fn new(store: SqliteStore) -> Self {
        Self {
            store,
            clock: StampClock::new(),
        }
    }

    pub fn open(path: &str) -> Result<Self, LedgerError> {
        Ok(Self::new(SqliteStore::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self, LedgerError> {
        Ok(Self::new(SqliteStore::open_in_memory()?))
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut SqliteStore {
        &mut self.store
    }

    /// Apply a prepared plan. This is the phase that cannot fail the
    /// request; per-unit problems are logged and counted as skips.
    pub fn commit(&mut self, actor: UserId, plan: &TransitionPlan) -> CommitReport {
        executor::commit(&mut self.store, &mut self.clock, actor, plan)
    }

    // ========================================================================
    // Stock intake
    // ========================================================================

    /// Introduce stock: standalone records with no predecessor. Serialized
    /// intake rejects serials that are already active; consumables are only
    /// stocked at kiosk locations.
    pub fn add_stock(
        &mut self,
        actor: UserId,
        part_id: &PartId,
        location: Location,
        building: u32,
        owner: Option<Holder>,
        container: Option<ContainerTag>,
        intake: StockIntake,
        dir: &dyn Directory,
    ) -> Result<CommitReport, LedgerError> {
        let entry = self.require_part(part_id)?;
        if entry.consumable && !dir.kiosk_names(building).contains(&location) {
            return Err(LedgerError::ConsumableOutsideKiosk(part_id.clone()));
        }
        if let Some(Holder::User(user)) = &owner {
            if !dir.user_exists(user) {
                return Err(LedgerError::UnknownUser(*user));
            }
        }
        let items = self.validate_intake(&entry, part_id, &intake)?;

        let mut dest = DestSpec::new(location, building);
        dest.owner = owner;
        dest.container = container;
        let mut plan = TransitionPlan::new(dest, RecordQuery::new(), items);
        plan.migrated = true;
        Ok(self.commit(actor, &plan))
    }

    /// Seed records from an import: the migrated mode. Serials that are
    /// already active are skipped silently instead of rejected.
    pub fn import_records(
        &mut self,
        actor: UserId,
        dest: DestSpec,
        items: Vec<CartItem>,
    ) -> CommitReport {
        let mut plan = TransitionPlan::new(dest, RecordQuery::new(), items);
        plan.migrated = true;
        self.commit(actor, &plan)
    }

    fn validate_intake(
        &self,
        entry: &CatalogEntry,
        part_id: &PartId,
        intake: &StockIntake,
    ) -> Result<Vec<CartItem>, LedgerError> {
        match intake {
            StockIntake::Bulk { quantity } => {
                if entry.serialized {
                    return Err(LedgerError::SerializedNeedsSerial(part_id.clone()));
                }
                if *quantity == 0 {
                    return Err(LedgerError::InvalidQuantity);
                }
                Ok(vec![CartItem::bulk(part_id.clone(), *quantity)])
            }
            StockIntake::Serialized { serials } => {
                if !entry.serialized {
                    return Err(LedgerError::SerialNotNeeded(part_id.clone()));
                }
                if serials.is_empty() {
                    return Err(LedgerError::InvalidQuantity);
                }
                for (i, serial) in serials.iter().enumerate() {
                    if serials[..i].contains(serial) {
                        return Err(LedgerError::DuplicateSerial {
                            part_id: part_id.clone(),
                            serial: serial.clone(),
                        });
                    }
                    if self.serial_active(part_id, serial)? {
                        return Err(LedgerError::SerialExists {
                            part_id: part_id.clone(),
                            serial: serial.clone(),
                        });
                    }
                }
                Ok(serials
                    .iter()
                    .map(|s| CartItem::serialized(part_id.clone(), s.clone()))
                    .collect())
            }
        }
    }

    // ========================================================================
    // Checkout / check-in
    // ========================================================================

    /// Validate a kiosk checkout: the user exists, every serialized entry
    /// names a serial present at the kiosk, and bulk quantities are in
    /// stock. The plan moves units into the user's inventory; consumables
    /// are born consumed.
    pub fn prepare_checkout(
        &self,
        kiosk: &Location,
        building: u32,
        user: UserId,
        cart: &[CartItem],
        dir: &dyn Directory,
    ) -> Result<TransitionPlan, LedgerError> {
        if !dir.user_exists(&user) {
            return Err(LedgerError::UnknownUser(user));
        }
        let source = RecordQuery::new().at(kiosk.clone()).in_building(building);
        self.validate_outgoing_cart(cart, &source)?;

        let dest = DestSpec::new(Location::tech_inventory(), building).owned_by(Holder::User(user));
        let mut plan = TransitionPlan::new(dest, source, cart.to_vec());
        plan.consume_consumables = true;
        Ok(plan)
    }

    pub fn checkout(
        &mut self,
        actor: UserId,
        kiosk: &Location,
        building: u32,
        user: UserId,
        cart: &[CartItem],
        dir: &dyn Directory,
    ) -> Result<CommitReport, LedgerError> {
        let plan = self.prepare_checkout(kiosk, building, user, cart, dir)?;
        Ok(self.commit(actor, &plan))
    }

    /// Validate a check-in: every entry must be in the holder's inventory.
    /// The plan clears the owner and parks units in the check-in queue.
    pub fn prepare_checkin(
        &self,
        holder: &Holder,
        building: u32,
        cart: &[CartItem],
        dir: &dyn Directory,
    ) -> Result<TransitionPlan, LedgerError> {
        if let Holder::User(user) = holder {
            if !dir.user_exists(user) {
                return Err(LedgerError::UnknownUser(*user));
            }
        }
        let source = RecordQuery::new().held_by(holder.clone());
        self.validate_outgoing_cart(cart, &source)?;

        let dest = DestSpec::new(Location::check_in_queue(), building);
        Ok(TransitionPlan::new(dest, source, cart.to_vec()))
    }

    pub fn checkin(
        &mut self,
        actor: UserId,
        holder: &Holder,
        building: u32,
        cart: &[CartItem],
        dir: &dyn Directory,
    ) -> Result<CommitReport, LedgerError> {
        let plan = self.prepare_checkin(holder, building, cart, dir)?;
        Ok(self.commit(actor, &plan))
    }

    /// Pending check-ins in a building, grouped per (stamp, returning
    /// user), newest first.
    pub fn checkin_queue(&self, building: u32) -> Result<Vec<CheckinBatch>, LedgerError> {
        let records = self.store.find_active(
            &RecordQuery::new()
                .at(Location::check_in_queue())
                .in_building(building),
        )?;

        let mut batches: Vec<(Stamp, UserId, Vec<PartRecord>)> = Vec::new();
        for record in records {
            let key = (record.created_at, record.actor);
            match batches.iter().position(|(s, u, _)| (*s, *u) == key) {
                Some(i) => batches[i].2.push(record),
                None => batches.push((key.0, key.1, vec![record])),
            }
        }
        batches.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(batches
            .into_iter()
            .map(|(stamp, returned_by, records)| CheckinBatch {
                stamp,
                returned_by,
                parts: stocktrail_core::records_to_cart_items(&records),
            })
            .collect())
    }

    /// Approve or deny one queued check-in batch. Approved units land at
    /// the chosen kiosk; denied units return to the holder's inventory.
    pub fn process_checkin(
        &mut self,
        actor: UserId,
        building: u32,
        stamp: Stamp,
        returned_by: UserId,
        decisions: &[CheckinDecision],
        dir: &dyn Directory,
    ) -> Result<CommitReport, LedgerError> {
        let kiosks = dir.kiosk_names(building);
        let base = RecordQuery::new()
            .at(Location::check_in_queue())
            .in_building(building)
            .created(stamp)
            .by_actor(returned_by);

        for decision in decisions {
            let part_id = &decision.item.part_id;
            match &decision.item.payload {
                CartPayload::Serialized { serial } => {
                    let approved = decision
                        .approved
                        .ok_or_else(|| LedgerError::UndecidedItem(part_id.clone()))?;
                    if approved {
                        Self::require_kiosk(&kiosks, decision.kiosk.as_ref())?;
                    }
                    let count = self.store.count_active(
                        &base.clone().part(part_id.clone()).with_serial(serial.clone()),
                    )?;
                    if count != 1 {
                        return Err(LedgerError::QueueMismatch(part_id.clone()));
                    }
                }
                CartPayload::Bulk { quantity } => {
                    let approved_count = decision
                        .approved_count
                        .ok_or_else(|| LedgerError::UndecidedItem(part_id.clone()))?;
                    if approved_count > 0 {
                        Self::require_kiosk(&kiosks, decision.kiosk.as_ref())?;
                    }
                    if approved_count > *quantity {
                        return Err(LedgerError::QueueMismatch(part_id.clone()));
                    }
                    let count = self
                        .store
                        .count_active(&base.clone().part(part_id.clone()).bulk_only())?;
                    if count != *quantity as u64 {
                        return Err(LedgerError::QueueMismatch(part_id.clone()));
                    }
                }
            }
        }

        // All decisions in the batch share one transition stamp.
        let commit_stamp = self.clock.tick()?;
        let mut report = CommitReport::default();
        for decision in decisions {
            let part_id = decision.item.part_id.clone();
            let (approved_items, denied_items) = match &decision.item.payload {
                CartPayload::Serialized { serial } => {
                    let item = CartItem::serialized(part_id.clone(), serial.clone());
                    if decision.approved == Some(true) {
                        (vec![item], Vec::new())
                    } else {
                        (Vec::new(), vec![item])
                    }
                }
                CartPayload::Bulk { quantity } => {
                    let approved = decision.approved_count.unwrap_or(0);
                    let denied = quantity - approved;
                    let mut a = Vec::new();
                    let mut d = Vec::new();
                    if approved > 0 {
                        a.push(CartItem::bulk(part_id.clone(), approved));
                    }
                    if denied > 0 {
                        d.push(CartItem::bulk(part_id.clone(), denied));
                    }
                    (a, d)
                }
            };

            if !approved_items.is_empty() {
                // Validation guaranteed the kiosk is present and known.
                if let Some(kiosk) = decision.kiosk.clone() {
                    let plan = TransitionPlan::new(
                        DestSpec::new(kiosk, building),
                        base.clone(),
                        approved_items,
                    );
                    report =
                        merge(report, executor::commit_at(&mut self.store, commit_stamp, actor, &plan));
                }
            }
            if !denied_items.is_empty() {
                let dest = DestSpec::new(Location::tech_inventory(), building)
                    .owned_by(Holder::User(returned_by));
                let plan = TransitionPlan::new(dest, base.clone(), denied_items);
                report = merge(report, executor::commit_at(&mut self.store, commit_stamp, actor, &plan));
            }
        }
        Ok(report)
    }

    fn require_kiosk(
        kiosks: &[Location],
        kiosk: Option<&Location>,
    ) -> Result<(), LedgerError> {
        match kiosk {
            Some(location) if kiosks.contains(location) => Ok(()),
            Some(location) => Err(LedgerError::UnknownKiosk(location.clone())),
            None => Err(LedgerError::UnknownKiosk(Location::new("<none>"))),
        }
    }

    // ========================================================================
    // Transfer
    // ========================================================================

    /// Validate an inventory transfer and build its plan. Destination
    /// classes carry their own permission requirements; terminal classes
    /// produce successors that are born retired.
    pub fn prepare_transfer(
        &self,
        auth: &TransferAuth,
        source_holder: &Holder,
        destination: &TransferDestination,
        entries: &[InventoryEntry],
        actor_building: u32,
        dir: &dyn Directory,
    ) -> Result<TransitionPlan, LedgerError> {
        for (i, entry) in entries.iter().enumerate() {
            if entries[..i].iter().any(|e| e.part_id == entry.part_id) {
                return Err(LedgerError::DuplicateEntry(entry.part_id.clone()));
            }
        }

        let selling = matches!(destination, TransferDestination::Sold { .. });
        let source = RecordQuery::new().held_by(source_holder.clone());
        let mut serialized_parts = BTreeMap::<PartId, bool>::new();

        for entry in entries {
            let info = self.require_part(&entry.part_id)?;
            serialized_parts.insert(entry.part_id.clone(), info.serialized);

            if info.serialized {
                if entry.unserialized > 0
                    && entry.new_serials.len() != entry.unserialized as usize
                {
                    return Err(LedgerError::MissingNewSerials(entry.part_id.clone()));
                }
                for serial in &entry.serials {
                    let found = self.store.find_one_active(
                        &source
                            .clone()
                            .part(entry.part_id.clone())
                            .with_serial(serial.clone()),
                    )?;
                    if found.is_none() {
                        return Err(LedgerError::SerialUnavailable {
                            part_id: entry.part_id.clone(),
                            serial: serial.clone(),
                        });
                    }
                }
                for serial in &entry.new_serials {
                    if self.serial_active(&entry.part_id, serial)? {
                        return Err(LedgerError::SerialExists {
                            part_id: entry.part_id.clone(),
                            serial: serial.clone(),
                        });
                    }
                }
            } else {
                if (!entry.serials.is_empty() || !entry.new_serials.is_empty()) && !selling {
                    return Err(LedgerError::SerialNotNeeded(entry.part_id.clone()));
                }
                let count = self.store.count_active(
                    &source.clone().part(entry.part_id.clone()).bulk_only(),
                )?;
                if count < entry.unserialized as u64 {
                    return Err(LedgerError::InsufficientStock(entry.part_id.clone()));
                }
            }
        }

        let dest = self.transfer_destination(auth, destination, actor_building, dir)?;

        let mut items = Vec::new();
        let mut new_serials = BTreeMap::new();
        for entry in entries {
            let serialized = serialized_parts[&entry.part_id];
            if serialized {
                for serial in &entry.serials {
                    items.push(CartItem::serialized(entry.part_id.clone(), serial.clone()));
                }
            }
            if entry.unserialized > 0 {
                items.push(CartItem::bulk(entry.part_id.clone(), entry.unserialized));
            }
            // Serial grants: serialized parts name theirs in new_serials;
            // bulk parts sold against an order may serialize at sale time.
            let grants: Vec<Serial> = if serialized {
                entry.new_serials.clone()
            } else if selling {
                entry
                    .serials
                    .iter()
                    .chain(entry.new_serials.iter())
                    .cloned()
                    .collect()
            } else {
                Vec::new()
            };
            if !grants.is_empty() {
                new_serials.insert(entry.part_id.clone(), grants);
            }
        }

        let mut plan = TransitionPlan::new(dest, source, items);
        plan.new_serials = new_serials;
        Ok(plan)
    }

    pub fn transfer(
        &mut self,
        actor: UserId,
        auth: &TransferAuth,
        source_holder: &Holder,
        destination: &TransferDestination,
        entries: &[InventoryEntry],
        actor_building: u32,
        dir: &dyn Directory,
    ) -> Result<CommitReport, LedgerError> {
        let plan =
            self.prepare_transfer(auth, source_holder, destination, entries, actor_building, dir)?;
        Ok(self.commit(actor, &plan))
    }

    fn transfer_destination(
        &self,
        auth: &TransferAuth,
        destination: &TransferDestination,
        actor_building: u32,
        dir: &dyn Directory,
    ) -> Result<DestSpec, LedgerError> {
        Ok(match destination {
            TransferDestination::User(user) => {
                if !dir.user_exists(user) {
                    return Err(LedgerError::UnknownUser(*user));
                }
                let building = dir.user_building(user).unwrap_or(actor_building);
                DestSpec::new(Location::tech_inventory(), building)
                    .owned_by(Holder::User(*user))
            }
            TransferDestination::AllTechs => {
                DestSpec::new(Location::new(Location::ALL_TECHS), actor_building)
                    .owned_by(Holder::AllTechs)
            }
            TransferDestination::TestingCenter => {
                DestSpec::new(Location::new(Location::TESTING_CENTER), actor_building)
                    .owned_by(Holder::Testing)
            }
            TransferDestination::DriveWipe => {
                DestSpec::new(Location::new(Location::DRIVE_WIPE_SHELF), actor_building)
            }
            TransferDestination::BuildingTransfer { building, shelf } => {
                if !auth.stock_admin {
                    return Err(LedgerError::PermissionDenied(
                        "building transfers need stock admin rights",
                    ));
                }
                DestSpec::new(shelf.clone(), *building)
            }
            TransferDestination::Sold { order_ref } => {
                if !auth.resale {
                    return Err(LedgerError::PermissionDenied(
                        "marking parts sold needs resale rights",
                    ));
                }
                if order_ref.trim().is_empty() {
                    return Err(LedgerError::MissingOrderRef);
                }
                let mut dest = DestSpec::new(
                    Location::new(Disposition::Sold.as_str()),
                    actor_building,
                )
                .retired(Disposition::Sold);
                dest.order_ref = Some(order_ref.clone());
                dest
            }
            TransferDestination::Lost => {
                Self::require_stock_admin(auth, "marking parts lost needs stock admin rights")?;
                DestSpec::new(Location::new(Disposition::Lost.as_str()), actor_building)
                    .retired(Disposition::Lost)
            }
            TransferDestination::Broken => {
                Self::require_stock_admin(auth, "marking parts broken needs stock admin rights")?;
                DestSpec::new(Location::new(Disposition::Broken.as_str()), actor_building)
                    .retired(Disposition::Broken)
            }
            TransferDestination::Deleted => {
                Self::require_stock_admin(auth, "marking parts deleted needs stock admin rights")?;
                DestSpec::new(Location::new(Disposition::Deleted.as_str()), actor_building)
                    .retired(Disposition::Deleted)
            }
        })
    }

    fn require_stock_admin(auth: &TransferAuth, reason: &'static str) -> Result<(), LedgerError> {
        if auth.stock_admin {
            Ok(())
        } else {
            Err(LedgerError::PermissionDenied(reason))
        }
    }

    /// Retire surplus bulk records at a kiosk down to a target quantity.
    pub fn shrink_location(
        &mut self,
        actor: UserId,
        part_id: &PartId,
        location: &Location,
        building: u32,
        target_quantity: u32,
        dir: &dyn Directory,
    ) -> Result<CommitReport, LedgerError> {
        if !dir.kiosk_names(building).contains(location) {
            return Err(LedgerError::UnknownKiosk(location.clone()));
        }
        let entry = self.require_part(part_id)?;
        if entry.serialized {
            return Err(LedgerError::SerializedShrink(part_id.clone()));
        }
        let count = self.store.count_active(
            &RecordQuery::new()
                .part(part_id.clone())
                .at(location.clone())
                .in_building(building)
                .bulk_only(),
        )?;
        if (target_quantity as u64) > count {
            return Err(LedgerError::InvalidQuantity);
        }
        let surplus = count as u32 - target_quantity;
        if surplus == 0 {
            return Ok(CommitReport::default());
        }

        let dest = DestSpec::new(Location::new(Disposition::Deleted.as_str()), building)
            .retired(Disposition::Deleted);
        let source = RecordQuery::new().at(location.clone()).in_building(building);
        let plan = TransitionPlan::new(dest, source, vec![CartItem::bulk(part_id.clone(), surplus)]);
        Ok(self.commit(actor, &plan))
    }

    // ========================================================================
    // Catalog lifecycle
    // ========================================================================

    /// Create a catalog entry and its initial stock records.
    pub fn create_part(
        &mut self,
        actor: UserId,
        mut entry: CatalogEntry,
        location: Location,
        building: u32,
        intake: Option<StockIntake>,
    ) -> Result<CommitReport, LedgerError> {
        if self.store.get_part(&entry.part_id)?.is_some() {
            return Err(LedgerError::PartExists(entry.part_id));
        }
        entry.created_by = actor;
        entry.created_at = self.clock.tick()?;
        let part_id = entry.part_id.clone();

        let items = match &intake {
            Some(intake) => self.validate_intake(&entry, &part_id, intake)?,
            None => Vec::new(),
        };
        self.store.put_part(&entry)?;
        if items.is_empty() {
            return Ok(CommitReport::default());
        }

        let dest = DestSpec::new(location, building);
        let mut plan = TransitionPlan::new(dest, RecordQuery::new(), items);
        plan.migrated = true;
        Ok(self.commit(actor, &plan))
    }

    /// Update a catalog entry. A part turning consumable retires its active
    /// records outside kiosk locations; a part id change cascades over all
    /// records.
    pub fn update_part(
        &mut self,
        part_id: &PartId,
        updated: CatalogEntry,
        dir: &dyn Directory,
    ) -> Result<(), LedgerError> {
        let existing = self.require_part(part_id)?;
        let mut merged = updated;
        merged.created_by = existing.created_by;
        merged.created_at = existing.created_at;

        if merged.part_id != *part_id {
            if self.store.get_part(&merged.part_id)?.is_some() {
                return Err(LedgerError::PartExists(merged.part_id));
            }
            self.store.rename_part(part_id, &merged.part_id)?;
        }
        self.store.put_part(&merged)?;

        if merged.consumable && !existing.consumable {
            let kiosks = dir.all_kiosk_names();
            let active = self
                .store
                .find_active(&RecordQuery::new().part(merged.part_id.clone()))?;
            let stamp = self.clock.tick()?;
            for record in active {
                if kiosks.contains(&record.location) {
                    continue;
                }
                self.store.close(
                    record.record_id,
                    Succession::Retired(Disposition::Consumed),
                    None,
                    stamp,
                )?;
            }
        }
        Ok(())
    }

    /// Delete a catalog entry; every active record of the part chains to a
    /// deleted terminal. Returns the number of records closed.
    pub fn delete_part(&mut self, part_id: &PartId) -> Result<u32, LedgerError> {
        self.require_part(part_id)?;
        self.store.delete_part(part_id)?;

        let active = self
            .store
            .find_active(&RecordQuery::new().part(part_id.clone()))?;
        let stamp = self.clock.tick()?;
        let mut closed = 0;
        for record in active {
            if self.store.close(
                record.record_id,
                Succession::Retired(Disposition::Deleted),
                None,
                stamp,
            )? {
                closed += 1;
            }
        }
        Ok(closed)
    }

    /// Stamp the part's audit date.
    pub fn audit_part(&mut self, part_id: &PartId) -> Result<Stamp, LedgerError> {
        let stamp = self.clock.tick()?;
        if !self.store.set_audit_date(part_id, stamp)? {
            return Err(LedgerError::UnknownPart(part_id.clone()));
        }
        Ok(stamp)
    }

    /// Lowest unused part number for a prefix, gap-filling.
    pub fn next_part_id(&self, prefix: &str) -> Result<PartId, LedgerError> {
        let existing = self.store.list_part_ids()?;
        Ok(PartId::next_sequential(prefix, &existing)?)
    }

    // ========================================================================
    // Containers
    // ========================================================================

    /// Diff a container's contents against a target state. Added units come
    /// out of the holder's inventory; removed units go back to it.
    pub fn prepare_container_update(
        &self,
        tag: &ContainerTag,
        container_location: Location,
        building: u32,
        target: &[CartItem],
        holder: &Holder,
        dir: &dyn Directory,
    ) -> Result<ContainerUpdatePlan, LedgerError> {
        if let Holder::User(user) = holder {
            if !dir.user_exists(user) {
                return Err(LedgerError::UnknownUser(*user));
            }
        }
        let current = self
            .store
            .find_active(&RecordQuery::new().in_container(tag.clone()))?;
        let d = diff_records(target, &current);
        if d.malformed {
            return Err(LedgerError::MalformedTarget);
        }

        let holder_source = RecordQuery::new().held_by(holder.clone());
        let add = if d.added.is_empty() {
            None
        } else {
            self.validate_outgoing_cart(&d.added, &holder_source)?;
            let dest = DestSpec::new(container_location, building).in_container(tag.clone());
            let mut plan = TransitionPlan::new(dest, holder_source.clone(), d.added);
            plan.consume_consumables = true;
            Some(plan)
        };
        let remove = if d.removed.is_empty() {
            None
        } else {
            let dest =
                DestSpec::new(Location::tech_inventory(), building).owned_by(holder.clone());
            let source = RecordQuery::new().in_container(tag.clone());
            let mut plan = TransitionPlan::new(dest, source, d.removed);
            plan.consume_consumables = true;
            Some(plan)
        };
        Ok(ContainerUpdatePlan { add, remove })
    }

    /// Commit a container update; both halves share one stamp.
    pub fn update_container(
        &mut self,
        actor: UserId,
        tag: &ContainerTag,
        container_location: Location,
        building: u32,
        target: &[CartItem],
        holder: &Holder,
        dir: &dyn Directory,
    ) -> Result<CommitReport, LedgerError> {
        let plans = self.prepare_container_update(
            tag,
            container_location,
            building,
            target,
            holder,
            dir,
        )?;
        let stamp = self.clock.tick()?;
        let mut report = CommitReport::default();
        if let Some(plan) = &plans.add {
            report = merge(report, executor::commit_at(&mut self.store, stamp, actor, plan));
        }
        if let Some(plan) = &plans.remove {
            report = merge(report, executor::commit_at(&mut self.store, stamp, actor, plan));
        }
        Ok(report)
    }

    // ========================================================================
    // Views
    // ========================================================================

    pub fn stock_count(&self, query: &RecordQuery) -> Result<u64, LedgerError> {
        resolve::stock_count(&self.store, query)
    }

    pub fn snapshot(&self, query: &RecordQuery) -> Result<Vec<CartItem>, LedgerError> {
        resolve::snapshot(&self.store, query)
    }

    pub fn holder_inventory(&self, holder: &Holder) -> Result<Vec<CartItem>, LedgerError> {
        resolve::holder_inventory(&self.store, holder)
    }

    pub fn holder_has(&self, holder: &Holder, wanted: &[CartItem]) -> Result<bool, LedgerError> {
        resolve::holder_has(&self.store, holder, wanted)
    }

    pub fn kiosk_quantities(
        &self,
        part_id: &PartId,
        building: u32,
        dir: &dyn Directory,
    ) -> Result<Vec<(Location, u64)>, LedgerError> {
        resolve::kiosk_quantities(&self.store, part_id, building, &dir.kiosk_names(building))
    }

    pub fn history(
        &self,
        unit: &UnitKey,
        container: Option<&ContainerMeta>,
        page: PageRequest,
    ) -> Result<HistoryPage, LedgerError> {
        history::timeline(&self.store, unit, container, page)
    }

    pub fn checkout_log(
        &self,
        query: &CheckoutLogQuery,
        page: PageRequest,
    ) -> Result<CheckoutLogPage, LedgerError> {
        history::checkout_log(&self.store, query, page)
    }

    /// Walk a record's chain backwards to the start of its lineage,
    /// stopping once a kiosk-located record is reached.
    pub fn record_lineage(
        &self,
        record_id: RecordId,
        dir: &dyn Directory,
    ) -> Result<Vec<PartRecord>, LedgerError> {
        let kiosks = dir.all_kiosk_names();
        let mut record = self
            .store
            .get(record_id)?
            .ok_or(LedgerError::RecordNotFound(record_id))?;
        let mut lineage = vec![record.clone()];
        while let Some(prev_id) = record.prev {
            if kiosks.contains(&record.location) {
                break;
            }
            record = self
                .store
                .get(prev_id)?
                .ok_or(LedgerError::RecordNotFound(prev_id))?;
            lineage.push(record.clone());
        }
        Ok(lineage)
    }

    // ========================================================================
    // Shared validation
    // ========================================================================

    /// Check a cart against a source filter: parts exist, serial shapes
    /// match the catalog, serials are unique within the request and present
    /// at the source, and bulk quantities are in stock.
    fn validate_outgoing_cart(
        &self,
        cart: &[CartItem],
        source: &RecordQuery,
    ) -> Result<(), LedgerError> {
        let mut seen = Vec::<(PartId, Serial)>::new();
        for item in cart {
            let entry = self.require_part(&item.part_id)?;
            match &item.payload {
                CartPayload::Serialized { serial } => {
                    if !entry.serialized {
                        return Err(LedgerError::SerialNotNeeded(item.part_id.clone()));
                    }
                    let pair = (item.part_id.clone(), serial.clone());
                    if seen.contains(&pair) {
                        return Err(LedgerError::DuplicateSerial {
                            part_id: item.part_id.clone(),
                            serial: serial.clone(),
                        });
                    }
                    seen.push(pair);
                    let found = self.store.find_one_active(
                        &source
                            .clone()
                            .part(item.part_id.clone())
                            .with_serial(serial.clone()),
                    )?;
                    if found.is_none() {
                        return Err(LedgerError::SerialUnavailable {
                            part_id: item.part_id.clone(),
                            serial: serial.clone(),
                        });
                    }
                }
                CartPayload::Bulk { quantity } => {
                    if entry.serialized {
                        return Err(LedgerError::SerializedNeedsSerial(item.part_id.clone()));
                    }
                    if *quantity == 0 {
                        return Err(LedgerError::MalformedCart(item.part_id.clone()));
                    }
                    let count = self.store.count_active(
                        &source.clone().part(item.part_id.clone()).bulk_only(),
                    )?;
                    if count < *quantity as u64 {
                        return Err(LedgerError::InsufficientStock(item.part_id.clone()));
                    }
                }
            }
        }
        Ok(())
    }

    fn require_part(&self, part_id: &PartId) -> Result<CatalogEntry, LedgerError> {
        self.store
            .get_part(part_id)?
            .ok_or_else(|| LedgerError::UnknownPart(part_id.clone()))
    }

    fn serial_active(&self, part_id: &PartId, serial: &Serial) -> Result<bool, LedgerError> {
        Ok(self
            .store
            .find_one_active(
                &RecordQuery::new()
                    .part(part_id.clone())
                    .with_serial(serial.clone()),
            )?
            .is_some())
    }
}

fn merge(a: CommitReport, b: CommitReport) -> CommitReport {
    CommitReport {
        created: a.created + b.created,
        skipped: a.skipped + b.skipped,
    }
}
