use stocktrail_core::{
    CatalogEntry, ContainerTag, Holder, Location, NewRecord, PartId, PartRecord, RecordId, Serial,
    Stamp, Succession, UserId,
};

use crate::error::StoreError;

/// Which logical unit a history query targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitKey {
    Part(PartId),
    Container(ContainerTag),
}

/// Serial constraint of a record query. `Any` matches both shapes, `Bulk`
/// matches serial-less records only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SerialFilter {
    #[default]
    Any,
    Bulk,
    Is(Serial),
}

/// Optional-field filter over records. Unset fields match everything;
/// active-only is implied by the query method, not the filter.
#[derive(Debug, Clone, Default)]
pub struct RecordQuery {
    pub part_id: Option<PartId>,
    pub serial: SerialFilter,
    pub location: Option<Location>,
    pub location_in: Option<Vec<Location>>,
    pub building: Option<u32>,
    pub owner: Option<Holder>,
    pub container: Option<ContainerTag>,
    pub created_at: Option<Stamp>,
    pub actor: Option<UserId>,
}

impl RecordQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn part(mut self, part_id: PartId) -> Self {
        self.part_id = Some(part_id);
        self
    }

    pub fn bulk_only(mut self) -> Self {
        self.serial = SerialFilter::Bulk;
        self
    }

    pub fn with_serial(mut self, serial: Serial) -> Self {
        self.serial = SerialFilter::Is(serial);
        self
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn at_any_of(mut self, locations: Vec<Location>) -> Self {
        self.location_in = Some(locations);
        self
    }

    pub fn in_building(mut self, building: u32) -> Self {
        self.building = Some(building);
        self
    }

    pub fn held_by(mut self, owner: Holder) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn in_container(mut self, tag: ContainerTag) -> Self {
        self.container = Some(tag);
        self
    }

    pub fn created(mut self, stamp: Stamp) -> Self {
        self.created_at = Some(stamp);
        self
    }

    pub fn by_actor(mut self, actor: UserId) -> Self {
        self.actor = Some(actor);
        self
    }
}

/// Filter for the checkout log: records closed by a real successor handed
/// to a holder, within a stamp range.
#[derive(Debug, Clone)]
pub struct CheckoutLogQuery {
    /// Inclusive lower bound on `replaced_at`.
    pub from: Stamp,
    /// Exclusive upper bound on `replaced_at`.
    pub until: Stamp,
    /// Source locations the units left (e.g. the kiosk set); None matches all.
    pub source_locations: Option<Vec<Location>>,
    /// Destination holder; None matches any holder.
    pub next_owner: Option<Holder>,
}

/// Append-only record store. `insert` never validates cross-record
/// invariants (serial uniqueness etc.); callers check first and accept the
/// documented check-then-insert race window.
pub trait LedgerStore {
    fn insert(&mut self, record: &NewRecord) -> Result<(), StoreError>;

    /// The one permitted write to an existing record: set the forward link,
    /// successor owner, and replacement stamp. Conditional on the record
    /// still being open; returns `false` when a concurrent caller closed it
    /// first. Passing `Succession::Open` is a constraint violation.
    fn close(
        &mut self,
        id: RecordId,
        successor: Succession,
        next_owner: Option<&Holder>,
        stamp: Stamp,
    ) -> Result<bool, StoreError>;

    fn get(&self, id: RecordId) -> Result<Option<PartRecord>, StoreError>;

    fn find_active(&self, query: &RecordQuery) -> Result<Vec<PartRecord>, StoreError>;

    fn find_one_active(&self, query: &RecordQuery) -> Result<Option<PartRecord>, StoreError>;

    fn count_active(&self, query: &RecordQuery) -> Result<u64, StoreError>;

    /// Distinct transition stamps touching the unit (creations and
    /// replacements), descending.
    fn distinct_stamps(&self, unit: &UnitKey) -> Result<Vec<Stamp>, StoreError>;

    /// Records of the unit created exactly at `stamp`.
    fn created_at(&self, unit: &UnitKey, stamp: Stamp) -> Result<Vec<PartRecord>, StoreError>;

    /// Records of the unit replaced exactly at `stamp`.
    fn replaced_at(&self, unit: &UnitKey, stamp: Stamp) -> Result<Vec<PartRecord>, StoreError>;

    /// Records of the unit alive just before `stamp`: created earlier and
    /// not yet replaced at that point.
    fn existing_at(&self, unit: &UnitKey, stamp: Stamp) -> Result<Vec<PartRecord>, StoreError>;

    fn closed_in_range(&self, query: &CheckoutLogQuery) -> Result<Vec<PartRecord>, StoreError>;

    // Catalog

    fn put_part(&mut self, entry: &CatalogEntry) -> Result<(), StoreError>;

    fn get_part(&self, part_id: &PartId) -> Result<Option<CatalogEntry>, StoreError>;

    fn delete_part(&mut self, part_id: &PartId) -> Result<bool, StoreError>;

    /// Rewrite a part id across the catalog row and every record that
    /// references it.
    fn rename_part(&mut self, from: &PartId, to: &PartId) -> Result<(), StoreError>;

    fn list_part_ids(&self) -> Result<Vec<PartId>, StoreError>;

    fn set_audit_date(&mut self, part_id: &PartId, stamp: Stamp) -> Result<bool, StoreError>;
}
