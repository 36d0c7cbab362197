use stocktrail_core::{
    CartItem, CatalogEntry, CategoryDetail, Holder, Location, PartId, Serial, Stamp, UserId,
};
use stocktrail_engine::{
    CommitReport, Directory, Ledger, LedgerError, StockIntake,
};

use crate::directory::StaticDirectory;

pub const BUILDING: u32 = 1;

/// One in-memory ledger plus a fixed directory: a kiosk, its kiosk
/// operator, and a tech user, all in `BUILDING`.
pub struct TestRig {
    pub ledger: Ledger,
    pub directory: StaticDirectory,
    pub kiosk: Location,
    pub kiosk_operator: UserId,
    pub tech: UserId,
}

impl TestRig {
    pub fn new() -> Result<Self, LedgerError> {
        let mut directory = StaticDirectory::new();
        let kiosk = directory.add_kiosk(BUILDING, "Parts Room");
        let kiosk_operator = directory.add_user(BUILDING);
        let tech = directory.add_user(BUILDING);
        Ok(Self {
            ledger: Ledger::open_in_memory()?,
            directory,
            kiosk,
            kiosk_operator,
            tech,
        })
    }

    pub fn dir(&self) -> &dyn Directory {
        &self.directory
    }

    /// Register a bulk part and stock `quantity` units at the kiosk.
    pub fn seed_bulk_part(
        &mut self,
        part_no: &str,
        quantity: u32,
    ) -> Result<PartId, LedgerError> {
        let part_id = PartId::parse(part_no)?;
        let entry = self.catalog_entry(part_id.clone(), false, false);
        self.ledger.create_part(
            self.kiosk_operator,
            entry,
            self.kiosk.clone(),
            BUILDING,
            Some(StockIntake::Bulk { quantity }),
        )?;
        Ok(part_id)
    }

    /// Register a serialized part and stock one record per serial.
    pub fn seed_serialized_part(
        &mut self,
        part_no: &str,
        serials: &[&str],
    ) -> Result<PartId, LedgerError> {
        let part_id = PartId::parse(part_no)?;
        let entry = self.catalog_entry(part_id.clone(), true, false);
        let serials = serials
            .iter()
            .map(|s| Serial::parse(s))
            .collect::<Result<Vec<_>, _>>()?;
        self.ledger.create_part(
            self.kiosk_operator,
            entry,
            self.kiosk.clone(),
            BUILDING,
            Some(StockIntake::Serialized { serials }),
        )?;
        Ok(part_id)
    }

    /// Register a consumable bulk part with stock at the kiosk.
    pub fn seed_consumable_part(
        &mut self,
        part_no: &str,
        quantity: u32,
    ) -> Result<PartId, LedgerError> {
        let part_id = PartId::parse(part_no)?;
        let entry = self.catalog_entry(part_id.clone(), false, true);
        self.ledger.create_part(
            self.kiosk_operator,
            entry,
            self.kiosk.clone(),
            BUILDING,
            Some(StockIntake::Bulk { quantity }),
        )?;
        Ok(part_id)
    }

    pub fn catalog_entry(&self, part_id: PartId, serialized: bool, consumable: bool) -> CatalogEntry {
        CatalogEntry {
            part_id,
            manufacturer: "Generic".into(),
            name: "Test Part".into(),
            serialized,
            consumable,
            shelf_location: Some("A1".into()),
            detail: CategoryDetail::Cable {
                end1: "SATA".into(),
                end2: "SATA".into(),
            },
            notes: String::new(),
            created_by: self.kiosk_operator,
            created_at: Stamp::new(0, 0),
            audited_at: None,
        }
    }

    /// Check a cart out of the rig's kiosk into the tech's inventory.
    pub fn checkout_to_tech(&mut self, cart: &[CartItem]) -> Result<CommitReport, LedgerError> {
        let kiosk = self.kiosk.clone();
        self.ledger.checkout(
            self.kiosk_operator,
            &kiosk,
            BUILDING,
            self.tech,
            cart,
            &self.directory,
        )
    }

    /// Check a cart from the tech's inventory into the check-in queue.
    pub fn checkin_from_tech(&mut self, cart: &[CartItem]) -> Result<CommitReport, LedgerError> {
        let tech = self.tech;
        self.ledger.checkin(
            tech,
            &Holder::User(tech),
            BUILDING,
            cart,
            &self.directory,
        )
    }

    pub fn tech_holder(&self) -> Holder {
        Holder::User(self.tech)
    }
}
