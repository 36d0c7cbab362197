use stocktrail_core::{CartItem, Disposition, Holder, Location, Serial, Succession};
use stocktrail_engine::{
    CheckinDecision, LedgerError, StockIntake, TransferAuth, TransferDestination,
};
use stocktrail_harness::{StaticDirectory, TestRig, rig::BUILDING};
use stocktrail_storage::{LedgerStore, RecordQuery};

// ============================================================================
// Checkout
// ============================================================================

#[test]
fn bulk_checkout_moves_stock() -> Result<(), Box<dyn std::error::Error>> {
    let mut rig = TestRig::new()?;
    let part = rig.seed_bulk_part("PN0000001", 5)?;

    let report = rig.checkout_to_tech(&[CartItem::bulk(part.clone(), 2)])?;
    assert_eq!(report.created, 2);
    assert_eq!(report.skipped, 0);

    let tech_inventory = rig.ledger.holder_inventory(&rig.tech_holder())?;
    assert_eq!(tech_inventory, vec![CartItem::bulk(part.clone(), 2)]);

    let kiosk_snapshot = rig.ledger.snapshot(
        &RecordQuery::new().at(rig.kiosk.clone()).in_building(BUILDING),
    )?;
    assert_eq!(kiosk_snapshot, vec![CartItem::bulk(part, 3)]);
    Ok(())
}

#[test]
fn serialized_checkout_requires_the_exact_serial() -> Result<(), Box<dyn std::error::Error>> {
    let mut rig = TestRig::new()?;
    let part = rig.seed_serialized_part("PN0000002", &["S1"])?;

    let missing = Serial::parse("S9")?;
    let result = rig.checkout_to_tech(&[CartItem::serialized(part.clone(), missing)]);
    assert!(matches!(result, Err(LedgerError::SerialUnavailable { .. })));

    // The rejection created nothing: the kiosk still holds the unit.
    let count = rig.ledger.stock_count(
        &RecordQuery::new()
            .part(part)
            .at(rig.kiosk.clone())
            .in_building(BUILDING),
    )?;
    assert_eq!(count, 1);
    Ok(())
}

#[test]
fn checkout_insufficient_stock_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let mut rig = TestRig::new()?;
    let part = rig.seed_bulk_part("PN0000003", 2)?;
    let result = rig.checkout_to_tech(&[CartItem::bulk(part, 3)]);
    assert!(matches!(result, Err(LedgerError::InsufficientStock(_))));
    Ok(())
}

#[test]
fn checkout_serialized_without_serial_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let mut rig = TestRig::new()?;
    let part = rig.seed_serialized_part("PN0000004", &["S1", "S2"])?;
    let result = rig.checkout_to_tech(&[CartItem::bulk(part, 1)]);
    assert!(matches!(result, Err(LedgerError::SerializedNeedsSerial(_))));
    Ok(())
}

#[test]
fn checkout_duplicate_serial_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let mut rig = TestRig::new()?;
    let part = rig.seed_serialized_part("PN0000005", &["S1"])?;
    let item = CartItem::serialized(part, Serial::parse("S1")?);
    let result = rig.checkout_to_tech(&[item.clone(), item]);
    assert!(matches!(result, Err(LedgerError::DuplicateSerial { .. })));
    Ok(())
}

#[test]
fn checkout_for_unknown_user_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let mut rig = TestRig::new()?;
    let part = rig.seed_bulk_part("PN0000006", 2)?;
    let stranger = stocktrail_core::UserId::new();
    let kiosk = rig.kiosk.clone();
    let result = rig.ledger.checkout(
        rig.kiosk_operator,
        &kiosk,
        BUILDING,
        stranger,
        &[CartItem::bulk(part, 1)],
        &rig.directory,
    );
    assert!(matches!(result, Err(LedgerError::UnknownUser(_))));
    Ok(())
}

#[test]
fn checkout_zero_quantity_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let mut rig = TestRig::new()?;
    let part = rig.seed_bulk_part("PN0000007", 2)?;
    let result = rig.checkout_to_tech(&[CartItem::bulk(part, 0)]);
    assert!(matches!(result, Err(LedgerError::MalformedCart(_))));
    Ok(())
}

#[test]
fn consumable_checkout_is_born_consumed() -> Result<(), Box<dyn std::error::Error>> {
    let mut rig = TestRig::new()?;
    let part = rig.seed_consumable_part("PN0000008", 3)?;

    let report = rig.checkout_to_tech(&[CartItem::bulk(part.clone(), 2)])?;
    assert_eq!(report.created, 2);

    // The successors never became active stock in the tech's inventory.
    assert!(rig.ledger.holder_inventory(&rig.tech_holder())?.is_empty());
    let records = rig
        .ledger
        .store()
        .find_active(&RecordQuery::new().part(part.clone()))?;
    assert_eq!(records.len(), 1);

    // The consumed successors exist in the chain, terminally retired.
    let sources = rig
        .ledger
        .store()
        .closed_in_range(&stocktrail_storage::CheckoutLogQuery {
            from: stocktrail_core::Stamp::new(0, 0),
            until: stocktrail_core::Stamp::new(u64::MAX, u32::MAX),
            source_locations: None,
            next_owner: None,
        })?;
    for source in &sources {
        let successor_id = source.next.successor().unwrap();
        let successor = rig.ledger.store().get(successor_id)?.unwrap();
        assert_eq!(successor.next, Succession::Retired(Disposition::Consumed));
    }
    Ok(())
}

// ============================================================================
// Check-in
// ============================================================================

#[test]
fn serialized_checkout_then_checkin_chain() -> Result<(), Box<dyn std::error::Error>> {
    let mut rig = TestRig::new()?;
    let part = rig.seed_serialized_part("PN0000010", &["S1"])?;
    let item = CartItem::serialized(part.clone(), Serial::parse("S1")?);

    rig.checkout_to_tech(&[item.clone()])?;
    rig.checkin_from_tech(&[item])?;

    // One active record: owner cleared, parked in the check-in queue.
    let active = rig
        .ledger
        .store()
        .find_active(&RecordQuery::new().part(part.clone()))?;
    assert_eq!(active.len(), 1);
    let current = &active[0];
    assert!(current.owner.is_none());
    assert_eq!(current.location, Location::check_in_queue());
    assert_eq!(current.serial, Some(Serial::parse("S1")?));

    // Two closed records behind it.
    let mid = rig.ledger.store().get(current.prev.unwrap())?.unwrap();
    assert_eq!(mid.next, Succession::Replaced(current.record_id));
    assert_eq!(mid.owner, Some(rig.tech_holder()));
    let first = rig.ledger.store().get(mid.prev.unwrap())?.unwrap();
    assert_eq!(first.next, Succession::Replaced(mid.record_id));
    assert!(first.prev.is_none());
    Ok(())
}

#[test]
fn checkin_more_than_held_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let mut rig = TestRig::new()?;
    let part = rig.seed_bulk_part("PN0000011", 5)?;
    rig.checkout_to_tech(&[CartItem::bulk(part.clone(), 2)])?;
    let result = rig.checkin_from_tech(&[CartItem::bulk(part, 3)]);
    assert!(matches!(result, Err(LedgerError::InsufficientStock(_))));
    Ok(())
}

#[test]
fn checkin_queue_groups_by_stamp_and_user() -> Result<(), Box<dyn std::error::Error>> {
    let mut rig = TestRig::new()?;
    let part_a = rig.seed_bulk_part("PN0000012", 4)?;
    let part_b = rig.seed_serialized_part("PN0000013", &["S1"])?;
    rig.checkout_to_tech(&[
        CartItem::bulk(part_a.clone(), 2),
        CartItem::serialized(part_b.clone(), Serial::parse("S1")?),
    ])?;

    // Two separate check-ins produce two batches.
    rig.checkin_from_tech(&[CartItem::bulk(part_a.clone(), 2)])?;
    rig.checkin_from_tech(&[CartItem::serialized(part_b.clone(), Serial::parse("S1")?)])?;

    let queue = rig.ledger.checkin_queue(BUILDING)?;
    assert_eq!(queue.len(), 2);
    // Newest first.
    assert!(queue[0].stamp > queue[1].stamp);
    assert_eq!(queue[0].returned_by, rig.tech);
    assert_eq!(
        queue[0].parts,
        vec![CartItem::serialized(part_b, Serial::parse("S1")?)]
    );
    assert_eq!(queue[1].parts, vec![CartItem::bulk(part_a, 2)]);
    Ok(())
}

#[test]
fn process_checkin_splits_approved_and_denied() -> Result<(), Box<dyn std::error::Error>> {
    let mut rig = TestRig::new()?;
    let part = rig.seed_bulk_part("PN0000014", 5)?;
    rig.checkout_to_tech(&[CartItem::bulk(part.clone(), 3)])?;
    rig.checkin_from_tech(&[CartItem::bulk(part.clone(), 3)])?;

    let queue = rig.ledger.checkin_queue(BUILDING)?;
    assert_eq!(queue.len(), 1);
    let batch = &queue[0];

    let decisions = vec![CheckinDecision {
        item: CartItem::bulk(part.clone(), 3),
        approved: None,
        approved_count: Some(2),
        kiosk: Some(rig.kiosk.clone()),
    }];
    let report = rig.ledger.process_checkin(
        rig.kiosk_operator,
        BUILDING,
        batch.stamp,
        batch.returned_by,
        &decisions,
        &rig.directory,
    )?;
    assert_eq!(report.created, 3);

    // Two approved units returned to the kiosk (2 untouched + 2 approved),
    // one denied unit back in the tech's inventory.
    let kiosk_count = rig.ledger.stock_count(
        &RecordQuery::new()
            .part(part.clone())
            .at(rig.kiosk.clone())
            .in_building(BUILDING),
    )?;
    assert_eq!(kiosk_count, 4);
    assert_eq!(
        rig.ledger.holder_inventory(&rig.tech_holder())?,
        vec![CartItem::bulk(part, 1)]
    );
    assert!(rig.ledger.checkin_queue(BUILDING)?.is_empty());
    Ok(())
}

#[test]
fn process_checkin_requires_a_decision_and_kiosk() -> Result<(), Box<dyn std::error::Error>> {
    let mut rig = TestRig::new()?;
    let part = rig.seed_bulk_part("PN0000015", 2)?;
    rig.checkout_to_tech(&[CartItem::bulk(part.clone(), 2)])?;
    rig.checkin_from_tech(&[CartItem::bulk(part.clone(), 2)])?;
    let batch = rig.ledger.checkin_queue(BUILDING)?.remove(0);

    let undecided = vec![CheckinDecision {
        item: CartItem::bulk(part.clone(), 2),
        approved: None,
        approved_count: None,
        kiosk: Some(rig.kiosk.clone()),
    }];
    let result = rig.ledger.process_checkin(
        rig.kiosk_operator,
        BUILDING,
        batch.stamp,
        batch.returned_by,
        &undecided,
        &rig.directory,
    );
    assert!(matches!(result, Err(LedgerError::UndecidedItem(_))));

    let no_kiosk = vec![CheckinDecision {
        item: CartItem::bulk(part, 2),
        approved: None,
        approved_count: Some(2),
        kiosk: Some(Location::new("Broom Closet")),
    }];
    let result = rig.ledger.process_checkin(
        rig.kiosk_operator,
        BUILDING,
        batch.stamp,
        batch.returned_by,
        &no_kiosk,
        &rig.directory,
    );
    assert!(matches!(result, Err(LedgerError::UnknownKiosk(_))));
    Ok(())
}

// ============================================================================
// Transfers
// ============================================================================

#[test]
fn transfer_bulk_to_another_user() -> Result<(), Box<dyn std::error::Error>> {
    let mut rig = TestRig::new()?;
    let part = rig.seed_bulk_part("PN0000020", 4)?;
    rig.checkout_to_tech(&[CartItem::bulk(part.clone(), 3)])?;
    let other = rig.directory.add_user(2);

    let entries = vec![stocktrail_core::InventoryEntry::bulk(part.clone(), 2)];
    rig.ledger.transfer(
        rig.kiosk_operator,
        &TransferAuth::default(),
        &rig.tech_holder(),
        &TransferDestination::User(other),
        &entries,
        BUILDING,
        &rig.directory,
    )?;

    assert_eq!(
        rig.ledger.holder_inventory(&Holder::User(other))?,
        vec![CartItem::bulk(part.clone(), 2)]
    );
    // The destination picked up the receiving user's building.
    let received = rig
        .ledger
        .store()
        .find_active(&RecordQuery::new().part(part).held_by(Holder::User(other)))?;
    assert!(received.iter().all(|r| r.building == 2));
    Ok(())
}

#[test]
fn transfer_to_shared_pools() -> Result<(), Box<dyn std::error::Error>> {
    let mut rig = TestRig::new()?;
    let part = rig.seed_bulk_part("PN0000021", 4)?;
    rig.checkout_to_tech(&[CartItem::bulk(part.clone(), 3)])?;

    rig.ledger.transfer(
        rig.kiosk_operator,
        &TransferAuth::default(),
        &rig.tech_holder(),
        &TransferDestination::AllTechs,
        &[stocktrail_core::InventoryEntry::bulk(part.clone(), 1)],
        BUILDING,
        &rig.directory,
    )?;
    rig.ledger.transfer(
        rig.kiosk_operator,
        &TransferAuth::default(),
        &rig.tech_holder(),
        &TransferDestination::TestingCenter,
        &[stocktrail_core::InventoryEntry::bulk(part.clone(), 1)],
        BUILDING,
        &rig.directory,
    )?;

    assert_eq!(
        rig.ledger.holder_inventory(&Holder::AllTechs)?,
        vec![CartItem::bulk(part.clone(), 1)]
    );
    assert_eq!(
        rig.ledger.holder_inventory(&Holder::Testing)?,
        vec![CartItem::bulk(part, 1)]
    );
    Ok(())
}

#[test]
fn transfer_lost_requires_stock_admin() -> Result<(), Box<dyn std::error::Error>> {
    let mut rig = TestRig::new()?;
    let part = rig.seed_bulk_part("PN0000022", 3)?;
    rig.checkout_to_tech(&[CartItem::bulk(part.clone(), 2)])?;
    let entries = vec![stocktrail_core::InventoryEntry::bulk(part.clone(), 1)];

    let result = rig.ledger.transfer(
        rig.kiosk_operator,
        &TransferAuth::default(),
        &rig.tech_holder(),
        &TransferDestination::Lost,
        &entries,
        BUILDING,
        &rig.directory,
    );
    assert!(matches!(result, Err(LedgerError::PermissionDenied(_))));

    let auth = TransferAuth { stock_admin: true, resale: false };
    rig.ledger.transfer(
        rig.kiosk_operator,
        &auth,
        &rig.tech_holder(),
        &TransferDestination::Lost,
        &entries,
        BUILDING,
        &rig.directory,
    )?;
    // The lost unit left the trackable population entirely.
    assert_eq!(
        rig.ledger.holder_inventory(&rig.tech_holder())?,
        vec![CartItem::bulk(part.clone(), 1)]
    );
    assert_eq!(
        rig.ledger.stock_count(&RecordQuery::new().part(part))?,
        2 // 1 still at the kiosk, 1 with the tech
    );
    Ok(())
}

#[test]
fn transfer_sold_needs_order_and_resale_rights() -> Result<(), Box<dyn std::error::Error>> {
    let mut rig = TestRig::new()?;
    let part = rig.seed_bulk_part("PN0000023", 3)?;
    rig.checkout_to_tech(&[CartItem::bulk(part.clone(), 2)])?;
    let entries = vec![stocktrail_core::InventoryEntry::bulk(part.clone(), 1)];

    let result = rig.ledger.transfer(
        rig.kiosk_operator,
        &TransferAuth::default(),
        &rig.tech_holder(),
        &TransferDestination::Sold { order_ref: "ORD-77".into() },
        &entries,
        BUILDING,
        &rig.directory,
    );
    assert!(matches!(result, Err(LedgerError::PermissionDenied(_))));

    let auth = TransferAuth { stock_admin: false, resale: true };
    let result = rig.ledger.transfer(
        rig.kiosk_operator,
        &auth,
        &rig.tech_holder(),
        &TransferDestination::Sold { order_ref: "  ".into() },
        &entries,
        BUILDING,
        &rig.directory,
    );
    assert!(matches!(result, Err(LedgerError::MissingOrderRef)));

    rig.ledger.transfer(
        rig.kiosk_operator,
        &auth,
        &rig.tech_holder(),
        &TransferDestination::Sold { order_ref: "ORD-77".into() },
        &entries,
        BUILDING,
        &rig.directory,
    )?;

    // One unit left with the tech; the sold unit is out of the population.
    assert_eq!(
        rig.ledger.holder_inventory(&rig.tech_holder())?,
        vec![CartItem::bulk(part.clone(), 1)]
    );
    assert_eq!(rig.ledger.stock_count(&RecordQuery::new().part(part))?, 2);

    // The sale record carries the order reference and a terminal state.
    let (order_ref, disposition): (String, String) = rig.ledger.store().conn().query_row(
        "SELECT order_ref, disposition FROM part_records WHERE disposition = 'sold'",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    assert_eq!(order_ref, "ORD-77");
    assert_eq!(disposition, "sold");
    Ok(())
}

#[test]
fn transfer_serialized_parts_by_serial() -> Result<(), Box<dyn std::error::Error>> {
    let mut rig = TestRig::new()?;
    let part = rig.seed_serialized_part("PN0000024", &["S1", "S2"])?;
    rig.checkout_to_tech(&[
        CartItem::serialized(part.clone(), Serial::parse("S1")?),
        CartItem::serialized(part.clone(), Serial::parse("S2")?),
    ])?;

    let entries = vec![stocktrail_core::InventoryEntry::serialized(
        part.clone(),
        vec![Serial::parse("S1")?],
    )];
    rig.ledger.transfer(
        rig.kiosk_operator,
        &TransferAuth::default(),
        &rig.tech_holder(),
        &TransferDestination::AllTechs,
        &entries,
        BUILDING,
        &rig.directory,
    )?;

    assert_eq!(
        rig.ledger.holder_inventory(&Holder::AllTechs)?,
        vec![CartItem::serialized(part.clone(), Serial::parse("S1")?)]
    );
    assert_eq!(
        rig.ledger.holder_inventory(&rig.tech_holder())?,
        vec![CartItem::serialized(part, Serial::parse("S2")?)]
    );
    Ok(())
}

#[test]
fn transfer_rejects_serial_not_in_inventory() -> Result<(), Box<dyn std::error::Error>> {
    let mut rig = TestRig::new()?;
    let part = rig.seed_serialized_part("PN0000025", &["S1"])?;
    // S1 never checked out: the tech doesn't hold it.
    let entries = vec![stocktrail_core::InventoryEntry::serialized(
        part,
        vec![Serial::parse("S1")?],
    )];
    let result = rig.ledger.transfer(
        rig.kiosk_operator,
        &TransferAuth::default(),
        &rig.tech_holder(),
        &TransferDestination::AllTechs,
        &entries,
        BUILDING,
        &rig.directory,
    );
    assert!(matches!(result, Err(LedgerError::SerialUnavailable { .. })));
    Ok(())
}

#[test]
fn transfer_rejects_duplicate_entries() -> Result<(), Box<dyn std::error::Error>> {
    let mut rig = TestRig::new()?;
    let part = rig.seed_bulk_part("PN0000026", 4)?;
    rig.checkout_to_tech(&[CartItem::bulk(part.clone(), 2)])?;
    let entry = stocktrail_core::InventoryEntry::bulk(part, 1);
    let result = rig.ledger.transfer(
        rig.kiosk_operator,
        &TransferAuth::default(),
        &rig.tech_holder(),
        &TransferDestination::AllTechs,
        &[entry.clone(), entry],
        BUILDING,
        &rig.directory,
    );
    assert!(matches!(result, Err(LedgerError::DuplicateEntry(_))));
    Ok(())
}

// ============================================================================
// Stock intake and shrinking
// ============================================================================

#[test]
fn add_stock_rejects_active_serials() -> Result<(), Box<dyn std::error::Error>> {
    let mut rig = TestRig::new()?;
    let part = rig.seed_serialized_part("PN0000030", &["S1"])?;
    let kiosk = rig.kiosk.clone();
    let result = rig.ledger.add_stock(
        rig.kiosk_operator,
        &part,
        kiosk,
        BUILDING,
        None,
        None,
        StockIntake::Serialized { serials: vec![Serial::parse("S1")?] },
        &rig.directory,
    );
    assert!(matches!(result, Err(LedgerError::SerialExists { .. })));
    Ok(())
}

#[test]
fn add_stock_consumable_outside_kiosk_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let mut rig = TestRig::new()?;
    let part = rig.seed_consumable_part("PN0000031", 1)?;
    let result = rig.ledger.add_stock(
        rig.kiosk_operator,
        &part,
        Location::new("Receiving Dock"),
        BUILDING,
        None,
        None,
        StockIntake::Bulk { quantity: 5 },
        &rig.directory,
    );
    assert!(matches!(result, Err(LedgerError::ConsumableOutsideKiosk(_))));
    Ok(())
}

#[test]
fn shrink_location_retires_surplus() -> Result<(), Box<dyn std::error::Error>> {
    let mut rig = TestRig::new()?;
    let part = rig.seed_bulk_part("PN0000032", 5)?;
    let kiosk = rig.kiosk.clone();

    let report = rig.ledger.shrink_location(
        rig.kiosk_operator,
        &part,
        &kiosk,
        BUILDING,
        2,
        &rig.directory,
    )?;
    assert_eq!(report.created, 3);

    let count = rig.ledger.stock_count(
        &RecordQuery::new().part(part.clone()).at(kiosk).in_building(BUILDING),
    )?;
    assert_eq!(count, 2);
    // Nothing else of this part is active anywhere.
    assert_eq!(rig.ledger.stock_count(&RecordQuery::new().part(part))?, 2);
    Ok(())
}

#[test]
fn shrink_location_rejects_serialized_parts() -> Result<(), Box<dyn std::error::Error>> {
    let mut rig = TestRig::new()?;
    let part = rig.seed_serialized_part("PN0000033", &["S1"])?;
    let kiosk = rig.kiosk.clone();
    let result = rig.ledger.shrink_location(
        rig.kiosk_operator,
        &part,
        &kiosk,
        BUILDING,
        0,
        &rig.directory,
    );
    assert!(matches!(result, Err(LedgerError::SerializedShrink(_))));
    Ok(())
}

// ============================================================================
// Validate/commit race
// ============================================================================

#[test]
fn commit_silently_skips_items_lost_to_a_race() -> Result<(), Box<dyn std::error::Error>> {
    let mut rig = TestRig::new()?;
    let part = rig.seed_bulk_part("PN0000040", 3)?;

    // Validation sees 3 units in stock.
    let kiosk = rig.kiosk.clone();
    let plan = rig.ledger.prepare_checkout(
        &kiosk,
        BUILDING,
        rig.tech,
        &[CartItem::bulk(part.clone(), 2)],
        &rig.directory,
    )?;

    // A concurrent caller drains the kiosk between validation and commit.
    let sources = rig
        .ledger
        .store()
        .find_active(&RecordQuery::new().part(part.clone()))?;
    let stamp = stocktrail_core::Stamp::new(u64::MAX - 1, 0);
    for source in sources {
        rig.ledger.store_mut().close(
            source.record_id,
            Succession::Retired(Disposition::Lost),
            None,
            stamp,
        )?;
    }

    // The commit cannot fail the request: the starved item is skipped.
    let report = rig.ledger.commit(rig.kiosk_operator, &plan);
    assert_eq!(report.created, 0);
    assert_eq!(report.skipped, 2);
    assert!(rig.ledger.holder_inventory(&rig.tech_holder())?.is_empty());
    Ok(())
}

#[test]
fn unknown_part_rejected_everywhere() -> Result<(), Box<dyn std::error::Error>> {
    let mut rig = TestRig::new()?;
    let ghost = stocktrail_core::PartId::parse("PN9999999")?;
    let result = rig.checkout_to_tech(&[CartItem::bulk(ghost.clone(), 1)]);
    assert!(matches!(result, Err(LedgerError::UnknownPart(_))));
    let result = rig.ledger.delete_part(&ghost);
    assert!(matches!(result, Err(LedgerError::UnknownPart(_))));
    Ok(())
}

#[test]
fn directory_is_consulted_not_cached() -> Result<(), Box<dyn std::error::Error>> {
    // Two calls with different directories see different kiosk sets.
    let mut rig = TestRig::new()?;
    let part = rig.seed_consumable_part("PN0000041", 1)?;

    let mut other_dir = StaticDirectory::new();
    other_dir.add_kiosk(BUILDING, "Receiving Dock");
    let operator = rig.kiosk_operator;
    let result = rig.ledger.add_stock(
        operator,
        &part,
        Location::new("Receiving Dock"),
        BUILDING,
        None,
        None,
        StockIntake::Bulk { quantity: 1 },
        &other_dir,
    );
    assert!(result.is_ok());
    Ok(())
}
