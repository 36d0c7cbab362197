use stocktrail_core::{CoreError, Location, PartId, RecordId, Serial, UserId};
use stocktrail_storage::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("part not found: {0}")]
    UnknownPart(PartId),

    #[error("part already exists: {0}")]
    PartExists(PartId),

    #[error("user not found: {0}")]
    UnknownUser(UserId),

    #[error("record not found: {0}")]
    RecordNotFound(RecordId),

    #[error("{0} is a serialized part, a serial must be specified")]
    SerializedNeedsSerial(PartId),

    #[error("serials are not needed for {0}")]
    SerialNotNeeded(PartId),

    #[error("duplicate serial in request: {part_id}: {serial}")]
    DuplicateSerial { part_id: PartId, serial: Serial },

    #[error("serial already in inventory: {part_id}: {serial}")]
    SerialExists { part_id: PartId, serial: Serial },

    #[error("serial not available at source: {part_id}: {serial}")]
    SerialUnavailable { part_id: PartId, serial: Serial },

    #[error("insufficient stock for {0}")]
    InsufficientStock(PartId),

    #[error("duplicate entries in request for {0}")]
    DuplicateEntry(PartId),

    #[error("new serials missing for {0}")]
    MissingNewSerials(PartId),

    #[error("order reference required to mark parts sold")]
    MissingOrderRef,

    #[error("permission denied: {0}")]
    PermissionDenied(&'static str),

    #[error("malformed cart entry for {0}: needs a serial or a positive quantity")]
    MalformedCart(PartId),

    #[error("target state is malformed")]
    MalformedTarget,

    #[error("{0} is not a serialized part")]
    NotSerialized(PartId),

    #[error("cannot shrink serialized stock for {0}")]
    SerializedShrink(PartId),

    #[error("invalid quantity")]
    InvalidQuantity,

    #[error("consumables can only be stocked at kiosk locations: {0}")]
    ConsumableOutsideKiosk(PartId),

    #[error("not a kiosk location: {0}")]
    UnknownKiosk(Location),

    #[error("queued quantity mismatch for {0}")]
    QueueMismatch(PartId),

    #[error("{0} has not been approved or denied")]
    UndecidedItem(PartId),
}
