pub mod cart;
pub mod catalog;
pub mod error;
pub mod ids;
pub mod record;
pub mod stamp;

pub use cart::{CartItem, CartPayload, InventoryEntry, records_to_cart_items};
pub use catalog::{CatalogEntry, CategoryDetail};
pub use error::CoreError;
pub use ids::*;
pub use record::{Disposition, Holder, Location, NewRecord, PartRecord, Succession};
pub use stamp::{Stamp, StampClock};
