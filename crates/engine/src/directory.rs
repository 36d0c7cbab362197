use stocktrail_core::{Location, UserId};

/// Lookup surface of the external user/kiosk catalog. Passed into
/// operations as a parameter so the core never reads ambient name caches.
pub trait Directory {
    fn user_exists(&self, user: &UserId) -> bool;

    fn user_building(&self, user: &UserId) -> Option<u32>;

    /// Kiosk location names in one building.
    fn kiosk_names(&self, building: u32) -> Vec<Location>;

    /// Kiosk location names across all buildings.
    fn all_kiosk_names(&self) -> Vec<Location>;
}

/// Rights of the acting user that gate transfer destinations.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransferAuth {
    /// Building switches and the lost/broken/deleted classes.
    pub stock_admin: bool,
    /// Marking parts sold against an order.
    pub resale: bool,
}
