use stocktrail_core::{Location, UserId};
use stocktrail_engine::Directory;

/// Fixed user/kiosk directory for tests. Users carry a building; kiosks are
/// (building, name) pairs.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    users: Vec<(UserId, u32)>,
    kiosks: Vec<(u32, Location)>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&mut self, building: u32) -> UserId {
        let user = UserId::new();
        self.users.push((user, building));
        user
    }

    pub fn add_kiosk(&mut self, building: u32, name: &str) -> Location {
        let location = Location::new(name);
        self.kiosks.push((building, location.clone()));
        location
    }
}

impl Directory for StaticDirectory {
    fn user_exists(&self, user: &UserId) -> bool {
        self.users.iter().any(|(u, _)| u == user)
    }

    fn user_building(&self, user: &UserId) -> Option<u32> {
        self.users.iter().find(|(u, _)| u == user).map(|(_, b)| *b)
    }

    fn kiosk_names(&self, building: u32) -> Vec<Location> {
        self.kiosks
            .iter()
            .filter(|(b, _)| *b == building)
            .map(|(_, l)| l.clone())
            .collect()
    }

    fn all_kiosk_names(&self) -> Vec<Location> {
        self.kiosks.iter().map(|(_, l)| l.clone()).collect()
    }
}
