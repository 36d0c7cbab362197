pub mod directory;
pub mod rig;

pub use directory::StaticDirectory;
pub use rig::TestRig;
