pub mod error;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use error::StoreError;
pub use sqlite::SqliteStore;
pub use traits::{CheckoutLogQuery, LedgerStore, RecordQuery, SerialFilter, UnitKey};
