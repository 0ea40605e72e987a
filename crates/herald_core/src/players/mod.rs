//! Player profile state and persistence.

pub mod record;
pub mod registry;
pub mod store;

pub use record::PlayerRecord;
pub use registry::{PlayerRegistry, UnknownPlayer};
pub use store::{JsonFileStore, PersistError, PlayerStore};
