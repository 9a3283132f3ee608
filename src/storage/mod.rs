// Zone persistence: the store contract, partial updates and the in-memory backend

pub mod in_memory;
pub mod traits;
pub mod update;

pub use in_memory::InMemoryZoneStore;
pub use traits::ZoneStore;
pub use update::{FieldValue, ZoneField, ZoneFilter, ZoneUpdate};
