use async_trait::async_trait;

use super::update::{ZoneFilter, ZoneUpdate};
use crate::domain::{ChangeType, Zone};
use crate::error::Result;

/// Storage trait for persisting zones
#[async_trait]
pub trait ZoneStore: Send + Sync {
    /// Create a zone, or merge it into the stored one with the same id.
    ///
    /// Merging never changes `code` or immutable keys, unions parents, and
    /// only fills fields the stored zone is missing.
    async fn save_zone(&self, zone: Zone) -> Result<ChangeType>;

    async fn get_zone(&self, id: &str) -> Result<Option<Zone>>;

    /// Single-key lookup by any entry of the `keys` mapping
    async fn find_by_key(&self, level: &str, scheme: &str, value: &str) -> Result<Option<Zone>>;

    /// Zones matching the filter, ordered by id
    async fn zones(&self, filter: &ZoneFilter) -> Result<Vec<Zone>>;

    /// Apply a partial update to one zone. Returns whether it changed.
    async fn update_one(&self, id: &str, update: &ZoneUpdate) -> Result<bool>;

    /// Apply a partial update to every matching zone. Returns the modified count.
    async fn update_many(&self, filter: &ZoneFilter, update: &ZoneUpdate) -> Result<u64>;

    async fn count(&self) -> Result<usize>;
}
