use crate::error::Result;
use crate::observability::metrics::{emit_counter, MetricName};
use crate::storage::{ZoneFilter, ZoneStore, ZoneUpdate};

/// Write a null-filtered partial update to every zone matching `filter`.
///
/// Shared by group-parent assignment and knowledge-graph enrichment. The
/// update only carries present, non-empty values (see [`ZoneUpdate::set`]),
/// so stored fields the candidate lacks are left untouched and parents are
/// only ever added. Returns the number of zones modified.
pub async fn apply_non_null_fields(store: &dyn ZoneStore, filter: &ZoneFilter, update: &ZoneUpdate) -> Result<u64> {
    if update.is_empty() {
        return Ok(0);
    }
    let modified = store.update_many(filter, update).await?;
    emit_counter(MetricName::ZonesUpdated, modified);
    Ok(modified)
}
