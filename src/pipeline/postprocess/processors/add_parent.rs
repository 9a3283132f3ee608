use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeSet;

use crate::pipeline::merge::apply_non_null_fields;
use crate::pipeline::postprocess::Postprocessor;
use crate::storage::{ZoneFilter, ZoneStore, ZoneUpdate};

/// Adds one parent to every zone of a level whose code is listed. Set-union only.
pub struct AddParent {
    name: String,
    level: String,
    codes: BTreeSet<String>,
    parent: String,
}

impl AddParent {
    pub fn new<I, S>(name: &str, level: &str, codes: I, parent: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_string(),
            level: level.to_string(),
            codes: codes.into_iter().map(Into::into).collect(),
            parent: parent.to_string(),
        }
    }
}

#[async_trait]
impl Postprocessor for AddParent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, store: &dyn ZoneStore, _today: NaiveDate) -> anyhow::Result<u64> {
        let filter = ZoneFilter::level(&self.level).codes(self.codes.iter().cloned());
        let update = ZoneUpdate::new().add_parent(self.parent.clone());
        Ok(apply_non_null_fields(store, &filter, &update).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Zone;
    use crate::storage::InMemoryZoneStore;

    #[tokio::test]
    async fn test_idempotent_and_never_removes_parents() {
        let store = InMemoryZoneStore::new();
        for code in ["fr", "de", "us"] {
            store
                .save_zone(Zone::new("country", code, code).with_parent("country-group:world"))
                .await
                .unwrap();
        }
        store.save_zone(Zone::new("country-group", "fr", "Not a country")).await.unwrap();

        let processor = AddParent::new("eu", "country", ["fr", "de", "gb"], "country-group:ue");
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(processor.process(&store, today).await.unwrap(), 2);
        let once = store.zones(&ZoneFilter::all()).await.unwrap();

        assert_eq!(processor.process(&store, today).await.unwrap(), 0);
        let twice = store.zones(&ZoneFilter::all()).await.unwrap();
        assert_eq!(once, twice);

        let france = store.get_zone("country:fr").await.unwrap().unwrap();
        assert!(france.parents.contains("country-group:world"));
        assert!(france.parents.contains("country-group:ue"));
        let us = store.get_zone("country:us").await.unwrap().unwrap();
        assert!(!us.parents.contains("country-group:ue"));
        let group = store.get_zone("country-group:fr").await.unwrap().unwrap();
        assert!(group.parents.is_empty());
    }
}
