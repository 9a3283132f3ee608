use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use super::traits::ZoneStore;
use super::update::{ZoneFilter, ZoneUpdate};
use crate::domain::{ChangeType, Zone};
use crate::error::{GeozonesError, Result};

/// In-memory zone store, persisted as a JSON array of zones
#[derive(Clone, Default)]
pub struct InMemoryZoneStore {
    zones: Arc<Mutex<BTreeMap<String, Zone>>>,
}

impl InMemoryZoneStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, Zone>>> {
        self.zones.lock().map_err(|e| GeozonesError::Store {
            message: format!("zone store lock poisoned: {}", e),
        })
    }

    /// Write every zone to `path` as pretty printed JSON
    pub async fn export_json(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let zones: Vec<Zone> = self.lock()?.values().cloned().collect();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(&zones)?;
        tokio::fs::write(path, json).await?;
        debug!("Exported {} zones to {}", zones.len(), path.display());
        Ok(zones.len())
    }

    /// Load a store previously written by [`InMemoryZoneStore::export_json`]
    pub async fn import_json(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path.as_ref()).await?;
        let zones: Vec<Zone> = serde_json::from_slice(&bytes)?;
        let store = Self::new();
        {
            let mut map = store.lock()?;
            for zone in zones {
                map.insert(zone.id.clone(), zone);
            }
        }
        Ok(store)
    }
}

/// Merge a freshly extracted zone into the stored one
fn merge_into(stored: &mut Zone, incoming: Zone) -> bool {
    let before = stored.clone();

    if stored.name.is_empty() {
        stored.name = incoming.name;
    }
    stored.population = stored.population.or(incoming.population);
    stored.area = stored.area.or(incoming.area);
    stored.wikidata = stored.wikidata.take().or(incoming.wikidata);
    stored.wikipedia = stored.wikipedia.take().or(incoming.wikipedia);
    stored.dbpedia = stored.dbpedia.take().or(incoming.dbpedia);
    stored.website = stored.website.take().or(incoming.website);
    stored.flag = stored.flag.take().or(incoming.flag);
    for (scheme, value) in incoming.keys {
        stored.keys.entry(scheme).or_insert(value);
    }
    stored.parents.extend(incoming.parents);

    *stored != before
}

#[async_trait]
impl ZoneStore for InMemoryZoneStore {
    async fn save_zone(&self, zone: Zone) -> Result<ChangeType> {
        let mut zones = self.lock()?;
        match zones.get_mut(&zone.id) {
            Some(stored) => {
                if merge_into(stored, zone) {
                    debug!("Updated zone {}", stored.id);
                    Ok(ChangeType::Updated)
                } else {
                    Ok(ChangeType::NoChange)
                }
            }
            None => {
                debug!("Created zone {}", zone.id);
                zones.insert(zone.id.clone(), zone);
                Ok(ChangeType::Created)
            }
        }
    }

    async fn get_zone(&self, id: &str) -> Result<Option<Zone>> {
        Ok(self.lock()?.get(id).cloned())
    }

    async fn find_by_key(&self, level: &str, scheme: &str, value: &str) -> Result<Option<Zone>> {
        let zones = self.lock()?;
        let zone = zones
            .values()
            .find(|z| z.level == level && z.key(scheme) == Some(value))
            .cloned();
        Ok(zone)
    }

    async fn zones(&self, filter: &ZoneFilter) -> Result<Vec<Zone>> {
        let zones = self.lock()?;
        Ok(zones.values().filter(|z| filter.matches(z)).cloned().collect())
    }

    async fn update_one(&self, id: &str, update: &ZoneUpdate) -> Result<bool> {
        let mut zones = self.lock()?;
        Ok(zones.get_mut(id).map_or(false, |zone| update.apply(zone)))
    }

    async fn update_many(&self, filter: &ZoneFilter, update: &ZoneUpdate) -> Result<u64> {
        let mut zones = self.lock()?;
        let mut modified = 0;
        for zone in zones.values_mut().filter(|z| filter.matches(z)) {
            if update.apply(zone) {
                modified += 1;
            }
        }
        Ok(modified)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }
}
