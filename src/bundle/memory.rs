use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::{BundleConfig, BundleStorage};
use crate::error::{RdfGraphError, Result};

type BundleMap = BTreeMap<String, BTreeMap<String, BundleConfig>>;

/// In-process bundle storage.
///
/// Also used as the read cache behind [`super::YamlBundleStorage`].
#[derive(Default)]
pub struct MemoryBundleStorage {
    bundles: Mutex<BundleMap>,
}

impl MemoryBundleStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a storage from bundles of a single type, validating each one.
    pub fn with_bundles<I>(bundle_type: &str, bundles: I) -> Result<Self>
    where
        I: IntoIterator<Item = BundleConfig>,
    {
        let storage = Self::new();
        for bundle in bundles {
            storage.save(bundle_type, &bundle)?;
        }
        Ok(storage)
    }

    /// Number of stored bundles across all types
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.values().map(BTreeMap::len).sum())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, BundleMap>> {
        self.bundles
            .lock()
            .map_err(|_| RdfGraphError::Config("bundle storage lock poisoned".to_string()))
    }
}

impl BundleStorage for MemoryBundleStorage {
    fn load(&self, bundle_type: &str, bundle_id: &str) -> Result<Option<BundleConfig>> {
        Ok(self
            .lock()?
            .get(bundle_type)
            .and_then(|bundles| bundles.get(bundle_id))
            .cloned())
    }

    fn load_multiple(&self, bundle_type: &str) -> Result<Vec<BundleConfig>> {
        Ok(self
            .lock()?
            .get(bundle_type)
            .map(|bundles| bundles.values().cloned().collect())
            .unwrap_or_default())
    }

    fn save(&self, bundle_type: &str, bundle: &BundleConfig) -> Result<()> {
        bundle.validate()?;
        self.lock()?
            .entry(bundle_type.to_string())
            .or_default()
            .insert(bundle.id.clone(), bundle.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load() {
        let storage = MemoryBundleStorage::new();
        assert!(storage.is_empty().unwrap());

        let bundle = BundleConfig::new("article", "Article")
            .with_graph_uri("default", "http://example.org/article");
        storage.save("rdf_type", &bundle).unwrap();

        assert_eq!(storage.load("rdf_type", "article").unwrap(), Some(bundle));
        assert_eq!(storage.load("rdf_type", "missing").unwrap(), None);
        assert_eq!(storage.load("node_type", "article").unwrap(), None);
        assert_eq!(storage.len().unwrap(), 1);
    }

    #[test]
    fn test_load_multiple_sorted_by_id() {
        let storage = MemoryBundleStorage::with_bundles(
            "rdf_type",
            vec![BundleConfig::new("zeta", "Z"), BundleConfig::new("alpha", "A")],
        )
        .unwrap();
        let ids: Vec<_> = storage
            .load_multiple("rdf_type")
            .unwrap()
            .into_iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(ids, vec!["alpha", "zeta"]);
        assert!(storage.load_multiple("other").unwrap().is_empty());
    }

    #[test]
    fn test_save_rejects_invalid_bundle() {
        let storage = MemoryBundleStorage::new();
        let bundle = BundleConfig::new("article", "Article").with_graph_uri("default", "nope");
        assert!(storage.save("rdf_type", &bundle).is_err());
        assert!(storage.is_empty().unwrap());
    }

    #[test]
    fn test_save_replaces() {
        let storage = MemoryBundleStorage::new();
        storage.save("t", &BundleConfig::new("a", "First")).unwrap();
        storage.save("t", &BundleConfig::new("a", "Second")).unwrap();
        assert_eq!(storage.load("t", "a").unwrap().unwrap().label, "Second");
        assert_eq!(storage.len().unwrap(), 1);
    }

    #[test]
    fn test_poisoned_lock_is_an_error() {
        let storage = std::sync::Arc::new(MemoryBundleStorage::new());
        let poisoner = storage.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.bundles.lock().unwrap();
            panic!("poison the bundle lock");
        })
        .join();

        assert!(matches!(storage.len(), Err(RdfGraphError::Config(_))));
        assert!(storage.is_empty().is_err());
        assert!(storage.load_multiple("rdf_type").is_err());
    }
}
