//! Bundle storage backed by a directory of exported YAML files.
//!
//! Files are named `<bundle_type>.<bundle_id>.yml`; anything else in the
//! directory is ignored. The directory is read once on open.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::{BundleConfig, BundleStorage, MemoryBundleStorage};
use crate::error::{RdfGraphError, Result};

pub struct YamlBundleStorage {
    dir: PathBuf,
    cache: MemoryBundleStorage,
}

impl YamlBundleStorage {
    /// Read every bundle file under `dir`.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            return Err(RdfGraphError::Config(format!(
                "Bundle configuration directory does not exist: {}",
                dir.display()
            )));
        }

        let cache = MemoryBundleStorage::new();
        for entry in WalkDir::new(&dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some((bundle_type, bundle_id)) = split_file_name(path) else {
                log::debug!("Skipping non-bundle file {}", path.display());
                continue;
            };

            let content = fs::read_to_string(path)?;
            let mut bundle: BundleConfig = serde_yaml_ng::from_str(&content)?;
            if bundle.id.is_empty() {
                bundle.id = bundle_id.clone();
            } else if bundle.id != bundle_id {
                return Err(RdfGraphError::Config(format!(
                    "Bundle id '{}' does not match file name {}",
                    bundle.id,
                    path.display()
                )));
            }
            cache.save(&bundle_type, &bundle)?;
        }

        log::info!("Loaded {} bundle configurations from {}", cache.len()?, dir.display());
        Ok(Self { dir, cache })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_path(&self, bundle_type: &str, bundle_id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}.yml", bundle_type, bundle_id))
    }
}

impl BundleStorage for YamlBundleStorage {
    fn load(&self, bundle_type: &str, bundle_id: &str) -> Result<Option<BundleConfig>> {
        self.cache.load(bundle_type, bundle_id)
    }

    fn load_multiple(&self, bundle_type: &str) -> Result<Vec<BundleConfig>> {
        self.cache.load_multiple(bundle_type)
    }

    fn save(&self, bundle_type: &str, bundle: &BundleConfig) -> Result<()> {
        bundle.validate()?;
        let yaml = serde_yaml_ng::to_string(bundle)?;
        fs::write(self.file_path(bundle_type, &bundle.id), yaml)?;
        self.cache.save(bundle_type, bundle)
    }
}

/// `rdf_type.article.yml` -> `("rdf_type", "article")`
fn split_file_name(path: &Path) -> Option<(String, String)> {
    let extension = path.extension()?.to_str()?.to_lowercase();
    if !matches!(extension.as_str(), "yml" | "yaml") {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let (bundle_type, bundle_id) = stem.split_once('.')?;
    if bundle_type.is_empty() || bundle_id.is_empty() || bundle_id.contains('.') {
        return None;
    }
    Some((bundle_type.to_string(), bundle_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const EVENT: &str = r#"
rid: event
name: Event
third_party_settings:
  rdf_entity:
    graph_default: 'http://example.org/event'
"#;

    #[test]
    fn test_open_reads_bundle_files() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("rdf_type.event.yml"), EVENT).unwrap();
        fs::write(temp_dir.path().join("README.md"), "ignored").unwrap();
        fs::write(temp_dir.path().join("system.site.extra.yml"), "ignored: true").unwrap();

        let storage = YamlBundleStorage::open(temp_dir.path()).unwrap();
        let bundle = storage.load("rdf_type", "event").unwrap().unwrap();
        assert_eq!(bundle.label, "Event");
        assert_eq!(bundle.graph_uri("default"), Some("http://example.org/event"));
        assert_eq!(storage.load_multiple("rdf_type").unwrap().len(), 1);
    }

    #[test]
    fn test_id_taken_from_file_name() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("rdf_type.news.yml"), "name: News\n").unwrap();
        let storage = YamlBundleStorage::open(temp_dir.path()).unwrap();
        assert_eq!(storage.load("rdf_type", "news").unwrap().unwrap().id, "news");
    }

    #[test]
    fn test_mismatched_id_is_error() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("rdf_type.other.yml"), EVENT).unwrap();
        assert!(YamlBundleStorage::open(temp_dir.path()).is_err());
    }

    #[test]
    fn test_save_writes_file() {
        let temp_dir = TempDir::new().unwrap();
        let storage = YamlBundleStorage::open(temp_dir.path()).unwrap();
        let bundle = BundleConfig::new("page", "Page").with_graph_uri("default", "http://example.org/page");
        storage.save("rdf_type", &bundle).unwrap();
        assert!(temp_dir.path().join("rdf_type.page.yml").exists());

        let reopened = YamlBundleStorage::open(temp_dir.path()).unwrap();
        assert_eq!(reopened.load("rdf_type", "page").unwrap(), Some(bundle));
    }

    #[test]
    fn test_open_missing_dir() {
        let temp_dir = TempDir::new().unwrap();
        assert!(YamlBundleStorage::open(temp_dir.path().join("nope")).is_err());
    }

    #[test]
    fn test_split_file_name() {
        assert_eq!(
            split_file_name(Path::new("a/rdf_type.article.yml")),
            Some(("rdf_type".to_string(), "article".to_string()))
        );
        assert_eq!(split_file_name(Path::new("rdf_type.yml")), None);
        assert_eq!(split_file_name(Path::new("rdf_type.article.json")), None);
    }
}
