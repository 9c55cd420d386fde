//! Document-mode catalog persistence.
//!
//! The catalog is one ordered JSON array, the same document the storefront
//! consumes. Commits write a sibling temp file and rename it over the
//! target, so a crash mid-write leaves the previous document intact; the
//! file is never truncated in place.

use std::fs;
use std::path::{Path, PathBuf};

use hwcat_core::CatalogEntry;

use crate::EngineError;

pub struct JsonCatalogStore {
    path: PathBuf,
}

impl JsonCatalogStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the whole catalog document.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DocumentMissing`] when the document does not
    /// exist (bootstrapping an empty catalog is an explicit caller choice,
    /// not a silent default), [`EngineError::DocumentIo`] on read failure,
    /// or [`EngineError::DocumentParse`] on malformed JSON.
    pub fn load(&self) -> Result<Vec<CatalogEntry>, EngineError> {
        if !self.path.exists() {
            return Err(EngineError::DocumentMissing {
                path: self.path.display().to_string(),
            });
        }

        let content = fs::read_to_string(&self.path).map_err(|source| EngineError::DocumentIo {
            path: self.path.display().to_string(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| EngineError::DocumentParse {
            path: self.path.display().to_string(),
            source,
        })
    }

    /// Atomically replaces the catalog document with `entries`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DocumentIo`] if the temp file cannot be
    /// written or renamed into place.
    pub fn commit(&self, entries: &[CatalogEntry]) -> Result<(), EngineError> {
        let io_err = |source| EngineError::DocumentIo {
            path: self.path.display().to_string(),
            source,
        };

        let json = serde_json::to_vec(entries).map_err(|source| EngineError::DocumentParse {
            path: self.path.display().to_string(),
            source,
        })?;

        let tmp = self.tmp_path();
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;

        tracing::info!(
            path = %self.path.display(),
            entries = entries.len(),
            "catalog document committed"
        );
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map_or_else(|| "catalog".into(), std::ffi::OsStr::to_os_string);
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(code: &str, price: f64) -> CatalogEntry {
        let mut e = CatalogEntry::new(code);
        e.description = format!("ITEM {code}");
        e.bs_price_web = Some(price);
        e
    }

    #[test]
    fn commit_then_load_roundtrips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonCatalogStore::new(dir.path().join("productos_precios.json"));

        let entries = vec![entry("22090", 668.16), entry("104010", 45.0)];
        store.commit(&entries).expect("commit");
        let loaded = store.load().expect("load");

        assert_eq!(loaded, entries);
    }

    #[test]
    fn load_missing_document_is_a_distinct_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonCatalogStore::new(dir.path().join("nope.json"));
        let err = store.load().unwrap_err();
        assert!(matches!(err, EngineError::DocumentMissing { .. }));
    }

    #[test]
    fn load_malformed_document_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.json");
        fs::write(&path, "{not json").expect("write");
        let err = JsonCatalogStore::new(&path).load().unwrap_err();
        assert!(matches!(err, EngineError::DocumentParse { .. }));
    }

    #[test]
    fn commit_replaces_previous_document() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonCatalogStore::new(dir.path().join("catalog.json"));

        store.commit(&[entry("A", 1.0)]).expect("first commit");
        store
            .commit(&[entry("A", 2.0), entry("B", 3.0)])
            .expect("second commit");

        let loaded = store.load().expect("load");
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].bs_price_web, Some(2.0));
    }

    #[test]
    fn commit_leaves_no_temp_file_behind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonCatalogStore::new(dir.path().join("catalog.json"));
        store.commit(&[entry("A", 1.0)]).expect("commit");

        let names: Vec<String> = fs::read_dir(dir.path())
            .expect("read_dir")
            .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["catalog.json"]);
    }

    #[test]
    fn loads_sparse_legacy_document() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("legacy.json");
        fs::write(
            &path,
            r#"[{"code":"104010","description":"MARTILLO","bs_price_web":45.0}]"#,
        )
        .expect("write");
        let loaded = JsonCatalogStore::new(&path).load().expect("load");
        assert_eq!(loaded[0].code, "104010");
        assert_eq!(loaded[0].box_qty, 0, "unset legacy fields default");
    }
}
