//! Scoped access to a supplier workbook file.
//!
//! The handle is opened, consumed by one run and dropped deterministically.
//! The server process lives for weeks and must not leak file handles across
//! repeated runs.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader, Sheets};
use sha2::{Digest, Sha256};

use hwcat_core::SheetLayout;

use crate::EngineError;

pub struct Workbook {
    sheets: Sheets<BufReader<File>>,
    sheet_names: Vec<String>,
}

impl std::fmt::Debug for Workbook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workbook")
            .field("sheet_names", &self.sheet_names)
            .finish_non_exhaustive()
    }
}

impl Workbook {
    /// Opens a workbook of any supported format (`.xlsx`, `.xlsm`, `.xls`).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::WorkbookOpen`] when the file cannot be opened
    /// or is not a readable workbook.
    pub fn open(path: &Path) -> Result<Self, EngineError> {
        let sheets = open_workbook_auto(path).map_err(|source| EngineError::WorkbookOpen {
            path: path.display().to_string(),
            source,
        })?;
        let sheet_names = sheets.sheet_names();
        Ok(Self {
            sheets,
            sheet_names,
        })
    }

    #[must_use]
    pub fn has_sheet(&self, name: &str) -> bool {
        self.sheet_names.iter().any(|n| n == name)
    }

    /// Returns the full cell range of the layout's price sheet.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MissingSheet`] when the configured price sheet
    /// does not exist (a configuration error that aborts the run before any
    /// catalog mutation), or [`EngineError::SheetRead`] when the sheet cannot
    /// be parsed.
    pub fn price_range(&mut self, layout: &SheetLayout) -> Result<Range<Data>, EngineError> {
        if !self.has_sheet(&layout.price_sheet) {
            return Err(EngineError::MissingSheet {
                name: layout.price_sheet.clone(),
            });
        }
        self.sheets
            .worksheet_range(&layout.price_sheet)
            .map_err(|source| EngineError::SheetRead {
                name: layout.price_sheet.clone(),
                source,
            })
    }

    /// Reads the supplier-discount header cell from the layout's order
    /// sheet.
    ///
    /// A template without an order sheet, a workbook missing that sheet, or
    /// an out-of-range address all yield `None`; discount resolution falls
    /// through to the default instead of failing the run.
    pub fn discount_cell(&mut self, layout: &SheetLayout) -> Option<Data> {
        let sheet = layout.order_sheet.as_deref()?;
        let address = layout.discount_cell?;

        if !self.has_sheet(sheet) {
            tracing::warn!(sheet, "order sheet missing; discount will fall back");
            return None;
        }

        match self.sheets.worksheet_range(sheet) {
            Ok(range) => range.get_value((address.row, address.col)).cloned(),
            Err(error) => {
                tracing::warn!(sheet, %error, "order sheet unreadable; discount will fall back");
                None
            }
        }
    }
}

/// SHA-256 of the workbook file, recorded on the run for auditability.
///
/// # Errors
///
/// Returns [`EngineError::WorkbookHash`] on I/O failure.
pub fn workbook_sha256(path: &Path) -> Result<String, EngineError> {
    let map_err = |source| EngineError::WorkbookHash {
        path: path.display().to_string(),
        source,
    };

    let file = File::open(path).map_err(map_err)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf).map_err(map_err)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn sha256_of_empty_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("empty.xlsx");
        File::create(&path).expect("create");
        assert_eq!(
            workbook_sha256(&path).expect("hash"),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn sha256_of_known_bytes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("abc.bin");
        File::create(&path)
            .and_then(|mut f| f.write_all(b"abc"))
            .expect("write");
        assert_eq!(
            workbook_sha256(&path).expect("hash"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn sha256_missing_file_is_an_error() {
        let err = workbook_sha256(Path::new("/nonexistent/proveedor.xlsm")).unwrap_err();
        assert!(matches!(err, EngineError::WorkbookHash { .. }));
    }

    #[test]
    fn open_missing_workbook_is_an_error() {
        let err = Workbook::open(Path::new("/nonexistent/proveedor.xlsm")).unwrap_err();
        assert!(matches!(err, EngineError::WorkbookOpen { .. }));
    }
}
