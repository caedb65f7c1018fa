//! Operator-supplied overrides loaded from a local CSV file.
//!
//! Each row is `category,identifier`. Only the `txForceSuccess` category is
//! understood; identifiers listed under it report as flagged. Build one
//! `LocalOverrides` at startup and hand it to whatever needs it.

use crate::error::Result;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// Default file name, resolved against the working directory.
pub const DEFAULT_OVERRIDES_FILE: &str = "rosetta_local_fix.csv";

const FORCE_SUCCESS: &str = "txForceSuccess";

#[derive(Debug, Clone, Default)]
pub struct LocalOverrides {
    flagged: HashSet<String>,
}

impl LocalOverrides {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads `path` if it exists; a missing file yields an empty table.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::empty());
        }
        let overrides = Self::from_reader(std::fs::File::open(path)?)?;
        info!(path = %path.display(), entries = overrides.len(), "Loaded local overrides");
        Ok(overrides)
    }

    /// Parses CSV rows. Rows without exactly two fields or with an unknown
    /// category are skipped.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut flagged = HashSet::new();
        for record in csv.records() {
            let record = record?;
            if record.len() != 2 {
                continue;
            }
            if &record[0] == FORCE_SUCCESS {
                flagged.insert(record[1].to_lowercase());
            }
        }
        Ok(Self { flagged })
    }

    /// Identifiers compare case-insensitively.
    pub fn is_flagged(&self, identifier: &str) -> bool {
        self.flagged.contains(&identifier.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.flagged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flagged.is_empty()
    }
}
