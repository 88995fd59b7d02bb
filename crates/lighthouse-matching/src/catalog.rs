use std::collections::HashMap;
use std::ffi::OsStr;
use std::sync::Arc;

use tracing::{info, warn};

use crate::description::ImageDescription;
use crate::error::{MatchingError, MatchingResult};
use crate::layout::{CatalogLayout, DESCRIPTION_FILE};
use crate::record;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub loaded: usize,
    pub skipped: usize,
}

/// Descriptions known to the appliance, keyed by id.
#[derive(Debug, Default)]
pub struct Catalog {
    entries: HashMap<String, Arc<ImageDescription>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads every entry directory under the layout root. Unreadable or
    /// corrupt records, and records whose id differs from their directory
    /// name, are logged and skipped.
    pub fn load_all(layout: &CatalogLayout) -> (Self, LoadSummary) {
        let mut catalog = Self::new();
        let mut summary = LoadSummary::default();
        let dirs = match layout.entry_dirs() {
            Ok(dirs) => dirs,
            Err(err) => {
                warn!(root = %layout.root().display(), error = %err, "cannot list catalog");
                return (catalog, summary);
            }
        };
        for dir in dirs {
            let path = dir.join(DESCRIPTION_FILE);
            match record::load(&path) {
                Ok(description) if dir.file_name() != Some(OsStr::new(description.id())) => {
                    warn!(
                        path = %path.display(),
                        id = %description.id(),
                        "skipping catalog record stored under another id"
                    );
                    summary.skipped += 1;
                }
                Ok(description) => {
                    catalog.add(description);
                    summary.loaded += 1;
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping catalog record");
                    summary.skipped += 1;
                }
            }
        }
        info!(
            loaded = summary.loaded,
            skipped = summary.skipped,
            "catalog loaded"
        );
        (catalog, summary)
    }

    pub fn add(&mut self, description: ImageDescription) -> Arc<ImageDescription> {
        let description = Arc::new(description);
        self.entries
            .insert(description.id().to_string(), Arc::clone(&description));
        description
    }

    pub fn get(&self, id: &str) -> MatchingResult<Arc<ImageDescription>> {
        self.entries
            .get(id)
            .cloned()
            .ok_or_else(|| MatchingError::not_found(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids in lexical order.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn descriptions(&self) -> impl Iterator<Item = &Arc<ImageDescription>> {
        self.entries.values()
    }
}
