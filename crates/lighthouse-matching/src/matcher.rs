use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use lighthouse_types::ImageFrame;
use tracing::{debug, info};

use crate::catalog::{Catalog, LoadSummary};
use crate::description::ImageDescription;
use crate::error::MatchingResult;
use crate::extractor::DescriptorExtractor;
use crate::layout::CatalogLayout;
use crate::record;
use crate::scorer::{GoodMatch, MatchScorer, ScoredMatch};
use crate::settings::MatchingSettings;

/// Extraction, scoring and the catalog behind one handle.
///
/// Reads may come from any thread. The catalog is only written by the
/// appliance loop, which is the one context that records items.
#[derive(Debug)]
pub struct ImageMatcher {
    settings: MatchingSettings,
    extractor: DescriptorExtractor,
    scorer: MatchScorer,
    layout: CatalogLayout,
    catalog: RwLock<Catalog>,
}

impl ImageMatcher {
    pub fn new(settings: MatchingSettings, layout: CatalogLayout) -> MatchingResult<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            extractor: DescriptorExtractor::new(&settings),
            scorer: MatchScorer::new(settings),
            layout,
            catalog: RwLock::new(Catalog::new()),
        })
    }

    /// Creates the data directory if needed and loads every readable record
    /// from it.
    pub fn open(
        settings: MatchingSettings,
        layout: CatalogLayout,
    ) -> MatchingResult<(Self, LoadSummary)> {
        layout.ensure_root()?;
        let (catalog, summary) = Catalog::load_all(&layout);
        let matcher = Self::new(settings, layout)?;
        *matcher.catalog_mut() = catalog;
        Ok((matcher, summary))
    }

    pub fn settings(&self) -> &MatchingSettings {
        &self.settings
    }

    pub fn layout(&self) -> &CatalogLayout {
        &self.layout
    }

    pub fn get_description(&self, frame: &ImageFrame) -> MatchingResult<ImageDescription> {
        self.extractor.extract(frame)
    }

    pub fn find_matches(&self, query: &ImageDescription) -> Vec<ScoredMatch> {
        let catalog = self.catalog();
        let matches = self.scorer.find_matches(query, catalog.descriptions());
        debug!(
            candidates = catalog.len(),
            matches = matches.len(),
            best = matches.first().map(|m| m.score),
            "scored catalog"
        );
        matches
    }

    pub fn good_matches(
        &self,
        query: &ImageDescription,
        candidate: &ImageDescription,
    ) -> Vec<GoodMatch> {
        self.scorer.good_matches(query, candidate)
    }

    pub fn score(&self, query: &ImageDescription, candidate: &ImageDescription) -> Option<f32> {
        self.scorer.score(query, candidate)
    }

    pub fn get_description_by_id(&self, id: &str) -> MatchingResult<Arc<ImageDescription>> {
        self.catalog().get(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.catalog().ids()
    }

    pub fn len(&self) -> usize {
        self.catalog().len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog().is_empty()
    }

    pub fn add_to_db(&self, description: ImageDescription) -> Arc<ImageDescription> {
        let id = description.id().to_string();
        let stored = self.catalog_mut().add(description);
        info!(id = %id, "catalog entry added");
        stored
    }

    /// Writes the description record into its entry directory, creating the
    /// directory when missing.
    pub fn persist(&self, description: &ImageDescription) -> MatchingResult<()> {
        self.layout.ensure_entry_dir(description.id())?;
        record::persist(description, &self.layout.description_path(description.id()))
    }

    fn catalog(&self) -> RwLockReadGuard<'_, Catalog> {
        self.catalog.read().expect("catalog lock poisoned")
    }

    fn catalog_mut(&self) -> RwLockWriteGuard<'_, Catalog> {
        self.catalog.write().expect("catalog lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use lighthouse_types::ImageFrame;
    use tempfile::tempdir;

    use super::*;
    use crate::error::MatchingError;

    fn frame(seed: u32) -> ImageFrame {
        let (width, height) = (160u32, 120u32);
        let mut data = vec![0u8; (width * height * 4) as usize];
        for y in 0..height {
            for x in 0..width {
                let idx = ((y * width + x) * 4) as usize;
                let cell = (x / 8 + y / 8 * 31 + seed * 97) as u64;
                let hashed = cell.wrapping_mul(0x9E37_79B9_7F4A_7C15) >> 56;
                let v = if (x / 8 + y / 8) % 2 == 0 { hashed as u8 } else { 255 - hashed as u8 };
                data[idx..idx + 4].copy_from_slice(&[v, v.wrapping_add(40), v / 3, 255]);
            }
        }
        ImageFrame::from_owned(width, height, data).unwrap()
    }

    #[test]
    fn recorded_items_survive_a_reload() {
        let dir = tempdir().unwrap();
        let layout = CatalogLayout::new(dir.path());
        let (matcher, summary) = ImageMatcher::open(MatchingSettings::default(), layout.clone()).unwrap();
        assert_eq!(summary.loaded, 0);

        let description = matcher.get_description(&frame(1)).unwrap();
        matcher.persist(&description).unwrap();
        matcher.add_to_db(description.clone());

        let (reloaded, summary) = ImageMatcher::open(MatchingSettings::default(), layout).unwrap();
        assert_eq!(summary.loaded, 1);
        assert_eq!(*reloaded.get_description_by_id(description.id()).unwrap(), description);
    }

    #[test]
    fn same_frame_matches_its_own_entry_best() {
        let dir = tempdir().unwrap();
        let matcher = ImageMatcher::new(MatchingSettings::default(), CatalogLayout::new(dir.path())).unwrap();
        let first = matcher.add_to_db(matcher.get_description(&frame(1)).unwrap());
        let _second = matcher.add_to_db(matcher.get_description(&frame(2)).unwrap());

        let query = matcher.get_description(&frame(1)).unwrap();
        let matches = matcher.find_matches(&query);
        assert!(!matches.is_empty());
        assert_eq!(matches[0].description.id(), first.id());
    }

    #[test]
    fn empty_catalog_yields_no_matches() {
        let dir = tempdir().unwrap();
        let matcher = ImageMatcher::new(MatchingSettings::default(), CatalogLayout::new(dir.path())).unwrap();
        let query = matcher.get_description(&frame(3)).unwrap();
        assert!(matcher.find_matches(&query).is_empty());
        assert!(matches!(
            matcher.get_description_by_id("nope"),
            Err(MatchingError::NotFound { .. })
        ));
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let settings = MatchingSettings {
            ratio_test_k: 2.0,
            ..MatchingSettings::default()
        };
        assert!(ImageMatcher::new(settings, CatalogLayout::new("/tmp/unused")).is_err());
    }
}
