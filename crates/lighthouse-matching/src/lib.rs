//! Image descriptions, match scoring and the on-disk catalog.

pub mod catalog;
pub mod description;
pub mod error;
pub mod extractor;
pub mod layout;
pub mod matcher;
pub mod record;
pub mod scorer;
pub mod settings;

pub use catalog::{Catalog, LoadSummary};
pub use description::{ElementType, ImageDescription, Matrix};
pub use error::{MatchingError, MatchingResult};
pub use extractor::DescriptorExtractor;
pub use layout::CatalogLayout;
pub use matcher::ImageMatcher;
pub use record::MatrixRecord;
pub use scorer::{GoodMatch, MatchScorer, ScoredMatch};
pub use settings::MatchingSettings;
