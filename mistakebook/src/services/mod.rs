//! Services module
//!
//! Business logic services that coordinate between commands and the record store.

pub mod archive;
pub mod catalog;
pub mod images;
pub mod mistakes;

pub use archive::{ArchiveService, ImportSummary};
pub use catalog::CatalogService;
pub use images::{AddImagesReport, DeleteImageReport, ImagesService};
pub use mistakes::MistakesService;
