//! Record store module
//!
//! This module provides all persistence for the notebook:
//! - Model definitions
//! - JSON documents on disk
//! - The in-memory record store

pub mod documents;
pub mod models;
pub mod repository;

pub use documents::{ChapterMap, Documents};
pub use models::*;
pub use repository::{CascadeReport, RecordStore, SharedStore};
