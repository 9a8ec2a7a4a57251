//! Storage module
//!
//! Provides the managed directory for image files attached to mistakes.

pub mod image_store;

pub use image_store::ImageStore;
