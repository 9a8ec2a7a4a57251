//! Mistake notebook library
//!
//! A single-user store of logged mistakes filed by subject and chapter, with
//! attached images and zip export/import. Front ends drive it through
//! [`commands::Session`].

pub mod app;
pub mod commands;
pub mod config;
pub mod error;
pub mod selection;
pub mod services;
pub mod storage;
pub mod store;
