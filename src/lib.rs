//! Formflow
//!
//! Multi-page form builder with conditional page navigation.
//!
//! ## Features
//!
//! - **Builder API**: Create forms with pages, fields and navigation rules
//! - **Embedded Viewer API**: Field visibility and next-page resolution per answer set
//! - **Submissions**: Server-side path replay, validation and normalized records
//!
//! The navigation engine in [`engine`] and the draft editor in [`builder`] are
//! usable without the HTTP layer.

pub mod builder;
pub mod config;
pub mod db;
pub mod engine;
pub mod handlers;
pub mod models;
pub mod validation;
