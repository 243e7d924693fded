//! # View Module
//!
//! Human-facing pages. A handler reads a snapshot from the coordinator, hands
//! it to one of the [`pages`] builders to get a [`ViewDictionary`], and
//! expands that against a template with the shared [`ViewRenderer`].
//!
//! A lookup that finds nothing still yields a full page: the document
//! carries an [`ErrorAnnotation`] under its page header and the template shows
//! an error panel in place of the entity's fields.

pub mod dictionary;
pub mod pages;
pub mod renderer;

pub use dictionary::{ErrorAnnotation, ViewDictionary};
pub use pages::{template, Overview, EMPTY_OUTPUT_COUNT};
pub use renderer::ViewRenderer;
