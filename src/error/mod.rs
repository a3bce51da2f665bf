//! Error types for the collection itself and helpers for producers.
//!
//! Domain errors describe why a collection operation was refused. The
//! operational helpers let producer code route failures into a collection
//! instead of propagating them.

pub mod domain;
pub mod operational;

pub use {
    domain::{CollectionError, Result},
    operational::ResultExt,
};
