//! Canonical Schema Module
//!
//! The comparison-ready schema representation shared by both sides of the
//! audit: the expected schema projected from migration operations and the
//! actual schema introspected from the live database. Using one canonical
//! format for both enables apples-to-apples comparison.

pub mod fingerprint;
pub mod model;
pub mod types;

pub use fingerprint::schema_fingerprint;
pub use model::{Column, Schema, Table};
pub use types::{TypeMap, UNKNOWN_TYPE};
