//! # DocuDB Testkit
//!
//! Test utilities for DocuDB.
//!
//! This crate provides:
//! - Temporary engines and pre-built collections
//! - Property-based generators for records and numeric literals
//! - A one-time test logging initializer
//!
//! ## Usage
//!
//! ```rust,ignore
//! use docudb_testkit::prelude::*;
//!
//! #[test]
//! fn insert_and_select() {
//!     with_temp_engine(|engine| {
//!         engine.datastores().create_datastore("shop").unwrap();
//!         // ... test operations
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod logging;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
}

pub use fixtures::*;
pub use generators::*;
pub use logging::*;
