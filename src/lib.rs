//! Reading, editing, merging and compiling gettext PO catalogs.
//!
//! The binary in `main.rs` exposes the same operations over a line-based
//! JSON protocol (see [`protocol::handle`]).

pub mod error;
pub mod model;
pub mod parsers;
pub mod protocol;
pub mod services;

pub use error::{CatalogError, Result};
pub use model::catalog::{Catalog, EntryFilter, Metadata};
pub use model::entry::{Entry, Occurrence};
pub use model::settings::{Settings, SourceGroup, SourceRoot};
pub use services::locate::Locator;
pub use services::lookup::{ActiveCatalog, CatalogLookup, NullCatalog};
pub use services::merge::{merge, preview, MergeResult, Priority};
pub use services::validate::{FormatIssue, Validator};
