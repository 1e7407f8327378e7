//! Multi-tenant metadata store
//!
//! Typed key/value attributes are attached to owners identified by tenant,
//! owner type and owner id, then read back by key or found through
//! multi-criteria owner search.

pub mod codec;
pub mod config;
pub mod error;
pub mod metadata;
pub mod models;
pub mod search;
pub mod state;

pub use config::Config;
pub use error::{AppError, Result};
pub use metadata::MetadataService;
pub use search::{ConstraintGroup, Page, PageRequest, SearchEngine, SortField, SortOrder};
pub use state::{create_store, AttributeStore, RowScope};
