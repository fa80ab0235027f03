//! easyqc-core: rating modules, rating records, and the rating file store.
//!
//! This crate defines the data model every other easyqc crate builds on:
//! ordered module/score/tag registries, the on-disk rating file contract,
//! and the rating session that edits one subject at a time.

pub mod error;
pub mod model;
pub mod modules;
pub mod project;
pub mod registry;
pub mod session;
pub mod store;
pub mod template;

pub use error::{ModuleError, RegistryError, SessionError, StoreError};
pub use model::{CodeExe, ModuleDefinition, RatingRecord, ScoreDef, TagDef};
pub use modules::ModuleRegistry;
pub use project::{Project, ProjectSettings};
pub use registry::OrdinalRegistry;
pub use session::RatingSession;
pub use store::{Access, LoadOutcome, RatingFileStore};
