//! Driven ports the boot sequence and pipeline depend on.
//!
//! One port per file, each with a fixture implementation suitable for
//! configurations without external services and for tests.

mod association_directory;
mod crash_report;
mod data_mapper;
mod schema_guard;

pub use association_directory::{
    AssociationDirectory, DirectoryError, FixtureAssociationDirectory,
};
pub use crash_report::{CrashReport, FaultEvent, NoopCrashReport};
pub use data_mapper::{DataMapper, DataMapperError, FixtureDataMapper};
pub use schema_guard::{FixtureSchemaGuard, SchemaGuard, SchemaGuardError};
