//! PostgreSQL adapters implementing the persistence-facing ports.

pub mod diesel_association_directory;
pub mod diesel_data_mapper;
pub mod diesel_schema_guard;
pub mod pool;
pub mod schema;

pub use diesel_association_directory::DieselAssociationDirectory;
pub use diesel_data_mapper::DieselDataMapper;
pub use diesel_schema_guard::{DieselSchemaGuard, MIGRATIONS};
pub use pool::{DbPool, PoolConfig, PoolError};
