pub mod connection;
pub mod staging;
pub mod vectors;

pub use connection::{init_database, SchemaSpec, STAGING_SCHEMA, VECTOR_SCHEMA};
pub use staging::StagingRepository;
pub use vectors::VectorRepository;
