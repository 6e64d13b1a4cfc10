pub mod auth;
pub mod in_memory_storage;
pub mod subject_stage;

#[cfg(feature = "federation")]
pub mod federation_reader;

pub use auth::StaticAuthContext;
pub use in_memory_storage::InMemoryStorageBackend;
pub use subject_stage::SubjectStage;

#[cfg(feature = "federation")]
pub use federation_reader::FederationResourceReader;
