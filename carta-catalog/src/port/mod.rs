pub mod auth_context;
pub mod resource_reader;
pub mod storage_backend;

pub use auth_context::AuthContext;
pub use resource_reader::{ResourceReadError, ResourceReader, RetrievedResource};
pub use storage_backend::{BatchOutcome, StorageBackend, StorageFault, TransactionToken};
