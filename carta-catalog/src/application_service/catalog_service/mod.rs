pub mod service;

pub use service::{CatalogError, CatalogService};
