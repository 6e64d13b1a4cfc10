pub mod catalog_service;
pub mod pipeline;

pub use catalog_service::{CatalogError, CatalogService};
pub use pipeline::{PluginChain, PostStage, PreStage, StageControl, StageFault};
