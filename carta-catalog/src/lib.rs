pub mod application_service;
pub mod domain;
pub mod infrastructure;
pub mod port;

pub use application_service::{
    CatalogError, CatalogService, PluginChain, PostStage, PreStage, StageControl, StageFault,
};
pub use domain::*;
pub use port::*;
