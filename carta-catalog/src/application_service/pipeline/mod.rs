pub mod chain;
pub mod stage;

pub use chain::PluginChain;
pub use stage::{PostStage, PreStage, StageControl, StageFault};
