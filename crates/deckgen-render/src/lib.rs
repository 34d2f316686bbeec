pub mod contract;
pub mod excel;
pub mod mock;
pub mod node;

pub use contract::{RenderError, RenderRequest, RenderReply, Renderer};
pub use excel::{ExcelBridge, ReadOptions};
pub use mock::{MockOutcome, MockRenderer};
pub use node::{NodeConfig, NodeRenderer, NodeRunner};
