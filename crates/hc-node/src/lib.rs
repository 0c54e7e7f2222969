pub mod api;
pub mod config;
pub mod error;
pub mod event;
pub mod node;

pub use config::NodeConfig;
pub use error::NodeError;
pub use event::NodeEvent;
pub use node::{Node, ResolutionReport};
