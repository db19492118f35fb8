mod config;
mod node;

pub use config::NodeConfig;
pub use node::Node;
