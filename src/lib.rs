pub mod config;
pub mod node;
pub mod error;

pub use config::Config;
pub use node::Node;
pub use error::{FilehubError, Result};

// Re-export key types from workspace crates
pub use storage;
pub use api;
