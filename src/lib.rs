pub mod config;
pub mod executor;
pub mod harvest;
pub mod index;
pub mod model;
pub mod parser;
pub mod render;
pub mod store;
pub mod traits;

// Re-export common types for convenience
pub use config::CrawlConfig;
pub use executor::*;
pub use model::*;
pub use traits::*;
