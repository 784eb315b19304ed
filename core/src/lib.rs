pub mod agents;
pub mod config;
pub mod error;
pub mod executor;
pub mod extract;
pub mod llm;
pub mod pipeline;
pub mod routing;
pub mod services;
pub mod util;


// Re-exports for convenience
pub use config::RouterConfig;
pub use error::{Result, RouterError};
pub use pipeline::{Pipeline, PipelineContext, PipelineOutcome, RouteOutcome};
pub use routing::{Intent, Source};
