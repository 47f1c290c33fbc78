//! Tool system: schema types, registry, concurrent executor, builtin tools.

pub mod builtin;
pub mod executor;
pub mod registry;
pub mod types;

pub use executor::ToolExecutor;
pub use registry::{Tool, ToolRegistry};
pub use types::{
    PropertySchema, ToolContext, ToolDefinition, ToolExecutionResult, ToolInputSchema, ToolResult,
};

use crate::providers::ProviderRegistry;
use std::sync::Arc;

/// Build a registry with every builtin tool registered.
pub fn create_default_registry(providers: Arc<ProviderRegistry>) -> ToolRegistry {
    let registry = ToolRegistry::new();
    registry.register(Arc::new(builtin::WebSearchTool::new(Arc::clone(&providers))));
    registry.register(Arc::new(builtin::GenerateImageTool::new(Arc::clone(&providers))));
    registry.register(Arc::new(builtin::GenerateCodeTool::new(Arc::clone(&providers))));
    registry.register(Arc::new(builtin::AnalyzeDataTool::new(Arc::clone(&providers))));
    registry.register(Arc::new(builtin::ExplainConceptTool::new(providers)));
    registry
}
