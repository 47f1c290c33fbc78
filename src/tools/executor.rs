//! Concurrent tool execution
//!
//! All tool calls returned by one model turn run concurrently and are awaited
//! jointly. A failing tool produces an error-flagged result; it never aborts
//! its siblings.

use crate::providers::ToolCall;
use crate::tools::registry::ToolRegistry;
use crate::tools::types::{ToolContext, ToolExecutionResult};
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Instant;

pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        ToolExecutor { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute a batch of tool calls concurrently, preserving call order in
    /// the returned results.
    pub async fn execute_batch(
        &self,
        calls: &[ToolCall],
        context: &ToolContext,
    ) -> Vec<ToolExecutionResult> {
        let started = Instant::now();
        log::info!("[TOOLS] Executing {} tool call(s)", calls.len());

        let futures = calls.iter().map(|call| {
            let registry = Arc::clone(&self.registry);
            async move {
                let result = registry
                    .execute(&call.name, call.arguments.clone(), context)
                    .await;
                if !result.success {
                    log::warn!(
                        "[TOOLS] Tool '{}' failed: {}",
                        call.name,
                        result.error.as_deref().unwrap_or("unknown error")
                    );
                }
                ToolExecutionResult {
                    tool_call_id: call.id.clone(),
                    name: call.name.clone(),
                    content: result.content,
                    is_error: !result.success,
                    metadata: result.metadata,
                }
            }
        });

        let results = join_all(futures).await;
        log::info!(
            "[TOOLS] Batch of {} finished in {}ms",
            results.len(),
            started.elapsed().as_millis()
        );
        results
    }
}
