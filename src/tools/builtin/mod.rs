//! Builtin tools
//!
//! Each tool performs one externally visible model-backed side effect and
//! tags its result metadata with a `type` the orchestrator uses to shape the
//! response.

pub mod analyze_data;
pub mod explain_concept;
pub mod generate_code;
pub mod generate_image;
pub mod web_search;

pub use analyze_data::AnalyzeDataTool;
pub use explain_concept::ExplainConceptTool;
pub use generate_code::GenerateCodeTool;
pub use generate_image::GenerateImageTool;
pub use web_search::WebSearchTool;
