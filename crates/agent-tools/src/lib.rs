//! # agent-tools
//!
//! Turns request-supplied tool descriptors into tools the reasoning loop
//! can invoke.
//!
//! ```text
//! ToolDescriptor ──adapt──▶ Arc<dyn Tool>
//!   ├─ Http     ──▶ HttpToolInvoker      GET query / POST body, bounded timeout
//!   └─ Function ──▶ FunctionToolInvoker  built-ins, else echo fallback
//! ```
//!
//! Adaptation has no side effects. All I/O happens when the model invokes
//! a tool, and every failure at that point is reported back to the model as
//! an unsuccessful [`agent_core::ExecutionOutcome`].

pub mod adapter;
pub mod descriptor;
pub mod error;
pub mod feedback;
pub mod function;
pub mod http;
mod payload;

pub use adapter::ToolAdapter;
pub use descriptor::{FunctionTool, HttpMethod, HttpTool, RawToolDescriptor, ToolDescriptor};
pub use error::{Result, ToolsError};
pub use feedback::{FeedbackSink, HttpFeedbackSink};
pub use function::{Builtin, FunctionToolInvoker};
pub use http::HttpToolInvoker;
