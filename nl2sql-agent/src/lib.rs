//! Agent controller (C5): the tool registry, per-turn state and its
//! repetition/retry guards, prompt assembly, and the LLM tool-calling
//! loop that ties the catalog, retrieval engine, and SQL pipeline
//! together into one question/answer turn (spec §4.5).

mod controller;
mod loop_guard;
mod prompt;
mod state;
mod tools;

pub use controller::Agent;
pub use loop_guard::{pre_tool_guard, record_call, record_dry_run_outcome, repetition_hash};
pub use prompt::{render_dynamic_context, static_system_prompt, DynamicContext};
pub use state::TurnState;
pub use tools::{tool_definitions, ToolName};
