//! The core agent loop of codevox.
//!
//! The agent follows a **Plan -> Execute -> Observe** cycle:
//!
//! 1. **Receive** a user utterance
//! 2. **Seed context** (system prompt with tool contract and folder hints)
//! 3. **Ask the model** for a single structured plan step
//! 4. **If a tool step**: execute the tool, append the observation, loop
//! 5. **If an output step**: return the final answer
//!
//! The loop is bounded: it never makes more than `max_steps` model calls
//! per turn, no matter what the model replies. Tool failures, unknown tool
//! names, and malformed model output are all fed back as observations so
//! the model can self-correct on the next iteration.

pub mod prompt;
pub mod runner;

pub use runner::{AgentRunner, TraceEntry, TraceKind, TurnResult, TurnStatus};
