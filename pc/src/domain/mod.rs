//! Domain types for PlanCouncil
//!
//! Sessions, phases, worker statuses and the identifier allocator.

pub mod names;
mod session;

pub use session::{InvalidTransition, Phase, Session, SessionMeta, SessionState, WorkerStatus};
