//! Turn orchestration
//!
//! A turn runs Drafting -> PeerReview -> Synthesizing and stops at
//! UserReview, producing one artifact for the human to edit or approve.

pub mod diff;
mod error;
mod orchestrator;
pub mod pairing;
pub mod synthesis;

pub use diff::{Feedback, unified_diff};
pub use error::TurnError;
pub use orchestrator::TurnOrchestrator;
pub use pairing::ring_pairs;
