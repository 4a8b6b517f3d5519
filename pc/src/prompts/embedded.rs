//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

/// Turn-1 draft: explore from scratch
pub const DRAFT_INITIAL: &str = include_str!("../../prompts/draft-initial.pmt");

/// Turn-N draft: revise the working file given human feedback
pub const DRAFT_REVISE: &str = include_str!("../../prompts/draft-revise.pmt");

/// Peer review of a neighbor's draft
pub const PEER_REVIEW: &str = include_str!("../../prompts/peer-review.pmt");

/// Merge all final plans
pub const SYNTHESIZE: &str = include_str!("../../prompts/synthesize.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "draft-initial" => Some(DRAFT_INITIAL),
        "draft-revise" => Some(DRAFT_REVISE),
        "peer-review" => Some(PEER_REVIEW),
        "synthesize" => Some(SYNTHESIZE),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}
