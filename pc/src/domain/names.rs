//! Human-readable identifier allocation
//!
//! Session ids and plan ids are two dictionary words joined by a hyphen,
//! e.g. `amber-falcon`. Allocation retries a bounded number of times and then
//! falls back to appending a random hex suffix.

use std::collections::HashSet;

use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::debug;

/// Random-name attempts before falling back to a suffixed name
pub const MAX_NAME_ATTEMPTS: usize = 20;

const ADJECTIVES: &[&str] = &[
    "amber", "ancient", "autumn", "bold", "brave", "bright", "calm", "clever", "cobalt", "crimson", "crisp", "curious",
    "daring", "dusty", "eager", "early", "electric", "emerald", "fancy", "fierce", "gentle", "gilded", "glad",
    "golden", "grand", "hidden", "hollow", "humble", "icy", "jolly", "keen", "kind", "lively", "lucky", "lunar",
    "mellow", "misty", "modest", "nimble", "noble", "olive", "patient", "polar", "proud", "quiet", "rapid", "rustic",
    "scarlet", "shy", "silent", "silver", "sleepy", "solar", "steady", "stormy", "sunny", "swift", "tidy", "tranquil",
    "velvet", "vivid", "wandering", "wild", "wise", "witty", "young", "zesty",
];

const NOUNS: &[&str] = &[
    "anchor", "badger", "beacon", "birch", "bison", "brook", "canyon", "cedar", "comet", "coral", "crane", "delta",
    "dune", "eagle", "ember", "falcon", "fern", "fjord", "forest", "fox", "glacier", "grove", "harbor", "hawk",
    "heron", "island", "lagoon", "lantern", "lark", "maple", "meadow", "mesa", "moose", "nebula", "oak", "orca",
    "otter", "owl", "panda", "peak", "pine", "prairie", "quartz", "raven", "reef", "ridge", "river", "robin", "sage",
    "sparrow", "spruce", "summit", "thicket", "tiger", "tundra", "valley", "walrus", "willow", "wren", "yak",
];

/// Produce one random `adjective-noun` name
pub fn random_name() -> String {
    let mut rng = rand::rng();
    let adjective = ADJECTIVES.choose(&mut rng).copied().unwrap_or("plain");
    let noun = NOUNS.choose(&mut rng).copied().unwrap_or("plan");
    format!("{}-{}", adjective, noun)
}

fn random_suffix() -> String {
    let value: u32 = rand::rng().random_range(0..0x10000);
    format!("{:04x}", value)
}

/// Allocate a name for which `is_taken` returns false
///
/// Tries [`MAX_NAME_ATTEMPTS`] plain names, then falls back to
/// `name-xxxx` suffixed names until one is free.
pub fn allocate_name(is_taken: impl Fn(&str) -> bool) -> String {
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let name = random_name();
        if !is_taken(&name) {
            debug!(%name, attempt, "allocate_name: found free name");
            return name;
        }
    }

    debug!("allocate_name: attempts exhausted, using suffixed name");
    loop {
        let name = format!("{}-{}", random_name(), random_suffix());
        if !is_taken(&name) {
            return name;
        }
    }
}

/// Allocate a name unique against a set of already-assigned names
pub fn allocate_unique(taken: &HashSet<String>) -> String {
    allocate_name(|name| taken.contains(name))
}

/// Generate an opaque secret token (32 hex chars)
pub fn generate_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
