//! Best-effort player counts from console status output.
//!
//! Game servers print player counts as free text and the wording changes
//! between versions. Unrecognised output yields [`PlayerCount::unknown`]
//! rather than an error.

use std::sync::LazyLock;

use regex::Regex;
use sooty_core::PlayerCount;

static PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Rust `status`: "players : 3 (50 max) (0 queued) (0 joining)"
        r"(?mi)^\s*players\s*:\s*(?P<online>\d+)\s*\((?P<max>\d+)\s*max\)",
        // Minecraft `list`: "There are 3 of a max of 20 players online: ..."
        r"(?i)There are (?P<online>\d+) of a max(?: of)? (?P<max>\d+) players online",
        // Older Minecraft: "There are 3/20 players online:"
        r"(?i)There are (?P<online>\d+)/(?P<max>\d+) players online",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Parse the player count out of `output`.
pub fn parse_player_count(output: &str) -> PlayerCount {
    for pattern in PATTERNS.iter() {
        if let Some(caps) = pattern.captures(output) {
            let number = |name: &str| caps.name(name).and_then(|m| m.as_str().parse().ok());
            return PlayerCount {
                online: number("online"),
                max: number("max"),
            };
        }
    }
    PlayerCount::unknown()
}
