//! Opaque id minting for nodes and content blobs.
//!
//! Ids are fixed-length lowercase hex tokens drawn from a cryptographically
//! secure RNG. They are *not* content hashes: uniqueness is probabilistic,
//! so minting against a live id set detects and retries on collision.

use tracing::warn;

/// Default id length in hex characters.
pub const DEFAULT_ID_LENGTH: usize = 8;

/// Supported id lengths.
pub const VALID_ID_LENGTHS: [usize; 3] = [8, 16, 32];

/// Mint a single random id of `length` lowercase hex characters.
pub fn mint_id(length: usize) -> String {
    use rand::Rng;
    let mut rng = rand::rng();
    let mut bytes = vec![0u8; length.div_ceil(2)];
    rng.fill(&mut bytes[..]);

    let mut hex = String::with_capacity(bytes.len() * 2);
    for b in &bytes {
        hex.push_str(&format!("{b:02x}"));
    }
    hex.truncate(length);
    hex
}

/// Mint an id that is not already taken, retrying on collision.
///
/// Collisions are vanishingly rare at 8+ hex chars for realistic tree
/// sizes, but they are detected rather than assumed away.
pub fn mint_unique_id(length: usize, mut is_taken: impl FnMut(&str) -> bool) -> String {
    let mut attempts = 0;
    loop {
        let id = mint_id(length);
        if !is_taken(&id) {
            return id;
        }
        attempts += 1;
        warn!(attempts, length, "Id collision during minting, retrying");
    }
}
