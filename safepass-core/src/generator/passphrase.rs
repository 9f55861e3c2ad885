use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::password::secure_index;
use crate::platform::SecureRandom;

/// Dictionary passphrase words are drawn from.
pub const WORDS: [&str; 26] = [
    "apple", "brave", "cloud", "dragon", "eagle", "flame", "globe", "heart", "ice", "jewel", "king",
    "light", "mountain", "night", "ocean", "peace", "queen", "river", "star", "tree", "unity",
    "victory", "water", "xray", "year", "zenith",
];

/// `word_count` dictionary words joined by hyphens, with a two-digit number
/// appended to the last word (`ocean-star-king-dragon07`).
///
/// Words come from the secure source. The suffix comes from a
/// fast non-cryptographic generator and adds no meaningful entropy.
pub fn generate_passphrase(word_count: usize, rng: &dyn SecureRandom) -> String {
    let word_count = word_count.max(1);
    let words: Vec<&str> = (0..word_count)
        .map(|_| WORDS[secure_index(rng, WORDS.len())])
        .collect();

    let suffix: u8 = SmallRng::from_os_rng().random_range(0..100);
    format!("{}{:02}", words.join("-"), suffix)
}
