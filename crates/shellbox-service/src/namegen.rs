//! Random word-like name generation for auto-allocated slots.

use rand::Rng;

const CONSONANTS: &[u8] = b"bcdfghjklmnprstvwz";
const VOWELS: &[u8] = b"aeiou";

/// Number of consonant-vowel syllables in a generated name.
pub const DEFAULT_SYLLABLES: usize = 4;

/// Generate a pronounceable lowercase name from the thread-local RNG.
pub fn word_like_name(syllables: usize) -> String {
    word_like_name_with(&mut rand::thread_rng(), syllables)
}

/// Generate a pronounceable lowercase name from the given RNG.
pub fn word_like_name_with<R: Rng>(rng: &mut R, syllables: usize) -> String {
    let mut name = String::with_capacity(syllables * 2);
    for _ in 0..syllables {
        name.push(CONSONANTS[rng.gen_range(0..CONSONANTS.len())] as char);
        name.push(VOWELS[rng.gen_range(0..VOWELS.len())] as char);
    }
    name
}
