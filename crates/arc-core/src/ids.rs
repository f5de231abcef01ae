use std::collections::HashSet;

use rand::Rng;

use crate::error::ArcError;
use crate::item::Prefix;

/// No `q`, `x` or `y`: they read badly when spoken aloud.
const CONSONANTS: &[u8] = b"bcdfghjklmnprstvwz";
const VOWELS: &[u8] = b"aeiou";
const SYLLABLES: usize = 3;
const CAPITALIZE_PROBABILITY: f64 = 0.3;

pub const MAX_ID_ATTEMPTS: u32 = 100;

/// Three consonant-vowel syllables, e.g. `gabdur` or `GaBdur`.
pub fn generate_suffix<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut suffix = String::with_capacity(SYLLABLES * 2);
    for _ in 0..SYLLABLES {
        let consonant = char::from(CONSONANTS[rng.gen_range(0..CONSONANTS.len())]);
        let vowel = char::from(VOWELS[rng.gen_range(0..VOWELS.len())]);
        if rng.gen_bool(CAPITALIZE_PROBABILITY) {
            suffix.push(consonant.to_ascii_uppercase());
        } else {
            suffix.push(consonant);
        }
        suffix.push(vowel);
    }
    suffix
}

pub fn generate_id<R: Rng + ?Sized>(prefix: &Prefix, rng: &mut R) -> String {
    prefix.qualify(&generate_suffix(rng))
}

/// Draws ids until one is not in `taken`.
///
/// # Errors
/// Returns [`ArcError::IdSpaceExhausted`] after [`MAX_ID_ATTEMPTS`] collisions.
pub fn generate_unique_id<R: Rng + ?Sized>(
    prefix: &Prefix,
    taken: &HashSet<String>,
    rng: &mut R,
) -> Result<String, ArcError> {
    for _ in 0..MAX_ID_ATTEMPTS {
        let candidate = generate_id(prefix, rng);
        if !taken.contains(&candidate) {
            return Ok(candidate);
        }
    }
    Err(ArcError::IdSpaceExhausted {
        attempts: MAX_ID_ATTEMPTS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{must_err, must_ok};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn suffix_is_three_pronounceable_syllables() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let suffix = generate_suffix(&mut rng);
            let bytes = suffix.as_bytes();
            assert_eq!(bytes.len(), 6);
            for pair in bytes.chunks(2) {
                assert!(CONSONANTS.contains(&pair[0].to_ascii_lowercase()));
                assert!(VOWELS.contains(&pair[1]));
            }
        }
    }

    #[test]
    fn capitalization_happens_but_is_not_the_norm() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut upper = 0;
        let mut total = 0;
        for _ in 0..500 {
            for ch in generate_suffix(&mut rng).chars() {
                let lower = ch.to_ascii_lowercase();
                if CONSONANTS.iter().any(|c| char::from(*c) == lower) {
                    total += 1;
                    if ch.is_ascii_uppercase() {
                        upper += 1;
                    }
                }
            }
        }
        assert!(upper > 0);
        assert!(upper * 2 < total);
    }

    #[test]
    fn ids_carry_the_project_prefix() {
        let mut rng = StdRng::seed_from_u64(3);
        let prefix = must_ok(Prefix::parse("proj"));
        let id = generate_id(&prefix, &mut rng);
        assert!(id.starts_with("proj-"));
        assert_eq!(id.len(), "proj-".len() + 6);
    }

    #[test]
    fn unique_id_skips_taken_values() {
        let prefix = Prefix::default();
        let mut probe = StdRng::seed_from_u64(5);
        let first = generate_id(&prefix, &mut probe);

        let taken: HashSet<String> = [first.clone()].into_iter().collect();
        let mut rng = StdRng::seed_from_u64(5);
        let id = must_ok(generate_unique_id(&prefix, &taken, &mut rng));
        assert_ne!(id, first);
    }

    #[test]
    fn exhaustion_is_reported_not_looped() {
        struct Constant;
        impl rand::RngCore for Constant {
            fn next_u32(&mut self) -> u32 {
                0
            }
            fn next_u64(&mut self) -> u64 {
                0
            }
            fn fill_bytes(&mut self, dest: &mut [u8]) {
                dest.fill(0);
            }
            fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
                dest.fill(0);
                Ok(())
            }
        }

        let prefix = Prefix::default();
        let only = generate_id(&prefix, &mut Constant);
        let taken: HashSet<String> = [only].into_iter().collect();
        let err = must_err(generate_unique_id(&prefix, &taken, &mut Constant));
        assert_eq!(
            err,
            ArcError::IdSpaceExhausted {
                attempts: MAX_ID_ATTEMPTS
            }
        );
    }
}
