//! Collision-free names for fixture-owned remote resources

use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::HashSet;

use crate::error::{Error, Result};

/// Length of the random suffix appended to every generated name
pub const SUFFIX_LEN: usize = 8;

const MAX_ATTEMPTS: usize = 32;

fn random_suffix<R: Rng>(rng: &mut R) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect()
}

fn validate_prefix(prefix: &str) -> Result<()> {
    let valid = !prefix.is_empty()
        && prefix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidName(prefix.to_string()))
    }
}

/// Name generator that never hands out the same name twice.
///
/// Names look like `prefix-xxxxxxxx`. Storage backends reject upper case and
/// most punctuation, so the suffix is restricted to `[a-z0-9]`.
#[derive(Debug, Default)]
pub struct UniqueNames {
    issued: HashSet<String>,
}

impl UniqueNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw a fresh name, re-drawing on the (unlikely) event of a repeat
    pub fn next(&mut self, prefix: &str) -> Result<String> {
        validate_prefix(prefix)?;
        let mut rng = rand::thread_rng();
        for _ in 0..MAX_ATTEMPTS {
            let candidate = format!("{}-{}", prefix, random_suffix(&mut rng));
            if self.issued.insert(candidate.clone()) {
                return Ok(candidate);
            }
        }
        Err(Error::NamesExhausted {
            prefix: prefix.to_string(),
            attempts: MAX_ATTEMPTS,
        })
    }

    pub fn issued(&self) -> usize {
        self.issued.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_shape() {
        let name = UniqueNames::new().next("storage").unwrap();
        let (prefix, suffix) = name.split_once('-').unwrap();
        assert_eq!(prefix, "storage");
        assert_eq!(suffix.len(), SUFFIX_LEN);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_rejects_bad_prefix() {
        let mut names = UniqueNames::new();
        assert!(matches!(names.next(""), Err(Error::InvalidName(_))));
        assert!(matches!(names.next("Storage"), Err(Error::InvalidName(_))));
        assert!(matches!(names.next("a b"), Err(Error::InvalidName(_))));
        assert_eq!(names.issued(), 0);
    }

    #[test]
    fn test_unique_names_never_repeat() {
        let mut names = UniqueNames::new();
        let mut seen = HashSet::new();
        for _ in 0..5_000 {
            let name = names.next("pipeline").unwrap();
            assert!(seen.insert(name));
        }
        assert_eq!(names.issued(), 5_000);
    }
}
