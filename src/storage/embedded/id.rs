//! Identifier generation for the embedded adapter.

use rand::distr::{Alphanumeric, SampleString};

/// Source of identifiers for newly inserted records.
///
/// Passed to the adapter at construction so collision behaviour and test
/// determinism are controlled by the caller.
pub trait IdGenerator: Send + Sync {
    /// Returns a fresh identifier.
    fn generate(&self) -> String;
}

/// Random alphanumeric identifiers of a fixed length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomIdGenerator {
    length: usize,
}

impl RandomIdGenerator {
    /// Default identifier length.
    pub const DEFAULT_LENGTH: usize = 12;

    /// Creates a generator producing identifiers of `length` characters.
    #[must_use]
    pub const fn new(length: usize) -> Self {
        Self { length }
    }

    /// Identifier length.
    #[must_use]
    pub const fn length(&self) -> usize {
        self.length
    }
}

impl Default for RandomIdGenerator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LENGTH)
    }
}

impl IdGenerator for RandomIdGenerator {
    fn generate(&self) -> String {
        Alphanumeric.sample_string(&mut rand::rng(), self.length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_default_length() {
        let id = RandomIdGenerator::default().generate();
        assert_eq!(id.len(), 12);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_custom_length() {
        assert_eq!(RandomIdGenerator::new(32).generate().len(), 32);
        assert_eq!(RandomIdGenerator::new(0).generate(), "");
    }

    #[test]
    fn test_ids_are_distinct() {
        let generator = RandomIdGenerator::default();
        let ids: HashSet<String> = (0..1000).map(|_| generator.generate()).collect();
        assert_eq!(ids.len(), 1000);
    }
}
