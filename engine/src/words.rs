//! Word-pair sources.
//!
//! The engine never fails because words cannot be fetched: [`FallbackWordSource`]
//! substitutes the built-in categories whenever the wrapped source errors.

use crate::error::WordSourceError;
use log::warn;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use shared::{SecretPair, WordPair, WordPairCategory};

pub const DEFAULT_CATEGORY: &str = "Everyday Words";

pub trait WordPairSource: Send + Sync {
    /// Lists categories, optionally restricted to one language code.
    fn list_categories(&self, language: Option<&str>) -> Result<Vec<WordPairCategory>, WordSourceError>;

    /// Picks one pair of `category` at random.
    fn random_pair_for(&self, category: &str, rng: &mut dyn RngCore) -> Result<WordPair, WordSourceError>;
}

pub fn default_categories() -> Vec<WordPairCategory> {
    vec![WordPairCategory::new(
        DEFAULT_CATEGORY,
        "Common everyday objects and concepts",
        vec![
            WordPair::new("Coffee", "Tea"),
            WordPair::new("Dog", "Cat"),
            WordPair::new("Car", "Bus"),
        ],
    )]
}

pub fn default_pair() -> WordPair {
    WordPair::new("Coffee", "Tea")
}

/// Flips a fair coin per pair to decide which side civilians get.
pub fn materialize(category: &WordPairCategory, rng: &mut dyn RngCore) -> Vec<SecretPair> {
    category
        .pairs
        .iter()
        .map(|pair| SecretPair::from_pair(pair, rng.gen_bool(0.5)))
        .collect()
}

/// Categories held in memory.
#[derive(Debug, Clone)]
pub struct StaticWordPairSource {
    categories: Vec<WordPairCategory>,
}

impl StaticWordPairSource {
    pub fn new(categories: Vec<WordPairCategory>) -> Self {
        Self { categories }
    }
}

impl Default for StaticWordPairSource {
    fn default() -> Self {
        Self::new(default_categories())
    }
}

impl WordPairSource for StaticWordPairSource {
    fn list_categories(&self, language: Option<&str>) -> Result<Vec<WordPairCategory>, WordSourceError> {
        Ok(self
            .categories
            .iter()
            .filter(|c| c.matches_language(language))
            .cloned()
            .collect())
    }

    fn random_pair_for(&self, category: &str, rng: &mut dyn RngCore) -> Result<WordPair, WordSourceError> {
        let found = self
            .categories
            .iter()
            .find(|c| c.name == category)
            .ok_or_else(|| WordSourceError::UnknownCategory(category.to_string()))?;

        found
            .pairs
            .choose(rng)
            .cloned()
            .ok_or_else(|| WordSourceError::EmptyCategory(category.to_string()))
    }
}

/// Wraps a source and answers from the built-in set when it fails.
pub struct FallbackWordSource<S> {
    inner: S,
}

impl<S: WordPairSource> FallbackWordSource<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn categories(&self, language: Option<&str>) -> Vec<WordPairCategory> {
        match self.inner.list_categories(language) {
            Ok(categories) if !categories.is_empty() => categories,
            Ok(_) => {
                warn!("Word source returned no categories, using defaults");
                default_categories()
            }
            Err(e) => {
                warn!("Word source unavailable ({}), using default categories", e);
                default_categories()
            }
        }
    }

    /// The pairs of `category` with their sides fixed by one coin flip each.
    /// An unknown or empty category is replaced by the built-in one.
    pub fn deck(&self, category: &str, rng: &mut dyn RngCore) -> Vec<SecretPair> {
        let categories = self.categories(None);
        if let Some(found) = categories.iter().find(|c| c.name == category && !c.pairs.is_empty()) {
            return materialize(found, rng);
        }
        warn!("Category {} has no word pairs, using {}", category, DEFAULT_CATEGORY);
        default_categories()
            .iter()
            .flat_map(|c| materialize(c, rng))
            .collect()
    }

    /// Draws one pair from a freshly materialized deck of `category`.
    pub fn secret_pair_for(&self, category: &str, rng: &mut dyn RngCore) -> SecretPair {
        let deck = self.deck(category, rng);
        deck.choose(rng)
            .cloned()
            .unwrap_or_else(|| SecretPair::from_pair(&default_pair(), false))
    }
}
