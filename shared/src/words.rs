use serde::{Deserialize, Serialize};

fn default_language() -> String {
    "EN".to_string()
}

/// Two related words as listed in a category, before sides are chosen.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct WordPair {
    pub civilian: String,
    pub undercover: String,
}

impl WordPair {
    pub fn new(civilian: impl Into<String>, undercover: impl Into<String>) -> Self {
        Self {
            civilian: civilian.into(),
            undercover: undercover.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct WordPairCategory {
    pub name: String,
    pub description: String,
    #[serde(default = "default_language")]
    pub language: String,
    pub pairs: Vec<WordPair>,
}

impl WordPairCategory {
    pub fn new(name: impl Into<String>, description: impl Into<String>, pairs: Vec<WordPair>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            language: default_language(),
            pairs,
        }
    }

    pub fn matches_language(&self, language: Option<&str>) -> bool {
        language.map_or(true, |lang| self.language.eq_ignore_ascii_case(lang))
    }
}

/// A pair after the coin flip: civilians get `secret_word`, the undercover
/// player gets `decoy_word`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SecretPair {
    pub secret_word: String,
    pub decoy_word: String,
}

impl SecretPair {
    pub fn new(secret_word: impl Into<String>, decoy_word: impl Into<String>) -> Self {
        Self {
            secret_word: secret_word.into(),
            decoy_word: decoy_word.into(),
        }
    }

    /// Keeps the listed sides (`flip == false`) or swaps them.
    pub fn from_pair(pair: &WordPair, flip: bool) -> Self {
        if flip {
            Self::new(&pair.undercover, &pair.civilian)
        } else {
            Self::new(&pair.civilian, &pair.undercover)
        }
    }
}
