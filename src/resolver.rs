//! Sentence → clip resolution.
//!
//! Each token is looked up as a whole word first. Tokens without a word clip
//! are spelled out letter by letter; letters without a clip are dropped.

use crate::catalog::Catalog;
use crate::defaults::{CLIP_EXTENSION, EOL_TOKEN};
use crate::tokenize::Tokenizer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A token (or letter) paired with the clip that signs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedWord {
    pub word: String,
    pub file_name: String,
}

impl ResolvedWord {
    pub fn new(word: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            file_name: file_name.into(),
        }
    }
}

/// Result of resolving one sentence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Resolution {
    /// Clips to play, in order.
    pub words: Vec<ResolvedWord>,
    /// Normalized tokens that had no whole-word clip.
    pub unresolved: Vec<String>,
    /// Letters of unresolved tokens that had no clip either.
    pub dropped_chars: usize,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Lowercase and strip one trailing period.
pub fn normalize_token(token: &str) -> String {
    let lower = token.to_lowercase();
    match lower.strip_suffix('.') {
        Some(stripped) => stripped.to_string(),
        None => lower,
    }
}

/// Maps pre-processed sentences to clip sequences.
pub struct Resolver {
    catalog: Arc<Catalog>,
    tokenizer: Box<dyn Tokenizer>,
}

impl Resolver {
    pub fn new(catalog: Arc<Catalog>, tokenizer: Box<dyn Tokenizer>) -> Self {
        Self { catalog, tokenizer }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Tokenize and normalize, skipping `EOL` markers.
    pub fn tokens(&self, sentence: &str) -> Vec<String> {
        self.tokenizer
            .tokenize(sentence)
            .into_iter()
            .filter(|t| t != EOL_TOKEN)
            .map(|t| normalize_token(&t))
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// Resolve a pre-processed sentence.
    pub fn resolve(&self, sentence: &str) -> Resolution {
        let mut resolution = Resolution::default();

        for token in self.tokens(sentence) {
            if let Some(entry) = self.catalog.lookup(&token) {
                resolution
                    .words
                    .push(ResolvedWord::new(token, entry.file_name.clone()));
                continue;
            }

            for c in token.chars() {
                match self.catalog.lookup_char(c) {
                    Some(entry) => resolution
                        .words
                        .push(ResolvedWord::new(c.to_string(), entry.file_name.clone())),
                    None => resolution.dropped_chars += 1,
                }
            }

            tracing::debug!(
                id = self.catalog.next_id(),
                name = %token,
                file = %format!("{token}{CLIP_EXTENSION}"),
                "no clip for word; candidate catalog entry"
            );
            resolution.unresolved.push(token);
        }

        tracing::debug!(
            sentence,
            clips = resolution.words.len(),
            unresolved = resolution.unresolved.len(),
            "resolved sentence"
        );
        resolution
    }
}
