//! Sentence tokenizers, selected by input language.
//!
//! Tokenizers only split. Normalization (lowercasing, trailing period) and
//! `EOL` filtering belong to the resolver.

use crate::defaults::EOL_TOKEN;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Input language used to pick a tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    English,
    Hindi,
}

impl Language {
    /// Tokenizer for this language.
    pub fn tokenizer(self) -> Box<dyn Tokenizer> {
        match self {
            Language::English => Box::new(EnglishTokenizer),
            Language::Hindi => Box::new(HindiTokenizer),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::English => write!(f, "english"),
            Language::Hindi => write!(f, "hindi"),
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "english" | "en" => Ok(Language::English),
            "hindi" | "hi" => Ok(Language::Hindi),
            other => Err(format!("unsupported language: {other}")),
        }
    }
}

/// Splits a sentence into raw tokens.
pub trait Tokenizer: Send + Sync {
    /// Split `text` into tokens. Never returns empty tokens.
    fn tokenize(&self, text: &str) -> Vec<String>;

    fn name(&self) -> &'static str;
}

/// Splits on whitespace and commas; each line break becomes an `EOL` marker.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnglishTokenizer;

impl Tokenizer for EnglishTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        split_lines(text, |c| c.is_whitespace() || c == ',')
    }

    fn name(&self) -> &'static str {
        "english"
    }
}

/// Like [`EnglishTokenizer`], but the danda (`।`) also ends a line.
#[derive(Debug, Clone, Copy, Default)]
pub struct HindiTokenizer;

const DANDA: char = '।';

impl Tokenizer for HindiTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        let normalized = text.replace(DANDA, "\n");
        split_lines(&normalized, |c| c.is_whitespace() || c == ',')
    }

    fn name(&self) -> &'static str {
        "hindi"
    }
}

fn split_lines(text: &str, is_separator: impl Fn(char) -> bool + Copy) -> Vec<String> {
    let mut tokens = Vec::new();
    let lines: Vec<&str> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect();

    for (idx, line) in lines.iter().enumerate() {
        tokens.extend(
            line.split(is_separator)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
        );
        if idx + 1 < lines.len() {
            tokens.push(EOL_TOKEN.to_string());
        }
    }

    tokens
}
