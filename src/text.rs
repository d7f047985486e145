//! Title and author-name normalization.

use std::sync::LazyLock;

use ahash::AHashSet;
use regex::Regex;

/// Runs of ASCII punctuation and/or whitespace separate title tokens.
static TOKEN_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[[:punct:]\s]+").unwrap());

static PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[[:punct:]]+").unwrap());

static AUTHOR_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",\s*").unwrap());

/// Stop words, compared exactly against lowercase tokens.
#[derive(Debug, Clone, Default)]
pub struct StopWords {
    words: AHashSet<String>,
}

impl StopWords {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            words: words.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, token: &str) -> bool {
        self.words.contains(token)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Lowercase `text` and split it into tokens on punctuation and whitespace.
pub fn tokenize(text: &str) -> Vec<String> {
    TOKEN_SEPARATOR
        .split(&text.to_lowercase())
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Remove punctuation but keep case; whitespace runs collapse to one space.
pub fn strip_punctuation(text: &str) -> String {
    PUNCTUATION
        .replace_all(text, "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Tokenizer for titles, sharing one stop-word table.
#[derive(Debug, Clone, Default)]
pub struct TitleNormalizer {
    stop_words: StopWords,
}

impl TitleNormalizer {
    pub fn new(stop_words: StopWords) -> Self {
        Self { stop_words }
    }

    pub fn stop_words(&self) -> &StopWords {
        &self.stop_words
    }

    /// Lowercase tokens of `title`, stop words dropped when asked.
    pub fn tokenize(&self, title: &str, remove_stop_words: bool) -> Vec<String> {
        let mut tokens = tokenize(title);
        if remove_stop_words {
            tokens.retain(|t| !self.stop_words.contains(t));
        }
        tokens
    }

    /// Stop-word and punctuation free title, tokens joined by single spaces.
    pub fn strip_to_plain_string(&self, title: &str) -> String {
        self.tokenize(title, true).join(" ")
    }
}

/// Split a raw author string ("A. Smith, B. Jones") into author names.
pub fn split_authors(raw: &str) -> Vec<String> {
    AUTHOR_SEPARATOR
        .split(raw)
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Last whitespace-delimited token of an author name.
pub fn last_name(author: &str) -> &str {
    author.split_whitespace().next_back().unwrap_or("")
}

/// Last names of all authors, in input order.
pub fn last_names<'a, I>(authors: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a String>,
{
    authors.into_iter().map(|a| last_name(a)).collect()
}
