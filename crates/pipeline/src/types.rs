//! Data model shared by the pipeline stages

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// One extracted assertion
pub type Claim = String;

/// Pipeline stage, used for logging, metrics and error context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Chunking,
    Retrieval,
    Extraction,
    Discovery,
    Evidence,
    Aggregation,
    Reasoning,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Chunking => "chunking",
            Stage::Retrieval => "retrieval",
            Stage::Extraction => "extraction",
            Stage::Discovery => "discovery",
            Stage::Evidence => "evidence",
            Stage::Aggregation => "aggregation",
            Stage::Reasoning => "reasoning",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contiguous text segment sized for a single analysis call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position in the input, for progress reporting only
    pub index: usize,
    pub content: String,
    pub token_count: usize,
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chunk {} ({} tokens)", self.index, self.token_count)
    }
}

/// What the caller asked us to verify
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "input_type", content = "content", rename_all = "snake_case")]
pub enum VerificationInput {
    Text(String),
    Url(String),
}

impl VerificationInput {
    /// Treat `http(s)://` strings without whitespace as URLs, everything else as text
    pub fn detect(content: &str) -> Self {
        let trimmed = content.trim();
        let is_url = (trimmed.starts_with("http://") || trimmed.starts_with("https://"))
            && !trimmed.contains(char::is_whitespace);
        if is_url {
            VerificationInput::Url(trimmed.to_string())
        } else {
            VerificationInput::Text(content.to_string())
        }
    }

    pub fn content(&self) -> &str {
        match self {
            VerificationInput::Text(s) | VerificationInput::Url(s) => s,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            VerificationInput::Text(_) => "text",
            VerificationInput::Url(_) => "url",
        }
    }
}

/// Claim -> candidate source URLs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceMap(BTreeMap<Claim, Vec<String>>);

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, claim: Claim, urls: Vec<String>) {
        self.0.insert(claim, urls);
    }

    /// URLs for `claim`; an absent claim reads the same as one with no sources
    pub fn get(&self, claim: &str) -> &[String] {
        self.0.get(claim).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, claim: &str) -> bool {
        self.0.contains_key(claim)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Claim, &Vec<String>)> {
        self.0.iter()
    }

    /// Union of all URLs with duplicates removed
    pub fn unique_urls(&self) -> Vec<String> {
        self.0
            .values()
            .flatten()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn total_links(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn claims_with_sources(&self) -> usize {
        self.0.values().filter(|urls| !urls.is_empty()).count()
    }

    pub fn into_inner(self) -> BTreeMap<Claim, Vec<String>> {
        self.0
    }
}

impl FromIterator<(Claim, Vec<String>)> for SourceMap {
    fn from_iter<I: IntoIterator<Item = (Claim, Vec<String>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Source URL -> claims extracted from its content
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvidenceMap(BTreeMap<String, Vec<Claim>>);

impl EvidenceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: String, claims: Vec<Claim>) {
        self.0.insert(url, claims);
    }

    pub fn get(&self, url: &str) -> Option<&[Claim]> {
        self.0.get(url).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<Claim>)> {
        self.0.iter()
    }

    pub fn total_claims(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }
}

impl FromIterator<(String, Vec<Claim>)> for EvidenceMap {
    fn from_iter<I: IntoIterator<Item = (String, Vec<Claim>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for EvidenceMap {
    type Item = (String, Vec<Claim>);
    type IntoIter = std::collections::btree_map::IntoIter<String, Vec<Claim>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Outcome of the reasoning stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    True,
    False,
    /// The reasoning call or its parsing failed
    Unknown,
}

impl Verdict {
    pub fn from_bool(value: bool) -> Self {
        if value {
            Verdict::True
        } else {
            Verdict::False
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Verdict::True => Some(true),
            Verdict::False => Some(false),
            Verdict::Unknown => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Verdict::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::True => "true",
            Verdict::False => "false",
            Verdict::Unknown => "unknown",
        }
    }
}

impl Serialize for Verdict {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_bool().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Verdict {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<bool>::deserialize(deserializer)?
            .map(Verdict::from_bool)
            .unwrap_or(Verdict::Unknown))
    }
}

/// Verdict plus the explanation given for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub verdict: Verdict,
    pub reasoning: String,
}

impl VerificationResult {
    pub fn unknown(reasoning: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Unknown,
            reasoning: reasoning.into(),
        }
    }

    pub fn is_conclusive(&self) -> bool {
        !self.verdict.is_unknown()
    }
}
