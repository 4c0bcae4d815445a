//! In-process collaborator doubles for tests

use crate::chunker::TokenCounter;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use truthlens_common::{
    AppError, ContentRetriever, PageContent, Result, SourceLookup, TextUnderstanding,
};

/// One token per whitespace-separated word
pub struct WordCounter;

impl TokenCounter for WordCounter {
    fn count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

type Script = dyn Fn(usize, &str, &str) -> Result<String> + Send + Sync;

/// Understanding capability answering from a closure of (call number, system, prompt)
pub struct ScriptedUnderstanding {
    script: Box<Script>,
    calls: AtomicUsize,
}

impl ScriptedUnderstanding {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(usize, &str, &str) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always answer `response`
    pub fn fixed(response: &str) -> Self {
        let response = response.to_string();
        Self::new(move |_, _, _| Ok(response.clone()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextUnderstanding for ScriptedUnderstanding {
    async fn understand(&self, system: &str, prompt: &str) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        (self.script)(call, system, prompt)
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Source lookup backed by a fixed claim -> URLs table
#[derive(Default)]
pub struct MapLookup {
    results: HashMap<String, Vec<String>>,
    failing: Vec<String>,
    queries: Mutex<Vec<(String, usize)>>,
}

impl MapLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, claim: &str, urls: &[&str]) -> Self {
        self.results
            .insert(claim.to_string(), urls.iter().map(|u| u.to_string()).collect());
        self
    }

    /// Make lookups for `claim` fail
    pub fn failing(mut self, claim: &str) -> Self {
        self.failing.push(claim.to_string());
        self
    }

    /// (query, max_results) of every lookup made
    pub fn queries(&self) -> Vec<(String, usize)> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SourceLookup for MapLookup {
    async fn lookup(&self, query: &str, max_results: usize) -> Result<Vec<String>> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push((query.to_string(), max_results));
        }
        if self.failing.iter().any(|c| c == query) {
            return Err(AppError::Lookup {
                message: format!("lookup failed for {}", query),
            });
        }
        Ok(self
            .results
            .get(query)
            .map(|urls| urls.iter().take(max_results).cloned().collect())
            .unwrap_or_default())
    }
}

/// Content retriever backed by a fixed URL -> body table; unknown URLs come back empty
#[derive(Default)]
pub struct MapRetriever {
    pages: HashMap<String, String>,
}

impl MapRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self
    }
}

#[async_trait]
impl ContentRetriever for MapRetriever {
    async fn retrieve(&self, url: &str) -> PageContent {
        match self.pages.get(url) {
            Some(body) => PageContent {
                url: url.to_string(),
                title: String::new(),
                body_text: body.clone(),
            },
            None => PageContent::empty(url),
        }
    }
}
