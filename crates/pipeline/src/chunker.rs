//! Text chunking module
//!
//! Splits text into chunks that fit a token budget. Paragraphs are packed
//! greedily; a paragraph that alone exceeds the budget is packed sentence by
//! sentence. A single sentence over the budget is kept intact.

use crate::errors::PipelineError;
use crate::types::Chunk;
use regex_lite::Regex;
use std::sync::{Arc, LazyLock};
use tiktoken_rs::CoreBPE;
use tracing::debug;
use truthlens_common::{AppError, Result};

/// Blank line, with either LF or CRLF line endings
static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n[ \t]*\r?\n").expect("valid paragraph regex"));

/// Sentence terminator, optional closing quote or bracket, then whitespace
static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[.!?]+["')\]]*\s+"#).expect("valid sentence regex"));

const PARAGRAPH_SEPARATOR: &str = "\n\n";
const SENTENCE_SEPARATOR: &str = " ";

/// Counts tokens the way the understanding capability does
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// cl100k_base tokenizer
pub struct Cl100kCounter {
    bpe: CoreBPE,
}

impl Cl100kCounter {
    pub fn new() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base().map_err(|e| AppError::Internal {
            message: format!("Failed to load cl100k_base tokenizer: {}", e),
        })?;
        Ok(Self { bpe })
    }
}

impl TokenCounter for Cl100kCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

/// Greedy token-bounded chunker
#[derive(Clone)]
pub struct Chunker {
    counter: Arc<dyn TokenCounter>,
    max_tokens: usize,
}

impl Chunker {
    pub fn new(counter: Arc<dyn TokenCounter>, max_tokens: usize) -> Self {
        Self {
            counter,
            max_tokens: max_tokens.max(1),
        }
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Split `text` into chunks of at most `max_tokens` tokens.
    ///
    /// Text that already fits is returned unchanged as a single chunk.
    pub fn split(&self, text: &str) -> std::result::Result<Vec<Chunk>, PipelineError> {
        if text.trim().is_empty() {
            return Err(PipelineError::EmptyInput);
        }

        let total = self.counter.count(text);
        if total <= self.max_tokens {
            return Ok(vec![Chunk {
                index: 0,
                content: text.to_string(),
                token_count: total,
            }]);
        }

        let chunks: Vec<Chunk> = self
            .pack(text)
            .into_iter()
            .enumerate()
            .map(|(index, content)| Chunk {
                index,
                token_count: self.counter.count(&content),
                content,
            })
            .collect();

        debug!(
            input_tokens = total,
            chunk_count = chunks.len(),
            max_tokens = self.max_tokens,
            "Text chunked"
        );

        Ok(chunks)
    }

    fn pack(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();

        for paragraph in paragraphs(text) {
            if self.fits(&current, PARAGRAPH_SEPARATOR, paragraph) {
                append(&mut current, PARAGRAPH_SEPARATOR, paragraph);
                continue;
            }

            flush(&mut chunks, &mut current);

            if self.counter.count(paragraph) <= self.max_tokens {
                current.push_str(paragraph);
                continue;
            }

            // Leftover sentences stay open so the next paragraph can join them
            for sentence in sentences(paragraph) {
                if self.fits(&current, SENTENCE_SEPARATOR, sentence) {
                    append(&mut current, SENTENCE_SEPARATOR, sentence);
                } else {
                    flush(&mut chunks, &mut current);
                    current.push_str(sentence);
                }
            }
        }

        flush(&mut chunks, &mut current);
        chunks
    }

    fn fits(&self, current: &str, separator: &str, unit: &str) -> bool {
        if current.is_empty() {
            return self.counter.count(unit) <= self.max_tokens;
        }
        let candidate = format!("{}{}{}", current, separator, unit);
        self.counter.count(&candidate) <= self.max_tokens
    }
}

fn append(current: &mut String, separator: &str, unit: &str) {
    if !current.is_empty() {
        current.push_str(separator);
    }
    current.push_str(unit);
}

fn flush(chunks: &mut Vec<String>, current: &mut String) {
    let text = std::mem::take(current);
    if !text.trim().is_empty() {
        chunks.push(text);
    }
}

fn paragraphs(text: &str) -> impl Iterator<Item = &str> {
    PARAGRAPH_BREAK
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
}

fn sentences(paragraph: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;

    for m in SENTENCE_END.find_iter(paragraph) {
        let sentence = paragraph[start..m.end()].trim();
        if !sentence.is_empty() {
            out.push(sentence);
        }
        start = m.end();
    }

    let rest = paragraph[start..].trim();
    if !rest.is_empty() {
        out.push(rest);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::WordCounter;

    fn chunker(max_tokens: usize) -> Chunker {
        Chunker::new(Arc::new(WordCounter), max_tokens)
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let text = "  The bridge opened in 1932.\n\nIt is 500 metres long.  ";
        let chunks = chunker(100).split(text).unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, text);
        assert_eq!(chunks[0].index, 0);
    }

    #[test]
    fn test_empty_input_is_rejected() {
        assert_eq!(chunker(10).split(""), Err(PipelineError::EmptyInput));
        assert_eq!(chunker(10).split(" \n\n\t"), Err(PipelineError::EmptyInput));
    }

    #[test]
    fn test_paragraphs_are_packed_greedily() {
        let text = "one two three four\n\nfive six seven eight\n\nnine ten eleven twelve";
        let chunks = chunker(9).split(text).unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "one two three four\n\nfive six seven eight");
        assert_eq!(chunks[1].content, "nine ten eleven twelve");
        assert_eq!(chunks[1].index, 1);
    }

    #[test]
    fn test_oversized_paragraph_splits_on_sentences() {
        let text = "Alpha beta gamma. Delta epsilon zeta! Eta theta iota? Kappa lambda mu.";
        let chunks = chunker(7).split(text).unwrap();

        let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(
            contents,
            vec![
                "Alpha beta gamma. Delta epsilon zeta!",
                "Eta theta iota? Kappa lambda mu."
            ]
        );
        assert!(chunks.iter().all(|c| c.token_count <= 7));
    }

    #[test]
    fn test_oversized_sentence_is_kept_intact() {
        let long = "a b c d e f g h i j k l.";
        let text = format!("Short one.\n\n{} Tail here.", long);
        let chunks = chunker(5).split(&text).unwrap();

        let oversized: Vec<&Chunk> = chunks.iter().filter(|c| c.token_count > 5).collect();
        assert_eq!(oversized.len(), 1);
        assert_eq!(oversized[0].content, long);
        for chunk in &chunks {
            assert!(!chunk.content.trim().is_empty());
        }
    }

    #[test]
    fn test_chunks_respect_bound_and_keep_all_words() {
        let paragraph = "word ".repeat(12);
        let text = [paragraph.trim(); 5].join("\n\n");
        let chunks = chunker(30).split(&text).unwrap();

        assert!(chunks.iter().all(|c| c.token_count <= 30));
        let words: usize = chunks.iter().map(|c| c.token_count).sum();
        assert_eq!(words, 60);
    }

    #[test]
    fn test_crlf_paragraphs_are_split() {
        let lf = "one two three four\n\nfive six seven eight\n\nnine ten eleven twelve";
        let crlf = lf.replace('\n', "\r\n");

        for text in [lf.to_string(), crlf] {
            let chunks = chunker(5).split(&text).unwrap();
            let counts: Vec<usize> = chunks.iter().map(|c| c.token_count).collect();
            assert_eq!(counts, vec![4, 4, 4]);
            assert!(chunks.iter().all(|c| !c.content.contains('\r')));
        }
    }

    #[test]
    fn test_cl100k_chunks_respect_bound() {
        let counter = Arc::new(Cl100kCounter::new().unwrap());
        let paragraph = "The Harbour Bridge opened in 1932 after eight years of work. \
            Its steel arch spans 503 metres across the harbour. \
            Eight lanes of traffic and two rail lines cross it every day.";
        let text = [paragraph; 4].join("\n\n");
        let max_tokens = 20;

        let chunks = Chunker::new(counter.clone(), max_tokens).split(&text).unwrap();

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert_eq!(chunk.token_count, counter.count(&chunk.content));
            assert!(
                chunk.token_count <= max_tokens || sentences(&chunk.content).len() == 1,
                "{} over budget",
                chunk
            );
        }
        let words = |s: &str| s.split_whitespace().count();
        let total: usize = chunks.iter().map(|c| words(&c.content)).sum();
        assert_eq!(total, words(&text));
    }

    #[test]
    fn test_cl100k_counts_tokens() {
        let counter = Cl100kCounter::new().unwrap();
        assert_eq!(counter.count("hello world"), 2);
        assert_eq!(counter.count(""), 0);
    }
}
