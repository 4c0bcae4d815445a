//! Verdict reasoning
//!
//! A single capability call weighs all user claims against all evidence.
//! The reasoner never fails: transport errors and unparseable answers end up
//! as an unknown verdict with an explanation.

use crate::prompts;
use crate::types::{Claim, EvidenceMap, Stage, Verdict, VerificationResult};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use truthlens_common::config::ReasoningPolicy;
use truthlens_common::metrics::StageTimer;
use truthlens_common::retry::RetryError;
use truthlens_common::{AppError, RetryPolicy, TextUnderstanding};

const VERDICT_PREFIX: &str = "VERDICT:";
const REASONING_PREFIX: &str = "REASONING:";

pub struct Reasoner {
    llm: Arc<dyn TextUnderstanding>,
    policy: ReasoningPolicy,
    retry: RetryPolicy,
}

impl Reasoner {
    pub fn new(
        llm: Arc<dyn TextUnderstanding>,
        policy: ReasoningPolicy,
        retry: RetryPolicy,
    ) -> Self {
        Self { llm, policy, retry }
    }

    /// Judge `user_claims` against `evidence`, retrying while no verdict comes back
    #[instrument(skip_all, fields(
        claim_count = user_claims.len(),
        source_count = evidence.len(),
        policy = ?self.policy,
        model = %self.llm.model_name()
    ))]
    pub async fn reason(
        &self,
        user_claims: &[Claim],
        evidence: &EvidenceMap,
    ) -> VerificationResult {
        let timer = StageTimer::start(Stage::Reasoning.as_str());
        let prompt = prompts::reasoning(user_claims, evidence, self.policy);
        let llm = self.llm.as_ref();
        let prompt_ref = prompt.as_str();

        let outcome = self
            .retry
            .run(
                "reasoning",
                move |_| async move {
                    let response = llm.understand(prompts::REASONING_SYSTEM, prompt_ref).await?;
                    Ok::<_, AppError>(parse_verdict(&response))
                },
                VerificationResult::is_conclusive,
            )
            .await;

        let result = match outcome {
            Ok(retried) => retried.value,
            Err(RetryError::Rejected { mut last, attempts }) => {
                warn!(attempts, "Reasoning response carried no verdict");
                if last.reasoning.is_empty() {
                    last.reasoning = "The response did not contain a verdict.".to_string();
                }
                last
            }
            Err(RetryError::Failed { error, attempts }) => {
                warn!(attempts, error = %error, "Reasoning call failed");
                VerificationResult::unknown(format!("Error: {}", error))
            }
        };

        timer.finish(1);
        info!(verdict = result.verdict.as_str(), "Reasoning complete");
        result
    }
}

/// Parse a `VERDICT:` / `REASONING:` response.
///
/// A verdict line counts as true when the word "true" appears after the
/// prefix. Reasoning is everything after the prefix, including following
/// lines. No verdict line leaves the verdict unknown.
pub fn parse_verdict(response: &str) -> VerificationResult {
    let mut verdict = Verdict::Unknown;
    let mut reasoning = String::new();

    let lines: Vec<&str> = response.trim().lines().collect();
    for (i, line) in lines.iter().enumerate() {
        let line = line.trim_start();

        if let Some(rest) = strip_prefix_ignore_case(line, VERDICT_PREFIX) {
            verdict = Verdict::from_bool(contains_word(rest, "true"));
        } else if let Some(rest) = strip_prefix_ignore_case(line, REASONING_PREFIX) {
            reasoning = std::iter::once(rest)
                .chain(lines[i + 1..].iter().copied())
                .map(str::trim)
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string();
            break;
        }
    }

    VerificationResult { verdict, reasoning }
}

fn strip_prefix_ignore_case<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &line[prefix.len()..])
}

fn contains_word(text: &str, word: &str) -> bool {
    text.split(|c: char| !c.is_alphanumeric())
        .any(|token| token.eq_ignore_ascii_case(word))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedUnderstanding;
    use std::time::Duration;

    #[test]
    fn test_parse_true_with_inline_reasoning() {
        let result = parse_verdict("VERDICT: True\nREASONING: because X");
        assert_eq!(result.verdict, Verdict::True);
        assert_eq!(result.reasoning, "because X");
    }

    #[test]
    fn test_parse_is_case_insensitive_and_multiline() {
        let result = parse_verdict("Verdict: false\nReasoning: no match\nextra line");
        assert_eq!(result.verdict, Verdict::False);
        assert_eq!(result.reasoning, "no match\nextra line");
    }

    #[test]
    fn test_parse_without_verdict_is_unknown() {
        let result = parse_verdict("I could not decide.\nREASONING: sources disagree");
        assert_eq!(result.verdict, Verdict::Unknown);
        assert_eq!(result.reasoning, "sources disagree");

        assert!(parse_verdict("").verdict.is_unknown());
    }

    #[test]
    fn test_parse_details() {
        let result =
            parse_verdict("  **VERDICT: [True]**\n\nREASONING:\n  line one  \n  line two\n");
        assert_eq!(result.verdict, Verdict::Unknown);

        let result = parse_verdict("VERDICT: [True]\n\nREASONING:\n  line one  \n  line two\n");
        assert_eq!(result.verdict, Verdict::True);
        assert_eq!(result.reasoning, "line one\nline two");

        assert_eq!(parse_verdict("VERDICT: untrue").verdict, Verdict::False);
        assert_eq!(parse_verdict("VERDICT: Mostly True").verdict, Verdict::True);
    }

    #[tokio::test]
    async fn test_capability_failure_yields_unknown() {
        let llm = Arc::new(ScriptedUnderstanding::new(|_, _, _| {
            Err(AppError::CapabilityTimeout { timeout_ms: 60_000 })
        }));
        let reasoner = Reasoner::new(
            llm.clone(),
            ReasoningPolicy::Standard,
            RetryPolicy::fixed(2, Duration::ZERO),
        );

        let result = reasoner.reason(&["c".to_string()], &EvidenceMap::new()).await;

        assert!(!result.is_conclusive());
        assert!(result.reasoning.starts_with("Error: "));
        assert_eq!(llm.calls(), 2);
    }

    #[tokio::test]
    async fn test_missing_verdict_is_retried() {
        let llm = Arc::new(ScriptedUnderstanding::new(|call, system, _| {
            assert_eq!(system, prompts::REASONING_SYSTEM);
            if call == 1 {
                Ok("Let me think about it.".to_string())
            } else {
                Ok("VERDICT: False\nREASONING: contradicted by u1".to_string())
            }
        }));
        let reasoner = Reasoner::new(
            llm.clone(),
            ReasoningPolicy::Strict,
            RetryPolicy::fixed(2, Duration::ZERO),
        );

        let result = reasoner.reason(&["c".to_string()], &EvidenceMap::new()).await;

        assert_eq!(result.verdict, Verdict::False);
        assert_eq!(result.reasoning, "contradicted by u1");
        assert_eq!(llm.calls(), 2);
    }

    #[tokio::test]
    async fn test_no_verdict_after_retries_explains_itself() {
        let llm = Arc::new(ScriptedUnderstanding::fixed("no idea"));
        let reasoner = Reasoner::new(llm, ReasoningPolicy::Standard, RetryPolicy::once());

        let result = reasoner.reason(&["c".to_string()], &EvidenceMap::new()).await;

        assert!(result.verdict.is_unknown());
        assert!(!result.reasoning.is_empty());
    }
}
