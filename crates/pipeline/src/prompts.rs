//! Prompt templates for the understanding capability

use crate::types::{Claim, EvidenceMap};
use truthlens_common::config::ReasoningPolicy;

pub const CLAIM_EXTRACTION_SYSTEM: &str = "You extract checkable claims from text. \
Pick only the 3 to 7 most important, specific and distinct claims; skip filler and generic statements. \
Answer with a JSON array of strings and nothing else.";

pub const EVIDENCE_SYSTEM: &str = "You extract claims from web page content that bear on a set of \
original claims. Answer with a JSON array of strings and nothing else.";

pub const REASONING_SYSTEM: &str =
    "You are a fact-checker judging claims against evidence gathered from credible sources.";

pub const HEADLINE_SYSTEM: &str =
    "You write short, punchy news headlines that make readers want to click.";

pub const CATEGORY_SYSTEM: &str =
    "You assign a set of claims to exactly one topic category.";

const LIST_FORMAT: &str = r#"Format: ["claim one", "claim two", "claim three"]"#;

/// "1. a\n2. b"
pub fn numbered(claims: &[Claim]) -> String {
    claims
        .iter()
        .enumerate()
        .map(|(i, claim)| format!("{}. {}", i + 1, claim))
        .collect::<Vec<_>>()
        .join("\n")
}

/// "- a\n- b"
pub fn bulleted(claims: &[Claim]) -> String {
    claims
        .iter()
        .map(|claim| format!("- {}", claim))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Per-source numbered evidence block
pub fn evidence_block(evidence: &EvidenceMap) -> String {
    let mut out = Vec::new();
    for (url, claims) in evidence.iter() {
        out.push(format!("Source: {}", url));
        for (i, claim) in claims.iter().enumerate() {
            out.push(format!("  {}. {}", i + 1, claim));
        }
        out.push(String::new());
    }
    out.join("\n").trim_end().to_string()
}

pub fn claim_extraction(text: &str) -> String {
    format!(
        "Extract the most significant claims from the text below.\n\
         Prefer claims that:\n\
         - are concrete (numbers, names, dates, specific details)\n\
         - matter to the overall message\n\
         - cover different aspects, with no overlap between them\n\n\
         Return between 3 and 7 claims as a JSON array of strings.\n\
         {}\n\n\
         Text:\n{}\n\n\
         Claims:",
        LIST_FORMAT, text
    )
}

pub fn evidence_extraction(original_claims: &str, content: &str) -> String {
    format!(
        "The following claims are being checked:\n\n\
         ORIGINAL CLAIMS:\n{}\n\n\
         From the web page content below, extract 3 to 7 claims that:\n\
         - concern any of the original claims, or give context for them\n\
         - are concrete (numbers, names, dates, specific details)\n\
         - are distinct from one another\n\n\
         Web page content:\n{}\n\n\
         Return a JSON array of strings.\n\
         {}",
        original_claims, content, LIST_FORMAT
    )
}

pub fn reasoning(user_claims: &[Claim], evidence: &EvidenceMap, policy: ReasoningPolicy) -> String {
    let criteria = match policy {
        ReasoningPolicy::Standard => {
            "- True: the core claims are backed by credible evidence. Minor gaps or small \
             discrepancies in some sources do not overturn facts that hold up elsewhere.\n\
             - False: the core claims are contradicted by the evidence, or the content is \
             fundamentally misleading."
        }
        ReasoningPolicy::Strict => {
            "- Numbers, dates and quantities must match the evidence within 5%; a larger \
             mismatch makes the claim false.\n\
             - True: every core claim is directly supported by at least one source.\n\
             - False: any core claim is contradicted, or the evidence is too ambiguous to \
             support it. When in doubt, answer False."
        }
    };

    format!(
        "Check the user's claims against the evidence gathered from credible sources.\n\n\
         USER CLAIMS:\n{}\n\n\
         EVIDENCE FROM CREDIBLE SOURCES:\n{}\n\n\
         INSTRUCTIONS:\n\
         1. Compare each user claim with the evidence.\n\
         2. Weigh how credible and relevant each source is.\n\
         3. A claim confirmed by one source and not mentioned by another is still supported.\n\
         4. Tell apart claims that are contradicted from claims that are merely unsupported.\n\
         5. Judge the central message of the content rather than incidental details.\n\n\
         VERDICT CRITERIA:\n{}\n\n\
         Answer in exactly this format:\n\
         VERDICT: [True/False]\n\
         REASONING: [how you weighed the evidence]",
        numbered(user_claims),
        evidence_block(evidence),
        criteria
    )
}

pub fn headline(claims: &[Claim]) -> String {
    format!(
        "Write a dramatic, attention-grabbing headline of at most 12 words for the claims below.\n\
         Do not reveal whether the claims are true or false.\n\
         Output plain text only, without markdown or quotation marks.\n\n\
         CLAIMS:\n{}\n\n\
         HEADLINE:",
        bulleted(claims)
    )
}

pub fn category(claims: &[Claim], categories: &[&str]) -> String {
    let options = categories
        .iter()
        .map(|c| format!("- {}", c))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Assign the claims below to EXACTLY ONE of these categories:\n{}\n\n\
         Pick the category of the primary topic.\n\n\
         CLAIMS:\n{}\n\n\
         Answer with the category name only, in lowercase.\n\n\
         CATEGORY:",
        options,
        bulleted(claims)
    )
}
