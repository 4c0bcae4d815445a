//! Evidence aggregation
//!
//! Reduces raw per-URL evidence to the sources that actually said something.

use crate::types::{Claim, EvidenceMap};
use std::collections::HashSet;
use tracing::debug;

/// Drop sources with no evidence.
///
/// Claims within a source are trimmed, blank ones removed and repeats
/// collapsed to their first occurrence. A source left empty is dropped.
pub fn flatten(evidence: EvidenceMap) -> EvidenceMap {
    let before = evidence.len();

    let flat: EvidenceMap = evidence
        .into_iter()
        .filter_map(|(url, claims)| {
            let claims = dedupe(claims);
            (!claims.is_empty()).then_some((url, claims))
        })
        .collect();

    debug!(
        sources_in = before,
        sources_out = flat.len(),
        claims = flat.total_claims(),
        "Evidence flattened"
    );

    flat
}

fn dedupe(claims: Vec<Claim>) -> Vec<Claim> {
    let mut seen = HashSet::new();
    claims
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty() && seen.insert(c.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evidence(entries: &[(&str, &[&str])]) -> EvidenceMap {
        entries
            .iter()
            .map(|(url, claims)| {
                (
                    url.to_string(),
                    claims.iter().map(|c| c.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_empty_sources_are_dropped() {
        let flat = flatten(evidence(&[("u1", &[]), ("u2", &["x"])]));
        assert_eq!(flat, evidence(&[("u2", &["x"])]));
    }

    #[test]
    fn test_claims_are_cleaned_per_source() {
        let flat = flatten(evidence(&[
            ("u1", &[" a ", "a", "", "b"]),
            ("u2", &["  ", ""]),
            ("u3", &["a"]),
        ]));

        assert_eq!(flat.len(), 2);
        assert_eq!(flat.get("u1"), Some(&["a".to_string(), "b".to_string()][..]));
        assert_eq!(flat.get("u3"), Some(&["a".to_string()][..]));
    }

    #[test]
    fn test_nothing_in_nothing_out() {
        assert!(flatten(EvidenceMap::new()).is_empty());
        assert!(flatten(evidence(&[("u1", &[])])).is_empty());
    }
}
