//! Report enrichment: headline and topic category
//!
//! Both run after a verification and both fall back to a fixed value when
//! the capability misbehaves.

use crate::prompts;
use crate::types::Claim;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;
use truthlens_common::TextUnderstanding;

pub const FALLBACK_HEADLINE: &str = "Verification Report";

pub struct HeadlineGenerator {
    llm: Arc<dyn TextUnderstanding>,
}

impl HeadlineGenerator {
    pub fn new(llm: Arc<dyn TextUnderstanding>) -> Self {
        Self { llm }
    }

    pub async fn generate(&self, claims: &[Claim]) -> String {
        if claims.is_empty() {
            return FALLBACK_HEADLINE.to_string();
        }

        match self
            .llm
            .understand(prompts::HEADLINE_SYSTEM, &prompts::headline(claims))
            .await
        {
            Ok(response) => clean_headline(&response),
            Err(e) => {
                warn!(error = %e, "Headline generation failed");
                FALLBACK_HEADLINE.to_string()
            }
        }
    }
}

/// Strip quotes and markdown emphasis, keep the first non-empty line
fn clean_headline(response: &str) -> String {
    let line = response
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default();

    let cleaned: String = line
        .chars()
        .filter(|c| !matches!(c, '"' | '*' | '_' | '#' | '`'))
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        FALLBACK_HEADLINE.to_string()
    } else {
        cleaned.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Sports,
    #[default]
    Technology,
    Politics,
    Finance,
    Crime,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Sports,
        Category::Technology,
        Category::Politics,
        Category::Finance,
        Category::Crime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Sports => "sports",
            Category::Technology => "technology",
            Category::Politics => "politics",
            Category::Finance => "finance",
            Category::Crime => "crime",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown category: {}", s))
    }
}

pub struct Categorizer {
    llm: Arc<dyn TextUnderstanding>,
}

impl Categorizer {
    pub fn new(llm: Arc<dyn TextUnderstanding>) -> Self {
        Self { llm }
    }

    pub async fn categorize(&self, claims: &[Claim]) -> Category {
        if claims.is_empty() {
            return Category::default();
        }

        let names = Category::ALL.map(|c| c.as_str());
        let response = match self
            .llm
            .understand(prompts::CATEGORY_SYSTEM, &prompts::category(claims, &names))
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Categorization failed");
                return Category::default();
            }
        };

        parse_category(&response).unwrap_or_else(|| {
            warn!(response = %response.trim(), "Unrecognized category");
            Category::default()
        })
    }
}

/// Exact match first, then the first category named anywhere in the response
fn parse_category(response: &str) -> Option<Category> {
    if let Ok(category) = response.parse() {
        return Some(category);
    }
    let lower = response.to_lowercase();
    Category::ALL
        .into_iter()
        .find(|c| lower.contains(c.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedUnderstanding;
    use truthlens_common::AppError;

    fn claims() -> Vec<Claim> {
        vec!["The central bank raised rates by 0.5%".to_string()]
    }

    #[test]
    fn test_clean_headline() {
        assert_eq!(clean_headline("\"**Banks SHOCK markets!**\"\n"), "Banks SHOCK markets!");
        assert_eq!(clean_headline("\n\n  # Big News  \nmore"), "Big News");
        assert_eq!(clean_headline("  \"\"  "), FALLBACK_HEADLINE);
    }

    #[tokio::test]
    async fn test_headline_falls_back_on_error() {
        let llm = Arc::new(ScriptedUnderstanding::new(|_, _, _| {
            Err(AppError::Capability {
                message: "down".to_string(),
            })
        }));
        let generator = HeadlineGenerator::new(llm);

        assert_eq!(generator.generate(&claims()).await, FALLBACK_HEADLINE);
        assert_eq!(generator.generate(&[]).await, FALLBACK_HEADLINE);
    }

    #[tokio::test]
    async fn test_categorize() {
        let categorizer = Categorizer::new(Arc::new(ScriptedUnderstanding::fixed(" Finance\n")));
        assert_eq!(categorizer.categorize(&claims()).await, Category::Finance);

        let categorizer =
            Categorizer::new(Arc::new(ScriptedUnderstanding::fixed("Category: politics.")));
        assert_eq!(categorizer.categorize(&claims()).await, Category::Politics);

        let categorizer = Categorizer::new(Arc::new(ScriptedUnderstanding::fixed("weather")));
        assert_eq!(categorizer.categorize(&claims()).await, Category::Technology);
    }

    #[test]
    fn test_category_round_trips_through_str() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>(), Ok(category));
        }
        assert_eq!(
            serde_json::to_string(&Category::Crime).unwrap(),
            "\"crime\""
        );
    }
}
