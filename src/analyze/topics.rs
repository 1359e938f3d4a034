//! Keyword topic tags for edition entries.
//!
//! Config shape (`[[topics]]`, repeated):
//! ```toml
//! [[topics]]
//! tag = "funding"
//! any_contains = ["funding", "raises", "series a"]
//! ```
//!
//! Matching is case-insensitive on whole words; multi-word phrases must appear
//! as a contiguous run. Tags never influence scores.
//!
//! Source categories (`india`, `global`, ...) come from `[[sources]]` and are
//! looked up by source id.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::dedup::compare_form;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TopicRule {
    pub tag: String,
    #[serde(default)]
    pub any_contains: Vec<String>,
}

impl TopicRule {
    fn new(tag: &str, phrases: &[&str]) -> Self {
        Self {
            tag: tag.to_string(),
            any_contains: phrases.iter().map(|p| p.to_string()).collect(),
        }
    }
}

pub fn default_topics() -> Vec<TopicRule> {
    vec![
        TopicRule::new(
            "funding",
            &[
                "funding", "raise", "raises", "raised", "investment", "series a", "series b",
                "series c", "seed round", "venture", "round",
            ],
        ),
        TopicRule::new(
            "m&a",
            &[
                "acquire", "acquires", "acquired", "acquisition", "merger", "buyout", "takeover",
            ],
        ),
        TopicRule::new(
            "layoffs",
            &["layoff", "layoffs", "job cuts", "restructuring", "downsizing", "fires"],
        ),
        TopicRule::new(
            "policy",
            &["regulation", "regulator", "policy", "government", "law", "compliance", "ban"],
        ),
        TopicRule::new(
            "product",
            &["launch", "launches", "release", "releases", "unveils", "beta", "preview"],
        ),
        TopicRule::new(
            "security",
            &["hack", "hacked", "breach", "security", "cyber", "vulnerability", "attack"],
        ),
        TopicRule::new(
            "ai",
            &[
                "ai", "artificial intelligence", "machine learning", "ml", "neural", "gpt", "llm",
            ],
        ),
        TopicRule::new(
            "crypto",
            &["crypto", "bitcoin", "blockchain", "nft", "defi", "ethereum"],
        ),
        TopicRule::new(
            "ipo",
            &["ipo", "initial public offering", "public listing", "listing", "stock market"],
        ),
    ]
}

/// Compiled tagger; phrases are pre-normalized once.
#[derive(Clone, Debug, Default)]
pub struct Tagger {
    rules: Vec<(String, Vec<String>)>,
    /// source id → category
    categories: BTreeMap<String, String>,
}

impl Tagger {
    pub fn new(rules: &[TopicRule]) -> Self {
        let rules = rules
            .iter()
            .filter(|r| !r.tag.trim().is_empty())
            .map(|r| {
                let phrases = r
                    .any_contains
                    .iter()
                    .map(|p| compare_form(p))
                    .filter(|p| !p.is_empty())
                    .collect();
                (r.tag.trim().to_string(), phrases)
            })
            .collect();
        Self {
            rules,
            categories: BTreeMap::new(),
        }
    }

    pub fn with_categories(mut self, categories: BTreeMap<String, String>) -> Self {
        self.categories = categories
            .into_iter()
            .map(|(id, c)| (id, c.trim().to_lowercase()))
            .filter(|(_, c)| !c.is_empty())
            .collect();
        self
    }

    /// Distinct categories of `source_ids`, sorted. Unknown sources add none.
    pub fn categories_for(&self, source_ids: &BTreeSet<String>) -> Vec<String> {
        source_ids
            .iter()
            .filter_map(|id| self.categories.get(id).cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Tags in rule order, each at most once.
    pub fn tags_for(&self, title: &str) -> Vec<String> {
        let hay = format!(" {} ", compare_form(title));
        let mut out: Vec<String> = Vec::new();
        for (tag, phrases) in &self.rules {
            if out.contains(tag) {
                continue;
            }
            if phrases.iter().any(|p| hay.contains(&format!(" {p} "))) {
                out.push(tag.clone());
            }
        }
        out
    }
}

/// Three-sentence blurb built from topic tags, categories and reach.
pub fn summarize(topics: &[String], categories: &[String], sources: usize) -> String {
    let has = |t: &str| topics.iter().any(|x| x == t);
    let what = if has("funding") {
        "A funding round was announced."
    } else if has("m&a") {
        "An acquisition or merger was announced."
    } else if has("layoffs") {
        "Layoffs or job cuts were announced."
    } else if has("product") {
        "A new product or service was launched."
    } else {
        "A significant development was reported."
    };
    let scope = if categories.iter().any(|c| c == "india") {
        "It matters for the Indian startup ecosystem."
    } else {
        "It has global implications for the tech industry."
    };
    let reach = match sources {
        0 | 1 => "Reported by a single source so far.".to_string(),
        n => format!("Picked up by {n} sources."),
    };
    format!("{what} {scope} {reach}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagger() -> Tagger {
        Tagger::new(&default_topics())
    }

    #[test]
    fn funding_and_ai_tags() {
        let tags = tagger().tags_for("Bengaluru AI startup raises $10M Series A");
        assert_eq!(tags, vec!["funding".to_string(), "ai".to_string()]);
    }

    #[test]
    fn whole_word_matching_only() {
        // "said" contains "ai", "email" contains "ai": neither is a tag hit.
        assert!(tagger().tags_for("CEO said the email was fine").is_empty());
    }

    #[test]
    fn multi_word_phrase() {
        let tags = tagger().tags_for("Fintech firm files for initial public offering");
        assert_eq!(tags, vec!["ipo".to_string()]);
    }

    #[test]
    fn custom_rules_and_blank_tags() {
        let rules = vec![
            TopicRule::new("ev", &["electric vehicle", "EV"]),
            TopicRule::new("  ", &["anything"]),
        ];
        let t = Tagger::new(&rules);
        assert_eq!(t.tags_for("Ola's new EV scooter"), vec!["ev".to_string()]);
        assert!(t.tags_for("anything at all").is_empty());
    }

    #[test]
    fn categories_are_unioned_per_article() {
        let t = tagger().with_categories(BTreeMap::from([
            ("inc42".to_string(), "India".to_string()),
            ("techcrunch".to_string(), "global".to_string()),
            ("wired".to_string(), "global".to_string()),
            ("blank".to_string(), " ".to_string()),
        ]));
        let ids: BTreeSet<String> = ["wired", "inc42", "techcrunch", "blank", "unknown"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(t.categories_for(&ids), vec!["global", "india"]);
    }

    #[test]
    fn summary_follows_tags_and_category() {
        let s = summarize(&["ai".into(), "funding".into()], &["india".into()], 3);
        assert_eq!(
            s,
            "A funding round was announced. It matters for the Indian startup ecosystem. \
             Picked up by 3 sources."
        );
        let s = summarize(&[], &[], 1);
        assert!(s.starts_with("A significant development was reported."));
        assert!(s.contains("global implications"));
        assert!(s.ends_with("single source so far."));
    }
}
