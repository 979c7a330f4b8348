//! Model-tier classification (§4.9 step 5; placed here per SPEC_FULL.md §4.10
//! as a `[SUPPLEMENT]` — the distilled spec names the policy without naming
//! its home module). Two layers: a pure pattern-table classifier, and an
//! optional LLM-backed confirmation step under fixed adjustment rules.
//!
//! This is a *tier* selector, not a provider-failover router — picking which
//! concrete model serves a tier, and retrying across vendors, is out of
//! scope (§1 Non-goals).

use crate::provider::{ChatRequest, Message, ModelProvider, Role};

/// Model capability tier, ordered cheapest/fastest to most expensive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Simple,
    Medium,
    Coding,
    Complex,
    Reasoning,
}

struct PatternRule {
    tier: Tier,
    keywords: &'static [&'static str],
    weight: i32,
}

/// Negation words that, when found immediately before a matched keyword,
/// reduce that match's contribution instead of counting it fully.
const NEGATIONS: &[&str] = &["don't", "dont", "not", "no", "never", "without"];

const RULES: &[PatternRule] = &[
    PatternRule { tier: Tier::Reasoning, keywords: &["prove", "derive", "theorem", "why does", "reason step by step", "think carefully"], weight: 3 },
    PatternRule { tier: Tier::Complex, keywords: &["architecture", "design a system", "tradeoffs", "compare approaches", "plan a migration"], weight: 3 },
    PatternRule { tier: Tier::Coding, keywords: &["write", "implement", "refactor", "fix the bug", "code", "function", "script"], weight: 3 },
    PatternRule { tier: Tier::Medium, keywords: &["summarize", "explain", "describe", "what is", "how does"], weight: 2 },
    PatternRule { tier: Tier::Simple, keywords: &["hello", "hi", "thanks", "ok", "yes", "no"], weight: 1 },
];

/// Client-side, dependency-free classification (layer 1). Pure function:
/// same input always yields the same tier and confidence.
pub struct TierClassifier;

/// Outcome of layer 1 classification, carried into the optional layer 2
/// confirmation step.
#[derive(Debug, Clone)]
pub struct Classification {
    pub tier: Tier,
    pub confidence: f64,
    pub matched_keywords: Vec<String>,
}

impl TierClassifier {
    pub fn classify(&self, message: &str) -> Classification {
        let lower = message.to_lowercase();
        let words: Vec<&str> = lower.split_whitespace().collect();

        let mut best: Option<(Tier, i32)> = None;
        let mut matched = Vec::new();
        let mut negated_hits = 0i32;
        let mut total_hits = 0i32;

        for rule in RULES {
            for &kw in rule.keywords {
                if let Some(pos) = lower.find(kw) {
                    total_hits += 1;
                    let preceding_word = lower[..pos].split_whitespace().last();
                    let is_negated = preceding_word.map(|w| NEGATIONS.contains(&w)).unwrap_or(false);
                    if is_negated {
                        negated_hits += 1;
                        continue;
                    }
                    matched.push(kw.to_string());
                    let score = rule.weight;
                    best = Some(match best {
                        Some((t, s)) if s >= score => (t, s),
                        _ => (rule.tier, score),
                    });
                }
            }
        }
        let _ = words;

        let (tier, score) = best.unwrap_or((Tier::Simple, 0));
        let mut confidence = if score == 0 { 0.5 } else { (0.5 + score as f64 * 0.12).min(0.95) };
        if total_hits > 0 {
            confidence -= (negated_hits as f64 / total_hits as f64) * 0.3;
        }
        confidence = confidence.clamp(0.1, 0.95);

        Classification { tier, confidence, matched_keywords: matched }
    }
}

impl Default for TierClassifier {
    fn default() -> Self {
        Self
    }
}

/// Two-layer router: layer 1 is always run; layer 2 (an optional small-model
/// confirmation call) only runs when `confirm_below` confidence isn't met.
pub struct Router<'a> {
    classifier: TierClassifier,
    confirm_below: f64,
    confirm_model: &'a str,
}

impl<'a> Router<'a> {
    pub fn new(confirm_below: f64, confirm_model: &'a str) -> Self {
        Self { classifier: TierClassifier::default(), confirm_below, confirm_model }
    }

    /// Selects a tier for `message`. When layer-1 confidence is below
    /// `confirm_below`, asks `provider` (expected to be a cheap/fast model)
    /// to confirm or adjust the tier, then applies the fixed adjustment
    /// rules: `explain` never upgrades to coding; `write` never downgrades
    /// from coding; negations only ever reduce confidence, never tier.
    pub async fn select(&self, message: &str, provider: &dyn ModelProvider) -> Tier {
        let classification = self.classifier.classify(message);
        if classification.confidence >= self.confirm_below {
            return classification.tier;
        }

        let confirmed = self.confirm(message, &classification, provider).await.unwrap_or(classification.tier);
        self.apply_fixed_rules(message, classification.tier, confirmed)
    }

    async fn confirm(&self, message: &str, classification: &Classification, provider: &dyn ModelProvider) -> Option<Tier> {
        let prompt = format!(
            "Classify this user message into exactly one tier: simple, medium, coding, complex, reasoning.\n\
             A layer-1 keyword classifier guessed '{:?}' with confidence {:.2} (matched: {:?}).\n\
             Message: {message}\n\
             Respond with only the tier name.",
            classification.tier, classification.confidence, classification.matched_keywords,
        );
        let req = ChatRequest {
            model: self.confirm_model.to_string(),
            system: "You are a terse classifier. Respond with one word.".to_string(),
            messages: vec![Message { role: Role::User, content: prompt }],
            max_tokens: 8,
            tools: Vec::new(),
            raw_messages: None,
        };
        let response = provider.send(&req).await.ok()?;
        parse_tier(response.content.trim())
    }

    fn apply_fixed_rules(&self, message: &str, layer1_tier: Tier, confirmed_tier: Tier) -> Tier {
        let lower = message.to_lowercase();
        if lower.contains("explain") && confirmed_tier == Tier::Coding {
            return layer1_tier.max(Tier::Medium).min(Tier::Complex);
        }
        if lower.contains("write") && layer1_tier == Tier::Coding && confirmed_tier < Tier::Coding {
            return Tier::Coding;
        }
        confirmed_tier
    }
}

fn parse_tier(s: &str) -> Option<Tier> {
    match s.to_lowercase().as_str() {
        "simple" => Some(Tier::Simple),
        "medium" => Some(Tier::Medium),
        "coding" => Some(Tier::Coding),
        "complex" => Some(Tier::Complex),
        "reasoning" => Some(Tier::Reasoning),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ChatResponse;
    use async_trait::async_trait;

    #[test]
    fn classifies_coding_request() {
        let classification = TierClassifier.classify("please implement a sorting function");
        assert_eq!(classification.tier, Tier::Coding);
    }

    #[test]
    fn classifies_simple_greeting() {
        let classification = TierClassifier.classify("hello there");
        assert_eq!(classification.tier, Tier::Simple);
    }

    #[test]
    fn negation_reduces_confidence() {
        let plain = TierClassifier.classify("write a function");
        let negated = TierClassifier.classify("don't write a function");
        assert!(negated.confidence < plain.confidence);
    }

    struct StubProvider(Tier);
    #[async_trait]
    impl ModelProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }
        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, crate::provider::ProviderError> {
            let text = match self.0 {
                Tier::Simple => "simple",
                Tier::Medium => "medium",
                Tier::Coding => "coding",
                Tier::Complex => "complex",
                Tier::Reasoning => "reasoning",
            };
            Ok(ChatResponse {
                content: text.to_string(),
                model: "stub".into(),
                tokens_in: 1,
                tokens_out: 1,
                stop_reason: "stop".into(),
                tool_calls: Vec::new(),
            })
        }
    }

    #[tokio::test]
    async fn explain_never_upgrades_to_coding() {
        let router = Router::new(0.99, "stub-model");
        let provider = StubProvider(Tier::Coding);
        let tier = router.select("explain how this sorting function works", &provider).await;
        assert_ne!(tier, Tier::Coding);
    }

    #[tokio::test]
    async fn write_never_downgrades_from_coding() {
        let router = Router::new(0.99, "stub-model");
        let provider = StubProvider(Tier::Simple);
        let tier = router.select("write a quicksort implementation", &provider).await;
        assert_eq!(tier, Tier::Coding);
    }
}
