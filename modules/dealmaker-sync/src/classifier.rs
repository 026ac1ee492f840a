use std::fmt;
use std::sync::LazyLock;

use ai_client::{truncate_to_char_boundary, OpenAi};
use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use crate::profile::NormalizedProfile;
use crate::traits::ProfileClassifier;

pub const CLASSIFIER_SYSTEM_PROMPT: &str = "You are a classifier. Analyze if this LinkedIn profile \
belongs to a person or a company. Respond with only \"person\" or \"company\".";

const MAX_PROFILE_TEXT: usize = 500;
const LABEL_TOKEN_BUDGET: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileKind {
    Person,
    Company,
    /// Not enough signal to decide. Callers treat this as a person.
    Unknown,
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileKind::Person => write!(f, "person"),
            ProfileKind::Company => write!(f, "company"),
            ProfileKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// `name position company`, skipping blanks.
pub fn profile_text(profile: &NormalizedProfile) -> String {
    [&profile.name, &profile.position, &profile.company]
        .into_iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Interpret a model answer. Only an explicit "person" is a person.
pub fn parse_label(answer: &str) -> ProfileKind {
    let label = answer
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '.')
        .to_lowercase();
    if label == "person" {
        ProfileKind::Person
    } else {
        ProfileKind::Company
    }
}

// --- LLM ---

pub struct LlmClassifier {
    ai: OpenAi,
}

impl LlmClassifier {
    pub fn new(ai: OpenAi) -> Self {
        Self { ai }
    }
}

#[async_trait]
impl ProfileClassifier for LlmClassifier {
    async fn classify(&self, profile: &NormalizedProfile) -> ProfileKind {
        let text = profile_text(profile);
        if text.is_empty() {
            return ProfileKind::Unknown;
        }
        let user = format!(
            "Profile info: {}",
            truncate_to_char_boundary(&text, MAX_PROFILE_TEXT)
        );

        match self
            .ai
            .chat_completion_with_budget(CLASSIFIER_SYSTEM_PROMPT, &user, LABEL_TOKEN_BUDGET)
            .await
        {
            Ok(answer) if answer.trim().is_empty() => ProfileKind::Unknown,
            Ok(answer) => {
                let kind = parse_label(&answer);
                debug!(answer = answer.trim(), %kind, "Model classified profile");
                kind
            }
            Err(e) => {
                warn!(error = %e, "Profile classification failed");
                ProfileKind::Unknown
            }
        }
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}

// --- Rules ---

static ORGANIZATION_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:^|[^\p{L}\p{N}])(?:inc|ltd|corp|company|corporation|llc|gmbh|s\.a\.|s\.l\.|co\.|group)(?:$|[^\p{L}\p{N}])",
    )
    .expect("organization pattern is valid")
});

/// Keyword heuristic used when no model is configured. Looks for legal-form
/// and organization words in the position and company fields.
pub struct RuleClassifier;

impl RuleClassifier {
    pub fn label(profile: &NormalizedProfile) -> ProfileKind {
        if profile_text(profile).is_empty() {
            return ProfileKind::Unknown;
        }
        let haystack = format!("{} {}", profile.position, profile.company);
        if ORGANIZATION_MARKER.is_match(&haystack) {
            ProfileKind::Company
        } else {
            ProfileKind::Person
        }
    }
}

#[async_trait]
impl ProfileClassifier for RuleClassifier {
    async fn classify(&self, profile: &NormalizedProfile) -> ProfileKind {
        Self::label(profile)
    }

    fn name(&self) -> &'static str {
        "rules"
    }
}

/// LLM classifier when an API key is configured, rules otherwise.
pub fn from_config(api_key: Option<&str>, model: &str) -> Box<dyn ProfileClassifier> {
    match api_key {
        Some(key) => Box::new(LlmClassifier::new(OpenAi::new(key, model))),
        None => Box::new(RuleClassifier),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str, position: &str, company: &str) -> NormalizedProfile {
        NormalizedProfile {
            name: name.into(),
            position: position.into(),
            company: company.into(),
            ..Default::default()
        }
    }

    #[test]
    fn label_parsing_only_accepts_person() {
        assert_eq!(parse_label("person"), ProfileKind::Person);
        assert_eq!(parse_label(" Person.\n"), ProfileKind::Person);
        assert_eq!(parse_label("\"person\""), ProfileKind::Person);
        assert_eq!(parse_label("company"), ProfileKind::Company);
        assert_eq!(parse_label("I think it's a person"), ProfileKind::Company);
        assert_eq!(parse_label(""), ProfileKind::Company);
    }

    #[test]
    fn rules_flag_legal_forms_in_company() {
        let p = profile("Jane Doe", "CEO", "Acme Corp");
        assert_eq!(RuleClassifier::label(&p), ProfileKind::Company);

        let p = profile("", "", "Widgets S.L.");
        assert_eq!(RuleClassifier::label(&p), ProfileKind::Company);
    }

    #[test]
    fn rules_match_whole_words_only() {
        let p = profile("Jane Doe", "Incoming analyst", "Corpus Labs");
        assert_eq!(RuleClassifier::label(&p), ProfileKind::Person);

        let p = profile("Jane Doe", "Head of Growth", "Acme Group");
        assert_eq!(RuleClassifier::label(&p), ProfileKind::Company);
    }

    #[test]
    fn rules_ignore_the_name_field() {
        let p = profile("Company Jones", "Designer", "");
        assert_eq!(RuleClassifier::label(&p), ProfileKind::Person);
    }

    #[test]
    fn empty_profile_is_unknown() {
        assert_eq!(RuleClassifier::label(&NormalizedProfile::default()), ProfileKind::Unknown);
    }

    #[test]
    fn profile_text_skips_blanks() {
        assert_eq!(profile_text(&profile("Jane", "", "Acme")), "Jane Acme");
    }

    #[tokio::test]
    async fn llm_failure_degrades_to_unknown() {
        let ai = OpenAi::new("sk-test", "gpt-3.5-turbo").with_base_url("http://127.0.0.1:9");
        let classifier = LlmClassifier::new(ai);
        let kind = classifier.classify(&profile("Jane Doe", "CEO", "Acme")).await;
        assert_eq!(kind, ProfileKind::Unknown);
    }

    #[tokio::test]
    async fn llm_skips_empty_profiles() {
        let ai = OpenAi::new("sk-test", "gpt-3.5-turbo").with_base_url("http://127.0.0.1:9");
        let kind = LlmClassifier::new(ai).classify(&NormalizedProfile::default()).await;
        assert_eq!(kind, ProfileKind::Unknown);
    }

    #[test]
    fn config_without_key_uses_rules() {
        assert_eq!(from_config(None, "gpt-3.5-turbo").name(), "rules");
        assert_eq!(from_config(Some("sk-test"), "gpt-3.5-turbo").name(), "llm");
    }
}
