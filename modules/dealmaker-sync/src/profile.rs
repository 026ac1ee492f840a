use std::collections::BTreeMap;

use serde_json::Value;

use hubspot_client::types::CONTACT_LINKEDIN_URL;

/// One scraped profile exactly as the enrichment provider returned it.
///
/// The provider's output shape is not fixed: field names vary between runs
/// and values may be strings, objects, or arrays. Only [`normalize`] reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawProfile(pub Value);

impl From<Value> for RawProfile {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl RawProfile {
    fn field(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Text of a single field, or empty.
    fn text(&self, key: &str) -> String {
        self.field(key).map(value_text).unwrap_or_default()
    }

    /// First non-empty field among `keys`.
    fn first_text(&self, keys: &[&str]) -> String {
        keys.iter()
            .map(|k| self.text(k))
            .find(|t| !t.is_empty())
            .unwrap_or_default()
    }

    /// Text of `inner` on the first element of the array under `key`.
    fn nested_text(&self, key: &str, inner: &str) -> String {
        self.field(key)
            .and_then(|v| match v {
                Value::Array(items) => items.first(),
                other => Some(other),
            })
            .and_then(|v| v.get(inner))
            .map(value_text)
            .unwrap_or_default()
    }

    fn list_len(&self, keys: &[&str]) -> usize {
        keys.iter()
            .filter_map(|k| self.field(k).and_then(Value::as_array))
            .map(Vec::len)
            .next()
            .unwrap_or(0)
    }

    /// Every URL-ish value the profile carries, most specific first. The
    /// scraper may echo the request under a different key than the canonical
    /// profile link.
    pub fn url_hints(&self) -> Vec<String> {
        PROFILE_URL_KEYS
            .iter()
            .chain(["originalQuery"].iter())
            .map(|k| self.text(k))
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// Top-level keys, for diagnostics when a profile cannot be used.
    pub fn keys(&self) -> Vec<String> {
        self.0
            .as_object()
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default()
    }
}

const PROFILE_URL_KEYS: &[&str] = &["linkedinUrl", "url", "profileUrl", "publicProfileUrl", "query"];

/// Keys tried, in order, when a field holds an object instead of a string.
const OBJECT_TEXT_KEYS: &[&str] = &["linkedinText", "text", "title", "position", "name", "default"];

/// Flatten a JSON value to display text with collapsed whitespace.
fn value_text(value: &Value) -> String {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(_) | Value::Null => String::new(),
        Value::Object(map) => OBJECT_TEXT_KEYS
            .iter()
            .filter_map(|k| map.get(*k))
            .map(value_text)
            .find(|t| !t.is_empty())
            .unwrap_or_default(),
        Value::Array(items) => items
            .iter()
            .map(value_text)
            .find(|t| !t.is_empty())
            .unwrap_or_default(),
    };
    collapse_whitespace(&raw)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Profile reduced to the fields the workflow uses. Every field is present;
/// missing data is the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedProfile {
    pub name: String,
    pub first_name: String,
    pub last_name: String,
    pub position: String,
    pub company: String,
    pub location: String,
    pub profile_url: String,
    pub about: String,
    pub experience_count: usize,
    pub education_count: usize,
}

pub fn normalize(raw: &RawProfile) -> NormalizedProfile {
    let given = raw.text("firstName");
    let family = raw.text("lastName");
    let joined = collapse_whitespace(&format!("{given} {family}"));

    let name = [
        raw.text("name"),
        raw.text("fullName"),
        raw.text("authorName"),
        joined,
        title_prefix(&raw.text("title")),
        raw.text("username"),
        raw.text("fullname"),
        raw.text("displayName"),
        raw.text("userName"),
    ]
    .into_iter()
    .find(|n| !n.is_empty())
    .unwrap_or_default();

    let mut tokens = name.split_whitespace();
    let first_name = if given.is_empty() {
        tokens.next().unwrap_or_default().to_string()
    } else {
        given
    };
    let last_name = if family.is_empty() {
        if first_name == name.split_whitespace().next().unwrap_or_default() {
            name.split_whitespace().skip(1).collect::<Vec<_>>().join(" ")
        } else {
            String::new()
        }
    } else {
        family
    };

    let mut company = raw.first_text(&["company", "currentCompany", "companyName", "organization"]);
    if company.is_empty() {
        company = raw.nested_text("currentPosition", "companyName");
    }

    NormalizedProfile {
        name,
        first_name,
        last_name,
        position: raw.first_text(&["position", "currentPosition", "headline", "title", "jobTitle"]),
        company,
        location: raw.first_text(&["location", "city", "addressWithCountry"]),
        profile_url: raw.first_text(PROFILE_URL_KEYS),
        about: raw.first_text(&["about", "bio", "summary", "description"]),
        experience_count: raw.list_len(&["experience", "experiences"]),
        education_count: raw.list_len(&["education", "educations"]),
    }
}

/// `"Jane Doe - CEO at Acme"` → `"Jane Doe"`. Titles without the separator
/// are headlines, not names.
fn title_prefix(title: &str) -> String {
    match title.split_once(" - ") {
        Some((head, _)) => head.trim().to_string(),
        None => String::new(),
    }
}

// --- Contact draft ---

/// Contact fields written to the CRM for one profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactDraft {
    pub first_name: String,
    pub last_name: String,
    /// Always the candidate's normalized URL, never the scraped one.
    pub profile_url: String,
    pub job_title: String,
    pub company: String,
    pub city: String,
    pub bio: String,
}

impl ContactDraft {
    pub fn from_profile(profile: &NormalizedProfile, profile_url: &str) -> Self {
        Self {
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            profile_url: profile_url.to_string(),
            job_title: profile.position.clone(),
            company: profile.company.clone(),
            city: profile.location.clone(),
            bio: profile.about.clone(),
        }
    }

    /// A contact needs at least a first name to be created.
    pub fn has_valid_name(&self) -> bool {
        !self.first_name.trim().is_empty()
    }

    /// CRM property map. Empty values are left out so updates never blank a
    /// field; creates also tag the contact as a lead.
    pub fn properties(&self, for_create: bool) -> BTreeMap<String, String> {
        let fields = [
            ("firstname", &self.first_name),
            ("lastname", &self.last_name),
            (CONTACT_LINKEDIN_URL, &self.profile_url),
            ("jobtitle", &self.job_title),
            ("company", &self.company),
            ("city", &self.city),
            ("hs_bio", &self.bio),
        ];
        let mut props: BTreeMap<String, String> = fields
            .into_iter()
            .filter(|(_, v)| !v.trim().is_empty())
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        if for_create {
            props.insert("lifecyclestage".into(), "lead".into());
        }
        props
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn norm(value: Value) -> NormalizedProfile {
        normalize(&RawProfile(value))
    }

    #[test]
    fn username_only_profile_uses_username_as_name() {
        let p = norm(json!({ "username": "janedoe" }));
        assert_eq!(p.name, "janedoe");
        assert_eq!(p.first_name, "janedoe");
        assert_eq!(p.last_name, "");
    }

    #[test]
    fn first_and_last_name_fields_win_over_split() {
        let p = norm(json!({
            "firstName": "Jane",
            "lastName": "van der Berg",
            "headline": "Founder"
        }));
        assert_eq!(p.name, "Jane van der Berg");
        assert_eq!(p.first_name, "Jane");
        assert_eq!(p.last_name, "van der Berg");
        assert_eq!(p.position, "Founder");
    }

    #[test]
    fn full_name_is_split_on_whitespace() {
        let p = norm(json!({ "fullName": "  Jane   Mary  Doe " }));
        assert_eq!(p.name, "Jane Mary Doe");
        assert_eq!(p.first_name, "Jane");
        assert_eq!(p.last_name, "Mary Doe");
    }

    #[test]
    fn title_prefix_is_a_name_fallback() {
        let p = norm(json!({ "title": "Jane Doe - Head of Growth" }));
        assert_eq!(p.name, "Jane Doe");
        assert_eq!(p.position, "Jane Doe - Head of Growth");

        let headline_only = norm(json!({ "title": "Head of Growth" }));
        assert_eq!(headline_only.name, "");
    }

    #[test]
    fn object_and_array_values_are_flattened() {
        let p = norm(json!({
            "name": "Jane Doe",
            "location": { "linkedinText": "Madrid,\n Spain" },
            "currentPosition": [{ "companyName": "Acme" }],
            "experience": [{}, {}],
            "educations": [{}]
        }));
        assert_eq!(p.location, "Madrid, Spain");
        assert_eq!(p.position, "");
        assert_eq!(p.company, "Acme");
        assert_eq!(p.experience_count, 2);
        assert_eq!(p.education_count, 1);
    }

    #[test]
    fn url_hints_include_echoed_query() {
        let raw = RawProfile(json!({
            "linkedinUrl": "https://www.linkedin.com/in/ACoAAB123",
            "originalQuery": { "url": "https://www.linkedin.com/in/jane-doe" }
        }));
        assert_eq!(raw.url_hints(), vec!["https://www.linkedin.com/in/ACoAAB123".to_string()]);

        let raw = RawProfile(json!({
            "linkedinUrl": "https://www.linkedin.com/in/ACoAAB123",
            "originalQuery": "https://www.linkedin.com/in/jane-doe"
        }));
        assert_eq!(raw.url_hints().len(), 2);
    }

    #[test]
    fn empty_object_normalizes_to_empty_fields() {
        let p = norm(json!({}));
        assert_eq!(p, NormalizedProfile::default());
    }

    #[test]
    fn draft_properties_omit_blank_values() {
        let profile = norm(json!({ "name": "Jane Doe", "position": "CEO" }));
        let draft = ContactDraft::from_profile(&profile, "https://www.linkedin.com/in/jane-doe");

        let update = draft.properties(false);
        assert_eq!(update.get("firstname").map(String::as_str), Some("Jane"));
        assert_eq!(update.get("jobtitle").map(String::as_str), Some("CEO"));
        assert_eq!(
            update.get(CONTACT_LINKEDIN_URL).map(String::as_str),
            Some("https://www.linkedin.com/in/jane-doe")
        );
        assert!(!update.contains_key("company"));
        assert!(!update.contains_key("lifecyclestage"));

        let create = draft.properties(true);
        assert_eq!(create.get("lifecyclestage").map(String::as_str), Some("lead"));
    }

    #[test]
    fn blank_first_name_is_not_valid() {
        let draft = ContactDraft::from_profile(&NormalizedProfile::default(), "u");
        assert!(!draft.has_valid_name());
    }
}
