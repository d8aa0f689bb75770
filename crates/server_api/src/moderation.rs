//! Bad-word filter applied to comment text before it is persisted.
//!
//! The list and the warning shown to the user are deployment configuration;
//! the defaults here only cover the out-of-the-box setup.

const DEFAULT_BANNED: &[&str] = &["spam", "scam", "advert"];
const DEFAULT_WARNING: &str = "comment contains words that are not allowed";

#[derive(Debug, Clone)]
pub struct ModerationPolicy {
    banned: Vec<String>,
    warning: String,
}

impl ModerationPolicy {
    pub fn new(banned: impl IntoIterator<Item = String>, warning: impl Into<String>) -> Self {
        let banned = banned
            .into_iter()
            .map(|word| word.trim().to_lowercase())
            .filter(|word| !word.is_empty())
            .collect();
        Self {
            banned,
            warning: warning.into(),
        }
    }

    /// Case-insensitive substring containment against the banned list.
    pub fn matches(&self, text: &str) -> bool {
        let haystack = text.to_lowercase();
        self.banned.iter().any(|word| haystack.contains(word))
    }

    pub fn warning(&self) -> &str {
        &self.warning
    }

    /// Builds the policy from optional configuration values, keeping the
    /// compiled-in defaults for anything left unset.
    pub fn from_config(banned: Option<Vec<String>>, warning: Option<String>) -> Self {
        let defaults = Self::default();
        Self::new(
            banned.unwrap_or(defaults.banned),
            warning.unwrap_or(defaults.warning),
        )
    }
}

impl Default for ModerationPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_BANNED.iter().map(|word| word.to_string()),
            DEFAULT_WARNING,
        )
    }
}
