use serde::{Deserialize, Serialize};

/// Domain suffix handling for user identities.
///
/// Sites where every account shares one mail domain let users type `bob`
/// instead of `bob@example.org`. Identities are resuffixed before they go
/// on the wire and desuffixed before they are displayed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suffix(Option<String>);

impl Suffix {
    /// A bare domain like `gentoo.org` is taken as `@gentoo.org`.
    pub fn new(suffix: Option<String>) -> Self {
        let suffix = suffix
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty() && s != "@")
            .map(|s| if s.starts_with('@') { s } else { format!("@{}", s) });
        Self(suffix)
    }

    pub fn none() -> Self {
        Self(None)
    }

    /// Append the suffix to a bare login name.
    ///
    /// Identities that already carry a domain are left alone.
    pub fn resuffix(&self, identity: &str) -> String {
        match &self.0 {
            Some(suffix) if !identity.is_empty() && !identity.contains('@') => {
                format!("{}{}", identity, suffix)
            }
            _ => identity.to_string(),
        }
    }

    /// Strip the suffix for display.
    pub fn desuffix(&self, identity: &str) -> String {
        match &self.0 {
            Some(suffix) => identity
                .strip_suffix(suffix.as_str())
                .filter(|name| !name.is_empty())
                .unwrap_or(identity)
                .to_string(),
            None => identity.to_string(),
        }
    }

    pub fn resuffix_all<S: AsRef<str>>(&self, identities: &[S]) -> Vec<String> {
        identities.iter().map(|i| self.resuffix(i.as_ref())).collect()
    }

    pub fn desuffix_all<S: AsRef<str>>(&self, identities: &[S]) -> Vec<String> {
        identities.iter().map(|i| self.desuffix(i.as_ref())).collect()
    }
}
