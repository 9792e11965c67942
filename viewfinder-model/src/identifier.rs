use std::fmt::Display;
use std::fmt::Formatter;
use std::sync::Arc;

/// A resolved image URL, the unit of caching.
///
/// Two different tiers of the same logical image are different
/// `ResourceUrl`s. Equality and hashing are plain string equality, and
/// cloning is cheap so the same identifier can live in the recency set, an
/// in-flight probe, and a surface update at once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceUrl(Arc<str>);

impl ResourceUrl {
    /// Wrap an already-resolved URL string.
    pub fn new(url: impl Into<Arc<str>>) -> Self {
        Self(url.into())
    }

    /// The underlying URL string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ResourceUrl {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceUrl {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<String> for ResourceUrl {
    fn from(url: String) -> Self {
        Self::new(url)
    }
}

impl AsRef<str> for ResourceUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
