use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Identifies one logical resource in a [`ResourceCache`](super::ResourceCache).
///
/// The key is opaque to the cache. For HTTP resources it is usually the URL, but any stable
/// request fingerprint works. Cloning is cheap, the underlying string is shared.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceKey(Arc<str>);

impl ResourceKey {
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ResourceKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ResourceKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ResourceKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for ResourceKey {
    fn from(key: String) -> Self {
        Self::new(key)
    }
}

impl From<&String> for ResourceKey {
    fn from(key: &String) -> Self {
        Self::new(key.as_str())
    }
}

impl From<url::Url> for ResourceKey {
    fn from(url: url::Url) -> Self {
        Self::new(String::from(url))
    }
}
