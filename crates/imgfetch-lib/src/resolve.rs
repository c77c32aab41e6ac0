use crate::reference::ImageReference;
use std::fmt;

/// Fully qualified address used for the network request of one image.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResolvedAddress(String);

impl ResolvedAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResolvedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ResolvedAddress {
    fn from(address: String) -> Self {
        Self(address)
    }
}

impl AsRef<str> for ResolvedAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Turns a reference into an absolute address relative to the page `base`.
///
/// Absolute references are re-serialized as-is. Network-path references
/// (`//host/path`) borrow the scheme of `base`. Everything else is appended to
/// `base` with a single `/` between them.
pub fn resolve(base: &str, reference: &ImageReference) -> ResolvedAddress {
    if reference.is_absolute() {
        return ResolvedAddress(reference.to_string());
    }

    let serialized = reference.to_string();
    if reference.authority().is_some() {
        let scheme = base.split_once("://").map_or("http", |(scheme, _)| scheme);
        tracing::trace!(reference = %serialized, "Network-path reference, using scheme {}", scheme);
        return ResolvedAddress(format!("{scheme}:{serialized}"));
    }

    tracing::trace!(reference = %serialized, "Relative reference, prefixing it with {}", base);
    ResolvedAddress(format!(
        "{}/{}",
        base.trim_end_matches('/'),
        serialized.trim_start_matches('/')
    ))
}
