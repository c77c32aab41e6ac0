use std::fmt;

/// A decomposed `src` attribute value taken from an `<img>` tag.
///
/// Equality is structural, so a set of references holds each distinct
/// decomposition exactly once.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageReference {
    scheme: Option<String>,
    authority: Option<String>,
    path: String,
    query: Option<String>,
    fragment: Option<String>,
}

impl ImageReference {
    /// Splits a raw reference into its URI components. Any string decomposes,
    /// at worst into a path-only reference.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();

        let (rest, fragment) = match raw.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment.to_string())),
            None => (raw, None),
        };
        let (rest, query) = match rest.split_once('?') {
            Some((rest, query)) => (rest, Some(query.to_string())),
            None => (rest, None),
        };
        let (scheme, rest) = match split_scheme(rest) {
            Some((scheme, rest)) => (Some(scheme.to_ascii_lowercase()), rest),
            None => (None, rest),
        };
        let (authority, path) = match rest.strip_prefix("//") {
            Some(after) => {
                let end = after.find('/').unwrap_or(after.len());
                (Some(after[..end].to_string()), after[end..].to_string())
            }
            None => (None, rest.to_string()),
        };

        Self {
            scheme,
            authority,
            path,
            query,
            fragment,
        }
    }

    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    pub fn authority(&self) -> Option<&str> {
        self.authority.as_deref()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    pub fn is_absolute(&self) -> bool {
        self.scheme.is_some()
    }

    /// Final path segment, or an empty string when the path ends in `/` or in
    /// a dot-segment.
    pub fn file_name(&self) -> &str {
        match self.path.rsplit('/').next() {
            Some(".") | Some("..") | None => "",
            Some(segment) => segment,
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(scheme) = &self.scheme {
            write!(f, "{scheme}:")?;
        }
        if let Some(authority) = &self.authority {
            write!(f, "//{authority}")?;
            if !self.path.is_empty() && !self.path.starts_with('/') {
                f.write_str("/")?;
            }
        }
        f.write_str(&self.path)?;
        if let Some(query) = &self.query {
            write!(f, "?{query}")?;
        }
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

impl From<&str> for ImageReference {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

fn split_scheme(input: &str) -> Option<(&str, &str)> {
    let (candidate, rest) = input.split_once(':')?;
    let mut chars = candidate.chars();
    let first = chars.next()?;
    let valid = first.is_ascii_alphabetic()
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some((candidate, rest))
}
