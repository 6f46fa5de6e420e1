//! Same-origin return paths for checkout redirects.

use std::fmt;

/// A relative, same-origin path the provider redirects back to.
///
/// Anything that could leave the site (absolute URLs, protocol-relative
/// `//host` paths, backslash tricks, control characters) collapses to `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnPath(String);

impl ReturnPath {
    /// Sanitizes an optional client-supplied path.
    #[must_use]
    pub fn sanitize(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim) else {
            return Self::root();
        };
        let safe = raw.starts_with('/')
            && !raw.starts_with("//")
            && !raw.contains('\\')
            && !raw.chars().any(char::is_control);
        if safe {
            Self(raw.to_string())
        } else {
            tracing::debug!(path = raw, "rejected unsafe return path");
            Self::root()
        }
    }

    /// The site root.
    #[must_use]
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Returns the path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Joins the path onto the site base URL and appends `query` to its
    /// query string, ahead of any `#fragment`.
    ///
    /// `query` must not start with `?` or `&`.
    #[must_use]
    pub fn to_url(&self, site_url: &str, query: &str) -> String {
        let base = site_url.trim_end_matches('/');
        let (path, fragment) = match self.0.split_once('#') {
            Some((path, fragment)) => (path, Some(fragment)),
            None => (self.0.as_str(), None),
        };
        let sep = match path.split_once('?') {
            Some((_, "")) => "",
            Some(_) => "&",
            None => "?",
        };
        match fragment {
            Some(fragment) => format!("{base}{path}{sep}{query}#{fragment}"),
            None => format!("{base}{path}{sep}{query}"),
        }
    }
}

impl Default for ReturnPath {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for ReturnPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
