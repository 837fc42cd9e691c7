use std::fmt;

use crate::error::StorageError;

/// A bucket plus object name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectLocation {
    pub bucket: String,
    pub object: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            object: object.into(),
        }
    }

    /// Parse `gs://bucket/path/to/object`. The scheme is optional.
    pub fn parse(locator: &str) -> Result<Self, StorageError> {
        let trimmed = locator.trim();
        let rest = trimmed.strip_prefix("gs://").unwrap_or(trimmed);
        match rest.split_once('/') {
            Some((bucket, object)) if !bucket.is_empty() && !object.is_empty() => {
                Ok(Self::new(bucket, object))
            }
            _ => Err(StorageError::InvalidLocator(locator.to_string())),
        }
    }

    /// `gs://bucket/object`
    pub fn uri(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.object)
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gs://{}/{}", self.bucket, self.object)
    }
}

/// Normalize a bucket-or-prefix setting to `gs://bucket/prefix/` form.
pub fn ensure_gcs_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_start_matches("gs://").trim_end_matches('/');
    format!("gs://{trimmed}/")
}

/// Split a `gs://bucket/prefix/` string into bucket and prefix (prefix may be empty).
pub fn split_prefix(prefix: &str) -> Option<(String, String)> {
    let rest = prefix.trim().trim_start_matches("gs://");
    let (bucket, path) = match rest.split_once('/') {
        Some((b, p)) => (b, p),
        None => (rest, ""),
    };
    if bucket.is_empty() {
        return None;
    }
    let path = path.trim_matches('/');
    let path = if path.is_empty() {
        String::new()
    } else {
        format!("{path}/")
    };
    Some((bucket.to_string(), path))
}
