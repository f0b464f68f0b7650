//! Object Locators
//!
//! A point-cloud object is addressed as `cos://<bucket>/<key>`. The URL only names the
//! object; its size comes from a metadata lookup (see [`super::metadata`]) and the two
//! together form a [`DataLocator`].

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

const OBJECT_URL_PATTERN: &str = r"^(?:(?P<scheme>[A-Za-z0-9_]+)://)?(?P<bucket>[^/:]+)/(?P<key>.+)$";

/// Storage schemes accepted in object URLs. A URL without a scheme is `cos`.
pub const SUPPORTED_SCHEMES: [&str; 3] = ["cos", "ibm_cos", "s3"];

/// A parsed, not yet resolved, object URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectUrl {
    pub scheme: String,
    pub bucket: String,
    pub key: String,
}

impl ObjectUrl {
    pub fn parse(url: &str) -> Result<Self> {
        let re = Regex::new(OBJECT_URL_PATTERN).map_err(|e| Error::Internal(e.to_string()))?;
        let caps = re.captures(url.trim()).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "'{}' is not an object URL (expected cos://<bucket>/<key>)",
                url
            ))
        })?;

        let scheme = caps
            .name("scheme")
            .map(|m| m.as_str().to_lowercase())
            .unwrap_or_else(|| "cos".to_string());

        if !SUPPORTED_SCHEMES.contains(&scheme.as_str()) {
            return Err(Error::InvalidArgument(format!(
                "Unsupported storage scheme '{}'",
                scheme
            )));
        }

        let bucket = caps["bucket"].to_string();
        let key = caps["key"].to_string();

        // Prefixes would name many objects; a run partitions exactly one.
        if key.ends_with('/') {
            return Err(Error::InvalidArgument(format!(
                "'{}' names a prefix, not an object",
                url
            )));
        }

        Ok(Self {
            scheme,
            bucket,
            key,
        })
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.scheme, self.bucket, self.key)
    }
}

/// Identifies a remote point-cloud object and its size in bytes.
///
/// Displayed as `<bucket>/<key>`; the URL scheme is not retained after resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataLocator {
    pub bucket: String,
    pub key: String,
    pub size: u64,
}

impl DataLocator {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>, size: u64) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            size,
        }
    }
}

impl fmt::Display for DataLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({} bytes)", self.bucket, self.key, self.size)
    }
}
