//! Fetched script resources
//!
//! A `ScriptResource` holds the encoded bytes of a script along with the
//! response headers that govern it. The decoded text is produced on first
//! use and can be dropped under memory pressure; it is rebuilt on the next
//! access. `ScriptCache` keeps resources by URL with LRU eviction.

use std::collections::HashMap;
use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;

use anyhow::Context;
use lru::LruCache;
use serde::{Deserialize, Serialize};

use crate::charset::Charset;
use crate::error::PlatformError;

const JAVASCRIPT_MIME_TYPES: &[&str] = &[
    "application/ecmascript",
    "application/javascript",
    "application/x-ecmascript",
    "application/x-javascript",
    "text/ecmascript",
    "text/javascript",
    "text/javascript1.0",
    "text/javascript1.1",
    "text/javascript1.2",
    "text/javascript1.3",
    "text/javascript1.4",
    "text/javascript1.5",
    "text/jscript",
    "text/livescript",
    "text/x-ecmascript",
    "text/x-javascript",
];

pub fn is_supported_javascript_mime_type(mime_type: &str) -> bool {
    JAVASCRIPT_MIME_TYPES.contains(&mime_type.to_ascii_lowercase().as_str())
}

pub struct ScriptResource {
    url: String,
    data: Vec<u8>,
    charset: Charset,
    headers: HashMap<String, String>,
    decoded: Option<String>,
}

impl ScriptResource {
    pub fn new(url: impl Into<String>, charset: Charset) -> Self {
        ScriptResource {
            url: url.into(),
            data: Vec::new(),
            charset,
            headers: HashMap::new(),
            decoded: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Record a response header (names are case-insensitive)
    pub fn set_response_header(&mut self, name: &str, value: &str) {
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
    }

    pub fn response_header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn append_data(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
        self.decoded = None;
    }

    /// Override the charset with one announced by the HTTP response
    pub fn set_encoding(&mut self, label: &str) -> Result<(), PlatformError> {
        self.charset = Charset::from_label(label)?;
        self.decoded = None;
        Ok(())
    }

    /// Charset the text decodes with; a byte order mark wins over headers
    pub fn encoding(&self) -> Charset {
        Charset::sniff_bom(&self.data)
            .map(|(charset, _)| charset)
            .unwrap_or(self.charset)
    }

    /// Lowercased MIME type from `Content-Type`, without parameters
    pub fn mime_type(&self) -> String {
        self.response_header("content-type")
            .and_then(|value| value.split(';').next())
            .map(|mime| mime.trim().to_ascii_lowercase())
            .unwrap_or_default()
    }

    /// The decoded script text
    pub fn script(&mut self) -> &str {
        let decoded = match self.decoded.take() {
            Some(decoded) => decoded,
            None => {
                let (charset, skip) = Charset::sniff_bom(&self.data).unwrap_or((self.charset, 0));
                let text = charset.decode(&self.data[skip..]);
                log::trace!("decoded {} ({} bytes, {})", self.url, self.data.len(), charset);
                text
            }
        };
        self.decoded.insert(decoded)
    }

    pub fn is_decoded(&self) -> bool {
        self.decoded.is_some()
    }

    pub fn encoded_size(&self) -> usize {
        self.data.len()
    }

    pub fn decoded_size(&self) -> usize {
        self.decoded.as_ref().map_or(0, String::len)
    }

    /// Drop the decoded text; the encoded bytes are kept
    pub fn destroy_decoded_data(&mut self) {
        self.decoded = None;
    }

    /// False only when the response says `nosniff` and the MIME type is
    /// not a JavaScript type
    pub fn mime_type_allowed_by_nosniff(&self) -> bool {
        let nosniff = self
            .response_header("x-content-type-options")
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("nosniff"));
        !nosniff || is_supported_javascript_mime_type(&self.mime_type())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScriptCacheConfig {
    /// Maximum number of resources kept
    pub capacity: usize,
    /// Charset label used when a request names none
    pub default_charset: String,
}

impl Default for ScriptCacheConfig {
    fn default() -> Self {
        ScriptCacheConfig {
            capacity: 64,
            default_charset: "utf-8".to_string(),
        }
    }
}

impl ScriptCacheConfig {
    pub fn from_toml_str(source: &str) -> anyhow::Result<Self> {
        toml::from_str(source).context("invalid script cache configuration")
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)
            .with_context(|| format!("failed to read script cache configuration {}", path.display()))?;
        Self::from_toml_str(&source).with_context(|| format!("in {}", path.display()))
    }
}

/// Script resources by URL
pub struct ScriptCache {
    entries: LruCache<String, ScriptResource>,
    default_charset: Charset,
}

impl ScriptCache {
    pub fn new(config: &ScriptCacheConfig) -> Result<Self, PlatformError> {
        let capacity = NonZeroUsize::new(config.capacity).ok_or(PlatformError::ZeroCapacity)?;
        let default_charset = Charset::from_label(&config.default_charset)?;
        Ok(ScriptCache {
            entries: LruCache::new(capacity),
            default_charset,
        })
    }

    pub fn default_charset(&self) -> Charset {
        self.default_charset
    }

    /// A fresh resource for `url`, decoded with `charset` or the default
    pub fn create_resource(&self, url: &str, charset: Option<&str>) -> Result<ScriptResource, PlatformError> {
        let charset = match charset {
            Some(label) => Charset::from_label(label)?,
            None => self.default_charset,
        };
        Ok(ScriptResource::new(url, charset))
    }

    /// Insert a resource, returning the one it displaced (same URL or
    /// least recently used)
    pub fn insert(&mut self, resource: ScriptResource) -> Option<ScriptResource> {
        let displaced = self.entries.push(resource.url.clone(), resource);
        if let Some((url, _)) = &displaced {
            log::debug!("script cache displaced {}", url);
        }
        displaced.map(|(_, resource)| resource)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains(url)
    }

    pub fn resource(&mut self, url: &str) -> Option<&mut ScriptResource> {
        self.entries.get_mut(url)
    }

    /// Decoded text of the resource cached for `url`
    pub fn script(&mut self, url: &str) -> Option<&str> {
        self.entries.get_mut(url).map(|resource| resource.script())
    }

    pub fn remove(&mut self, url: &str) -> Option<ScriptResource> {
        self.entries.pop(url)
    }

    /// Drop decoded text from every resource. Returns the bytes freed.
    pub fn destroy_decoded_data(&mut self) -> usize {
        let mut freed = 0;
        for (_, resource) in self.entries.iter_mut() {
            freed += resource.decoded_size();
            resource.destroy_decoded_data();
        }
        log::debug!("script cache released {} decoded bytes", freed);
        freed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
