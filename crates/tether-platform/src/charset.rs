//! Script text charsets

use std::fmt;

use crate::error::PlatformError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Charset {
    Utf8,
    Latin1,
}

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

impl Charset {
    /// Resolve a charset label as it appears in headers and markup
    pub fn from_label(label: &str) -> Result<Self, PlatformError> {
        match label.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" | "unicode-1-1-utf-8" => Ok(Charset::Utf8),
            "iso-8859-1" | "iso8859-1" | "iso_8859-1" | "latin1" | "l1" | "us-ascii" | "ascii" => {
                Ok(Charset::Latin1)
            }
            _ => Err(PlatformError::UnknownCharset(label.to_string())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Charset::Utf8 => "UTF-8",
            Charset::Latin1 => "ISO-8859-1",
        }
    }

    /// Charset announced by a byte order mark, with the mark's length
    pub fn sniff_bom(data: &[u8]) -> Option<(Charset, usize)> {
        data.starts_with(UTF8_BOM).then_some((Charset::Utf8, UTF8_BOM.len()))
    }

    /// Decode `data`; malformed UTF-8 is replaced rather than rejected
    pub fn decode(self, data: &[u8]) -> String {
        match self {
            Charset::Utf8 => String::from_utf8_lossy(data).into_owned(),
            Charset::Latin1 => data.iter().map(|&b| char::from(b)).collect(),
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
