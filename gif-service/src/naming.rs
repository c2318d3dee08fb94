//! Asset naming and the extension → content-type table.
//!
//! Every file the service produces is named `<sha256(url)>.<ext>`, so the
//! same source URL always maps onto the same set of keys. That is the only
//! thing standing in for a cache: work is skipped when a file with the
//! expected name already exists.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Length of a hex-encoded SHA-256 digest.
const HASH_HEX_LEN: usize = 64;

pub const GIF_EXTENSION: &str = "gif";
pub const GIF_CONTENT_TYPE: &str = "image/gif";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Webm,
    Mp4,
    Jpg,
    Png,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Webm => "webm",
            OutputFormat::Mp4 => "mp4",
            OutputFormat::Jpg => "jpg",
            OutputFormat::Png => "png",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Webm => "video/webm",
            OutputFormat::Mp4 => "video/mp4",
            OutputFormat::Jpg => "image/jpeg",
            OutputFormat::Png => "image/png",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "webm" => Some(OutputFormat::Webm),
            "mp4" => Some(OutputFormat::Mp4),
            "jpg" | "jpeg" => Some(OutputFormat::Jpg),
            "png" => Some(OutputFormat::Png),
            _ => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Hex SHA-256 of the source URL.
pub fn url_hash(url: &str) -> String {
    hex::encode(Sha256::digest(url.as_bytes()))
}

pub fn asset_key(url: &str, format: OutputFormat) -> String {
    format!("{}.{}", url_hash(url), format.extension())
}

/// Name of the downloaded source file in the work directory.
pub fn source_key(url: &str) -> String {
    format!("{}.{}", url_hash(url), GIF_EXTENSION)
}

/// Validates a client-supplied asset name.
///
/// Only `<64 lowercase hex>.<output extension>` is accepted, which also rules
/// out separators and `..` before the name gets anywhere near a filesystem
/// path.
pub fn parse_asset_key(name: &str) -> Option<(&str, OutputFormat)> {
    let (hash, ext) = name.split_once('.')?;
    if hash.len() != HASH_HEX_LEN
        || !hash
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    {
        return None;
    }
    // Keys are only ever minted with the canonical extension.
    let format = OutputFormat::from_extension(ext)?;
    (format.extension() == ext).then_some((hash, format))
}
