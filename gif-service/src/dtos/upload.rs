use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    /// Source GIF URL.
    pub u: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FetchParams {
    pub u: Option<String>,
    /// Extension of the wanted output (`mp4`, `webm`, `jpg`, `png`).
    pub t: Option<String>,
}

/// Descriptor returned by `/upload`.
///
/// Exactly one of `jpgurl`/`pngurl` is present, matching the configured
/// preview format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResult {
    pub mp4url: String,
    pub webmurl: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub jpgurl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pngurl: Option<String>,
    pub width: u32,
    pub height: u32,
}
