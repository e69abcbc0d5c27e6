//! MIME type lookup for served media.
//!
//! Unlike a general static file server, the gateway refuses to guess:
//! an extension missing from the table yields `None` and the request is
//! answered with 204 instead of an unlabelled `application/octet-stream`.

/// Common MIME type constants.
pub mod types {
    // Text
    pub const HTML: &str = "text/html";
    pub const PLAIN: &str = "text/plain";
    pub const CSS: &str = "text/css";
    pub const JAVASCRIPT: &str = "application/javascript";
    pub const JSON: &str = "application/json";
    pub const XML: &str = "application/xml";
    pub const MARKDOWN: &str = "text/markdown";
    pub const CSV: &str = "text/csv";

    // Documents
    pub const PDF: &str = "application/pdf";

    // Images
    pub const PNG: &str = "image/png";
    pub const JPEG: &str = "image/jpeg";
    pub const GIF: &str = "image/gif";
    pub const WEBP: &str = "image/webp";
    pub const AVIF: &str = "image/avif";
    pub const SVG: &str = "image/svg+xml";
    pub const ICO: &str = "image/x-icon";
    pub const BMP: &str = "image/bmp";
    pub const TIFF: &str = "image/tiff";

    // Audio
    pub const MP3: &str = "audio/mpeg";
    pub const WAV: &str = "audio/wav";
    pub const OGG_AUDIO: &str = "audio/ogg";
    pub const FLAC: &str = "audio/flac";
    pub const AAC: &str = "audio/aac";

    // Video
    pub const MP4: &str = "video/mp4";
    pub const WEBM: &str = "video/webm";
    pub const MOV: &str = "video/quicktime";
}

/// Look up the MIME type for a file extension (without the dot).
///
/// Matching is case-insensitive. Returns `None` for unknown extensions.
pub fn from_extension(ext: &str) -> Option<&'static str> {
    let ext = ext.to_ascii_lowercase();
    let mime = match ext.as_str() {
        // Images
        "jpg" | "jpeg" => types::JPEG,
        "png" => types::PNG,
        "gif" => types::GIF,
        "webp" => types::WEBP,
        "avif" => types::AVIF,
        "bmp" => types::BMP,
        "tif" | "tiff" => types::TIFF,
        "svg" => types::SVG,
        "ico" => types::ICO,

        // Documents
        "pdf" => types::PDF,

        // Video
        "mp4" | "m4v" => types::MP4,
        "webm" => types::WEBM,
        "mov" => types::MOV,

        // Audio
        "mp3" => types::MP3,
        "ogg" | "oga" => types::OGG_AUDIO,
        "wav" => types::WAV,
        "flac" => types::FLAC,
        "aac" | "m4a" => types::AAC,

        // Text
        "json" => types::JSON,
        "xml" => types::XML,
        "txt" => types::PLAIN,
        "md" => types::MARKDOWN,
        "csv" => types::CSV,
        "html" | "htm" => types::HTML,
        "css" => types::CSS,
        "js" => types::JAVASCRIPT,

        _ => return None,
    };
    Some(mime)
}

/// Extensions the editor embeds inline as images.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff"];

/// Check if an extension denotes an inline-embeddable image.
pub fn is_image_extension(ext: &str) -> bool {
    let ext = ext.to_ascii_lowercase();
    IMAGE_EXTENSIONS.contains(&ext.as_str())
}
