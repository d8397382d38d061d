//! Static extension → MIME type table.

/// Fallback MIME type for unknown or missing extensions.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

const MIME_TABLE: &[(&str, &str)] = &[
    ("html", "text/html"),
    ("htm", "text/html"),
    ("css", "text/css"),
    ("js", "application/javascript"),
    ("json", "application/json"),
    ("xml", "application/xml"),
    ("txt", "text/plain"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("svg", "image/svg+xml"),
    ("ico", "image/x-icon"),
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
    ("mp3", "audio/mpeg"),
    ("mp4", "video/mp4"),
    ("avi", "video/x-msvideo"),
];

/// Resolve the MIME type for a path from its extension.
///
/// Only the final path segment is inspected, and the extension match is
/// case-insensitive. Returns [`DEFAULT_MIME_TYPE`] when nothing matches.
pub fn from_path(path: &str) -> &'static str {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let Some((_, ext)) = file_name.rsplit_once('.') else {
        return DEFAULT_MIME_TYPE;
    };

    MIME_TABLE
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(ext))
        .map(|(_, mime)| *mime)
        .unwrap_or(DEFAULT_MIME_TYPE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions() {
        assert_eq!(from_path("/www/index.html"), "text/html");
        assert_eq!(from_path("/www/app.js"), "application/javascript");
        assert_eq!(from_path("photo.JPEG"), "image/jpeg");
        assert_eq!(from_path("/logs/archive.gz"), "application/gzip");
    }

    #[test]
    fn unknown_or_missing_extension_falls_back() {
        assert_eq!(from_path("/data/blob.bin"), DEFAULT_MIME_TYPE);
        assert_eq!(from_path("/data/README"), DEFAULT_MIME_TYPE);
        assert_eq!(from_path(""), DEFAULT_MIME_TYPE);
    }

    #[test]
    fn dot_in_directory_is_not_an_extension() {
        assert_eq!(from_path("/site.v2/README"), DEFAULT_MIME_TYPE);
    }
}
