//! Content-type inference from file names.

/// Fallback content type for unknown or missing extensions.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Map a file extension (without the dot) to a MIME type.
pub fn content_type_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "tif" | "tiff" => "image/tiff",
        "jp2" => "image/jp2",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "html" => "text/html",
        "xml" => "application/xml",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        _ => DEFAULT_CONTENT_TYPE,
    }
}

/// Infer a MIME type from a file name or path.
pub fn content_type_for_name(name: Option<&str>) -> &'static str {
    let Some(name) = name else {
        return DEFAULT_CONTENT_TYPE;
    };
    let file = name.rsplit('/').next().unwrap_or(name);
    match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => content_type_for_extension(ext),
        _ => DEFAULT_CONTENT_TYPE,
    }
}
