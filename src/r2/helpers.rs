/// Detect Content-Type from an object key's extension
///
/// Returns `None` for unknown or missing extensions so no content type is
/// bound into an upload signature.
pub fn detect_content_type(key: &str) -> Option<&'static str> {
    let file_name = key.rsplit('/').next().unwrap_or(key);
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }

    let content_type = match ext.to_ascii_lowercase().as_str() {
        // Video formats
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "m4v" => "video/x-m4v",

        // Image formats
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",

        // Audio formats
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        "aac" => "audio/aac",
        "m4a" => "audio/mp4",

        // Document formats
        "pdf" => "application/pdf",

        // Text formats
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "csv" => "text/csv",
        "srt" => "application/x-subrip",
        "vtt" => "text/vtt",

        // Archive formats
        "zip" => "application/zip",
        "tar" => "application/x-tar",
        "gz" => "application/gzip",

        _ => return None,
    };

    Some(content_type)
}
