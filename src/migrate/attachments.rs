use std::path::Path;

const TEXT_PLAIN: &str = "text/plain";
const OCTET_STREAM: &str = "application/octet-stream";

/// Number of leading bytes inspected when sniffing for binary content.
const SNIFF_LEN: usize = 1024;

/// Content type for an uploaded attachment. Known extensions win; unknown or
/// plain-text ones fall back to sniffing the first bytes.
pub fn content_type(file_name: &str, bytes: &[u8]) -> &'static str {
    let from_extension = Path::new(file_name.trim())
        .extension()
        .and_then(|e| e.to_str())
        .and_then(|e| by_extension(&e.to_ascii_lowercase()));

    match from_extension {
        Some(kind) if kind != TEXT_PLAIN => kind,
        _ if is_binary(bytes) => OCTET_STREAM,
        _ => TEXT_PLAIN,
    }
}

fn by_extension(ext: &str) -> Option<&'static str> {
    let kind = match ext {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "json" => "application/json",
        "xml" => "application/xml",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "md" => "text/markdown",
        "txt" | "log" => TEXT_PLAIN,
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "mp3" => "audio/mpeg",
        _ => return None,
    };
    Some(kind)
}

fn is_binary(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(SNIFF_LEN)];
    if head.contains(&0) {
        return true;
    }
    match std::str::from_utf8(head) {
        Ok(_) => false,
        // A multi-byte character cut off at the sniff boundary is still text.
        Err(e) => e.error_len().is_some(),
    }
}
