//! File extension → `Content-Type`.

use std::path::Path;

use crate::response::ContentType;

/// The content type served for `path`, judged by its extension alone.
pub fn content_type(path: &Path) -> &'static str {
    let ext = path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css")          => "text/css; charset=utf-8",
        Some("txt" | "md")   => "text/plain; charset=utf-8",
        Some("csv")          => "text/csv; charset=utf-8",
        Some("xml")          => "application/xml",
        Some("js" | "mjs")   => "application/javascript; charset=utf-8",
        Some("json" | "map") => "application/json",
        Some("wasm")         => "application/wasm",
        Some("png")          => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif")          => "image/gif",
        Some("svg")          => "image/svg+xml",
        Some("ico")          => "image/x-icon",
        Some("webp")         => "image/webp",
        Some("mp4")          => "video/mp4",
        Some("webm")         => "video/webm",
        Some("mp3")          => "audio/mpeg",
        Some("wav")          => "audio/wav",
        Some("woff")         => "font/woff",
        Some("woff2")        => "font/woff2",
        Some("ttf")          => "font/ttf",
        Some("pdf")          => "application/pdf",
        Some("zip")          => "application/zip",
        Some("gz")           => "application/gzip",
        _                    => ContentType::OctetStream.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions() {
        assert_eq!(content_type(Path::new("index.html")), "text/html; charset=utf-8");
        assert_eq!(content_type(Path::new("a/b/app.JS")), "application/javascript; charset=utf-8");
        assert_eq!(content_type(Path::new("logo.svg")), "image/svg+xml");
    }

    #[test]
    fn unknown_or_missing_extension() {
        assert_eq!(content_type(Path::new("data.xyz")), "application/octet-stream");
        assert_eq!(content_type(Path::new("Makefile")), "application/octet-stream");
    }
}
