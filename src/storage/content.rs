//! Content-type heuristics keyed on object names.

/// Extensions treated as text regardless of the reported content type.
const TEXT_EXTENSIONS: &[&str] = &[
    ".txt", ".json", ".xml", ".html", ".htm", ".css", ".js", ".ts", ".md", ".csv", ".yml",
    ".yaml", ".log", ".sh", ".bash", ".py", ".rb", ".java", ".c", ".cpp", ".h", ".cs", ".php",
];

/// Returns `true` when the object should be decoded as UTF-8 text.
pub fn is_text_file(key: &str, content_type: Option<&str>) -> bool {
    let content_type = content_type.unwrap_or_default();
    if content_type.starts_with("text/")
        || matches!(
            content_type,
            "application/json" | "application/xml" | "application/javascript"
        )
    {
        return true;
    }
    let key = key.to_lowercase();
    TEXT_EXTENSIONS.iter().any(|ext| key.ends_with(ext))
}

/// Returns `true` for PDF objects.
pub fn is_pdf_file(key: &str, content_type: Option<&str>) -> bool {
    content_type == Some("application/pdf") || key.to_lowercase().ends_with(".pdf")
}

/// Guesses a MIME type from the key's extension.
pub fn detect_content_type(key: &str) -> &'static str {
    let lower = key.to_lowercase();
    let extension = lower.rsplit('.').next().unwrap_or_default();

    match extension {
        "txt" => "text/plain",
        "json" => "application/json",
        "xml" => "application/xml",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "application/javascript",
        "ts" => "application/typescript",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "yml" | "yaml" => "application/x-yaml",
        "pdf" => "application/pdf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "zip" => "application/zip",
        "tar" => "application/x-tar",
        "gz" => "application/gzip",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("report.TXT", "text/plain" ; "uppercase extension")]
    #[test_case("site/index.htm", "text/html" ; "htm alias")]
    #[test_case("bundle.mjs", "application/javascript" ; "module script")]
    #[test_case("archive.tar.gz", "application/gzip" ; "last extension wins")]
    #[test_case("Makefile", "application/octet-stream" ; "no extension")]
    #[test_case("photo.jpeg", "image/jpeg" ; "jpeg")]
    fn test_detect_content_type(key: &str, expected: &str) {
        assert_eq!(detect_content_type(key), expected);
    }

    #[test_case("data.bin", Some("text/csv"), true ; "text content type")]
    #[test_case("data.bin", Some("application/json"), true ; "json content type")]
    #[test_case("README.MD", None, true ; "text extension")]
    #[test_case("photo.png", Some("image/png"), false ; "binary")]
    fn test_is_text_file(key: &str, content_type: Option<&str>, expected: bool) {
        assert_eq!(is_text_file(key, content_type), expected);
    }

    #[test]
    fn test_is_pdf_file() {
        assert!(is_pdf_file("paper.PDF", None));
        assert!(is_pdf_file("blob", Some("application/pdf")));
        assert!(!is_pdf_file("paper.txt", Some("text/plain")));
    }
}
