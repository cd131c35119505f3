//! Content type detection from object keys.

/// Fallback for unknown or missing extensions.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Content type to serve `path` with, derived from its extension.
///
/// Text and JSON types get an explicit `charset=utf-8` parameter; unknown
/// extensions are served as [`DEFAULT_CONTENT_TYPE`].
///
/// ```
/// use shipr_publish::content_type;
///
/// assert_eq!(content_type("index.html"), "text/html; charset=utf-8");
/// assert_eq!(content_type("img/logo.PNG"), "image/png");
/// assert_eq!(content_type("LICENSE"), "application/octet-stream");
/// ```
pub fn content_type(path: &str) -> String {
    let mime = mime_type(path).unwrap_or(DEFAULT_CONTENT_TYPE);
    match is_textual(mime) {
        true => format!("{mime}; charset=utf-8"),
        false => mime.to_string(),
    }
}

fn mime_type(path: &str) -> Option<&'static str> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = name.rsplit_once('.')?;
    // Dotfiles such as `.htaccess` have no extension.
    if stem.is_empty() {
        return None;
    }
    Some(match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" | "cjs" => "text/javascript",
        "txt" | "text" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "csv" => "text/csv",
        "ics" => "text/calendar",
        "json" | "map" => "application/json",
        "jsonld" => "application/ld+json",
        "webmanifest" => "application/manifest+json",
        "xml" => "application/xml",
        "rss" => "application/rss+xml",
        "atom" => "application/atom+xml",
        "yaml" | "yml" => "application/yaml",
        "toml" => "application/toml",
        "wasm" => "application/wasm",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "ico" => "image/vnd.microsoft.icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        _ => return None,
    })
}

/// Types that are always UTF-8. XML based types carry no parameter.
fn is_textual(mime: &str) -> bool {
    matches!(mime, "application/json" | "application/manifest+json") || mime.starts_with("text/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("index.html", "text/html; charset=utf-8")]
    #[case("assets/app.min.js", "text/javascript; charset=utf-8")]
    #[case("assets/app.js.map", "application/json; charset=utf-8")]
    #[case("site.webmanifest", "application/manifest+json; charset=utf-8")]
    #[case("feed.rss", "application/rss+xml")]
    #[case("logo.svg", "image/svg+xml")]
    #[case("sitemap.xml", "application/xml")]
    #[case("data.jsonld", "application/ld+json")]
    #[case("fonts/inter.woff2", "font/woff2")]
    #[case("photo.JPEG", "image/jpeg")]
    #[case("app.wasm", "application/wasm")]
    #[case("archive.tar.gz", "application/gzip")]
    fn known_extensions(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(content_type(path), expected);
    }

    #[rstest]
    #[case("Makefile")]
    #[case(".htaccess")]
    #[case("dir.d/README")]
    #[case("blob.unknownext")]
    fn fallback(#[case] path: &str) {
        assert_eq!(content_type(path), DEFAULT_CONTENT_TYPE);
    }
}
