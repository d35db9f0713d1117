use unicode_normalization::UnicodeNormalization;
use url::Url;

use crate::error::DownloadError;

pub const ALLOWED_DOMAINS: &[&str] = &[
    "instagram.com",
    "youtube.com",
    "youtu.be",
    "facebook.com",
    "fb.watch",
    "tiktok.com",
    "twitter.com",
    "vimeo.com",
    "dailymotion.com",
    "twitch.tv",
    "linkedin.com",
];

pub const UNSUPPORTED_PLATFORM: &str = "URL must be from a supported platform";

/// Turn a video title into an ASCII token that is safe both as a path component
/// and inside a `Content-Disposition` header. Never returns an empty string.
pub fn sanitize_filename(title: &str) -> String {
    // NFKD splits accents off their base letter; the non-ASCII marks are then dropped.
    let s: String = title
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if s.is_empty() {
        "video".to_string()
    } else {
        s
    }
}

/// Parse `raw` as an http(s) URL and check it against [`ALLOWED_DOMAINS`].
///
/// The check is a substring match on the caller's lower-cased string, not on the
/// parsed host, so an allowed domain in the path or query also passes.
pub fn validate_url(raw: &str) -> Result<Url, DownloadError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| DownloadError::Validation(format!("Invalid URL: {}", e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(DownloadError::Validation(format!(
            "Invalid URL: unsupported scheme {}",
            url.scheme()
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(DownloadError::Validation("Invalid URL: missing host".to_string()));
    }

    // Match what was sent; `Url` normalizes dot segments, whitespace and escapes.
    let lowered = raw.trim().to_lowercase();
    if !ALLOWED_DOMAINS.iter().any(|d| lowered.contains(d)) {
        return Err(DownloadError::Validation(UNSUPPORTED_PLATFORM.to_string()));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_empty_falls_back_to_video() {
        assert_eq!(sanitize_filename(""), "video");
        // Only non-ASCII characters: everything is dropped.
        assert_eq!(sanitize_filename("日本語"), "video");
    }

    #[test]
    fn sanitize_strips_accents_and_spaces() {
        let s = sanitize_filename("Ångström café.mp4");
        assert_eq!(s, "Angstrom_cafe.mp4");
        assert!(s.is_ascii());
        assert!(!s.contains(char::is_whitespace));
    }

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_filename("My Video"), "My_Video");
        assert_eq!(sanitize_filename("a/b\\c:d\"e;f"), "a_b_c_d_e_f");
        assert_eq!(sanitize_filename("keep-this_one.v2"), "keep-this_one.v2");
    }

    #[test]
    fn sanitize_is_idempotent() {
        for title in ["", "My Video", "Ångström café.mp4", "¿Qué? 100% (live)", "ok-name_1.mp4"] {
            let once = sanitize_filename(title);
            assert_eq!(sanitize_filename(&once), once, "title: {:?}", title);
        }
    }

    #[test]
    fn accepts_allow_listed_platforms() {
        for url in [
            "https://www.youtube.com/watch?v=abc123",
            "https://youtu.be/abc123",
            "https://WWW.TikTok.com/@someone/video/1",
            "http://fb.watch/xyz",
            "https://vimeo.com/12345",
        ] {
            assert!(validate_url(url).is_ok(), "{}", url);
        }
    }

    #[test]
    fn allow_list_matches_anywhere_in_url() {
        assert!(validate_url("https://example.com/watch?ref=youtube.com").is_ok());
        assert!(validate_url("https://evil.test/instagram.com/p/1").is_ok());
    }

    #[test]
    fn allow_list_checks_the_string_as_sent() {
        // Parsing would drop the `youtube.com/..` segment.
        assert!(validate_url("https://example.com/youtube.com/..").is_ok());
        // Parsing would strip the tab and glue the domain together.
        let err = validate_url("https://example.com/you\ttube.com").unwrap_err();
        assert_eq!(err.to_string(), UNSUPPORTED_PLATFORM);
    }

    #[test]
    fn rejects_other_hosts_with_fixed_message() {
        let err = validate_url("https://example.com/video").unwrap_err();
        assert!(matches!(err, DownloadError::Validation(_)));
        assert_eq!(err.to_string(), UNSUPPORTED_PLATFORM);
    }

    #[test]
    fn rejects_malformed_urls() {
        for raw in ["", "not a url", "youtube.com/watch?v=1", "ftp://youtube.com/x", "mailto:a@youtube.com"] {
            let err = validate_url(raw).unwrap_err();
            assert!(err.to_string().starts_with("Invalid URL"), "{}: {}", raw, err);
        }
    }
}
