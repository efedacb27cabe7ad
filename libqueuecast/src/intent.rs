//! Queue line classification
//!
//! A queue line is either `HEAD|COMMENT` or plain text. The head decides the
//! intent: a URL becomes a link post, an image filename becomes a local
//! image post, anything else leaves the whole line as a text status.

use crate::types::PostIntent;

/// Separator between the head and the comment of a queue line
pub const SEPARATOR: char = '|';

const URL_PREFIXES: [&str; 3] = ["http://", "https://", "www."];

const IMAGE_EXTENSIONS: [&str; 7] = [".jpg", ".jpeg", ".png", ".gif", ".webp", ".bmp", ".tiff"];

/// Classify one queue line into a post intent
///
/// Never fails: lines that do not match a link or image head fall back to
/// a text intent containing the trimmed line, separator included.
///
/// # Examples
///
/// ```
/// use libqueuecast::intent::classify;
/// use libqueuecast::PostIntent;
///
/// assert_eq!(
///     classify("https://example.com|Worth a read"),
///     PostIntent::Link {
///         url: "https://example.com".to_string(),
///         comment: "Worth a read".to_string(),
///     }
/// );
/// ```
pub fn classify(line: &str) -> PostIntent {
    let line = line.trim();

    let Some((head, rest)) = line.split_once(SEPARATOR) else {
        return PostIntent::Text {
            body: line.to_string(),
        };
    };

    let head = head.trim();
    let rest = rest.trim();

    if is_url(head) {
        return PostIntent::Link {
            url: head.to_string(),
            comment: rest.to_string(),
        };
    }

    if is_image_filename(head) {
        return PostIntent::LocalImage {
            path: head.to_string(),
            caption: rest.to_string(),
        };
    }

    PostIntent::Text {
        body: line.to_string(),
    }
}

/// Make a link head usable as an absolute URL
///
/// Heads written as `www.example.com/...` carry no scheme; they are served
/// over https.
pub fn absolute_url(url: &str) -> String {
    if url.starts_with("www.") {
        format!("https://{}", url)
    } else {
        url.to_string()
    }
}

fn is_url(head: &str) -> bool {
    URL_PREFIXES.iter().any(|prefix| head.starts_with(prefix))
}

fn is_image_filename(head: &str) -> bool {
    let lower = head.to_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(body: &str) -> PostIntent {
        PostIntent::Text {
            body: body.to_string(),
        }
    }

    #[test]
    fn test_plain_text_without_separator() {
        assert_eq!(classify("Just a thought"), text("Just a thought"));
        assert_eq!(classify("  padded status  "), text("padded status"));
    }

    #[test]
    fn test_link_prefixes() {
        for url in ["http://a.example", "https://b.example/x?y=1", "www.c.example"] {
            let line = format!("{}|  my comment ", url);
            assert_eq!(
                classify(&line),
                PostIntent::Link {
                    url: url.to_string(),
                    comment: "my comment".to_string(),
                }
            );
        }
    }

    #[test]
    fn test_link_head_is_trimmed() {
        assert_eq!(
            classify("  https://example.com/a  |Check this out"),
            PostIntent::Link {
                url: "https://example.com/a".to_string(),
                comment: "Check this out".to_string(),
            }
        );
    }

    #[test]
    fn test_link_splits_on_first_separator_only() {
        assert_eq!(
            classify("https://example.com|a | b"),
            PostIntent::Link {
                url: "https://example.com".to_string(),
                comment: "a | b".to_string(),
            }
        );
    }

    #[test]
    fn test_link_with_empty_comment() {
        assert_eq!(
            classify("https://example.com|"),
            PostIntent::Link {
                url: "https://example.com".to_string(),
                comment: String::new(),
            }
        );
    }

    #[test]
    fn test_image_extensions_case_insensitive() {
        for name in [
            "cat.jpg", "cat.JPEG", "a.png", "b.Gif", "c.webp", "d.bmp", "e.TIFF",
        ] {
            let line = format!("{}|caption", name);
            assert_eq!(
                classify(&line),
                PostIntent::LocalImage {
                    path: name.to_string(),
                    caption: "caption".to_string(),
                },
                "{} should be a local image",
                name
            );
        }
    }

    #[test]
    fn test_unsupported_extension_falls_back_to_text() {
        assert_eq!(classify("notes.txt|caption"), text("notes.txt|caption"));
        assert_eq!(classify("movie.mp4|clip"), text("movie.mp4|clip"));
    }

    #[test]
    fn test_unknown_head_keeps_whole_line() {
        assert_eq!(
            classify("  Score: 3|1 for the home team "),
            text("Score: 3|1 for the home team")
        );
    }

    #[test]
    fn test_absolute_url() {
        assert_eq!(absolute_url("www.example.com/a"), "https://www.example.com/a");
        assert_eq!(absolute_url("http://example.com"), "http://example.com");
    }

    #[test]
    fn test_empty_line_is_empty_text() {
        assert_eq!(classify(""), text(""));
    }
}
