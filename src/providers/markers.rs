//! Inline control markers embedded in model output.
//!
//! The system prompt teaches the model a small tag protocol:
//! `[[LINK:page.html]]`, `[[LINKS:[…json…]]]`, `[[CMD:action]]` and
//! `[[NOLINK]]`. This module parses those tags out of the visible text into
//! a typed side-channel value instead of leaving the munging to callers.
//!
//! A `LINKS` payload is a JSON array and therefore often ends in `]]]`
//! (array close + tag close), so the tag terminator is the first `]]` not
//! followed by another `]`.

use serde::Serialize;

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ReplyDirectives {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub no_link: bool,
}

/// Find the closing `]]` of a tag starting at `from`, skipping closers that
/// are immediately followed by another `]`.
fn tag_end(text: &str, from: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = from;
    while i + 1 < bytes.len() {
        if bytes[i] == b']' && bytes[i + 1] == b']' {
            if i + 2 < bytes.len() && bytes[i + 2] == b']' {
                i += 1;
                continue;
            }
            return Some(i);
        }
        i += 1;
    }
    None
}

fn extract_tag(text: &mut String, opener: &str) -> Option<String> {
    let start = text.find(opener)?;
    let content_start = start + opener.len();
    let end = tag_end(text, content_start)?;
    let payload = text[content_start..end].trim().to_string();
    text.replace_range(start..end + 2, "");
    Some(payload)
}

/// Split model output into visible text and typed directives.
pub fn parse_reply_markers(raw: &str) -> (String, ReplyDirectives) {
    let mut text = raw.to_string();
    let mut directives = ReplyDirectives::default();

    while text.contains("[[NOLINK]]") {
        text = text.replacen("[[NOLINK]]", "", 1);
        directives.no_link = true;
    }

    // LINKS before LINK: "[[LINKS:" also starts with "[[LINK".
    while let Some(payload) = extract_tag(&mut text, "[[LINKS:") {
        if directives.links.is_none() {
            let candidate = if payload.starts_with('[') {
                payload
            } else {
                format!("[{payload}]")
            };
            // Keep the first parsable payload; drop the rest silently.
            if let Ok(value @ serde_json::Value::Array(_)) = serde_json::from_str(&candidate) {
                directives.links = Some(value);
            } else {
                tracing::warn!("ignoring unparsable LINKS payload in model output");
            }
        }
    }

    while let Some(payload) = extract_tag(&mut text, "[[LINK:") {
        if directives.link.is_none() && !payload.is_empty() {
            directives.link = Some(payload);
        }
    }

    while let Some(payload) = extract_tag(&mut text, "[[CMD:") {
        if directives.command.is_none() && !payload.is_empty() {
            directives.command = Some(payload);
        }
    }

    // A dangling opener with no closer is model noise: cut it.
    for opener in ["[[LINKS:", "[[LINK:", "[[CMD:"] {
        if let Some(start) = text.find(opener) {
            text.truncate(start);
        }
    }

    (collapse_spaces(text.trim()), directives)
}

/// Visible text with every control tag removed; directives are discarded.
pub fn strip_control_markers(raw: &str) -> String {
    parse_reply_markers(raw).0
}

fn collapse_spaces(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = false;
    for c in text.chars() {
        if c == ' ' {
            if !last_was_space {
                out.push(c);
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        let (text, d) = parse_reply_markers("Il gelato si conserva a -14°C.");
        assert_eq!(text, "Il gelato si conserva a -14°C.");
        assert_eq!(d, ReplyDirectives::default());
    }

    #[test]
    fn single_link_tag_is_extracted() {
        let (text, d) =
            parse_reply_markers("Apri la scheda per i dettagli! [[LINK:sweet-treats.html]]");
        assert_eq!(text, "Apri la scheda per i dettagli!");
        assert_eq!(d.link.as_deref(), Some("sweet-treats.html"));
        assert!(!d.no_link);
    }

    #[test]
    fn nolink_tag_sets_flag_and_disappears() {
        let (text, d) = parse_reply_markers("Nessuna scheda utile. [[NOLINK]]");
        assert_eq!(text, "Nessuna scheda utile.");
        assert!(d.no_link);
        assert!(d.link.is_none());
    }

    #[test]
    fn links_array_payload_parses_despite_triple_bracket() {
        let raw = r#"Ecco le schede. [[LINKS:["gelato-lab.html","caffe.html"]]]"#;
        let (text, d) = parse_reply_markers(raw);
        assert_eq!(text, "Ecco le schede.");
        assert_eq!(
            d.links,
            Some(serde_json::json!(["gelato-lab.html", "caffe.html"]))
        );
    }

    #[test]
    fn bare_links_payload_gets_wrapped() {
        let raw = r#"Vedi qui. [[LINKS:"a.html","b.html"]]"#;
        let (_, d) = parse_reply_markers(raw);
        assert_eq!(d.links, Some(serde_json::json!(["a.html", "b.html"])));
    }

    #[test]
    fn unparsable_links_payload_is_dropped_but_text_is_clean() {
        let raw = "Vedi qui. [[LINKS:not json at all]]";
        let (text, d) = parse_reply_markers(raw);
        assert_eq!(text, "Vedi qui.");
        assert!(d.links.is_none());
    }

    #[test]
    fn cmd_tag_is_extracted() {
        let (text, d) = parse_reply_markers("Fatto! [[CMD:open-quiz]]");
        assert_eq!(text, "Fatto!");
        assert_eq!(d.command.as_deref(), Some("open-quiz"));
    }

    #[test]
    fn first_of_duplicate_tags_wins() {
        let (_, d) = parse_reply_markers("x [[LINK:a.html]] y [[LINK:b.html]]");
        assert_eq!(d.link.as_deref(), Some("a.html"));
    }

    #[test]
    fn dangling_opener_is_truncated() {
        let (text, _) = parse_reply_markers("Risposta utile. [[LINK:troncato");
        assert_eq!(text, "Risposta utile.");
    }

    #[test]
    fn mixed_tags_all_come_out() {
        let raw = "Ciao! [[LINK:caffe.html]] [[CMD:scroll]] [[NOLINK]]";
        let (text, d) = parse_reply_markers(raw);
        assert_eq!(text, "Ciao!");
        assert_eq!(d.link.as_deref(), Some("caffe.html"));
        assert_eq!(d.command.as_deref(), Some("scroll"));
        assert!(d.no_link);
    }

    #[test]
    fn strip_control_markers_keeps_only_text() {
        assert_eq!(
            strip_control_markers("Testo. [[LINK:a.html]]"),
            "Testo."
        );
    }
}
