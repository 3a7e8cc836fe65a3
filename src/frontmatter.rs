//! Frontmatter codec: `---` delimited YAML metadata followed by a free-text body.
//!
//! File shape produced by [`generate`]:
//!
//! ```text
//! ---
//! id: 5f0c...
//! title: Buy milk
//! ---
//!
//! free text body, verbatim
//! ```
//!
//! Only the first `---` line after the opening delimiter closes the block,
//! so three-dash lines inside the body are left alone.

use crate::error::FrontmatterError;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Metadata delimiter line.
pub const DELIMITER: &str = "---";

/// Result of non-strict parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<M> {
    pub metadata: Option<M>,
    pub body: String,
}

/// Split text into (raw metadata, body). `None` when no complete block
/// opens the text.
pub fn split(text: &str) -> Option<(&str, &str)> {
    let opening_end = text.find('\n')?;
    if text[..opening_end].trim_end_matches('\r') != DELIMITER {
        return None;
    }

    let meta_start = opening_end + 1;
    let mut pos = meta_start;
    while pos <= text.len() {
        let line_end = text[pos..].find('\n').map(|i| pos + i);
        let line = &text[pos..line_end.unwrap_or(text.len())];
        if line.trim_end_matches('\r') == DELIMITER {
            let meta = &text[meta_start..pos];
            let rest = &text[line_end.map(|e| e + 1).unwrap_or(text.len())..];
            // One blank separator line belongs to the format, not the body.
            let body = rest
                .strip_prefix("\r\n")
                .or_else(|| rest.strip_prefix('\n'))
                .unwrap_or(rest);
            return Some((meta, body));
        }
        match line_end {
            Some(end) => pos = end + 1,
            None => break,
        }
    }
    None
}

/// Non-strict parse. Never fails: text without a well-formed block is all
/// body.
pub fn parse<M: DeserializeOwned>(text: &str) -> Parsed<M> {
    match parse_strict(text) {
        Ok((metadata, body)) => Parsed {
            metadata: Some(metadata),
            body,
        },
        Err(_) => Parsed {
            metadata: None,
            body: text.to_string(),
        },
    }
}

/// Strict parse for callers that require metadata to be present.
pub fn parse_strict<M: DeserializeOwned>(text: &str) -> Result<(M, String), FrontmatterError> {
    let (raw, body) = split(text).ok_or(FrontmatterError::MissingDelimiter)?;
    let metadata = serde_yaml::from_str(raw)
        .map_err(|e| FrontmatterError::MalformedMetadata(e.to_string()))?;
    Ok((metadata, body.to_string()))
}

/// Render metadata and body. Field order follows the metadata type's
/// serialization order, so logically equal records render identically.
pub fn generate<M: Serialize>(metadata: &M, body: &str) -> Result<String, serde_yaml::Error> {
    let yaml = serde_yaml::to_string(metadata)?;
    let mut out = String::with_capacity(yaml.len() + body.len() + 10);
    out.push_str(DELIMITER);
    out.push('\n');
    out.push_str(&yaml);
    if !yaml.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(DELIMITER);
    out.push_str("\n\n");
    out.push_str(body);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Meta {
        id: String,
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        project: Option<String>,
    }

    fn meta() -> Meta {
        Meta {
            id: "abc".to_string(),
            title: "Buy milk".to_string(),
            project: None,
        }
    }

    #[test]
    fn generate_then_parse_roundtrips() {
        let text = generate(&meta(), "line one\nline two\n").unwrap();
        assert!(text.starts_with("---\nid: abc\ntitle: Buy milk\n---\n\n"));

        let (parsed, body) = parse_strict::<Meta>(&text).unwrap();
        assert_eq!(parsed, meta());
        assert_eq!(body, "line one\nline two\n");
    }

    #[test]
    fn empty_and_leading_blank_bodies_survive() {
        for body in ["", "\nstarts blank", "\n\n"] {
            let text = generate(&meta(), body).unwrap();
            let (_, parsed_body) = parse_strict::<Meta>(&text).unwrap();
            assert_eq!(parsed_body, body);
        }
    }

    #[test]
    fn dashes_in_body_do_not_close_a_second_block() {
        let body = "intro\n---\nmore: text\n---\ntail";
        let text = generate(&meta(), body).unwrap();
        let (parsed, parsed_body) = parse_strict::<Meta>(&text).unwrap();
        assert_eq!(parsed.title, "Buy milk");
        assert_eq!(parsed_body, body);
    }

    #[test]
    fn text_without_block_is_all_body() {
        let parsed = parse::<Meta>("just some notes\n---\n");
        assert!(parsed.metadata.is_none());
        assert_eq!(parsed.body, "just some notes\n---\n");
    }

    #[test]
    fn unclosed_block_is_missing_delimiter() {
        let err = parse_strict::<Meta>("---\nid: abc\ntitle: x\n").unwrap_err();
        assert_eq!(err, FrontmatterError::MissingDelimiter);

        let parsed = parse::<Meta>("---\nid: abc\n");
        assert!(parsed.metadata.is_none());
        assert_eq!(parsed.body, "---\nid: abc\n");
    }

    #[test]
    fn malformed_yaml_is_classified() {
        let err = parse_strict::<Meta>("---\nid: [unclosed\n---\n\nbody").unwrap_err();
        assert!(matches!(err, FrontmatterError::MalformedMetadata(_)));
    }

    #[test]
    fn missing_required_field_is_malformed() {
        let err = parse_strict::<Meta>("---\nid: abc\n---\n\nbody").unwrap_err();
        assert!(matches!(err, FrontmatterError::MalformedMetadata(_)));
    }

    #[test]
    fn crlf_files_are_accepted() {
        let text = "---\r\nid: abc\r\ntitle: Buy milk\r\n---\r\n\r\nbody\r\n";
        let (parsed, body) = parse_strict::<Meta>(text).unwrap();
        assert_eq!(parsed.id, "abc");
        assert_eq!(body, "body\r\n");
    }

    #[test]
    fn generation_is_stable() {
        let a = generate(&meta(), "x").unwrap();
        let b = generate(&meta(), "x").unwrap();
        assert_eq!(a, b);
    }
}
