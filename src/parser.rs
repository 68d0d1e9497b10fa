//! Badge path grammars.
//!
//! `/v2/` paths are slash separated: `text/<label>/<value>/<color>.png`,
//! `pypi/<project>/<metric>/<color>.png` and
//! `drone/<owner>/<repo>/<pass>-<fail>.png`.
//!
//! `/v1/<kind>/` paths carry a single filename whose fields are joined with
//! `-`. Inside a field a space is written `_`, an underscore `__` and a
//! hyphen `--`, so `my_lib-build_status-green.png` decodes to
//! `["my lib", "build status", "green.png"]`.

use crate::badge::{BadgeRequest, PackageMetric, ShieldKind};
use crate::error::ParseError;

const SUFFIX: &str = ".png";

/// Path encodings, selected by the API version segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    Hyphen,
    Segment,
}

impl Grammar {
    pub fn for_version(version: &str) -> Option<Self> {
        match version {
            "v1" => Some(Grammar::Hyphen),
            "v2" => Some(Grammar::Segment),
            _ => None,
        }
    }
}

/// Parse a `/v2/` shield path such as `text/build/passing/green.png`.
pub fn parse_segments(path: &str) -> Result<BadgeRequest, ParseError> {
    let parts: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    let kind: ShieldKind = parts[0].parse()?;
    if parts.len() != 4 {
        return Err(ParseError::Malformed(format!(
            "{} badges take 3 segments after the type, got {}",
            kind.token(),
            parts.len() - 1
        )));
    }

    let fields = parts[1..].iter().map(|part| part.to_string()).collect();
    build_request(kind, fields)
}

/// Parse a `/v1/<kind>/` filename such as `build-passing-green.png`.
pub fn parse_filename(kind: ShieldKind, filename: &str) -> Result<BadgeRequest, ParseError> {
    let mut fields = decode_fields(filename)?;
    let arity = match kind {
        ShieldKind::Text | ShieldKind::PackageIndex => 3,
        ShieldKind::CiStatus => 4,
    };
    if fields.len() != arity {
        return Err(ParseError::Malformed(format!(
            "{} filenames take {} fields, got {}",
            kind.token(),
            arity,
            fields.len()
        )));
    }

    if kind == ShieldKind::CiStatus {
        // Pass and fail colors arrive as separate fields here; fold them
        // into the `<pass>-<fail>.png` form the segment grammar uses.
        let fail = fields.pop().unwrap_or_default();
        let pass = fields.pop().unwrap_or_default();
        fields.push(format!("{pass}-{fail}"));
    }
    build_request(kind, fields)
}

/// Inverse of [`parse_filename`] for fields without leading, trailing or
/// doubled hyphens and without runs of spaces. The last field is the color.
pub fn encode_filename(fields: &[&str]) -> String {
    let encoded: Vec<String> = fields
        .iter()
        .map(|field| {
            let mut out = String::with_capacity(field.len());
            for c in field.chars() {
                match c {
                    '_' => out.push_str("__"),
                    ' ' => out.push('_'),
                    '-' => out.push_str("--"),
                    other => out.push(other),
                }
            }
            out
        })
        .collect();
    format!("{}{}", encoded.join("-"), SUFFIX)
}

/// Decode the underscore escapes: `__` is an underscore, a lone `_` a space.
fn unescape_spaces(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '_' {
            out.push(c);
        } else if chars.peek() == Some(&'_') {
            chars.next();
            out.push('_');
        } else {
            out.push(' ');
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Next token starts a new field.
    Field,
    /// An escaped hyphen was seen; the next token continues the last field.
    Joining,
}

/// Split a hyphen-encoded filename into its fields.
fn decode_fields(filename: &str) -> Result<Vec<String>, ParseError> {
    let unescaped = unescape_spaces(filename);
    let mut fields: Vec<String> = Vec::new();
    let mut state = ScanState::Field;

    for token in unescaped.split('-') {
        state = match state {
            ScanState::Field if token.is_empty() => {
                if fields.is_empty() {
                    return Err(ParseError::Malformed(
                        "filename starts with a hyphen".to_string(),
                    ));
                }
                ScanState::Joining
            }
            ScanState::Field => {
                fields.push(token.to_string());
                ScanState::Field
            }
            ScanState::Joining => {
                if let Some(prev) = fields.last_mut() {
                    prev.push('-');
                    prev.push_str(token);
                }
                ScanState::Field
            }
        };
    }

    if state == ScanState::Joining {
        return Err(ParseError::Malformed(
            "filename ends with a hyphen".to_string(),
        ));
    }
    Ok(fields)
}

fn strip_suffix(token: &str) -> Result<&str, ParseError> {
    token.strip_suffix(SUFFIX).ok_or(ParseError::MissingSuffix)
}

/// Build a request from `[key, value, color.png]` fields.
fn build_request(kind: ShieldKind, fields: Vec<String>) -> Result<BadgeRequest, ParseError> {
    let [key, value, last]: [String; 3] = fields
        .try_into()
        .map_err(|_| ParseError::Malformed("wrong number of fields".to_string()))?;
    let color = strip_suffix(&last)?;
    if color.is_empty() {
        return Err(ParseError::InvalidColorSpec(last));
    }

    match kind {
        ShieldKind::Text => Ok(BadgeRequest::Text {
            label: key,
            value,
            color: color.to_string(),
        }),
        ShieldKind::PackageIndex => {
            if key.is_empty() {
                return Err(ParseError::Malformed("empty project name".to_string()));
            }
            let metric: PackageMetric = value.parse()?;
            Ok(BadgeRequest::PackageIndex {
                project: key,
                metric,
                color: color.to_string(),
            })
        }
        ShieldKind::CiStatus => {
            if key.is_empty() || value.is_empty() {
                return Err(ParseError::Malformed("empty owner or repository".to_string()));
            }
            let (pass, fail) = color
                .split_once('-')
                .filter(|(pass, fail)| !pass.is_empty() && !fail.is_empty() && !fail.contains('-'))
                .ok_or_else(|| ParseError::InvalidColorSpec(color.to_string()))?;
            Ok(BadgeRequest::CiStatus {
                owner: key,
                repo: value,
                pass_color: pass.to_string(),
                fail_color: fail.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(label: &str, value: &str, color: &str) -> BadgeRequest {
        BadgeRequest::Text {
            label: label.into(),
            value: value.into(),
            color: color.into(),
        }
    }

    #[test]
    fn test_grammar_for_version() {
        assert_eq!(Grammar::for_version("v1"), Some(Grammar::Hyphen));
        assert_eq!(Grammar::for_version("v2"), Some(Grammar::Segment));
        assert_eq!(Grammar::for_version("v3"), None);
    }

    #[test]
    fn test_segment_text() {
        assert_eq!(
            parse_segments("text/build/passing/green.png").unwrap(),
            text("build", "passing", "green")
        );
        assert_eq!(
            parse_segments("/text/coverage/93%/4c1.png").unwrap(),
            text("coverage", "93%", "4c1")
        );
    }

    #[test]
    fn test_segment_package_index() {
        assert_eq!(
            parse_segments("pypi/requests/week_down/blue.png").unwrap(),
            BadgeRequest::PackageIndex {
                project: "requests".into(),
                metric: PackageMetric::WeekDownloads,
                color: "blue".into(),
            }
        );
        assert_eq!(
            parse_segments("pypi/requests/stars/blue.png"),
            Err(ParseError::UnknownMetric("stars".into()))
        );
    }

    #[test]
    fn test_segment_ci_status() {
        assert_eq!(
            parse_segments("drone/acme/widgets/green-red.png").unwrap(),
            BadgeRequest::CiStatus {
                owner: "acme".into(),
                repo: "widgets".into(),
                pass_color: "green".into(),
                fail_color: "red".into(),
            }
        );
        for bad in [
            "drone/acme/widgets/green.png",
            "drone/acme/widgets/green-.png",
            "drone/acme/widgets/a-b-c.png",
        ] {
            assert!(
                matches!(parse_segments(bad), Err(ParseError::InvalidColorSpec(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_segment_rejections() {
        assert_eq!(
            parse_segments("npm/left-pad/version/green.png"),
            Err(ParseError::UnknownShield("npm".into()))
        );
        assert!(matches!(
            parse_segments("text/build/green.png"),
            Err(ParseError::Malformed(_))
        ));
        assert!(matches!(
            parse_segments("text/build/passing/extra/green.png"),
            Err(ParseError::Malformed(_))
        ));
        assert_eq!(
            parse_segments("text/build/passing/green.svg"),
            Err(ParseError::MissingSuffix)
        );
        assert!(matches!(
            parse_segments("text/build/passing/.png"),
            Err(ParseError::InvalidColorSpec(_))
        ));
        assert!(matches!(
            parse_segments("drone//widgets/green-red.png"),
            Err(ParseError::Malformed(_))
        ));
    }

    #[test]
    fn test_unescape_spaces() {
        assert_eq!(unescape_spaces("build_status"), "build status");
        assert_eq!(unescape_spaces("my__lib"), "my_lib");
        assert_eq!(unescape_spaces("a___b"), "a_ b");
    }

    #[test]
    fn test_decode_escaped_hyphens() {
        assert_eq!(
            decode_fields("pre--release-1.0-orange.png").unwrap(),
            vec!["pre-release", "1.0", "orange.png"]
        );
        assert!(matches!(decode_fields("-lead"), Err(ParseError::Malformed(_))));
        assert!(matches!(decode_fields("trail-"), Err(ParseError::Malformed(_))));
    }

    #[test]
    fn test_filename_text() {
        assert_eq!(
            parse_filename(ShieldKind::Text, "build_status-passing-green.png").unwrap(),
            text("build status", "passing", "green")
        );
        assert!(matches!(
            parse_filename(ShieldKind::Text, "build-passing.png"),
            Err(ParseError::Malformed(_))
        ));
        assert_eq!(
            parse_filename(ShieldKind::Text, "build-passing-green"),
            Err(ParseError::MissingSuffix)
        );
    }

    #[test]
    fn test_filename_ci_status() {
        assert_eq!(
            parse_filename(ShieldKind::CiStatus, "acme-my__repo-green-red.png").unwrap(),
            BadgeRequest::CiStatus {
                owner: "acme".into(),
                repo: "my_repo".into(),
                pass_color: "green".into(),
                fail_color: "red".into(),
            }
        );
        assert!(matches!(
            parse_filename(ShieldKind::CiStatus, "acme-repo-green.png"),
            Err(ParseError::Malformed(_))
        ));
    }

    #[test]
    fn test_encode_then_decode_recovers_fields() {
        let cases = [
            ("build", "passing", "green"),
            ("build status", "passing", "brightgreen"),
            ("my_lib", "v 1.2_rc", "4c1"),
            ("a b c", "_x_", "red"),
            ("pre-release", "1.0", "orange"),
        ];

        for (label, value, color) in cases {
            let filename = encode_filename(&[label, value, color]);
            assert_eq!(
                parse_filename(ShieldKind::Text, &filename).unwrap(),
                text(label, value, color),
                "{filename}"
            );
        }
    }
}
