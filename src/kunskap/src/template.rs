//! SQL templates with brace placeholders.
//!
//! A template is plain SQL where `{name}` is replaced by the configuration
//! value called `name`. `{{` and `}}` produce literal braces. Rendering is
//! strict: an unknown name or a stray brace is an error, so rendered SQL never
//! contains placeholder syntax.

use std::path::{Path, PathBuf};

use crate::{config::Config, errors::TemplateError};

/// A SQL template loaded from disk or built from text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SqlTemplate {
    path: Option<PathBuf>,
    text: String,
}

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Literal(&'a str),
    Placeholder(&'a str),
}

impl SqlTemplate {
    /// Wraps template text.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            path: None,
            text: text.into(),
        }
    }

    /// Reads a template file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| TemplateError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            text,
        })
    }

    /// File the template came from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Raw template text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Distinct placeholder names in order of first appearance.
    pub fn placeholders(&self) -> Result<Vec<&str>, TemplateError> {
        let mut names: Vec<&str> = Vec::new();
        for segment in parse(&self.text)? {
            if let Segment::Placeholder(name) = segment {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        Ok(names)
    }

    /// Substitutes every placeholder from `config`.
    pub fn render(&self, config: &Config) -> Result<String, TemplateError> {
        self.render_with(|name| config.get(name))
    }

    /// Substitutes every placeholder through `lookup`.
    pub fn render_with<'v>(
        &self,
        lookup: impl Fn(&str) -> Option<&'v str>,
    ) -> Result<String, TemplateError> {
        let segments = parse(&self.text)?;
        let mut out = String::with_capacity(self.text.len());
        for segment in segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value = lookup(name).ok_or_else(|| TemplateError::UnknownPlaceholder {
                        name: name.to_string(),
                    })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Splits template text into literal runs and placeholders.
fn parse(text: &str) -> Result<Vec<Segment<'_>>, TemplateError> {
    let bytes = text.as_bytes();
    let mut segments = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' if bytes.get(i + 1) == Some(&b'{') => {
                push_literal(&mut segments, &text[literal_start..i]);
                segments.push(Segment::Literal("{"));
                i += 2;
                literal_start = i;
            }
            b'{' => {
                let rest = &bytes[i + 1..];
                let len = rest.iter().take_while(|b| is_name_byte(**b)).count();
                match rest.get(len) {
                    Some(b'}') if len > 0 => {}
                    Some(b'}') => {
                        return Err(TemplateError::Malformed {
                            offset: i,
                            reason: "empty placeholder",
                        });
                    }
                    None => {
                        return Err(TemplateError::Malformed {
                            offset: i,
                            reason: "unclosed '{'",
                        });
                    }
                    Some(_) => {
                        return Err(TemplateError::Malformed {
                            offset: i,
                            reason: "placeholder names may only contain letters, digits and '_'",
                        });
                    }
                }
                push_literal(&mut segments, &text[literal_start..i]);
                segments.push(Segment::Placeholder(&text[i + 1..i + 1 + len]));
                i += len + 2;
                literal_start = i;
            }
            b'}' if bytes.get(i + 1) == Some(&b'}') => {
                push_literal(&mut segments, &text[literal_start..i]);
                segments.push(Segment::Literal("}"));
                i += 2;
                literal_start = i;
            }
            b'}' => {
                return Err(TemplateError::Malformed {
                    offset: i,
                    reason: "single '}' outside a placeholder",
                });
            }
            _ => i += 1,
        }
    }
    push_literal(&mut segments, &text[literal_start..]);
    Ok(segments)
}

fn push_literal<'a>(segments: &mut Vec<Segment<'a>>, text: &'a str) {
    if !text.is_empty() {
        segments.push(Segment::Literal(text));
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::config::keys;

    fn config() -> Config {
        Config::from_pairs([
            (keys::BILLING_PROJECT_ID, "acme-billing"),
            (keys::AUDIT_LOGS_DATASET_ID, "audit_logs"),
            (keys::AUDIT_LOGS_VIEW_NAME, "usage_view"),
        ])
    }

    #[test]
    fn substitutes_known_placeholders() {
        let tpl = SqlTemplate::new(
            "SELECT * FROM `{billing_project_id}.{audit_logs_dataset_id}.{audit_logs_view_name}`",
        );
        assert_eq!(
            tpl.render(&config()).unwrap(),
            "SELECT * FROM `acme-billing.audit_logs.usage_view`"
        );
    }

    #[test]
    fn doubled_braces_are_literal() {
        let tpl = SqlTemplate::new("SELECT STRUCT('{{a}}' AS x) -- {billing_project_id}");
        assert_eq!(
            tpl.render(&config()).unwrap(),
            "SELECT STRUCT('{a}' AS x) -- acme-billing"
        );
    }

    #[test]
    fn unknown_placeholder_fails() {
        let err = SqlTemplate::new("SELECT '{no_such_key}'")
            .render(&config())
            .unwrap_err();
        assert!(matches!(
            err,
            TemplateError::UnknownPlaceholder { ref name } if name == "no_such_key"
        ));
        assert_eq!(
            err.to_string(),
            "unknown placeholder '{no_such_key}' in SQL template"
        );
    }

    #[test]
    fn stray_braces_are_malformed() {
        for (text, offset) in [("a { b", 2), ("a } b", 2), ("x{}", 1), ("{a.b}", 0), ("ok {", 3)] {
            match SqlTemplate::new(text).render(&config()).unwrap_err() {
                TemplateError::Malformed { offset: at, .. } => assert_eq!(at, offset, "{text}"),
                other => panic!("{text}: unexpected {other}"),
            }
        }
    }

    #[test]
    fn placeholders_are_listed_once_in_order() {
        let tpl = SqlTemplate::new("{b} {a} {b} {{c}}");
        assert_eq!(tpl.placeholders().unwrap(), vec!["b", "a"]);
    }

    #[test]
    fn multibyte_text_survives() {
        let tpl = SqlTemplate::new("-- kostnad för {billing_project_id} ✓");
        assert_eq!(
            tpl.render(&config()).unwrap(),
            "-- kostnad för acme-billing ✓"
        );
    }

    #[test]
    fn load_missing_file_reports_path() {
        let err = SqlTemplate::load("/definitely/not/here.sql").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.sql"));
    }

    proptest! {
        #[test]
        fn rendered_sql_has_no_placeholder_syntax(
            parts in proptest::collection::vec(("[^{}]{0,12}", 0usize..3), 0..8),
        ) {
            let names = [
                keys::BILLING_PROJECT_ID,
                keys::AUDIT_LOGS_DATASET_ID,
                keys::AUDIT_LOGS_VIEW_NAME,
            ];
            let mut text = String::new();
            for (literal, idx) in &parts {
                text.push_str(literal);
                text.push('{');
                text.push_str(names[*idx]);
                text.push('}');
            }

            let rendered = SqlTemplate::new(text).render(&config()).unwrap();
            let has_brace = rendered.contains(['{', '}']);
            prop_assert!(!has_brace, "rendered SQL kept brace syntax: {}", rendered);
        }

        #[test]
        fn any_unknown_name_fails(name in "[a-z_]{1,16}") {
            prop_assume!(config().get(&name).is_none());
            let text = format!("SELECT {{{name}}}");
            let is_unknown = matches!(
                SqlTemplate::new(text).render(&config()),
                Err(TemplateError::UnknownPlaceholder { .. })
            );
            prop_assert!(is_unknown);
        }
    }
}
