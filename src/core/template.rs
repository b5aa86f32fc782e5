use std::path::Path;

use serde::Deserialize;

use crate::core::error::{RenderError, SetupError};
use crate::core::recipients::RecipientRow;

/// Message template loaded once per batch invocation. `subject` and `body`
/// may contain `{{name}}` placeholders resolved from a row's extra fields.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TemplateSpec {
    pub subject: String,
    pub body: String,
    #[serde(default, alias = "from_address")]
    pub from: Option<String>,
}

impl TemplateSpec {
    pub fn load(path: &Path) -> Result<Self, SetupError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SetupError::Validation(format!("failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            SetupError::Validation(format!(
                "template file must be a JSON object with string 'subject' and 'body': {}",
                e
            ))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    pub from_address: Option<String>,
}

/// Merges the template (if any) with one recipient row. Pure function of its
/// inputs; a missing placeholder value fails this row only.
///
/// Sender precedence: row `from` override, then the template's `from`, then
/// the profile's default passed as `default_from`.
pub fn render(
    template: Option<&TemplateSpec>,
    row: &RecipientRow,
    default_from: Option<&str>,
) -> Result<RenderedMessage, RenderError> {
    if row.to.is_empty() {
        return Err(RenderError::MissingField("to"));
    }

    let (subject, body, template_from) = match template {
        Some(spec) => (
            render_string(&spec.subject, row)?,
            render_string(&spec.body, row)?,
            spec.from.as_deref(),
        ),
        None => (
            row.subject
                .clone()
                .ok_or(RenderError::MissingField("subject"))?,
            row.body.clone().ok_or(RenderError::MissingField("body"))?,
            None,
        ),
    };

    let from_address = row
        .from
        .as_deref()
        .or(template_from)
        .or(default_from)
        .map(str::to_string);

    Ok(RenderedMessage {
        to: row.to.clone(),
        subject,
        body,
        from_address,
    })
}

/// Single-pass `{{name}}` substitution. Substituted values are never
/// re-scanned, so expansion cannot recurse. Placeholder names match extra
/// fields exactly and case-sensitively; an unterminated `{{` is literal.
fn render_string(input: &str, row: &RecipientRow) -> Result<String, RenderError> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let name = &after[..end];
                match row.field(name) {
                    Some(value) => out.push_str(value),
                    None => return Err(RenderError::MissingPlaceholder(name.to_string())),
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[(&str, &str)]) -> RecipientRow {
        RecipientRow {
            to: vec!["user@example.com".to_string()],
            subject: Some("Row subject".to_string()),
            body: Some("Row body".to_string()),
            from: None,
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn template(subject: &str, body: &str) -> TemplateSpec {
        TemplateSpec {
            subject: subject.to_string(),
            body: body.to_string(),
            from: None,
        }
    }

    #[test]
    fn no_template_takes_fields_from_row() {
        let msg = render(None, &row(&[]), None).unwrap();
        assert_eq!(msg.to, vec!["user@example.com"]);
        assert_eq!(msg.subject, "Row subject");
        assert_eq!(msg.body, "Row body");
        assert_eq!(msg.from_address, None);
    }

    #[test]
    fn no_template_missing_subject_fails_row() {
        let mut r = row(&[]);
        r.subject = None;
        assert_eq!(
            render(None, &r, None).unwrap_err(),
            RenderError::MissingField("subject")
        );
    }

    #[test]
    fn placeholders_substitute_from_extra_fields() {
        let t = template("Hello {{name}}", "Your code is {{code}}");
        let msg = render(Some(&t), &row(&[("name", "Ada"), ("code", "42")]), None).unwrap();
        assert_eq!(msg.subject, "Hello Ada");
        assert_eq!(msg.body, "Your code is 42");
    }

    #[test]
    fn template_overrides_literal_row_subject_and_body() {
        let t = template("T subject", "T body");
        let msg = render(Some(&t), &row(&[]), None).unwrap();
        assert_eq!(msg.subject, "T subject");
        assert_eq!(msg.body, "T body");
    }

    #[test]
    fn missing_placeholder_names_the_field() {
        let t = template("Hello {{name}}", "Your code is {{code}}");
        let err = render(Some(&t), &row(&[("name", "Ada")]), None).unwrap_err();
        assert_eq!(err, RenderError::MissingPlaceholder("code".to_string()));
        assert!(err.to_string().contains("{{code}}"));
    }

    #[test]
    fn literal_strings_pass_through_unchanged() {
        let t = template("No placeholders here", "Plain body");
        let msg = render(Some(&t), &row(&[]), None).unwrap();
        assert_eq!(msg.subject, "No placeholders here");
        assert_eq!(msg.body, "Plain body");
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let t = template("{{outer}}", "-");
        let msg = render(Some(&t), &row(&[("outer", "{{inner}}")]), None).unwrap();
        assert_eq!(msg.subject, "{{inner}}");
    }

    #[test]
    fn placeholder_matching_is_case_sensitive() {
        let t = template("Hello {{Name}}", "-");
        let err = render(Some(&t), &row(&[("name", "Ada")]), None).unwrap_err();
        assert_eq!(err, RenderError::MissingPlaceholder("Name".to_string()));
    }

    #[test]
    fn unterminated_placeholder_is_literal() {
        let t = template("Hello {{name", "-");
        let msg = render(Some(&t), &row(&[]), None).unwrap();
        assert_eq!(msg.subject, "Hello {{name");
    }

    #[test]
    fn sender_precedence_row_then_template_then_default() {
        let mut t = template("S", "B");
        t.from = Some("template@example.com".to_string());

        let mut r = row(&[]);
        r.from = Some("row@example.com".to_string());
        let msg = render(Some(&t), &r, Some("profile@example.com")).unwrap();
        assert_eq!(msg.from_address.as_deref(), Some("row@example.com"));

        let msg = render(Some(&t), &row(&[]), Some("profile@example.com")).unwrap();
        assert_eq!(msg.from_address.as_deref(), Some("template@example.com"));

        let plain = template("S", "B");
        let msg = render(Some(&plain), &row(&[]), Some("profile@example.com")).unwrap();
        assert_eq!(msg.from_address.as_deref(), Some("profile@example.com"));
    }
}
