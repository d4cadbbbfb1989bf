use crate::{Diagnostic, StoryDocument};
use serde_json::Value;
use std::collections::HashSet;

/// Checks the minimum shape the converter needs. Returns the first failure.
pub fn validate_document(document: &StoryDocument) -> Result<(), Diagnostic> {
    if document.passages.is_empty() {
        return Err(rule_passages_present());
    }

    for (index, passage) in document.passages.iter().enumerate() {
        if passage.name.trim().is_empty() {
            return Err(rule_passage_named(index));
        }
    }

    let mut seen = HashSet::new();
    for passage in &document.passages {
        if !seen.insert(passage.name.as_str()) {
            return Err(rule_unique_names(&passage.name));
        }
    }

    Ok(())
}

/// The same checks over a JSON document that has not been through repair.
pub fn validate_document_value(document: &Value) -> Result<(), Diagnostic> {
    let Value::Object(fields) = document else {
        return Err(Diagnostic::error(
            "document_record",
            "document must be a JSON object",
        ));
    };

    let passages = match fields.get("passages") {
        Some(Value::Array(items)) if !items.is_empty() => items,
        _ => return Err(rule_passages_present()),
    };

    let mut names = Vec::with_capacity(passages.len());
    for (index, passage) in passages.iter().enumerate() {
        let Value::Object(passage) = passage else {
            return Err(Diagnostic::error(
                "passage_record",
                format!("passage #{} must be a JSON object", index + 1),
            ));
        };
        match passage.get("name").and_then(Value::as_str) {
            Some(name) if !name.trim().is_empty() => names.push(name),
            _ => return Err(rule_passage_named(index)),
        }
    }

    let mut seen = HashSet::new();
    for name in &names {
        if !seen.insert(*name) {
            return Err(rule_unique_names(name));
        }
    }

    for (passage, name) in passages.iter().zip(&names) {
        if let Some(links) = passage.get("links") {
            if !links.is_array() {
                return Err(Diagnostic::error("links_list", "passage links must be a list")
                    .with_passage(*name)
                    .with_fix("provide links as an array or omit the field"));
            }
        }
    }

    Ok(())
}

fn rule_passages_present() -> Diagnostic {
    Diagnostic::error("passages_present", "document must contain at least one passage")
}

fn rule_passage_named(index: usize) -> Diagnostic {
    Diagnostic::error(
        "passage_named",
        format!("passage #{} must have a non-empty name", index + 1),
    )
}

fn rule_unique_names(name: &str) -> Diagnostic {
    Diagnostic::error(
        "unique_names",
        format!("passage name '{name}' is used more than once"),
    )
    .with_passage(name)
    .with_fix("give every passage a distinct name")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Passage, repair_document};
    use serde_json::json;

    #[test]
    fn validate_document_no_passages_expected_error() {
        let document = StoryDocument::new("Empty", Vec::new());
        let diagnostic = validate_document(&document).expect_err("should fail");
        assert_eq!(diagnostic.rule, "passages_present");
    }

    #[test]
    fn validate_document_duplicate_names_bypassing_repair_expected_error() {
        let document = StoryDocument::new(
            "Ward",
            vec![Passage::new(1, "Start", ""), Passage::new(2, "Start", "")],
        );
        let diagnostic = validate_document(&document).expect_err("should fail");
        assert_eq!(diagnostic.rule, "unique_names");
        assert_eq!(diagnostic.passage.as_deref(), Some("Start"));
    }

    #[test]
    fn validate_document_blank_name_expected_error() {
        let document = StoryDocument::new("Ward", vec![Passage::new(1, "  ", "")]);
        let diagnostic = validate_document(&document).expect_err("should fail");
        assert_eq!(diagnostic.rule, "passage_named");
    }

    #[test]
    fn validate_document_after_repair_of_duplicates_expected_ok() {
        let document = repair_document(&json!({
            "passages": [{"name": "Start"}, {"name": "Start"}]
        }));
        validate_document(&document).expect("repaired document should pass");
    }

    #[test]
    fn validate_document_value_checks_in_order_expected_first_failure() {
        let cases = [
            (json!([]), "document_record"),
            (json!({"passages": []}), "passages_present"),
            (json!({"passages": [1]}), "passage_record"),
            (json!({"passages": [{"name": " "}]}), "passage_named"),
            (
                json!({"passages": [{"name": "a", "links": "b"}, {"name": "a"}]}),
                "unique_names",
            ),
            (json!({"passages": [{"name": "a", "links": "b"}]}), "links_list"),
        ];

        for (document, rule) in cases {
            let diagnostic = validate_document_value(&document).expect_err("should fail");
            assert_eq!(diagnostic.rule, rule, "document: {document}");
        }
    }

    #[test]
    fn validate_document_value_well_formed_expected_ok() {
        let document = json!({
            "name": "Ward",
            "passages": [
                {"name": "a", "links": [{"name": "Go", "link": "b"}]},
                {"name": "b"}
            ]
        });
        validate_document_value(&document).expect("document should pass");
    }
}
