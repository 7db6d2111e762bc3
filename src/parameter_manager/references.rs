/// `${secret.projects/P/secrets/S/versions/V}` references in parameter data
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref REFERENCE: Regex =
        Regex::new(r"\$\{secret\.(projects/([^/}]+)/secrets/([^/}]+)/versions/([^/}]+))\}").unwrap();
    static ref CANDIDATE: Regex = Regex::new(r"\$\{secret\.([^}]*)\}").unwrap();
}

const OPENER: &str = "${secret.";

/// One well-formed reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretReference {
    /// Full `${secret....}` text as it appears in the data
    pub placeholder: String,
    /// `projects/P/secrets/S/versions/V`
    pub resource: String,
    pub project: String,
    pub secret: String,
    pub version: String,
}

/// Outcome of checking every reference in a text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceValidation {
    pub valid: bool,
    pub reference_count: usize,
    pub references: Vec<String>,
    pub errors: Vec<String>,
}

/// Well-formed references in order of appearance
pub fn find_references(text: &str) -> Vec<SecretReference> {
    REFERENCE
        .captures_iter(text)
        .map(|caps| SecretReference {
            placeholder: caps[0].to_string(),
            resource: caps[1].to_string(),
            project: caps[2].to_string(),
            secret: caps[3].to_string(),
            version: caps[4].to_string(),
        })
        .collect()
}

/// Resource names of the well-formed references, deduplicated
pub fn parse_secret_references(text: &str) -> Vec<String> {
    let mut resources: Vec<String> = Vec::new();
    for reference in find_references(text) {
        if !resources.contains(&reference.resource) {
            resources.push(reference.resource);
        }
    }
    resources
}

/// Check that every `${secret.` opener forms a well-formed reference
pub fn validate_secret_references(text: &str) -> ReferenceValidation {
    let mut errors = Vec::new();

    for caps in CANDIDATE.captures_iter(text) {
        if !REFERENCE.is_match(&caps[0]) {
            errors.push(format!(
                "Invalid secret reference '{}': expected ${{secret.projects/PROJECT/secrets/SECRET/versions/VERSION}}",
                &caps[0]
            ));
        }
    }

    let closed = CANDIDATE.find_iter(text).count();
    let opened = text.matches(OPENER).count();
    if opened > closed {
        errors.push(format!(
            "{} unterminated secret reference(s): missing closing '}}'",
            opened - closed
        ));
    }

    let references = parse_secret_references(text);
    ReferenceValidation {
        valid: errors.is_empty(),
        reference_count: references.len(),
        references,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: &str = r#"{"db": {"password": "${secret.projects/p1/secrets/db-pass/versions/3}", "user": "app"}}"#;

    #[test]
    fn test_find_references_splits_components() {
        let found = find_references(DATA);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].project, "p1");
        assert_eq!(found[0].secret, "db-pass");
        assert_eq!(found[0].version, "3");
        assert_eq!(found[0].resource, "projects/p1/secrets/db-pass/versions/3");
        assert!(DATA.contains(&found[0].placeholder));
    }

    #[test]
    fn test_parse_deduplicates() {
        let text = "${secret.projects/p/secrets/a/versions/latest} ${secret.projects/p/secrets/a/versions/latest}";
        assert_eq!(parse_secret_references(text), vec!["projects/p/secrets/a/versions/latest"]);
    }

    #[test]
    fn test_validate_accepts_well_formed() {
        let result = validate_secret_references(DATA);
        assert!(result.valid);
        assert_eq!(result.reference_count, 1);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_validate_reports_malformed_and_unterminated() {
        let result = validate_secret_references("${secret.projects/p/secrets/a} and ${secret.projects/p");
        assert!(!result.valid);
        assert_eq!(result.reference_count, 0);
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_plain_text_has_no_references() {
        let result = validate_secret_references("no references here");
        assert!(result.valid);
        assert_eq!(result.reference_count, 0);
    }
}
