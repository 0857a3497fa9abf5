//! Pattern catalog (spec §4.1): the built-in named patterns, the six
//! "critical" patterns with deterministic scanners, and catalog selection.

pub mod deterministic;
pub mod prefilter;
pub mod search_counter;

use safnari_core::CustomPattern;

/// The fixed priority order critical patterns are tried in within a byte
/// (spec §4.2). Earlier entries win ties.
pub const CRITICAL_PRIORITY: [&str; 6] = [
    "aws_access_key",
    "jwt_token",
    "email",
    "api_key",
    "ssn",
    "credit_card",
];

pub const BUILTIN_PATTERNS: [&str; 14] = [
    "email",
    "credit_card",
    "ssn",
    "ip_address",
    "api_key",
    "phone_number",
    "aws_access_key",
    "jwt_token",
    "street_address",
    "iban",
    "uk_nin",
    "eu_vat",
    "india_aadhaar",
    "china_id",
];

pub fn is_critical(name: &str) -> bool {
    CRITICAL_PRIORITY.contains(&name)
}

/// A single match produced by either the deterministic or the regex
/// engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub pattern: String,
    pub value: String,
    pub start: usize,
    pub end: usize,
}

/// A compiled non-critical pattern: falls back to regex.
pub struct RegexPattern {
    pub name: String,
    pub regex: regex::Regex,
}

/// The resolved set of patterns a scan run will look for: which critical
/// patterns are enabled, plus compiled regex patterns for the rest.
pub struct Catalog {
    pub critical: Vec<String>,
    pub regex: Vec<RegexPattern>,
}

impl Catalog {
    /// Selection rule (spec §4.1): intersect `include_data_types` (or all
    /// builtins when empty but an exclude is present) with known patterns
    /// ∪ compiled custom patterns, then subtract `exclude_data_types`.
    /// Invalid user regexes are skipped with a warning, never fatal.
    pub fn build(
        include_data_types: &[String],
        exclude_data_types: &[String],
        custom_patterns: &[CustomPattern],
    ) -> Self {
        let mut universe: Vec<String> = BUILTIN_PATTERNS.iter().map(|s| s.to_string()).collect();
        for cp in custom_patterns {
            universe.push(cp.name.clone());
        }

        let selected: Vec<String> = if include_data_types.is_empty() {
            universe
        } else {
            universe
                .into_iter()
                .filter(|p| include_data_types.contains(p))
                .collect()
        };

        let selected: Vec<String> = selected
            .into_iter()
            .filter(|p| !exclude_data_types.contains(p))
            .collect();

        let mut critical = Vec::new();
        let mut regex = Vec::new();

        for name in &selected {
            if is_critical(name) {
                critical.push(name.clone());
                continue;
            }
            if let Some(cp) = custom_patterns.iter().find(|c| &c.name == name) {
                match regex::Regex::new(&cp.regex) {
                    Ok(re) => regex.push(RegexPattern {
                        name: cp.name.clone(),
                        regex: re,
                    }),
                    Err(e) => {
                        tracing::warn!(pattern = %cp.name, error = %e, "invalid custom pattern regex, skipping");
                    }
                }
            } else if let Some(builtin) = builtin_regex_source(name) {
                match regex::Regex::new(builtin) {
                    Ok(re) => regex.push(RegexPattern {
                        name: name.clone(),
                        regex: re,
                    }),
                    Err(e) => {
                        tracing::warn!(pattern = %name, error = %e, "invalid builtin pattern regex, skipping");
                    }
                }
            }
        }

        critical.sort_by_key(|n| CRITICAL_PRIORITY.iter().position(|c| c == n).unwrap_or(99));

        Self { critical, regex }
    }
}

fn builtin_regex_source(name: &str) -> Option<&'static str> {
    match name {
        "ip_address" => Some(r"\b(?:\d{1,3}\.){3}\d{1,3}\b"),
        "phone_number" => Some(r"\b\+?\d{1,2}[-.\s]?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b"),
        "street_address" => Some(r"\b\d{1,5}\s+[A-Za-z0-9.\s]+\s+(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Lane|Ln|Drive|Dr)\b"),
        "iban" => Some(r"\b[A-Z]{2}\d{2}[A-Z0-9]{10,30}\b"),
        "uk_nin" => Some(r"\b[A-CEGHJ-PR-TW-Z]{2}\d{6}[A-D]\b"),
        "eu_vat" => Some(r"\b[A-Z]{2}\d{8,12}\b"),
        "india_aadhaar" => Some(r"\b\d{4}\s?\d{4}\s?\d{4}\b"),
        "china_id" => Some(r"\b\d{17}[\dXx]\b"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_include_selects_all_builtins() {
        let cat = Catalog::build(&[], &[], &[]);
        assert!(cat.critical.contains(&"email".to_string()));
        assert!(!cat.regex.is_empty());
    }

    #[test]
    fn include_restricts_selection() {
        let cat = Catalog::build(&["email".to_string()], &[], &[]);
        assert_eq!(cat.critical, vec!["email".to_string()]);
        assert!(cat.regex.is_empty());
    }

    #[test]
    fn exclude_removes_from_selection() {
        let cat = Catalog::build(&[], &["email".to_string()], &[]);
        assert!(!cat.critical.contains(&"email".to_string()));
    }

    #[test]
    fn invalid_custom_regex_is_skipped_not_fatal() {
        let custom = vec![CustomPattern {
            name: "bad".to_string(),
            regex: "(".to_string(),
        }];
        let cat = Catalog::build(&["bad".to_string()], &[], &custom);
        assert!(cat.regex.is_empty());
        assert!(cat.critical.is_empty());
    }
}
