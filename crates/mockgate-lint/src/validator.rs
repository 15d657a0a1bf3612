//! Core validation logic for fixture documents.

use crate::types::{LintIssue, LintOptions, LintResult};
use base64::Engine;
use mockgate::matcher::is_absolute_url;
use mockgate::ResponseCode;
use regex::RegexBuilder;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;

const DOCUMENT_FIELDS: [&str; 3] = ["group", "match", "respond"];
const RULE_FIELDS: [&str; 2] = ["match", "respond"];
const MATCH_FIELDS: [&str; 2] = ["exact", "pattern"];
const RESPOND_FIELDS: [&str; 4] = ["status", "body", "bodyBase64", "failure"];
const FAILURE_FIELDS: [&str; 3] = ["domain", "code", "message"];

/// Report every key of `object` outside `known`; the loader rejects them.
fn check_known_fields(
    file: &Path,
    object: &Map<String, Value>,
    known: &[&str],
    location: &str,
    result: &mut LintResult,
) {
    for key in object.keys().filter(|key| !known.contains(&key.as_str())) {
        let issue = LintIssue::error("E008", format!("Unknown field: {key}"), file.to_path_buf())
            .with_location(join(location, key))
            .with_suggestion(format!("Known fields: {}", known.join(", ")));
        result.add_issue(issue);
    }
}

fn check_optional_string(
    file: &Path,
    object: &Map<String, Value>,
    field: &str,
    location: &str,
    result: &mut LintResult,
) {
    if object.get(field).is_some_and(|value| !value.is_string()) {
        result.add_issue(
            LintIssue::error(
                "E003",
                format!("`{field}` must be a string"),
                file.to_path_buf(),
            )
            .with_location(join(location, field)),
        );
    }
}

fn allowed_statuses() -> String {
    ResponseCode::ALL
        .iter()
        .map(|code| code.as_u16().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Validate a complete fixture document.
pub fn validate_fixture(
    file: &Path,
    fixture: &Value,
    result: &mut LintResult,
    options: &LintOptions,
) {
    let Some(document) = fixture.as_object() else {
        result.add_issue(
            LintIssue::error("E002", "Fixture must be a mapping", file.to_path_buf())
                .with_suggestion("Use a top-level `group:` list or a `match`/`respond` pair"),
        );
        return;
    };

    check_known_fields(file, document, &DOCUMENT_FIELDS, "", result);

    match document.get("group") {
        Some(group) => {
            if document.contains_key("match") || document.contains_key("respond") {
                result.add_issue(
                    LintIssue::error(
                        "E003",
                        "`group` cannot be combined with a top-level `match`/`respond`",
                        file.to_path_buf(),
                    )
                    .with_suggestion("Move the top-level rule into the group"),
                );
            }
            validate_group(file, group, result, options);
        }
        None => validate_rule(file, document, "", result, options),
    }
}

/// Validate a `group` list.
pub fn validate_group(
    file: &Path,
    group: &Value,
    result: &mut LintResult,
    options: &LintOptions,
) {
    let Some(entries) = group.as_array() else {
        result.add_issue(
            LintIssue::error("E003", "`group` must be a list of rules", file.to_path_buf())
                .with_location("group"),
        );
        return;
    };

    if entries.is_empty() {
        result.add_issue(
            LintIssue::warning("W003", "Group has no rules", file.to_path_buf())
                .with_location("group")
                .with_suggestion("Every request in this scope will be unmatched"),
        );
        return;
    }

    let mut seen: HashMap<String, usize> = HashMap::new();
    for (idx, entry) in entries.iter().enumerate() {
        let location = format!("group[{idx}]");
        let Some(rule) = entry.as_object() else {
            result.add_issue(
                LintIssue::error("E003", "Rule must be a mapping", file.to_path_buf())
                    .with_location(location),
            );
            continue;
        };

        check_known_fields(file, rule, &RULE_FIELDS, &location, result);
        validate_rule(file, rule, &location, result, options);

        if let Some(matcher) = rule.get("match") {
            let key = matcher.to_string();
            if let Some(first) = seen.get(&key) {
                result.add_issue(
                    LintIssue::warning(
                        "W002",
                        format!("Rule duplicates the match of group[{first}]; both will fire"),
                        file.to_path_buf(),
                    )
                    .with_location(format!("{location}.match"))
                    .with_suggestion("Remove one of the rules"),
                );
            } else {
                seen.insert(key, idx);
            }
        }
    }
}

fn join(location: &str, field: &str) -> String {
    if location.is_empty() {
        field.to_string()
    } else {
        format!("{location}.{field}")
    }
}

/// Validate one `match` + `respond` rule.
pub fn validate_rule(
    file: &Path,
    rule: &Map<String, Value>,
    location: &str,
    result: &mut LintResult,
    options: &LintOptions,
) {
    for field in ["match", "respond"] {
        if !rule.contains_key(field) {
            let issue = LintIssue::error(
                "E003",
                format!("Missing required field: {field}"),
                file.to_path_buf(),
            )
            .with_suggestion(format!("Add `{field}` to the rule"));
            result.add_issue(if location.is_empty() {
                issue
            } else {
                issue.with_location(location)
            });
        }
    }

    if let Some(matcher) = rule.get("match") {
        validate_match(file, matcher, &join(location, "match"), result, options);
    }
    if let Some(respond) = rule.get("respond") {
        validate_respond(file, respond, &join(location, "respond"), result);
    }
}

/// Validate a `match` object: exactly one of `exact` or `pattern`.
pub fn validate_match(
    file: &Path,
    matcher: &Value,
    location: &str,
    result: &mut LintResult,
    options: &LintOptions,
) {
    let Some(fields) = matcher.as_object() else {
        result.add_issue(
            LintIssue::error("E003", "`match` must be a mapping", file.to_path_buf())
                .with_location(location),
        );
        return;
    };
    check_known_fields(file, fields, &MATCH_FIELDS, location, result);

    let exact = matcher.get("exact");
    let pattern = matcher.get("pattern");

    let (kind, value) = match (exact, pattern) {
        (Some(exact), None) => ("exact", exact),
        (None, Some(pattern)) => ("pattern", pattern),
        _ => {
            result.add_issue(
                LintIssue::error(
                    "E003",
                    "`match` needs exactly one of `exact` or `pattern`",
                    file.to_path_buf(),
                )
                .with_location(location),
            );
            return;
        }
    };

    let Some(value) = value.as_str() else {
        result.add_issue(
            LintIssue::error(
                "E003",
                format!("`{kind}` must be a string"),
                file.to_path_buf(),
            )
            .with_location(join(location, kind)),
        );
        return;
    };

    if kind == "pattern" {
        if let Err(e) = RegexBuilder::new(value).case_insensitive(true).build() {
            result.add_issue(
                LintIssue::error(
                    "E004",
                    format!("Pattern does not compile, the rule would never match: {e}"),
                    file.to_path_buf(),
                )
                .with_location(join(location, kind)),
            );
        }
    } else if options.require_absolute_urls && !is_absolute_url(value) {
        result.add_issue(
            LintIssue::warning(
                "W001",
                format!("Exact URL is not absolute: {value}"),
                file.to_path_buf(),
            )
            .with_location(join(location, kind))
            .with_suggestion("Requests carry absolute URLs, include the scheme and host"),
        );
    }
}

/// Validate a `respond` object.
pub fn validate_respond(file: &Path, respond: &Value, location: &str, result: &mut LintResult) {
    let Some(respond) = respond.as_object() else {
        result.add_issue(
            LintIssue::error("E003", "`respond` must be a mapping", file.to_path_buf())
                .with_location(location),
        );
        return;
    };

    check_known_fields(file, respond, &RESPOND_FIELDS, location, result);
    check_optional_string(file, respond, "body", location, result);

    let has_body = respond.contains_key("body") || respond.contains_key("bodyBase64");

    if let Some(failure) = respond.get("failure") {
        let failure_location = join(location, "failure");
        let Some(failure) = failure.as_object() else {
            result.add_issue(
                LintIssue::error("E003", "`failure` must be a mapping", file.to_path_buf())
                    .with_location(failure_location),
            );
            return;
        };
        check_known_fields(file, failure, &FAILURE_FIELDS, &failure_location, result);
        check_optional_string(file, failure, "domain", &failure_location, result);
        check_optional_string(file, failure, "message", &failure_location, result);

        if respond.contains_key("status") || has_body {
            result.add_issue(
                LintIssue::error(
                    "E006",
                    "`failure` cannot be combined with `status` or a body",
                    file.to_path_buf(),
                )
                .with_location(location)
                .with_suggestion("Split the outcomes into separate rules"),
            );
        }
        if failure.get("code").and_then(Value::as_i64).is_none() {
            result.add_issue(
                LintIssue::error(
                    "E003",
                    "`failure` needs an integer `code`",
                    file.to_path_buf(),
                )
                .with_location(failure_location),
            );
        }
        return;
    }

    match respond.get("status") {
        None => result.add_issue(
            LintIssue::error(
                "E003",
                "`respond` needs a `status` or a `failure`",
                file.to_path_buf(),
            )
            .with_location(location),
        ),
        Some(status) => {
            let supported = status
                .as_u64()
                .and_then(|code| u16::try_from(code).ok())
                .is_some_and(|code| ResponseCode::try_from(code).is_ok());
            if !supported {
                result.add_issue(
                    LintIssue::error(
                        "E005",
                        format!("Unsupported status code: {status}"),
                        file.to_path_buf(),
                    )
                    .with_location(join(location, "status"))
                    .with_suggestion(format!("Use one of: {}", allowed_statuses())),
                );
            }
        }
    }

    if respond.contains_key("body") && respond.contains_key("bodyBase64") {
        result.add_issue(
            LintIssue::error(
                "E006",
                "`body` and `bodyBase64` are mutually exclusive",
                file.to_path_buf(),
            )
            .with_location(location),
        );
    }

    if let Some(encoded) = respond.get("bodyBase64") {
        let decoded = encoded.as_str().map(|encoded| {
            base64::engine::general_purpose::STANDARD.decode(encoded.trim())
        });
        if !matches!(decoded, Some(Ok(_))) {
            result.add_issue(
                LintIssue::error(
                    "E007",
                    "`bodyBase64` is not valid base64",
                    file.to_path_buf(),
                )
                .with_location(join(location, "bodyBase64")),
            );
        }
    }
}
