//! Identifier and literal helpers for generated Terraform

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;

lazy_static! {
    static ref VAR_NAME_INVALID: Regex = Regex::new(r"[^a-zA-Z0-9]+").unwrap();
    static ref RESOURCE_NAME_INVALID: Regex = Regex::new(r"[^a-zA-Z0-9_]+").unwrap();
}

/// Lowercase snake_case variable name; underscores collapse with other separators
pub fn to_var_name(s: &str) -> String {
    VAR_NAME_INVALID
        .replace_all(s, "_")
        .to_lowercase()
        .trim_matches('_')
        .to_string()
}

/// Lowercase Terraform resource label
pub fn to_resource_name(s: &str) -> String {
    RESOURCE_NAME_INVALID
        .replace_all(s, "_")
        .to_lowercase()
        .trim_matches('_')
        .to_string()
}

/// Escape a value for use inside a double-quoted HCL string
pub fn escape_hcl(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            // Template sequences would otherwise be interpolated
            '$' | '%' if chars.peek() == Some(&'{') => {
                escaped.push(c);
                escaped.push(c);
            }
            c => escaped.push(c),
        }
    }
    escaped
}

/// Double `${` and `%{` so heredoc bodies are taken literally
pub fn escape_template_sequences(s: &str) -> String {
    s.replace("${", "$${").replace("%{", "%%{")
}

/// Prefix every non-empty line with `spaces` spaces
pub fn indent(s: &str, spaces: usize) -> String {
    let prefix = " ".repeat(spaces);
    s.split('\n')
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{}{}", prefix, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Single-quote a word for a POSIX shell
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Hands out unique resource labels within one resource type
#[derive(Debug, Default)]
pub struct NameTable {
    used: BTreeSet<String>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a label derived from `source`, falling back to `fallback` when the
    /// source has no usable characters. Collisions get a numeric suffix.
    pub fn claim(&mut self, source: &str, fallback: &str) -> String {
        let mut base = to_resource_name(source);
        if base.is_empty() {
            base = fallback.to_string();
        }
        if base.starts_with(|c: char| c.is_ascii_digit()) {
            base = format!("r_{}", base);
        }

        let mut candidate = base.clone();
        let mut n = 2;
        while !self.used.insert(candidate.clone()) {
            candidate = format!("{}_{}", base, n);
            n += 1;
        }
        candidate
    }
}
