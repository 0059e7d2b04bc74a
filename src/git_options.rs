//! Git configuration text carried in a claim's execution flags.
//!
//! Authors write ordinary git-config syntax:
//!
//! ```text
//! [pack]
//!   threads = 4
//! [gc "refs"]
//!   auto = false
//! ```
//!
//! Each variable becomes one `-c section[.subsection].name=value` option on the
//! `git gc` invocation. Anything git itself would refuse to parse is a
//! [`ConfigurationError`], which puts the claim into the `Errored` state.

use std::fmt;

/// Malformed git configuration text. Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("invalid git options at line {line}: unterminated section header")]
    UnterminatedSection { line: usize },

    #[error("invalid git options at line {line}: invalid section name {name:?}")]
    InvalidSectionName { line: usize, name: String },

    #[error("invalid git options at line {line}: unterminated subsection name")]
    UnterminatedSubsection { line: usize },

    #[error("invalid git options at line {line}: variable outside of any section")]
    MissingSection { line: usize },

    #[error("invalid git options at line {line}: invalid variable name {name:?}")]
    InvalidName { line: usize, name: String },

    #[error("invalid git options at line {line}: unterminated quoted value")]
    UnterminatedQuote { line: usize },

    #[error("invalid git options at line {line}: invalid escape \\{escape}")]
    InvalidEscape { line: usize, escape: char },
}

/// One configuration variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitOption {
    pub section: String,
    pub subsection: Option<String>,
    pub name: String,
    pub value: String,
}

impl fmt::Display for GitOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subsection {
            Some(sub) => write!(f, "{}.{sub}.{}={}", self.section, self.name, self.value),
            None => write!(f, "{}.{}={}", self.section, self.name, self.value),
        }
    }
}

/// Parses git-config text into options, in the order they appear.
///
/// Section and variable names are case-insensitive and come back lowercased.
/// Subsection names keep their case. A variable without `=` is boolean `true`.
pub fn parse(text: &str) -> Result<Vec<GitOption>, ConfigurationError> {
    let mut options = Vec::new();
    let mut section: Option<(String, Option<String>)> = None;

    let mut lines = text.lines().enumerate();
    while let Some((index, raw)) = lines.next() {
        let line = index + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        if let Some(header) = trimmed.strip_prefix('[') {
            section = Some(parse_section(header, line)?);
            continue;
        }

        let Some((name, subsection)) = &section else {
            return Err(ConfigurationError::MissingSection { line });
        };

        // Names never contain `#` or `;`, so an `=` after one is inside a comment.
        let equals = trimmed.find('=').filter(|&i| !trimmed[..i].contains(['#', ';']));
        let (key, rest) = match equals {
            Some(i) => (trimmed[..i].trim(), Some(&trimmed[i + 1..])),
            None => (strip_comment(trimmed).trim(), None),
        };
        if !is_valid_name(key) {
            return Err(ConfigurationError::InvalidName {
                line,
                name: key.to_string(),
            });
        }

        let value = match rest {
            None => "true".to_string(),
            Some(rest) => {
                // Trailing backslash continues the value on the next line.
                let mut joined = rest.to_string();
                while ends_with_continuation(&joined) {
                    joined.pop();
                    match lines.next() {
                        Some((_, next)) => joined.push_str(next),
                        None => break,
                    }
                }
                parse_value(&joined, line)?
            }
        };

        options.push(GitOption {
            section: name.clone(),
            subsection: subsection.clone(),
            name: key.to_ascii_lowercase(),
            value,
        });
    }

    Ok(options)
}

/// Parses the text after `[` of a section header.
fn parse_section(
    header: &str,
    line: usize,
) -> Result<(String, Option<String>), ConfigurationError> {
    let Some(close) = header_end(header) else {
        if header.contains('"') {
            return Err(ConfigurationError::UnterminatedSubsection { line });
        }
        return Err(ConfigurationError::UnterminatedSection { line });
    };
    let trailing = header[close + 1..].trim();
    if !trailing.is_empty() && !trailing.starts_with('#') && !trailing.starts_with(';') {
        return Err(ConfigurationError::UnterminatedSection { line });
    }
    let inner = &header[..close];

    let (name, subsection) = match inner.find('"') {
        Some(quote) => {
            let name = inner[..quote].trim();
            let subsection = parse_subsection(&inner[quote + 1..], line)?;
            (name, Some(subsection))
        }
        // Legacy `[section.subsection]` form.
        None => match inner.split_once('.') {
            Some((name, sub)) if !sub.is_empty() => (name.trim(), Some(sub.trim().to_string())),
            _ => (inner.trim(), None),
        },
    };

    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
    if !valid {
        return Err(ConfigurationError::InvalidSectionName {
            line,
            name: name.to_string(),
        });
    }

    Ok((name.to_ascii_lowercase(), subsection))
}

/// Index of the `]` closing a section header, skipping any inside a quoted
/// subsection name.
fn header_end(header: &str) -> Option<usize> {
    let mut quoted = false;
    let mut escaped = false;
    for (i, c) in header.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            ']' if !quoted => return Some(i),
            _ => {}
        }
    }
    None
}

/// Parses a quoted subsection name; `rest` starts just after the opening quote.
fn parse_subsection(rest: &str, line: usize) -> Result<String, ConfigurationError> {
    let mut out = String::new();
    let mut chars = rest.chars();
    loop {
        match chars.next() {
            None => return Err(ConfigurationError::UnterminatedSubsection { line }),
            Some('"') => break,
            Some('\\') => match chars.next() {
                Some(c) => out.push(c),
                None => return Err(ConfigurationError::UnterminatedSubsection { line }),
            },
            Some(c) => out.push(c),
        }
    }
    if chars.as_str().trim().is_empty() {
        Ok(out)
    } else {
        Err(ConfigurationError::UnterminatedSection { line })
    }
}

/// Parses a value: strips comments and quotes, resolves escapes, trims
/// unquoted whitespace at both ends.
fn parse_value(raw: &str, line: usize) -> Result<String, ConfigurationError> {
    let mut out = String::new();
    let mut quoted = false;
    // Length of `out` up to the last quoted or escaped character; trailing
    // whitespace beyond it is trimmed.
    let mut kept = 0;
    let mut chars = raw.trim_start().chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                quoted = !quoted;
                kept = out.len();
            }
            '#' | ';' if !quoted => break,
            '\\' => {
                let escaped = match chars.next() {
                    Some('n') => '\n',
                    Some('t') => '\t',
                    Some('b') => '\u{8}',
                    Some(c @ ('\\' | '"')) => c,
                    Some(other) => {
                        return Err(ConfigurationError::InvalidEscape {
                            line,
                            escape: other,
                        });
                    }
                    None => break,
                };
                out.push(escaped);
                kept = out.len();
            }
            c => {
                out.push(c);
                if quoted || !c.is_whitespace() {
                    kept = out.len();
                }
            }
        }
    }

    if quoted {
        return Err(ConfigurationError::UnterminatedQuote { line });
    }
    out.truncate(kept);
    Ok(out)
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn strip_comment(s: &str) -> &str {
    s.find(['#', ';']).map_or(s, |i| &s[..i])
}

/// Whether the value ends in an unescaped backslash.
fn ends_with_continuation(s: &str) -> bool {
    let trailing = s.chars().rev().take_while(|&c| c == '\\').count();
    trailing % 2 == 1
}
