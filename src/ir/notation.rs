//! Parsing and rendering of the symbolic set/relation notation.
//!
//! The extractor emits sets like `{[i,j]: 0<=i and i<a}` and relations like
//! `{[i,j]->[2,i,0,j,0]}` or `{[i,k]->[_rVar0]: _rVar0 = col(k)}`. The
//! append splice and the code generator need to take these strings apart
//! and put them back together; this module owns that notation.
//!
//! An empty tuple renders as `[0]`; a set with no constraints omits the
//! colon. Constraints join with ` and `, access-relation guards with ` && `.

use crate::utils::errors::{ExtractError, ExtractErrorKind};

/// A parsed integer set: input tuple variables and raw constraint strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetNotation {
    /// Tuple variable names (empty for zero arity)
    pub iterators: Vec<String>,
    /// Constraint strings, verbatim
    pub constraints: Vec<String>,
}

/// A parsed relation: input tuple, output tuple entries, and guard strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationNotation {
    /// Input tuple variable names (empty for zero arity)
    pub inputs: Vec<String>,
    /// Output tuple entries, verbatim (names or integers)
    pub outputs: Vec<String>,
    /// Guard strings, verbatim
    pub guards: Vec<String>,
}

fn notation_error(what: &str, s: &str) -> ExtractError {
    ExtractError::new(
        ExtractErrorKind::Inconsistent,
        format!("Malformed {} string '{}'", what, s),
    )
}

/// Split a bracketed tuple body on commas. `[0]` denotes the empty tuple
/// when `zero_is_empty` is set (input tuples); schedule output tuples keep
/// the literal `0` entry.
fn split_tuple(body: &str, zero_is_empty: bool) -> Vec<String> {
    let body = body.trim();
    if body.is_empty() || (zero_is_empty && body == "0") {
        return Vec::new();
    }
    body.split(',').map(|s| s.trim().to_string()).collect()
}

/// Extract the text between a leading delimiter pair, returning the inner
/// text and the remainder after the closing delimiter.
fn take_bracketed(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    let rest = s.strip_prefix('[')?;
    let end = rest.find(']')?;
    Some((&rest[..end], &rest[end + 1..]))
}

/// Parse a set string like `{[i,j]: c1 and c2}` or `{[0]}`.
pub fn parse_set(s: &str) -> Result<SetNotation, ExtractError> {
    let inner = s
        .trim()
        .strip_prefix('{')
        .and_then(|t| t.strip_suffix('}'))
        .ok_or_else(|| notation_error("set", s))?;
    let (tuple, rest) = take_bracketed(inner).ok_or_else(|| notation_error("set", s))?;
    let iterators = split_tuple(tuple, true);

    let rest = rest.trim();
    let constraints = if rest.is_empty() {
        Vec::new()
    } else {
        let body = rest
            .strip_prefix(':')
            .ok_or_else(|| notation_error("set", s))?;
        body.split(" and ").map(|c| c.trim().to_string()).collect()
    };

    Ok(SetNotation {
        iterators,
        constraints,
    })
}

/// Parse a relation string like `{[i,j]->[o1,o2]}` with optional guards.
pub fn parse_relation(s: &str) -> Result<RelationNotation, ExtractError> {
    let inner = s
        .trim()
        .strip_prefix('{')
        .and_then(|t| t.strip_suffix('}'))
        .ok_or_else(|| notation_error("relation", s))?;
    let (in_tuple, rest) = take_bracketed(inner).ok_or_else(|| notation_error("relation", s))?;
    let rest = rest
        .trim_start()
        .strip_prefix("->")
        .ok_or_else(|| notation_error("relation", s))?;
    let (out_tuple, rest) = take_bracketed(rest).ok_or_else(|| notation_error("relation", s))?;

    let rest = rest.trim();
    let guards = if rest.is_empty() {
        Vec::new()
    } else {
        let body = rest
            .strip_prefix(':')
            .ok_or_else(|| notation_error("relation", s))?;
        body.split(" && ").map(|g| g.trim().to_string()).collect()
    };

    Ok(RelationNotation {
        inputs: split_tuple(in_tuple, true),
        outputs: split_tuple(out_tuple, false),
        guards,
    })
}

/// Render a tuple, using `[0]` for the empty tuple.
pub fn render_tuple(entries: &[String]) -> String {
    if entries.is_empty() {
        "[0]".to_string()
    } else {
        format!("[{}]", entries.join(","))
    }
}

/// Render a set from its parts.
pub fn render_set(iterators: &[String], constraints: &[String]) -> String {
    if constraints.is_empty() {
        format!("{{{}}}", render_tuple(iterators))
    } else {
        format!(
            "{{{}: {}}}",
            render_tuple(iterators),
            constraints.join(" and ")
        )
    }
}

/// Render a relation from its parts.
pub fn render_relation(inputs: &[String], outputs: &[String], guards: &[String]) -> String {
    let head = format!("{{{}->{}", render_tuple(inputs), render_tuple(outputs));
    if guards.is_empty() {
        format!("{}}}", head)
    } else {
        format!("{}: {}}}", head, guards.join(" && "))
    }
}

/// Replace whole-identifier occurrences of `from` with `to` in `text`.
///
/// An occurrence only matches when not surrounded by identifier characters,
/// so renaming `x` leaves `x1` and `max` alone.
pub fn replace_identifier(text: &str, from: &str, to: &str) -> String {
    if from.is_empty() {
        return text.to_string();
    }
    let is_ident = |c: char| c.is_alphanumeric() || c == '_';
    let mut result = String::with_capacity(text.len());
    let mut i = 0;
    while let Some(pos) = text[i..].find(from) {
        let start = i + pos;
        let end = start + from.len();
        let before_ok = !text[..start].chars().next_back().map(is_ident).unwrap_or(false);
        let after_ok = !text[end..].chars().next().map(is_ident).unwrap_or(false);

        result.push_str(&text[i..start]);
        if before_ok && after_ok {
            result.push_str(to);
        } else {
            result.push_str(from);
        }
        i = end;
    }
    result.push_str(&text[i..]);
    result
}

/// Apply a list of identifier renames to a string.
pub fn apply_renames(text: &str, renames: &[(String, String)]) -> String {
    let mut result = text.to_string();
    for (from, to) in renames {
        result = replace_identifier(&result, from, to);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_set_with_constraints() {
        let set = parse_set("{[i,j]: 0<=i and i<a and 0<=j and j<b}").unwrap();
        assert_eq!(set.iterators, vec!["i", "j"]);
        assert_eq!(set.constraints.len(), 4);
        assert_eq!(set.constraints[1], "i<a");
    }

    #[test]
    fn test_parse_empty_set() {
        let set = parse_set("{[0]}").unwrap();
        assert!(set.iterators.is_empty());
        assert!(set.constraints.is_empty());
    }

    #[test]
    fn test_parse_relation_with_guards() {
        let rel = parse_relation("{[i,k]->[_rVar0]: _rVar0 = col(k)}").unwrap();
        assert_eq!(rel.inputs, vec!["i", "k"]);
        assert_eq!(rel.outputs, vec!["_rVar0"]);
        assert_eq!(rel.guards, vec!["_rVar0 = col(k)"]);
    }

    #[test]
    fn test_parse_schedule_relation() {
        let rel = parse_relation("{[i,j]->[2,i,0,j,0]}").unwrap();
        assert_eq!(rel.outputs, vec!["2", "i", "0", "j", "0"]);
        assert!(rel.guards.is_empty());
    }

    #[test]
    fn test_zero_input_tuple() {
        let rel = parse_relation("{[0]->[1,0]}").unwrap();
        assert!(rel.inputs.is_empty());
        assert_eq!(rel.outputs, vec!["1", "0"]);
    }

    #[test]
    fn test_render_round_trip() {
        let s = "{[i,j]: 0<=i and i<a}";
        let set = parse_set(s).unwrap();
        assert_eq!(render_set(&set.iterators, &set.constraints), s);

        let r = "{[i,j]->[2,i,0,j,0]}";
        let rel = parse_relation(r).unwrap();
        assert_eq!(render_relation(&rel.inputs, &rel.outputs, &rel.guards), r);

        assert_eq!(render_set(&[], &[]), "{[0]}");
    }

    #[test]
    fn test_replace_identifier_boundaries() {
        assert_eq!(replace_identifier("x + x1 + max(x)", "x", "y"), "y + x1 + max(y)");
        assert_eq!(replace_identifier("i<n", "n", "m"), "i<m");
        assert_eq!(replace_identifier("col(k)", "k", "kk"), "col(kk)");
    }

    #[test]
    fn test_apply_renames() {
        let renames = vec![
            ("x".to_string(), "x__0".to_string()),
            ("res".to_string(), "res__0".to_string()),
        ];
        assert_eq!(apply_renames("res = x * x;", &renames), "res__0 = x__0 * x__0;");
    }
}
