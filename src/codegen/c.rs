//! C code generation from the extracted IR.
//!
//! Reconstructs a plain loop nest from the emitted statements: schedule
//! tuples are grouped lexicographically into sibling slots and loops, loop
//! bounds are recovered from the canonical lower/upper constraints, and any
//! leftover constraints become `if` guards around the statement.

use crate::ir::notation::{parse_relation, parse_set};
use crate::ir::Computation;
use crate::utils::errors::{ExtractError, ExtractErrorKind};
use anyhow::Result;
use std::collections::HashSet;

/// One entry of a parsed schedule tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    Slot(usize),
    Iter(String),
}

/// A statement prepared for code generation.
#[derive(Debug, Clone)]
struct GenStmt {
    source: String,
    entries: Vec<Entry>,
    constraints: Vec<String>,
}

/// C code generator for extracted computations.
pub struct CCodeGen {
    indent_unit: &'static str,
}

impl Default for CCodeGen {
    fn default() -> Self {
        Self::new()
    }
}

impl CCodeGen {
    /// Create a generator with default formatting.
    pub fn new() -> Self {
        Self {
            indent_unit: "    ",
        }
    }

    /// Generate C code for a computation.
    pub fn generate(&self, comp: &Computation) -> Result<String> {
        let mut stmts = Vec::with_capacity(comp.statements().len());
        for stmt in comp.statements() {
            let schedule = parse_relation(stmt.execution_schedule())?;
            let entries = schedule
                .outputs
                .iter()
                .map(|e| match e.parse::<usize>() {
                    Ok(n) => Entry::Slot(n),
                    Err(_) => Entry::Iter(e.clone()),
                })
                .collect();
            let space = parse_set(stmt.iteration_space())?;
            stmts.push(GenStmt {
                source: stmt.source_code().to_string(),
                entries,
                constraints: space.constraints,
            });
        }
        stmts.sort_by_key(|s| {
            s.entries
                .iter()
                .map(|e| match e {
                    Entry::Slot(n) => *n,
                    Entry::Iter(_) => 0,
                })
                .collect::<Vec<_>>()
        });

        let mut out = String::new();

        // signature
        let ret = self.return_type(comp);
        out.push_str(&format!("{} {}(", ret, comp.name()));
        for (i, (name, ty)) in comp.parameters().iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&param_decl(name, ty));
        }
        out.push_str(") {\n");

        // iterators introduced by for-declaration initializers have no
        // declaration statement of their own
        for iter in self.undeclared_iterators(comp, &stmts) {
            out.push_str(self.indent_unit);
            out.push_str(&format!("int {};\n", iter));
        }

        self.emit_group(&stmts, 0, &HashSet::new(), 1, comp, &mut out)?;

        for value in comp.return_values() {
            out.push_str(self.indent_unit);
            out.push_str(&format!("return {};\n", value));
        }
        out.push_str("}\n");
        Ok(out)
    }

    fn return_type(&self, comp: &Computation) -> String {
        match comp.return_values().first() {
            None => "void".to_string(),
            Some(value) => comp
                .data_spaces()
                .iter()
                .find(|(n, _)| n == value)
                .map(|(_, t)| t.clone())
                .unwrap_or_else(|| "int".to_string()),
        }
    }

    fn undeclared_iterators(&self, comp: &Computation, stmts: &[GenStmt]) -> Vec<String> {
        let mut iterators = Vec::new();
        for stmt in stmts {
            for entry in &stmt.entries {
                if let Entry::Iter(name) = entry {
                    if !comp.is_data_space(name) && !iterators.contains(name) {
                        iterators.push(name.clone());
                    }
                }
            }
        }
        iterators
    }

    /// Emit all statements sharing a schedule prefix of length `depth`.
    fn emit_group(
        &self,
        stmts: &[GenStmt],
        depth: usize,
        consumed: &HashSet<String>,
        level: usize,
        comp: &Computation,
        out: &mut String,
    ) -> Result<()> {
        // gather the sibling slots present at this depth, in order
        let mut slots: Vec<usize> = Vec::new();
        for stmt in stmts {
            if let Some(Entry::Slot(n)) = stmt.entries.get(depth) {
                if !slots.contains(n) {
                    slots.push(*n);
                }
            }
        }
        slots.sort_unstable();

        for slot in slots {
            let group: Vec<&GenStmt> = stmts
                .iter()
                .filter(|s| s.entries.get(depth) == Some(&Entry::Slot(slot)))
                .collect();

            if group[0].entries.len() == depth + 1 {
                // leaf statement(s) at this slot
                for stmt in group {
                    self.emit_leaf(stmt, consumed, level, comp, out);
                }
                continue;
            }

            // deeper statements share a loop over the next entry
            let iterator = match group[0].entries.get(depth + 1) {
                Some(Entry::Iter(name)) => name.clone(),
                _ => {
                    return Err(ExtractError::new(
                        ExtractErrorKind::Inconsistent,
                        "Schedule tuple does not alternate slots and iterators",
                    )
                    .into());
                }
            };

            let (lower_raw, lower) = self
                .find_lower_bound(&group[0].constraints, &iterator)
                .ok_or_else(|| {
                    ExtractError::new(
                        ExtractErrorKind::Inconsistent,
                        format!("No lower bound found for iterator '{}'", iterator),
                    )
                })?;
            let (upper_raw, upper) = self
                .find_upper_bound(&group[0].constraints, &iterator, &lower_raw)
                .ok_or_else(|| {
                    ExtractError::new(
                        ExtractErrorKind::Inconsistent,
                        format!("No upper bound found for iterator '{}'", iterator),
                    )
                })?;

            let mut consumed = consumed.clone();
            consumed.insert(lower_raw);
            consumed.insert(upper_raw);

            out.push_str(&self.indent_unit.repeat(level));
            out.push_str(&format!(
                "for ({} = {}; {}; {}++) {{\n",
                iterator,
                bracketed_arrays(&lower, comp),
                bracketed_arrays(&upper, comp),
                iterator
            ));
            let owned: Vec<GenStmt> = group.into_iter().cloned().collect();
            self.emit_group(&owned, depth + 2, &consumed, level + 1, comp, out)?;
            out.push_str(&self.indent_unit.repeat(level));
            out.push_str("}\n");
        }
        Ok(())
    }

    fn emit_leaf(
        &self,
        stmt: &GenStmt,
        consumed: &HashSet<String>,
        level: usize,
        comp: &Computation,
        out: &mut String,
    ) {
        let guards: Vec<String> = stmt
            .constraints
            .iter()
            .filter(|c| !consumed.contains(*c))
            .filter_map(|c| parse_constraint(c))
            .map(|(lhs, op, rhs)| {
                let op = if op == "=" { "==" } else { op };
                bracketed_arrays(&format!("{} {} {}", lhs, op, rhs), comp)
            })
            .collect();

        out.push_str(&self.indent_unit.repeat(level));
        if guards.is_empty() {
            out.push_str(&stmt.source);
        } else {
            out.push_str(&format!("if ({}) {}", guards.join(" && "), stmt.source));
        }
        out.push('\n');
    }

    /// The canonical lower bound has the shape `L<=v`; returns the raw
    /// constraint and the rendered initializer expression `L`.
    fn find_lower_bound(&self, constraints: &[String], iterator: &str) -> Option<(String, String)> {
        for c in constraints {
            if let Some((lhs, op, rhs)) = parse_constraint(c) {
                if op == "<=" && rhs == iterator {
                    return Some((c.clone(), lhs.to_string()));
                }
            }
        }
        None
    }

    /// The upper bound is the recorded loop condition: the first remaining
    /// constraint mentioning the iterator on its left side.
    fn find_upper_bound(
        &self,
        constraints: &[String],
        iterator: &str,
        lower_raw: &str,
    ) -> Option<(String, String)> {
        for c in constraints {
            if c == lower_raw {
                continue;
            }
            if let Some((lhs, op, rhs)) = parse_constraint(c) {
                if lhs == iterator {
                    let op = if op == "=" { "==" } else { op };
                    return Some((c.clone(), format!("{} {} {}", lhs, op, rhs)));
                }
            }
        }
        None
    }
}

/// Split a constraint into (lhs, op, rhs).
fn parse_constraint(c: &str) -> Option<(&str, &str, &str)> {
    for op in ["<=", ">=", "<", ">", "="] {
        if let Some(pos) = c.find(op) {
            // make sure we did not split `<=` at its `<`
            if op == "<" && c[pos..].starts_with("<=") {
                continue;
            }
            if op == ">" && c[pos..].starts_with(">=") {
                continue;
            }
            let (lhs, rest) = c.split_at(pos);
            return Some((lhs.trim(), op, rest[op.len()..].trim()));
        }
    }
    None
}

/// Rewrite array-safe uninterpreted-function text back to C subscripts:
/// `l(i,j)` becomes `l[i][j]` for every known data space `l`.
fn bracketed_arrays(text: &str, comp: &Computation) -> String {
    let is_ident = |c: char| c.is_alphanumeric() || c == '_';
    let mut result = String::with_capacity(text.len());
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        if is_ident(chars[i]) && (i == 0 || !is_ident(chars[i - 1])) {
            // scan an identifier
            let start = i;
            while i < chars.len() && is_ident(chars[i]) {
                i += 1;
            }
            let name: String = chars[start..i].iter().collect();
            if i < chars.len() && chars[i] == '(' && comp.is_data_space(&name) {
                // balanced-paren argument list
                let mut depth = 0;
                let open = i;
                let mut close = i;
                for (j, &c) in chars.iter().enumerate().skip(i) {
                    if c == '(' {
                        depth += 1;
                    } else if c == ')' {
                        depth -= 1;
                        if depth == 0 {
                            close = j;
                            break;
                        }
                    }
                }
                let inner: String = chars[open + 1..close].iter().collect();
                let args = split_top_level_commas(&inner);
                result.push_str(&name);
                for arg in args {
                    result.push('[');
                    result.push_str(&bracketed_arrays(arg.trim(), comp));
                    result.push(']');
                }
                i = close + 1;
                continue;
            }
            result.push_str(&name);
        } else {
            result.push(chars[i]);
            i += 1;
        }
    }
    result
}

/// Split on commas not nested inside parentheses.
fn split_top_level_commas(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Render one parameter declaration, turning `int[a][b]` back into
/// C array syntax.
fn param_decl(name: &str, ty: &str) -> String {
    match ty.find('[') {
        Some(pos) => format!("{} {}{}", &ty[..pos], name, &ty[pos..]),
        None => format!("{} {}", ty, name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend;
    use crate::extract::Extractor;
    use crate::utils::location::SourceMap;

    fn roundtrip(source: &str, entry: &str) -> String {
        let program = frontend::parse(source).unwrap();
        let map = SourceMap::new(source.to_string());
        let mut extractor = Extractor::new(&program, &map);
        let comp = extractor.extract(entry).unwrap();
        CCodeGen::new().generate(&comp).unwrap()
    }

    #[test]
    fn test_loop_nest_reconstruction() {
        let code = roundtrip(
            "void f(int n, int a[n], int b[n]) {
                int i;
                for (i = 0; i < n; i++) {
                    a[i] = b[i];
                }
            }",
            "f",
        );
        assert!(code.contains("void f(int n, int a[n], int b[n]) {"));
        assert!(code.contains("for (i = 0; i < n; i++) {"), "missing loop in:\n{}", code);
        assert!(code.contains("a[i] = b[i];"));
    }

    #[test]
    fn test_guard_emission() {
        let code = roundtrip(
            "void f(int n, int l[n][n], double x[n]) {
                int i;
                for (i = 0; i < n; i++) {
                    if (l[i][0] > 0) x[i] = 0;
                }
            }",
            "f",
        );
        assert!(code.contains("if (l[i][0] > 0)"), "missing guard in:\n{}", code);
    }

    #[test]
    fn test_for_decl_iterator_redeclared() {
        let code = roundtrip(
            "void f(int n, int a[n]) {
                for (int i = 0; i < n; i++) {
                    a[i] = 0;
                }
            }",
            "f",
        );
        assert!(code.contains("int i;"), "missing iterator decl in:\n{}", code);
    }

    #[test]
    fn test_return_value() {
        let code = roundtrip(
            "int f(int n) {
                int r = n;
                return r;
            }",
            "f",
        );
        assert!(code.contains("int r = n;"));
        assert!(code.contains("return r;"));
        assert!(code.starts_with("int f(int n)"));
    }

    #[test]
    fn test_parse_constraint_ops() {
        assert_eq!(parse_constraint("0<=i"), Some(("0", "<=", "i")));
        assert_eq!(parse_constraint("i<n"), Some(("i", "<", "n")));
        assert_eq!(parse_constraint("l(i,j)>0"), Some(("l(i,j)", ">", "0")));
    }

    #[test]
    fn test_bracketed_arrays() {
        let mut comp = Computation::new("f");
        comp.add_parameter("l", "int[n][n]");
        comp.add_parameter("col", "int[n]");
        assert_eq!(bracketed_arrays("l(i,j) > 0", &comp), "l[i][j] > 0");
        assert_eq!(bracketed_arrays("x(col(k))", &comp), "x(col[k])");
        assert_eq!(bracketed_arrays("max(i,j)", &comp), "max(i,j)");
    }
}
