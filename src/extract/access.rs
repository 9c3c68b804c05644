//! Data-access collection and subscript normalization.
//!
//! A [`DataAccess`] records one read or write of a data space by a
//! statement, holding borrowed references to the index expressions of the
//! original AST. The collector normalizes multi-dimensional subscript chains
//! with an explicit stack, enforces the maximum array rank, and recurses
//! into indices that are themselves subscript accesses (such sub-accesses
//! are always reads).

use crate::frontend::ast::{Expr, ExprKind, NodeId, UnaryOp};
use crate::utils::errors::{ExtractError, ExtractErrorKind};
use crate::utils::location::SourceMap;

/// Maximum allowed array rank (a safe bound on subscript chain depth).
pub const MAX_ARRAY_RANK: usize = 50;

/// Base name for fresh existential variables used in uniformization.
pub const REPLACEMENT_VAR_BASE_NAME: &str = "_rVar";

/// Generator for fresh `_rVarK` names, monotone across a whole extraction.
#[derive(Debug, Clone, Default)]
pub struct FreshNames {
    next: u32,
}

impl FreshNames {
    /// Create a generator starting at `_rVar0`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce the next fresh replacement name.
    pub fn replacement(&mut self) -> String {
        let name = format!("{}{}", REPLACEMENT_VAR_BASE_NAME, self.next);
        self.next += 1;
        name
    }
}

/// One read or write of a data space within a statement.
///
/// Holds non-owning references into the AST; every string emitted from it
/// is an owned copy made before the AST is dropped.
#[derive(Debug, Clone)]
pub struct DataAccess<'a> {
    /// Data space accessed
    pub name: String,
    /// ID of the originating AST node
    pub source_id: NodeId,
    /// Whether this access is a read (false for a write)
    pub is_read: bool,
    /// Whether this is an array access (false for a scalar)
    pub is_array: bool,
    /// Index expressions, outermost-first in source order
    pub indexes: Vec<&'a Expr>,
}

/// Collects the reads and writes made by one statement.
#[derive(Debug, Default)]
pub struct AccessCollector<'a> {
    /// Accesses in processing order; sub-accesses precede the access that
    /// uses them
    pub accesses: Vec<DataAccess<'a>>,
}

impl<'a> AccessCollector<'a> {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a scalar read.
    pub fn add_scalar_read(&mut self, name: impl Into<String>, source_id: NodeId) {
        self.accesses.push(DataAccess {
            name: name.into(),
            source_id,
            is_read: true,
            is_array: false,
            indexes: Vec::new(),
        });
    }

    /// Record a scalar write.
    pub fn add_scalar_write(&mut self, name: impl Into<String>, source_id: NodeId) {
        self.accesses.push(DataAccess {
            name: name.into(),
            source_id,
            is_read: false,
            is_array: false,
            indexes: Vec::new(),
        });
    }

    /// Record a subscript expression as an array read.
    pub fn process_subscript_read(&mut self, expr: &'a Expr) -> Result<(), ExtractError> {
        self.build_data_access(expr, true)
    }

    /// Record a subscript expression as an array write; accesses used
    /// within its indices are reads.
    pub fn process_subscript_write(&mut self, expr: &'a Expr) -> Result<(), ExtractError> {
        self.build_data_access(expr, false)
    }

    /// Normalize a subscript chain and record the resulting access, after
    /// recursively recording any sub-accesses appearing in its indices.
    fn build_data_access(&mut self, full: &'a Expr, is_read: bool) -> Result<(), ExtractError> {
        let (base, indexes) = normalize_subscript(full)?;

        for index in &indexes {
            if let ExprKind::Subscript { .. } = index.ignore_parens().kind {
                self.build_data_access(index.ignore_parens(), true)?;
            }
        }

        let name = base.as_variable().ok_or_else(|| {
            ExtractError::new(
                ExtractErrorKind::UnsupportedConstruct,
                "Subscripted expression must be a named array",
            )
            .with_span(base.span)
        })?;

        self.accesses.push(DataAccess {
            name: name.to_string(),
            source_id: full.id,
            is_read,
            is_array: true,
            indexes,
        });
        Ok(())
    }
}

/// Walk a subscript chain down through its bases, returning the base
/// expression and the indices outermost-first in source order. Fails when
/// the chain is deeper than [`MAX_ARRAY_RANK`].
pub fn normalize_subscript(full: &Expr) -> Result<(&Expr, Vec<&Expr>), ExtractError> {
    let mut stack = Vec::new();
    let mut current = full.ignore_parens();
    loop {
        match &current.kind {
            ExprKind::Subscript { base, index } => {
                if stack.len() >= MAX_ARRAY_RANK {
                    return Err(ExtractError::new(
                        ExtractErrorKind::CapacityExceeded,
                        format!("Array rank exceeds maximum of {}", MAX_ARRAY_RANK),
                    )
                    .with_span(full.span));
                }
                stack.push(index.as_ref());
                current = base.ignore_parens();
            }
            _ => break,
        }
    }
    stack.reverse();
    Ok((current, stack))
}

/// Check whether an expression is a negative numeric literal like `-1`.
fn is_negated_literal(expr: &Expr) -> bool {
    match &expr.ignore_parens().kind {
        ExprKind::Unary {
            op: UnaryOp::Neg,
            operand,
        } => matches!(
            operand.ignore_parens().kind,
            ExprKind::IntLiteral(_) | ExprKind::FloatLiteral(_)
        ),
        _ => false,
    }
}

/// Collect the data-space names read by a loop or branch condition,
/// excluding iterators. Subscript accesses contribute their base array and
/// whatever their indices read.
pub fn condition_data_spaces(
    expr: &Expr,
    is_iterator: &dyn Fn(&str) -> bool,
    out: &mut Vec<String>,
) -> Result<(), ExtractError> {
    let e = expr.ignore_parens();
    match &e.kind {
        ExprKind::Binary { left, right, .. } => {
            condition_data_spaces(left, is_iterator, out)?;
            condition_data_spaces(right, is_iterator, out)?;
        }
        ExprKind::Subscript { .. } => {
            let (base, indexes) = normalize_subscript(e)?;
            if let Some(name) = base.as_variable() {
                if !out.iter().any(|n| n == name) {
                    out.push(name.to_string());
                }
            }
            for index in indexes {
                condition_data_spaces(index, is_iterator, out)?;
            }
        }
        ExprKind::Variable(name) => {
            if !is_iterator(name) && !out.iter().any(|n| n == name) {
                out.push(name.clone());
            }
        }
        ExprKind::IntLiteral(_) | ExprKind::FloatLiteral(_) => {}
        _ if is_negated_literal(e) => {}
        _ => {
            return Err(ExtractError::new(
                ExtractErrorKind::UnsupportedConstruct,
                "Failed to process components of complex expression",
            )
            .with_span(e.span));
        }
    }
    Ok(())
}

/// Render an expression's source text with every subscript access rewritten
/// to uninterpreted-function form: `A[i][j]` becomes `A(i,j)`, recursively.
///
/// Text with no subscripts comes back unchanged, so the rewrite is
/// idempotent on already array-safe text.
pub fn expr_with_safe_arrays(expr: &Expr, source: &SourceMap) -> Result<String, ExtractError> {
    let mut components: Vec<&Expr> = Vec::new();
    collect_subscript_components(expr, &mut components);

    // Enclosing accesses first so a nested access's text is rewritten as
    // part of its parent before being seen on its own.
    components.sort_by_key(|c| std::cmp::Reverse(c.span.end_offset - c.span.start_offset));

    let mut text = source.span_text(&expr.span).to_string();
    for component in components {
        let original = source.span_text(&component.span);
        let safe = subscript_to_safe_string(component, source)?;
        text = text.replace(original, &safe);
    }
    Ok(text)
}

/// Gather every subscript expression appearing in `expr`, looking through
/// binary operators, parentheses, unary operators, and call arguments.
fn collect_subscript_components<'a>(expr: &'a Expr, out: &mut Vec<&'a Expr>) {
    let e = expr.ignore_parens();
    match &e.kind {
        ExprKind::Subscript { .. } => out.push(e),
        ExprKind::Binary { left, right, .. } => {
            collect_subscript_components(left, out);
            collect_subscript_components(right, out);
        }
        ExprKind::Unary { operand, .. } => collect_subscript_components(operand, out),
        ExprKind::Call { args, .. } => {
            for arg in args {
                collect_subscript_components(arg, out);
            }
        }
        _ => {}
    }
}

/// Render one subscript access in array-safe form, like `A(i,j)`.
fn subscript_to_safe_string(expr: &Expr, source: &SourceMap) -> Result<String, ExtractError> {
    let (base, indexes) = normalize_subscript(expr)?;
    let name = base.as_variable().ok_or_else(|| {
        ExtractError::new(
            ExtractErrorKind::UnsupportedConstruct,
            "Subscripted expression must be a named array",
        )
        .with_span(base.span)
    })?;

    let mut rendered = Vec::with_capacity(indexes.len());
    for index in indexes {
        rendered.push(expr_with_safe_arrays(index.ignore_parens(), source)?);
    }
    Ok(format!("{}({})", name, rendered.join(",")))
}
