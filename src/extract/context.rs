//! Position context: the information associated with a statement position.
//!
//! The context tracks the active iterators, the stack of symbolic
//! constraints, the execution schedule, the nesting depth, and the stack of
//! loop-invariant data-space groups. Scope entry and exit are strictly
//! paired; after a function has been fully processed every stack is empty
//! again.

use crate::extract::access::{
    condition_data_spaces, expr_with_safe_arrays, DataAccess, FreshNames,
};
use crate::extract::schedule::{ExecSchedule, ScheduleVal};
use crate::frontend::ast::{AssignOp, BinaryOp, Expr, ExprKind, ForInit};
use crate::utils::errors::{ExtractError, ExtractErrorKind};
use crate::utils::location::SourceMap;

/// A symbolic constraint `lhs op rhs` on the iteration space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    /// Left operand, array-safe
    pub lhs: String,
    /// Comparison operator (never `!=`)
    pub op: BinaryOp,
    /// Right operand, array-safe
    pub rhs: String,
}

impl Constraint {
    fn render(&self) -> String {
        format!("{}{}{}", self.lhs, comparison_str(self.op), self.rhs)
    }
}

/// Render a comparison operator in constraint notation (`==` becomes `=`).
fn comparison_str(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Ge => ">=",
        BinaryOp::Eq => "=",
        _ => "?",
    }
}

/// Context information associated with a statement position: iteration
/// domain, execution schedule, and enclosing-loop invariants.
#[derive(Debug, Clone, Default)]
pub struct PositionContext {
    /// Variables being iterated over
    iterators: Vec<String>,
    /// Constraints on iteration, in push order
    constraints: Vec<Constraint>,
    /// Execution schedule
    pub schedule: ExecSchedule,
    /// How deeply nested within compound structures this position is
    nest_level: u32,
    /// Data spaces held invariant, grouped by the loop they belong to
    invariants: Vec<Vec<String>>,
}

impl PositionContext {
    /// Create a context at the top of a function body.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether the given name is an iterator in this context.
    pub fn is_iterator(&self, name: &str) -> bool {
        self.iterators.iter().any(|it| it == name)
    }

    /// The active iterator names, outermost first.
    pub fn iterators(&self) -> &[String] {
        &self.iterators
    }

    /// The active constraints, in push order.
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// The active invariant groups, one per enclosing loop.
    pub fn invariants(&self) -> &[Vec<String>] {
        &self.invariants
    }

    /// Current nesting depth.
    pub fn nest_level(&self) -> u32 {
        self.nest_level
    }

    /// Add context information from a for loop: the iterator, its bound
    /// constraints, and the invariant group read by the loop condition.
    /// The loop header is validated; all violations are fatal.
    pub fn enter_for(
        &mut self,
        init: &ForInit,
        cond: &Expr,
        inc: &Expr,
        source: &SourceMap,
    ) -> Result<(), ExtractError> {
        // initializer: `i = L` or `T i = L`, registering `L <= i`
        let (iterator, lower) = match init {
            ForInit::Assign { target, value } => {
                let name = target.as_variable().ok_or_else(|| {
                    malformed_for("initializer", "must initialize iterator")
                })?;
                (name.to_string(), value)
            }
            ForInit::Decl { name, init, .. } => (name.clone(), init),
        };

        // condition: a binary comparison recorded as written
        let (cond_op, cond_lhs, cond_rhs) = match &cond.ignore_parens().kind {
            ExprKind::Binary { op, left, right } if op.is_comparison() => (*op, left, right),
            _ => return Err(malformed_for("condition", "must be a binary comparison")),
        };

        // increment: must raise the iterator by exactly 1
        if !is_unit_increment(inc, &iterator) {
            return Err(malformed_for("increment", "must increase iterator by 1"));
        }

        self.push_constraint(
            expr_with_safe_arrays(lower.ignore_parens(), source)?,
            BinaryOp::Le,
            iterator.clone(),
        )?;
        self.push_constraint(
            expr_with_safe_arrays(cond_lhs, source)?,
            cond_op,
            expr_with_safe_arrays(cond_rhs, source)?,
        )?;

        // data spaces read by the condition are invariant inside the loop
        let mut group = Vec::new();
        let is_iterator = |name: &str| self.is_iterator(name) || name == iterator;
        condition_data_spaces(cond_lhs, &is_iterator, &mut group)?;
        condition_data_spaces(cond_rhs, &is_iterator, &mut group)?;
        self.invariants.push(group);

        self.iterators.push(iterator.clone());
        self.schedule.push_value(ScheduleVal::Var(iterator));
        self.nest_level += 1;
        Ok(())
    }

    /// Remove context information from a for loop.
    pub fn exit_for(&mut self) {
        self.constraints.pop();
        self.constraints.pop();
        self.iterators.pop();
        self.schedule.pop_value();
        self.schedule.pop_value();
        self.invariants.pop();
        self.nest_level -= 1;
    }

    /// Add context information from an if statement. With `invert` set the
    /// condition operator is negated, for use in else clauses.
    pub fn enter_if(
        &mut self,
        cond: &Expr,
        invert: bool,
        source: &SourceMap,
    ) -> Result<(), ExtractError> {
        let (op, lhs, rhs) = match &cond.ignore_parens().kind {
            ExprKind::Binary { op, left, right } if op.is_comparison() => (*op, left, right),
            _ => {
                return Err(ExtractError::new(
                    ExtractErrorKind::UnsupportedConstruct,
                    "If statement condition must be a binary comparison",
                )
                .with_span(cond.span));
            }
        };
        let op = if invert {
            op.negate_comparison().ok_or_else(|| {
                ExtractError::new(
                    ExtractErrorKind::Inconsistent,
                    "Cannot negate a non-comparison condition",
                )
            })?
        } else {
            op
        };

        self.push_constraint(
            expr_with_safe_arrays(lhs, source)?,
            op,
            expr_with_safe_arrays(rhs, source)?,
        )?;
        self.nest_level += 1;
        Ok(())
    }

    /// Remove context information from an if statement.
    pub fn exit_if(&mut self) {
        self.constraints.pop();
        self.nest_level -= 1;
    }

    fn push_constraint(
        &mut self,
        lhs: String,
        op: BinaryOp,
        rhs: String,
    ) -> Result<(), ExtractError> {
        if op == BinaryOp::Ne {
            return Err(ExtractError::new(
                ExtractErrorKind::SemanticViolation,
                format!(
                    "Not-equal conditions are unsupported by SPF: in condition {} != {}",
                    lhs, rhs
                ),
            ));
        }
        self.constraints.push(Constraint { lhs, op, rhs });
        Ok(())
    }

    /// Get the tuple of iterators as a string, like `[i,j]` (`[0]` when
    /// empty).
    fn iters_tuple_string(&self) -> String {
        if self.iterators.is_empty() {
            "[0]".to_string()
        } else {
            format!("[{}]", self.iterators.join(","))
        }
    }

    /// Get a string representing the iteration space, like
    /// `{[i,j]: 0<=i and i<a and 0<=j and j<b}`.
    pub fn iter_space_string(&self) -> String {
        if self.constraints.is_empty() {
            format!("{{{}}}", self.iters_tuple_string())
        } else {
            let rendered: Vec<String> = self.constraints.iter().map(|c| c.render()).collect();
            format!(
                "{{{}: {}}}",
                self.iters_tuple_string(),
                rendered.join(" and ")
            )
        }
    }

    /// Get a string representing the execution schedule, like
    /// `{[i,j]->[2,i,0,j,0]}`.
    pub fn exec_schedule_string(&self) -> String {
        let entries = if self.schedule.is_empty() {
            "0".to_string()
        } else {
            self.schedule
                .entries()
                .iter()
                .map(ScheduleVal::to_string)
                .collect::<Vec<_>>()
                .join(",")
        };
        format!("{{{}->[{}]}}", self.iters_tuple_string(), entries)
    }

    /// Get a string representing the given data access, like
    /// `{[i,k]->[_rVar0]: _rVar0 = col(k)}`.
    ///
    /// Indices that are not a bare variable or numeric literal are
    /// uniformized through a fresh existential bound by an equality guard.
    pub fn data_access_string(
        &self,
        access: &DataAccess<'_>,
        fresh: &mut FreshNames,
        source: &SourceMap,
    ) -> Result<String, ExtractError> {
        let mut entries = Vec::with_capacity(access.indexes.len());
        let mut guards: Vec<String> = Vec::new();

        for index in &access.indexes {
            let index = index.ignore_parens();
            match &index.kind {
                ExprKind::Variable(name) => entries.push(name.clone()),
                ExprKind::IntLiteral(_) | ExprKind::FloatLiteral(_) => {
                    entries.push(source.span_text(&index.span).to_string());
                }
                _ => {
                    let replacement = fresh.replacement();
                    guards.push(format!(
                        "{} = {}",
                        replacement,
                        expr_with_safe_arrays(index, source)?
                    ));
                    entries.push(replacement);
                }
            }
        }

        let out = if entries.is_empty() {
            "0".to_string()
        } else {
            entries.join(",")
        };
        let mut result = format!("{{{}->[{}]", self.iters_tuple_string(), out);
        if !guards.is_empty() {
            result.push_str(": ");
            result.push_str(&guards.join(" && "));
        }
        result.push('}');
        Ok(result)
    }
}

/// Build the diagnostic for an invalid for-loop part.
fn malformed_for(part: &str, reason: &str) -> ExtractError {
    ExtractError::new(
        ExtractErrorKind::MalformedFor,
        format!("Invalid {} in for loop -- {}", part, reason),
    )
}

/// Check whether an increment expression raises `iterator` by exactly one.
/// Accepted forms: `++i`, `i++`, `i += 1`, `i -= -1`, `i = i + 1`,
/// `i = 1 + i`.
fn is_unit_increment(inc: &Expr, iterator: &str) -> bool {
    match &inc.ignore_parens().kind {
        ExprKind::Unary { op, operand } if op.is_increment() => {
            operand.as_variable() == Some(iterator)
        }
        ExprKind::Assign { op, target, value } => {
            if target.as_variable() != Some(iterator) {
                return false;
            }
            match op {
                AssignOp::AddAssign => value.eval_int() == Some(1),
                AssignOp::SubAssign => value.eval_int() == Some(-1),
                AssignOp::Assign => match &value.ignore_parens().kind {
                    ExprKind::Binary {
                        op: BinaryOp::Add,
                        left,
                        right,
                    } => {
                        (left.as_variable() == Some(iterator) && right.eval_int() == Some(1))
                            || (right.as_variable() == Some(iterator)
                                && left.eval_int() == Some(1))
                    }
                    _ => false,
                },
                _ => false,
            }
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::ast::StmtKind;
    use crate::frontend::{Lexer, Parser};

    fn parse_for(source: &str) -> (ForInit, Expr, Expr, SourceMap) {
        let full = format!("void f(int n, int m, int a[n], int col[n]) {{ {} }}", source);
        let lexer = Lexer::new(&full);
        let program = Parser::new(lexer).unwrap().parse_program().unwrap();
        let stmt = &program.functions[0].body.statements[0];
        match &stmt.kind {
            StmtKind::For {
                init, cond, inc, ..
            } => (
                init.clone(),
                cond.clone(),
                inc.clone(),
                SourceMap::new(full.clone()),
            ),
            _ => panic!("expected for statement"),
        }
    }

    fn enter(source: &str) -> Result<PositionContext, ExtractError> {
        let (init, cond, inc, map) = parse_for(source);
        let mut context = PositionContext::new();
        context.schedule.advance_schedule();
        context.enter_for(&init, &cond, &inc, &map)?;
        Ok(context)
    }

    #[test]
    fn test_enter_for_renders_strings() {
        let context = enter("for (int i = 0; i < n; i++) { ; }").unwrap();
        assert_eq!(context.iter_space_string(), "{[i]: 0<=i and i<n}");
        assert_eq!(context.exec_schedule_string(), "{[i]->[0,i]}");
        assert!(context.is_iterator("i"));
        assert_eq!(context.invariants(), &[vec!["n".to_string()]]);
    }

    #[test]
    fn test_exit_for_restores_everything() {
        let mut context = enter("for (int i = 0; i < n; i++) { ; }").unwrap();
        context.exit_for();
        assert!(context.iterators().is_empty());
        assert!(context.constraints().is_empty());
        assert!(context.invariants().is_empty());
        assert_eq!(context.nest_level(), 0);
        assert_eq!(context.schedule.dimension(), 0);
    }

    #[test]
    fn test_accepted_increments() {
        for inc in ["i++", "++i", "i += 1", "i -= -1", "i = i + 1", "i = 1 + i"] {
            let source = format!("for (int i = 0; i < n; {}) {{ ; }}", inc);
            assert!(enter(&source).is_ok(), "rejected increment {}", inc);
        }
    }

    #[test]
    fn test_rejected_increments() {
        for inc in ["i += 2", "i--", "i = i - 1", "i = 2 + i", "j++"] {
            let source = format!("for (int i = 0; i < n; {}) {{ ; }}", inc);
            let err = enter(&source).unwrap_err();
            assert_eq!(err.kind, ExtractErrorKind::MalformedFor, "increment {}", inc);
        }
    }

    #[test]
    fn test_not_equal_condition_rejected() {
        let err = enter("for (int i = 0; i != n; i++) { ; }").unwrap_err();
        assert_eq!(err.kind, ExtractErrorKind::SemanticViolation);
    }

    #[test]
    fn test_empty_context_rendering_stable() {
        let context = PositionContext::new();
        assert_eq!(context.iter_space_string(), "{[0]}");
        assert_eq!(context.iter_space_string(), "{[0]}");
        assert_eq!(context.exec_schedule_string(), "{[0]->[0]}");
    }

    #[test]
    fn test_if_constraint_and_inversion() {
        let cond_src = "l[i][j] > 0";
        let lexer = Lexer::new(cond_src);
        let cond = Parser::new(lexer).unwrap().parse_expression().unwrap();
        let cond_map = SourceMap::new(cond_src.to_string());

        let mut context = PositionContext::new();
        context.enter_if(&cond, false, &cond_map).unwrap();
        assert_eq!(context.iter_space_string(), "{[0]: l(i,j)>0}");
        context.exit_if();

        context.enter_if(&cond, true, &cond_map).unwrap();
        assert_eq!(context.iter_space_string(), "{[0]: l(i,j)<=0}");
        context.exit_if();
        assert_eq!(context.nest_level(), 0);
    }

    #[test]
    fn test_inverted_equality_rejected() {
        let cond_src = "i == 0";
        let lexer = Lexer::new(cond_src);
        let cond = Parser::new(lexer).unwrap().parse_expression().unwrap();
        let cond_map = SourceMap::new(cond_src.to_string());

        let mut context = PositionContext::new();
        assert!(context.enter_if(&cond, false, &cond_map).is_ok());
        context.exit_if();
        let err = context.enter_if(&cond, true, &cond_map).unwrap_err();
        assert_eq!(err.kind, ExtractErrorKind::SemanticViolation);
    }
}
