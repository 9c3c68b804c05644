//! The extractor driver: walks a function body and builds its Computation.
//!
//! The driver dispatches on statement kind, moves the position context
//! through scope transitions, runs the access collector and statement
//! handler on leaves, and inlines user function calls by splicing their
//! previously built computations into the caller. Sub-computations are
//! memoized per extractor, keyed by callee name.

use crate::extract::access::{AccessCollector, FreshNames};
use crate::extract::context::PositionContext;
use crate::frontend::ast::{Block, Expr, ExprKind, Function, Program, Stmt, StmtKind, UnaryOp};
use crate::ir::{Computation, Stmt as IrStmt};
use crate::utils::errors::{ExtractError, ExtractErrorKind};
use crate::utils::location::SourceMap;
use log::debug;
use std::collections::HashMap;

/// Standard library math functions that are never inlined; their data-space
/// arguments are recorded as reads and the call value is treated as opaque.
pub const RESERVED_FUNC_NAMES: &[&str] = &["sqrt", "ceil", "floor", "pow", "abs", "log", "log10"];

/// Check whether a callee name is a reserved math function.
pub fn is_reserved_func(name: &str) -> bool {
    RESERVED_FUNC_NAMES.contains(&name)
}

/// Per-function build state: the computation being assembled, the position
/// context, and bookkeeping local to one function body.
///
/// A fresh frame is created for every function build, so recursing into a
/// callee can never clobber the caller's context.
struct FunctionFrame {
    computation: Computation,
    context: PositionContext,
    found_return: bool,
    /// Source replacement rules for the statement being processed, used to
    /// substitute inlined calls with their return values
    replacements: Vec<(String, String)>,
}

impl FunctionFrame {
    fn new(name: &str) -> Self {
        Self {
            computation: Computation::new(name),
            context: PositionContext::new(),
            found_return: false,
            replacements: Vec::new(),
        }
    }

    fn apply_replacements(&self, text: &str) -> String {
        let mut result = text.to_string();
        for (from, to) in &self.replacements {
            result = result.replace(from, to);
        }
        result
    }
}

/// Builds polyhedral computations from functions of a parsed program.
///
/// Owns the state shared across one extraction run: the sub-computation
/// memo and the fresh-name counter for uniformization.
pub struct Extractor<'a> {
    program: &'a Program,
    source: &'a SourceMap,
    sub_computations: HashMap<String, Computation>,
    fresh_names: FreshNames,
    /// Names of functions currently being built, to refuse recursive calls
    building: Vec<String>,
}

impl<'a> Extractor<'a> {
    /// Create an extractor over a parsed program and its source.
    pub fn new(program: &'a Program, source: &'a SourceMap) -> Self {
        Self {
            program,
            source,
            sub_computations: HashMap::new(),
            fresh_names: FreshNames::new(),
            building: Vec::new(),
        }
    }

    /// Build the computation for the named entry-point function.
    pub fn extract(&mut self, entry_point: &str) -> Result<Computation, ExtractError> {
        let func = self.program.find_function(entry_point).ok_or_else(|| {
            ExtractError::new(
                ExtractErrorKind::Resolution,
                format!(
                    "Could not locate definition of the target function '{}'",
                    entry_point
                ),
            )
        })?;
        self.build_function(func)
    }

    /// The computations built for inlined callees, keyed by name.
    pub fn sub_computations(&self) -> &HashMap<String, Computation> {
        &self.sub_computations
    }

    /// Build a computation from one function definition.
    fn build_function(&mut self, func: &'a Function) -> Result<Computation, ExtractError> {
        debug!("building computation for function '{}'", func.name);
        if self.building.iter().any(|n| n == &func.name) {
            return Err(ExtractError::new(
                ExtractErrorKind::Resolution,
                format!("Recursive call cycle through function '{}'", func.name),
            )
            .with_span(func.span));
        }
        self.building.push(func.name.clone());

        let mut frame = FunctionFrame::new(&func.name);
        for param in &func.params {
            frame
                .computation
                .add_parameter(&param.name, param.type_string(self.source));
        }

        let result = self.process_block(&func.body, &mut frame);
        self.building.pop();
        result?;

        // scope entries and exits are paired LIFO; anything left over here
        // is a bug
        if !frame.context.iterators().is_empty()
            || !frame.context.constraints().is_empty()
            || !frame.context.invariants().is_empty()
            || frame.context.nest_level() != 0
        {
            return Err(ExtractError::new(
                ExtractErrorKind::Inconsistent,
                format!(
                    "Position context not fully unwound after function '{}'",
                    func.name
                ),
            )
            .with_span(func.span));
        }

        if !frame.computation.is_complete() {
            return Err(ExtractError::new(
                ExtractErrorKind::Inconsistent,
                format!(
                    "Computation is in an inconsistent/incomplete state after building \
                     from function '{}'. This should not be possible and most likely \
                     indicates a bug.",
                    func.name
                ),
            )
            .with_span(func.span));
        }
        Ok(frame.computation)
    }

    fn process_block(&mut self, block: &'a Block, frame: &mut FunctionFrame) -> Result<(), ExtractError> {
        for stmt in &block.statements {
            self.process_single_stmt(stmt, frame)?;
        }
        Ok(())
    }

    /// Process one statement, recursing through control structures.
    fn process_single_stmt(
        &mut self,
        stmt: &'a Stmt,
        frame: &mut FunctionFrame,
    ) -> Result<(), ExtractError> {
        if frame.found_return {
            return Err(self.stmt_error(
                ExtractErrorKind::UnsupportedConstruct,
                "Found a statement following a return statement. Returns are only \
                 allowed at the end of functions.",
                stmt,
            ));
        }
        frame.replacements.clear();

        match &stmt.kind {
            StmtKind::While { .. }
            | StmtKind::DoWhile { .. }
            | StmtKind::Break
            | StmtKind::Continue
            | StmtKind::Block { .. } => Err(self.stmt_error(
                ExtractErrorKind::UnsupportedConstruct,
                format!("Unsupported statement kind '{}'", stmt.kind.kind_name()),
                stmt,
            )),

            StmtKind::For {
                init,
                cond,
                inc,
                body,
            } => {
                frame.context.schedule.advance_schedule();
                frame
                    .context
                    .enter_for(init, cond, inc, self.source)
                    .map_err(|e| self.locate(e, stmt))?;
                self.process_block(body, frame)?;
                frame.context.exit_for();
                Ok(())
            }

            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                frame
                    .context
                    .enter_if(condition, false, self.source)
                    .map_err(|e| self.locate(e, stmt))?;
                self.process_block(then_branch, frame)?;
                frame.context.exit_if();
                // an else clause is the same if statement with the
                // condition inverted
                if let Some(else_branch) = else_branch {
                    frame
                        .context
                        .enter_if(condition, true, self.source)
                        .map_err(|e| self.locate(e, stmt))?;
                    self.process_block(else_branch, frame)?;
                    frame.context.exit_if();
                }
                Ok(())
            }

            StmtKind::Return { value } => {
                frame.context.schedule.advance_schedule();
                self.process_return(value.as_ref(), stmt, frame)
            }

            // a user call alone in a statement splices the callee in place
            // of emitting a leaf
            StmtKind::Expr { expr }
                if matches!(&expr.ignore_parens().kind,
                            ExprKind::Call { callee, .. } if !is_reserved_func(callee)) =>
            {
                frame.context.schedule.advance_schedule();
                self.inline_call(expr.ignore_parens(), frame)
                    .map_err(|e| self.locate(e, stmt))?;
                Ok(())
            }

            _ => {
                frame.context.schedule.advance_schedule();
                self.add_stmt(stmt, frame)
            }
        }
    }

    /// Statement handler: capture accesses, enforce loop invariance, and
    /// emit the finished IR statement.
    fn add_stmt(&mut self, stmt: &'a Stmt, frame: &mut FunctionFrame) -> Result<(), ExtractError> {
        let mut collector = AccessCollector::new();

        match &stmt.kind {
            StmtKind::Declaration { ty, name, init } => {
                if frame.computation.is_data_space(name) {
                    return Err(self.stmt_error(
                        ExtractErrorKind::SemanticViolation,
                        format!(
                            "Declaration of variable '{}' shadows an existing data space",
                            name
                        ),
                        stmt,
                    ));
                }
                frame.computation.add_data_space(name, ty.to_string());
                if let Some(init) = init {
                    self.process_complex_expr(init, true, &mut collector, frame)?;
                    collector.add_scalar_write(name, stmt.id);
                }
            }

            StmtKind::Expr { expr } => {
                let expr = expr.ignore_parens();
                match &expr.kind {
                    ExprKind::Assign { op, target, value } => {
                        let target = target.ignore_parens();
                        match &target.kind {
                            ExprKind::Subscript { .. } => {
                                collector
                                    .process_subscript_write(target)
                                    .map_err(|e| self.locate(e, stmt))?;
                            }
                            ExprKind::Variable(name) => {
                                if !frame.context.is_iterator(name) {
                                    collector.add_scalar_write(name, target.id);
                                }
                            }
                            _ => {
                                return Err(self.stmt_error(
                                    ExtractErrorKind::UnsupportedConstruct,
                                    "Assignment target must be a variable or array element",
                                    stmt,
                                ));
                            }
                        }
                        // a compound assignment also reads its target
                        if op.is_compound() {
                            self.process_complex_expr(target, true, &mut collector, frame)?;
                        }
                        self.process_complex_expr(value, true, &mut collector, frame)?;
                    }
                    _ => {
                        self.process_complex_expr(expr, true, &mut collector, frame)?;
                    }
                }
            }

            StmtKind::Empty => {}

            // control flow and returns never reach the leaf handler
            _ => {
                return Err(self.stmt_error(
                    ExtractErrorKind::Inconsistent,
                    format!(
                        "Statement kind '{}' reached the leaf handler",
                        stmt.kind.kind_name()
                    ),
                    stmt,
                ));
            }
        }

        // enforce loop invariance against every write
        for access in collector.accesses.iter().filter(|a| !a.is_read) {
            for group in frame.context.invariants() {
                if group.iter().any(|name| *name == access.name) {
                    return Err(self.stmt_error(
                        ExtractErrorKind::SemanticViolation,
                        format!(
                            "Code may not modify loop-invariant data space '{}'",
                            access.name
                        ),
                        stmt,
                    ));
                }
            }
        }

        let mut ir_stmt = IrStmt::new();

        let mut text = frame
            .apply_replacements(self.source.span_text(&stmt.span))
            .trim()
            .to_string();
        if !text.ends_with(';') {
            text.push(';');
        }
        ir_stmt.set_source_code(text);
        ir_stmt.set_iteration_space(frame.context.iter_space_string());
        ir_stmt.set_execution_schedule(frame.context.exec_schedule_string());

        for access in &collector.accesses {
            let relation = frame
                .context
                .data_access_string(access, &mut self.fresh_names, self.source)
                .map_err(|e| self.locate(e, stmt))?;
            if access.is_read {
                ir_stmt.add_read(access.name.clone(), relation);
            } else {
                ir_stmt.add_write(access.name.clone(), relation);
            }
        }

        frame.computation.add_stmt(ir_stmt);
        Ok(())
    }

    /// Walk a compound expression, recording reads and dispatching calls to
    /// the inliner. Rejects shapes outside the supported grammar.
    fn process_complex_expr(
        &mut self,
        expr: &'a Expr,
        process_reads: bool,
        collector: &mut AccessCollector<'a>,
        frame: &mut FunctionFrame,
    ) -> Result<(), ExtractError> {
        let e = expr.ignore_parens();
        match &e.kind {
            ExprKind::Binary { left, right, .. } => {
                self.process_complex_expr(left, process_reads, collector, frame)?;
                self.process_complex_expr(right, process_reads, collector, frame)?;
            }
            ExprKind::Subscript { .. } => {
                if process_reads {
                    collector.process_subscript_read(e)?;
                }
            }
            ExprKind::Variable(name) => {
                if process_reads && !frame.context.is_iterator(name) {
                    collector.add_scalar_read(name, e.id);
                }
            }
            ExprKind::IntLiteral(_) | ExprKind::FloatLiteral(_) => {}
            // tolerate negated literals like -1; other unary shapes are out
            // of the supported grammar
            ExprKind::Unary {
                op: UnaryOp::Neg,
                operand,
            } if matches!(
                operand.ignore_parens().kind,
                ExprKind::IntLiteral(_) | ExprKind::FloatLiteral(_)
            ) => {}
            ExprKind::Call { callee, args } => {
                if is_reserved_func(callee) {
                    // opaque math call: arguments are reads, the value is
                    // not modeled
                    for arg in args {
                        self.process_complex_expr(arg, process_reads, collector, frame)?;
                    }
                } else {
                    let surrogate = self.inline_call(e, frame)?;
                    if process_reads {
                        match surrogate {
                            Some(name) => collector.add_scalar_read(name, e.id),
                            None => {
                                return Err(ExtractError::new(
                                    ExtractErrorKind::Resolution,
                                    format!(
                                        "Call to '{}' used in an expression but the function \
                                         returns no value",
                                        callee
                                    ),
                                )
                                .with_span(e.span));
                            }
                        }
                    }
                }
            }
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

    /// Inline a user function call at the current position and return the
    /// surrogate name for its return value, if any.
    fn inline_call(
        &mut self,
        call: &'a Expr,
        frame: &mut FunctionFrame,
    ) -> Result<Option<String>, ExtractError> {
        let ExprKind::Call { callee, args } = &call.kind else {
            return Err(ExtractError::new(
                ExtractErrorKind::Inconsistent,
                "Inliner invoked on a non-call expression",
            )
            .with_span(call.span));
        };

        let program = self.program;
        let definition = program.find_function(callee).ok_or_else(|| {
            ExtractError::new(
                ExtractErrorKind::Resolution,
                format!("Cannot find definition of called function '{}'", callee),
            )
            .with_span(call.span)
        })?;

        if !self.sub_computations.contains_key(callee) {
            let sub = self.build_function(definition)?;
            self.sub_computations.insert(callee.clone(), sub);
        }

        let mut arg_strings = Vec::with_capacity(args.len());
        for arg in args {
            let arg = arg.ignore_parens();
            if !arg.is_var_or_literal() {
                return Err(ExtractError::new(
                    ExtractErrorKind::UnsupportedConstruct,
                    "Argument passed to function is too complex (must be a data space \
                     or a numeric literal)",
                )
                .with_span(arg.span));
            }
            arg_strings.push(self.source.span_text(&arg.span).to_string());
        }

        debug!("inlining call to '{}'", callee);
        let iter_space = frame.context.iter_space_string();
        let exec_schedule = frame.context.exec_schedule_string();
        let sub = &self.sub_computations[callee.as_str()];
        let result =
            frame
                .computation
                .append_computation(sub, &iter_space, &exec_schedule, &arg_strings)?;

        // stand past the spliced statements, then reserve the next slot
        frame.context.schedule.skip_to_position(result.tuple_position)?;
        frame.context.schedule.advance_schedule();

        if result.return_values.len() > 1 {
            return Err(ExtractError::new(
                ExtractErrorKind::Resolution,
                format!(
                    "Call to '{}' produced multiple return values",
                    callee
                ),
            )
            .with_span(call.span));
        }

        match result.return_values.into_iter().next() {
            Some(value) => {
                let call_text = self.source.span_text(&call.span).to_string();
                frame.replacements.push((call_text, value.clone()));
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Handle a return statement: only allowed at nest level zero as the
    /// last statement, returning a bare variable or numeric literal.
    fn process_return(
        &mut self,
        value: Option<&'a Expr>,
        stmt: &'a Stmt,
        frame: &mut FunctionFrame,
    ) -> Result<(), ExtractError> {
        frame.found_return = true;
        if frame.context.nest_level() != 0 {
            return Err(self.stmt_error(
                ExtractErrorKind::UnsupportedConstruct,
                "Return within nested structures is disallowed.",
                stmt,
            ));
        }
        if let Some(value) = value {
            let value = value.ignore_parens();
            if !value.is_var_or_literal() {
                return Err(self.stmt_error(
                    ExtractErrorKind::UnsupportedConstruct,
                    "Return value is too complex, must be data space or number literal.",
                    stmt,
                ));
            }
            frame
                .computation
                .add_return_value(self.source.span_text(&value.span));
        }
        Ok(())
    }

    fn stmt_error(
        &self,
        kind: ExtractErrorKind,
        message: impl Into<String>,
        stmt: &Stmt,
    ) -> ExtractError {
        ExtractError::new(kind, message)
            .with_span(stmt.span)
            .with_snippet(self.source.span_text(&stmt.span))
    }

    /// Attach a statement's location to an error that lacks one.
    fn locate(&self, error: ExtractError, stmt: &Stmt) -> ExtractError {
        let mut error = error;
        if error.span.is_none() {
            error.span = Some(stmt.span);
        }
        if error.snippet.is_none() {
            error.snippet = Some(self.source.span_text(&stmt.span).to_string());
        }
        error
    }
}
