//! The polyhedral IR: computations and statements.
//!
//! A [`Computation`] is the extracted model of one function: its parameters,
//! data spaces, return values, and ordered statements, each statement
//! carrying its source text, iteration space, execution schedule, and access
//! relations as symbolic strings.
//!
//! [`Computation::append_computation`] is the splice operation used for
//! inlining: it copies a callee computation into the host at a given
//! iteration-space/schedule position, renaming the callee's data spaces and
//! binding its parameters to the caller's arguments.

use crate::ir::notation::{
    apply_renames, parse_relation, parse_set, render_relation, render_set, render_tuple,
};
use crate::utils::errors::{ExtractError, ExtractErrorKind};
use log::debug;
use std::fmt;

/// A single extracted statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stmt {
    source_code: String,
    iteration_space: String,
    execution_schedule: String,
    reads: Vec<(String, String)>,
    writes: Vec<(String, String)>,
}

impl Stmt {
    /// Create an empty statement.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the statement's source text.
    pub fn set_source_code(&mut self, source: impl Into<String>) {
        self.source_code = source.into();
    }

    /// Set the iteration-space set string.
    pub fn set_iteration_space(&mut self, space: impl Into<String>) {
        self.iteration_space = space.into();
    }

    /// Set the execution-schedule relation string.
    pub fn set_execution_schedule(&mut self, schedule: impl Into<String>) {
        self.execution_schedule = schedule.into();
    }

    /// Record a read of `name` through the given access relation.
    pub fn add_read(&mut self, name: impl Into<String>, relation: impl Into<String>) {
        self.reads.push((name.into(), relation.into()));
    }

    /// Record a write of `name` through the given access relation.
    pub fn add_write(&mut self, name: impl Into<String>, relation: impl Into<String>) {
        self.writes.push((name.into(), relation.into()));
    }

    /// The statement's source text.
    pub fn source_code(&self) -> &str {
        &self.source_code
    }

    /// The iteration-space set string.
    pub fn iteration_space(&self) -> &str {
        &self.iteration_space
    }

    /// The execution-schedule relation string.
    pub fn execution_schedule(&self) -> &str {
        &self.execution_schedule
    }

    /// Reads as (data space, relation) pairs.
    pub fn reads(&self) -> &[(String, String)] {
        &self.reads
    }

    /// Writes as (data space, relation) pairs.
    pub fn writes(&self) -> &[(String, String)] {
        &self.writes
    }

    /// Check that all required components have been set.
    pub fn is_complete(&self) -> bool {
        !self.source_code.is_empty()
            && !self.iteration_space.is_empty()
            && !self.execution_schedule.is_empty()
    }
}

/// Result of splicing a callee computation into a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendResult {
    /// Top-level schedule slot of the last spliced statement
    pub tuple_position: usize,
    /// Return values of the splice, renamed into the host's namespace
    pub return_values: Vec<String>,
}

/// The extracted polyhedral model of one function.
#[derive(Debug, Clone, Default)]
pub struct Computation {
    name: String,
    /// Parameters in declaration order, as (name, type)
    parameters: Vec<(String, String)>,
    /// All data spaces (parameters included), in registration order
    data_spaces: Vec<(String, String)>,
    statements: Vec<Stmt>,
    return_values: Vec<String>,
    /// Counter feeding the `__K` suffix used when splicing callees
    rename_counter: usize,
}

impl Computation {
    /// Create an empty computation for the named function.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// The function name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a parameter. Parameters are also data spaces.
    pub fn add_parameter(&mut self, name: impl Into<String>, ty: impl Into<String>) {
        let name = name.into();
        let ty = ty.into();
        self.parameters.push((name.clone(), ty.clone()));
        self.add_data_space(name, ty);
    }

    /// Register a data space with its type.
    pub fn add_data_space(&mut self, name: impl Into<String>, ty: impl Into<String>) {
        let name = name.into();
        if !self.is_data_space(&name) {
            self.data_spaces.push((name, ty.into()));
        }
    }

    /// Check whether `name` is a known data space (or parameter).
    pub fn is_data_space(&self, name: &str) -> bool {
        self.data_spaces.iter().any(|(n, _)| n == name)
    }

    /// Append a statement.
    pub fn add_stmt(&mut self, stmt: Stmt) {
        self.statements.push(stmt);
    }

    /// Record a return value.
    pub fn add_return_value(&mut self, value: impl Into<String>) {
        self.return_values.push(value.into());
    }

    /// Parameters as (name, type) pairs.
    pub fn parameters(&self) -> &[(String, String)] {
        &self.parameters
    }

    /// All registered data spaces as (name, type) pairs.
    pub fn data_spaces(&self) -> &[(String, String)] {
        &self.data_spaces
    }

    /// The statements in emission order.
    pub fn statements(&self) -> &[Stmt] {
        &self.statements
    }

    /// The recorded return values.
    pub fn return_values(&self) -> &[String] {
        &self.return_values
    }

    /// Reset the rename counter used by [`Self::append_computation`].
    pub fn reset_rename_counters(&mut self) {
        self.rename_counter = 0;
    }

    /// Check overall consistency: every statement is complete and every
    /// access references a registered data space.
    pub fn is_complete(&self) -> bool {
        if self.name.is_empty() {
            return false;
        }
        for stmt in &self.statements {
            if !stmt.is_complete() {
                return false;
            }
            for (name, _) in stmt.reads().iter().chain(stmt.writes()) {
                if !self.is_data_space(name) {
                    return false;
                }
            }
        }
        true
    }

    /// Splice `callee` into this computation at the position described by
    /// the surrounding iteration space and execution schedule, binding the
    /// callee's parameters to `args` (bare data-space names or literals).
    ///
    /// Every data space of the callee is renamed with a fresh `__K` suffix;
    /// callee iterators that collide with surrounding iterators are renamed
    /// the same way. Returns the top-level schedule slot of the last spliced
    /// statement and the callee's return values under their new names.
    pub fn append_computation(
        &mut self,
        callee: &Computation,
        surrounding_iter_space: &str,
        surrounding_exec_schedule: &str,
        args: &[String],
    ) -> Result<AppendResult, ExtractError> {
        let surrounding = parse_set(surrounding_iter_space)?;
        let schedule = parse_relation(surrounding_exec_schedule)?;

        let base: usize = schedule
            .outputs
            .last()
            .and_then(|slot| slot.parse().ok())
            .ok_or_else(|| {
                ExtractError::new(
                    ExtractErrorKind::Inconsistent,
                    format!(
                        "Cannot append computation at schedule position '{}': \
                         tuple must end in a statement slot",
                        surrounding_exec_schedule
                    ),
                )
            })?;

        if args.len() != callee.parameters.len() {
            return Err(ExtractError::new(
                ExtractErrorKind::Resolution,
                format!(
                    "Call to '{}' passes {} arguments but the function takes {}",
                    callee.name,
                    args.len(),
                    callee.parameters.len()
                ),
            ));
        }

        let suffix = self.rename_counter;
        self.rename_counter += 1;
        debug!(
            "appending computation '{}' into '{}' at slot {} (suffix __{})",
            callee.name, self.name, base, suffix
        );

        // Rename every callee data space into the host's namespace.
        let renames: Vec<(String, String)> = callee
            .data_spaces
            .iter()
            .map(|(name, _)| (name.clone(), format!("{}__{}", name, suffix)))
            .collect();

        for (name, ty) in &callee.data_spaces {
            self.add_data_space(format!("{}__{}", name, suffix), ty.clone());
        }

        // Bind parameters to arguments with declaration statements at the
        // splice point, one top-level slot each.
        for (i, ((param, ty), arg)) in callee.parameters.iter().zip(args).enumerate() {
            let bound = format!("{}__{}", param, suffix);
            let mut stmt = Stmt::new();
            stmt.set_source_code(format!("{} {} = {};", ty, bound, arg));
            stmt.set_iteration_space(render_set(&surrounding.iterators, &surrounding.constraints));

            let mut out = schedule.outputs.clone();
            if let Some(last) = out.last_mut() {
                *last = (base + i).to_string();
            }
            stmt.set_execution_schedule(render_relation(&surrounding.iterators, &out, &[]));

            let scalar_rel = format!("{{{}->[0]}}", render_tuple(&surrounding.iterators));
            if self.is_data_space(arg) {
                stmt.add_read(arg.clone(), scalar_rel.clone());
            }
            stmt.add_write(bound, scalar_rel);
            self.statements.push(stmt);
        }

        // Splice the callee's statements, rebased onto the surrounding
        // iteration space and schedule prefix.
        let callee_base = base + args.len();
        let mut last_slot = if args.is_empty() { base } else { callee_base - 1 };

        for callee_stmt in &callee.statements {
            let mut renames = renames.clone();
            let space = parse_set(callee_stmt.iteration_space())?;

            // Callee iterators that collide with surrounding iterators get
            // the same fresh suffix.
            for iter in &space.iterators {
                if surrounding.iterators.contains(iter) {
                    renames.push((iter.clone(), format!("{}__{}", iter, suffix)));
                }
            }

            let callee_iters: Vec<String> = space
                .iterators
                .iter()
                .map(|it| apply_renames(it, &renames))
                .collect();
            let mut combined_iters = surrounding.iterators.clone();
            combined_iters.extend(callee_iters);

            let mut combined_constraints = surrounding.constraints.clone();
            combined_constraints.extend(
                space
                    .constraints
                    .iter()
                    .map(|c| apply_renames(c, &renames)),
            );

            let callee_sched = parse_relation(callee_stmt.execution_schedule())?;
            let top: usize = callee_sched
                .outputs
                .first()
                .and_then(|slot| slot.parse().ok())
                .ok_or_else(|| {
                    ExtractError::new(
                        ExtractErrorKind::Inconsistent,
                        format!(
                            "Spliced statement schedule '{}' does not start with a slot",
                            callee_stmt.execution_schedule()
                        ),
                    )
                })?;
            last_slot = callee_base + top;

            let mut out: Vec<String> = schedule.outputs[..schedule.outputs.len() - 1].to_vec();
            out.push(last_slot.to_string());
            out.extend(
                callee_sched.outputs[1..]
                    .iter()
                    .map(|e| apply_renames(e, &renames)),
            );

            let mut stmt = Stmt::new();
            stmt.set_source_code(apply_renames(callee_stmt.source_code(), &renames));
            stmt.set_iteration_space(render_set(&combined_iters, &combined_constraints));
            stmt.set_execution_schedule(render_relation(&combined_iters, &out, &[]));

            for (name, relation) in callee_stmt.reads() {
                let rel = parse_relation(relation)?;
                let outputs: Vec<String> =
                    rel.outputs.iter().map(|e| apply_renames(e, &renames)).collect();
                let guards: Vec<String> =
                    rel.guards.iter().map(|g| apply_renames(g, &renames)).collect();
                stmt.add_read(
                    apply_renames(name, &renames),
                    render_relation(&combined_iters, &outputs, &guards),
                );
            }
            for (name, relation) in callee_stmt.writes() {
                let rel = parse_relation(relation)?;
                let outputs: Vec<String> =
                    rel.outputs.iter().map(|e| apply_renames(e, &renames)).collect();
                let guards: Vec<String> =
                    rel.guards.iter().map(|g| apply_renames(g, &renames)).collect();
                stmt.add_write(
                    apply_renames(name, &renames),
                    render_relation(&combined_iters, &outputs, &guards),
                );
            }

            self.statements.push(stmt);
        }

        let return_values = callee
            .return_values
            .iter()
            .map(|v| apply_renames(v, &renames))
            .collect();

        Ok(AppendResult {
            tuple_position: last_slot,
            return_values,
        })
    }

    /// Render the IR in a human-readable form (used by `--frontend-only`).
    pub fn print_info(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Computation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Computation: {}", self.name)?;

        let params: Vec<String> = self
            .parameters
            .iter()
            .map(|(n, t)| format!("{} {}", t, n))
            .collect();
        writeln!(f, "Parameters: {}", params.join(", "))?;

        let locals: Vec<String> = self
            .data_spaces
            .iter()
            .filter(|(n, _)| !self.parameters.iter().any(|(p, _)| p == n))
            .map(|(n, t)| format!("{} {}", t, n))
            .collect();
        writeln!(f, "Data spaces: {}", locals.join(", "))?;
        writeln!(f, "Return values: {}", self.return_values.join(", "))?;

        for (i, stmt) in self.statements.iter().enumerate() {
            writeln!(f, "S{}: {}", i, stmt.source_code())?;
            writeln!(f, "    Iteration space: {}", stmt.iteration_space())?;
            writeln!(f, "    Execution schedule: {}", stmt.execution_schedule())?;
            for (name, rel) in stmt.reads() {
                writeln!(f, "    Read: {}: {}", name, rel)?;
            }
            for (name, rel) in stmt.writes() {
                writeln!(f, "    Write: {}: {}", name, rel)?;
            }
        }
        Ok(())
    }
}
