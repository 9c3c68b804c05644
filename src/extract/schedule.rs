//! The execution-schedule tuple.
//!
//! The schedule is the classical lexicographic tuple interleaving loop
//! iterators with integer sibling counters. The extractor advances the
//! trailing counter as it passes each sibling statement, pushes an iterator
//! entry when entering a loop, and skips the counter forward past statements
//! spliced in by the inliner.

use crate::utils::errors::{ExtractError, ExtractErrorKind};
use std::fmt;

/// An entry of an execution schedule: a loop iterator or a sibling counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleVal {
    /// A loop-iterator name
    Var(String),
    /// A sibling statement counter
    Num(usize),
}

impl fmt::Display for ScheduleVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleVal::Var(name) => write!(f, "{}", name),
            ScheduleVal::Num(n) => write!(f, "{}", n),
        }
    }
}

/// An execution schedule tuple, plus a few utilities for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecSchedule {
    tuple: Vec<ScheduleVal>,
}

impl ExecSchedule {
    /// Create an empty schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value to the end of the schedule tuple.
    pub fn push_value(&mut self, value: ScheduleVal) {
        self.tuple.push(value);
    }

    /// Remove and return the value at the end of the schedule tuple.
    pub fn pop_value(&mut self) -> Option<ScheduleVal> {
        self.tuple.pop()
    }

    /// Move the statement number forward: push a fresh counter after an
    /// iterator (or at the start), otherwise increment the trailing counter.
    pub fn advance_schedule(&mut self) {
        match self.tuple.last_mut() {
            Some(ScheduleVal::Num(n)) => *n += 1,
            _ => self.tuple.push(ScheduleVal::Num(0)),
        }
    }

    /// Set the trailing sibling counter to `position`, used to continue
    /// numbering past statements a splice emitted.
    pub fn skip_to_position(&mut self, position: usize) -> Result<(), ExtractError> {
        match self.tuple.last_mut() {
            Some(ScheduleVal::Num(n)) => {
                *n = position;
                Ok(())
            }
            _ => Err(ExtractError::new(
                ExtractErrorKind::Inconsistent,
                "Cannot skip schedule position: tuple does not end in a statement slot",
            )),
        }
    }

    /// Get the dimension of the schedule tuple.
    pub fn dimension(&self) -> usize {
        self.tuple.len()
    }

    /// Check if the schedule is empty.
    pub fn is_empty(&self) -> bool {
        self.tuple.is_empty()
    }

    /// The schedule entries in order.
    pub fn entries(&self) -> &[ScheduleVal] {
        &self.tuple
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_from_empty() {
        let mut schedule = ExecSchedule::new();
        schedule.advance_schedule();
        assert_eq!(schedule.entries(), &[ScheduleVal::Num(0)]);
        schedule.advance_schedule();
        assert_eq!(schedule.entries(), &[ScheduleVal::Num(1)]);
    }

    #[test]
    fn test_advance_after_iterator() {
        let mut schedule = ExecSchedule::new();
        schedule.advance_schedule();
        schedule.push_value(ScheduleVal::Var("i".into()));
        schedule.advance_schedule();
        assert_eq!(
            schedule.entries(),
            &[
                ScheduleVal::Num(0),
                ScheduleVal::Var("i".into()),
                ScheduleVal::Num(0),
            ]
        );
    }

    #[test]
    fn test_skip_to_position() {
        let mut schedule = ExecSchedule::new();
        schedule.advance_schedule();
        schedule.skip_to_position(7).unwrap();
        assert_eq!(schedule.entries(), &[ScheduleVal::Num(7)]);
        schedule.advance_schedule();
        assert_eq!(schedule.entries(), &[ScheduleVal::Num(8)]);
    }

    #[test]
    fn test_skip_requires_counter_on_top() {
        let mut schedule = ExecSchedule::new();
        schedule.push_value(ScheduleVal::Var("i".into()));
        assert!(schedule.skip_to_position(1).is_err());
    }

    #[test]
    fn test_push_pop_pairing() {
        let mut schedule = ExecSchedule::new();
        schedule.advance_schedule();
        schedule.push_value(ScheduleVal::Var("i".into()));
        schedule.advance_schedule();
        schedule.pop_value();
        schedule.pop_value();
        assert_eq!(schedule.entries(), &[ScheduleVal::Num(0)]);
    }
}
