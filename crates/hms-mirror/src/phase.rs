//! Per-table lifecycle.
//!
//! Transitions only move forward. SUCCESS, ERROR, FATAL and SKIPPED are terminal.

use crate::catalog::DataStrategy;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Lifecycle state of one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseState {
    #[default]
    Init,
    CalculatingSql,
    CalculatedSql,
    ApplyingSql,
    SqlExecuted,
    Success,
    Error,
    Fatal,
    Skipped,
}

impl PhaseState {
    pub fn is_terminal(&self) -> bool {
        is_terminal(*self)
    }

    fn successors(&self) -> &'static [PhaseState] {
        use PhaseState::*;
        match self {
            Init => &[CalculatingSql, Skipped, Error, Fatal],
            CalculatingSql => &[CalculatedSql, Skipped, Error, Fatal],
            CalculatedSql => &[ApplyingSql, Success, Skipped, Error, Fatal],
            // Statements already in flight finish; no SKIPPED from here.
            ApplyingSql => &[SqlExecuted, Error, Fatal],
            SqlExecuted => &[Success, Error, Fatal],
            Success | Error | Fatal | Skipped => &[],
        }
    }
}

impl fmt::Display for PhaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PhaseState::Init => "INIT",
            PhaseState::CalculatingSql => "CALCULATING_SQL",
            PhaseState::CalculatedSql => "CALCULATED_SQL",
            PhaseState::ApplyingSql => "APPLYING_SQL",
            PhaseState::SqlExecuted => "SQL_EXECUTED",
            PhaseState::Success => "SUCCESS",
            PhaseState::Error => "ERROR",
            PhaseState::Fatal => "FATAL",
            PhaseState::Skipped => "SKIPPED",
        };
        f.write_str(s)
    }
}

/// Requested transition is not permitted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid phase transition {from} -> {to} for {strategy}")]
pub struct InvalidTransitionError {
    pub from: PhaseState,
    pub to: PhaseState,
    pub strategy: DataStrategy,
}

pub fn is_terminal(state: PhaseState) -> bool {
    matches!(
        state,
        PhaseState::Success | PhaseState::Error | PhaseState::Fatal | PhaseState::Skipped
    )
}

/// Whether a strategy ever applies statements to a cluster.
pub fn executes_statements(strategy: DataStrategy) -> bool {
    strategy != DataStrategy::Dump
}

/// Validate and perform one transition.
pub fn advance(
    current: PhaseState,
    target: PhaseState,
    strategy: DataStrategy,
) -> Result<PhaseState, InvalidTransitionError> {
    let permitted = current.successors().contains(&target)
        && (target != PhaseState::ApplyingSql || executes_statements(strategy));

    if permitted {
        Ok(target)
    } else {
        Err(InvalidTransitionError {
            from: current,
            to: target,
            strategy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PhaseState::*;

    #[test]
    fn test_happy_path_with_execution() {
        let s = DataStrategy::SchemaOnly;
        let mut state = Init;
        for next in [CalculatingSql, CalculatedSql, ApplyingSql, SqlExecuted, Success] {
            state = advance(state, next, s).unwrap();
        }
        assert_eq!(state, Success);
        assert!(state.is_terminal());
    }

    #[test]
    fn test_dry_run_path() {
        let s = DataStrategy::Sql;
        let state = advance(Init, CalculatingSql, s).unwrap();
        let state = advance(state, CalculatedSql, s).unwrap();
        assert_eq!(advance(state, Success, s).unwrap(), Success);
    }

    #[test]
    fn test_cannot_execute_before_calculation() {
        let err = advance(Init, ApplyingSql, DataStrategy::Sql).unwrap_err();
        assert_eq!(err.from, Init);
        assert_eq!(err.to, ApplyingSql);
        assert!(advance(CalculatingSql, SqlExecuted, DataStrategy::Sql).is_err());
    }

    #[test]
    fn test_terminal_states_have_no_successors() {
        for terminal in [Success, Error, Fatal, Skipped] {
            assert!(is_terminal(terminal));
            for next in [Init, CalculatingSql, CalculatedSql, Success, Error, Skipped] {
                assert!(advance(terminal, next, DataStrategy::SchemaOnly).is_err());
            }
        }
    }

    #[test]
    fn test_dump_never_applies_sql() {
        assert!(advance(CalculatedSql, ApplyingSql, DataStrategy::Dump).is_err());
        assert_eq!(
            advance(CalculatedSql, Success, DataStrategy::Dump).unwrap(),
            Success
        );
    }

    #[test]
    fn test_no_skip_once_applying() {
        assert!(advance(ApplyingSql, Skipped, DataStrategy::Sql).is_err());
        assert!(advance(CalculatedSql, Skipped, DataStrategy::Sql).is_ok());
    }

    #[test]
    fn test_serializes_screaming_case() {
        let yaml = serde_yaml::to_string(&CalculatedSql).unwrap();
        assert_eq!(yaml.trim(), "CALCULATED_SQL");
    }
}
