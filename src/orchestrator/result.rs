//! Partial-success result of a learning journey.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::GenerationError;
use crate::types::{ContainerContent, ContainerType, ContentSpec, CostLedger, Narrative};

/// One (subject, container type) cell of a journey.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Cell {
    pub subject: String,
    pub container: ContainerType,
}

impl Cell {
    pub fn new(subject: impl Into<String>, container: ContainerType) -> Self {
        Self {
            subject: subject.into(),
            container,
        }
    }

    pub(crate) fn of(spec: &ContentSpec) -> Self {
        Self::new(spec.subject.clone(), spec.container_type)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.subject, self.container)
    }
}

/// Where in a journey a failure happened.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "at", rename_all = "lowercase")]
pub enum Coordinate {
    /// The shared narrative. Fatal for the journey.
    Narrative,
    /// One container cell. Affects only that cell.
    Cell(Cell),
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coordinate::Narrative => f.write_str("narrative"),
            Coordinate::Cell(cell) => cell.fmt(f),
        }
    }
}

/// A generation error annotated with where it happened.
#[derive(Debug, Clone)]
pub struct GenerationFailure {
    pub coordinate: Coordinate,
    pub error: GenerationError,
}

impl fmt::Display for GenerationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.coordinate, self.error)
    }
}

/// Outcome of [`Orchestrator::generate_journey`](super::Orchestrator::generate_journey).
///
/// Always carries a ledger. When the narrative fails, `narrative` is `None`,
/// `contents` is empty and `failures` holds exactly the narrative failure.
/// Otherwise every requested cell appears either in `contents` or in
/// `failures`, never both.
#[derive(Debug, Clone)]
pub struct JourneyResult {
    pub narrative: Option<Narrative>,
    pub contents: HashMap<Cell, ContainerContent>,
    pub failures: Vec<GenerationFailure>,
    pub ledger: CostLedger,
}

impl JourneyResult {
    pub(crate) fn narrative_failed(error: GenerationError, ledger: CostLedger) -> Self {
        Self {
            narrative: None,
            contents: HashMap::new(),
            failures: vec![GenerationFailure {
                coordinate: Coordinate::Narrative,
                error,
            }],
            ledger,
        }
    }

    /// Whether every requested item was delivered.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Content for one cell, if it was delivered.
    pub fn content(&self, subject: &str, container: ContainerType) -> Option<&ContainerContent> {
        self.contents.get(&Cell::new(subject, container))
    }

    /// Failure recorded against `coordinate`, if any.
    pub fn failure_at(&self, coordinate: &Coordinate) -> Option<&GenerationFailure> {
        self.failures.iter().find(|f| &f.coordinate == coordinate)
    }

    /// The narrative-level failure, if the journey aborted.
    pub fn narrative_failure(&self) -> Option<&GenerationError> {
        self.failure_at(&Coordinate::Narrative).map(|f| &f.error)
    }
}
