use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// Type aliases for clarity
pub type StudentId = u32;
pub type RoomId = String;

/// A student sitting exactly one named exam.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: StudentId,
    pub exam: String,
}

/// A rectangular room of rows x cols seats. The skip flags drop every
/// odd row and/or column from the usable grid.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomId,
    pub rows: u32,
    pub cols: u32,
    pub skip_rows: bool,
    pub skip_cols: bool,
}

/// Solver knobs. Every field carries a default so API callers may omit
/// any of them.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SolverConfig {
    /// Wall-clock limit for the search, in seconds.
    pub timeout_seconds: u64,
    /// Parallel workers inside the backend search.
    pub workers: u32,
    /// Ceiling on emitted separation constraints.
    pub separation_cap: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 120,
            workers: 4,
            separation_cap: 50_000,
        }
    }
}

/// The complete input for one seating request.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatingInput {
    pub students: Vec<Student>,
    pub rooms: Vec<Room>,
    /// Exam name -> rooms its students may sit in. An absent exam may sit
    /// anywhere; an empty list allows no room at all.
    #[serde(default)]
    pub restrictions: HashMap<String, Vec<RoomId>>,
    #[serde(default)]
    pub config: SolverConfig,
}

/// A single seated student.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub student_id: StudentId,
    pub room_id: RoomId,
    pub row: u32,
    pub col: u32,
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "student {} -> {} ({}, {})",
            self.student_id, self.room_id, self.row, self.col
        )
    }
}

/// Final state reported by the optimization backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Timeout,
}

/// Model and search statistics for one invocation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub students: usize,
    pub rooms: usize,
    pub total_capacity: usize,
    /// Seat variables created after restriction pre-filtering.
    pub variables: usize,
    pub separation_constraints: usize,
    /// True when the separation cap stopped emission early; the returned
    /// seating may then violate separation for pairs past the cap.
    pub separation_cap_hit: bool,
    /// Tie-break constraints added for interchangeable rooms.
    pub symmetry_constraints: usize,
    pub rooms_used: usize,
    pub status: SolveStatus,
    pub solve_time_ms: u64,
}

/// The final output of the solver.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatingOutput {
    pub assignments: Vec<Assignment>,
    pub diagnostics: Diagnostics,
}
