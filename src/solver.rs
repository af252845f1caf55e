use crate::data::{
    Assignment, Diagnostics, Room, RoomId, SeatingInput, SeatingOutput, SolveStatus, Student,
};
use crate::positions::{adjacent_pairs, usable_positions};
use good_lp::variable;
use good_lp::{
    constraint, default_solver, Expression, ProblemVariables, ResolutionError, Solution,
    SolverModel, Variable,
};
use itertools::Itertools;
use log::{info, trace, warn};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Instant;

/// Everything that can stop a seating request from producing an assignment.
#[derive(Debug)]
pub enum SolveError {
    /// The input failed structural validation before any work was done.
    InvalidInput(String),
    /// Fewer usable seats than students across all rooms combined.
    InsufficientCapacity { capacity: usize, students: usize },
    /// A restricted exam has fewer usable seats in its allowed rooms than
    /// students sitting it.
    RestrictedInsufficientCapacity {
        exam: String,
        capacity: usize,
        students: usize,
    },
    /// The search hit the wall-clock limit without a feasible seating.
    SolverTimeout(Diagnostics),
    /// The model was proven infeasible.
    SolverInfeasible(Diagnostics),
    /// The backend returned a truth assignment that breaks the seating
    /// invariants. Indicates a bug, not bad input.
    SolverInvariantViolated(String),
}

impl fmt::Display for SolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(reason) => write!(f, "invalid input: {}", reason),
            Self::InsufficientCapacity { capacity, students } => write!(
                f,
                "{} usable seats cannot hold {} students",
                capacity, students
            ),
            Self::RestrictedInsufficientCapacity {
                exam,
                capacity,
                students,
            } => write!(
                f,
                "exam '{}' is restricted to rooms with {} usable seats for {} students",
                exam, capacity, students
            ),
            Self::SolverTimeout(diagnostics) => write!(
                f,
                "no feasible seating found within the time limit ({} ms spent)",
                diagnostics.solve_time_ms
            ),
            Self::SolverInfeasible(_) => write!(f, "the seating model is infeasible"),
            Self::SolverInvariantViolated(reason) => {
                write!(f, "solver returned an inconsistent seating: {}", reason)
            }
        }
    }
}

impl std::error::Error for SolveError {}

/// Solves the seating assignment problem with the HiGHS MILP solver.
///
/// Places every student on exactly one usable seat so that no two students
/// of the same exam sit orthogonally adjacent, restricted exams stay inside
/// their allowed rooms, and the number of rooms in use is minimal.
pub fn solve(input: &SeatingInput) -> Result<SeatingOutput, SolveError> {
    let start_time = Instant::now();
    validate(input)?;

    // lookups
    let groups = exam_groups(&input.students);
    let group_index: HashMap<&str, usize> = groups
        .iter()
        .enumerate()
        .map(|(gi, (exam, _))| (exam.as_str(), gi))
        .collect();
    let group_of: Vec<usize> = input
        .students
        .iter()
        .map(|s| group_index[s.exam.as_str()])
        .collect();
    let room_ids: HashSet<&str> = input.rooms.iter().map(|r| r.id.as_str()).collect();

    for (exam, allowed) in &input.restrictions {
        for room_id in allowed {
            if !room_ids.contains(room_id.as_str()) {
                warn!(
                    "Restriction for exam '{}' names unknown room '{}'; it adds no capacity.",
                    exam, room_id
                );
            }
        }
    }

    // usable seats and adjacency, precomputed once per room
    let positions: Vec<Vec<(u32, u32)>> = input.rooms.iter().map(usable_positions).collect();
    let adjacency: Vec<Vec<(usize, usize)>> =
        positions.iter().map(|p| adjacent_pairs(p)).collect();
    let total_capacity: usize = positions.iter().map(|p| p.len()).sum();
    for (room, seats) in input.rooms.iter().zip(&positions) {
        trace!("Room {}: {} usable seats", room.id, seats.len());
    }

    if total_capacity < input.students.len() {
        return Err(SolveError::InsufficientCapacity {
            capacity: total_capacity,
            students: input.students.len(),
        });
    }

    // restriction pre-filter: the rooms each exam may use, ascending
    let allowed_rooms: Vec<Vec<usize>> = groups
        .iter()
        .map(|(exam, _)| match input.restrictions.get(exam) {
            Some(allowed) => (0..input.rooms.len())
                .filter(|&ki| allowed.contains(&input.rooms[ki].id))
                .collect(),
            None => (0..input.rooms.len()).collect(),
        })
        .collect();

    // a restricted exam must fit inside its allow-list; cheaper to reject
    // here than to let the solver prove infeasibility
    for (gi, (exam, members)) in groups.iter().enumerate() {
        if !input.restrictions.contains_key(exam) {
            continue;
        }
        let restricted_capacity: usize =
            allowed_rooms[gi].iter().map(|&ki| positions[ki].len()).sum();
        if restricted_capacity < members.len() {
            return Err(SolveError::RestrictedInsufficientCapacity {
                exam: exam.clone(),
                capacity: restricted_capacity,
                students: members.len(),
            });
        }
    }

    // model setup
    info!(
        "Setting up seating model with {} students, {} rooms, and {} usable seats...",
        input.students.len(),
        input.rooms.len(),
        total_capacity
    );
    let mut problem = ProblemVariables::new();

    // x_skp = 1 if student s sits on seat p of room k
    //         0 otherwise
    // created only for rooms the student's exam is allowed into, so the
    // restriction constraints exist as absent variables rather than as
    // explicit zero-constraints
    let mut candidate_triples = Vec::new();
    for si in 0..input.students.len() {
        for &ki in &allowed_rooms[group_of[si]] {
            for pi in 0..positions[ki].len() {
                candidate_triples.push((si, ki, pi));
            }
        }
    }
    trace!(
        "Generated {} seat variables out of a theoretical maximum of {}.",
        candidate_triples.len(),
        input.students.len() * total_capacity
    );

    let seat_vars_vec = problem.add_vector(variable().binary(), candidate_triples.len());
    let mut seat_vars: HashMap<(usize, usize, usize), Variable> = HashMap::new();
    for (i, triple) in candidate_triples.iter().enumerate() {
        seat_vars.insert(*triple, seat_vars_vec[i]);
    }

    // y_k = 1 if room k seats anyone
    let room_vars = problem.add_vector(variable().binary(), input.rooms.len());

    // objective: open as few rooms as possible
    let rooms_open: Expression = room_vars.iter().copied().sum();
    let mut model = problem
        .minimise(rooms_open)
        .using(default_solver)
        .set_option("time_limit", input.config.timeout_seconds as f64)
        .set_option("threads", input.config.workers as i32)
        .set_option("parallel", "on")
        .set_option("presolve", "on")
        .set_option("output_flag", "false");

    // each student sits exactly once
    info!("Adding 'student seated once' constraints...");
    for si in 0..input.students.len() {
        let seated: Expression = allowed_rooms[group_of[si]]
            .iter()
            .flat_map(|&ki| (0..positions[ki].len()).map(move |pi| (ki, pi)))
            .map(|(ki, pi)| seat_vars[&(si, ki, pi)])
            .sum();
        model.add_constraint(constraint!(seated == 1));
    }

    // one student per seat, and an occupied seat opens its room
    info!("Adding capacity and room-usage constraints...");
    for ki in 0..input.rooms.len() {
        for pi in 0..positions[ki].len() {
            let mut seat_occupancy = Vec::new();
            for si in 0..input.students.len() {
                if let Some(var) = seat_vars.get(&(si, ki, pi)) {
                    seat_occupancy.push(*var);
                }
            }
            if seat_occupancy.is_empty() {
                continue;
            }
            let occupied: Expression = seat_occupancy.iter().copied().sum();
            model.add_constraint(constraint!(occupied <= 1));
            for var in seat_occupancy {
                model.add_constraint(constraint!(var <= room_vars[ki]));
            }
        }
    }

    // interchangeable neighbouring rooms open in index order
    let mut symmetry_constraints = 0;
    for ki in 0..input.rooms.len().saturating_sub(1) {
        if rooms_interchangeable(&input.rooms[ki], &input.rooms[ki + 1], &input.restrictions) {
            model.add_constraint(constraint!(room_vars[ki + 1] <= room_vars[ki]));
            symmetry_constraints += 1;
        }
    }
    if symmetry_constraints > 0 {
        info!(
            "Added {} symmetry tie-break constraints for interchangeable rooms.",
            symmetry_constraints
        );
    }

    // forbid adjacent seats for same-exam pairs, up to the configured cap;
    // emission order is a fixed function of the input so identical requests
    // always produce identical models
    info!("Adding separation constraints...");
    let mut separation_constraints = 0;
    let mut separation_cap_hit = false;
    'exams: for (gi, (exam, members)) in groups.iter().enumerate() {
        if members.len() < 2 {
            continue;
        }
        for &ki in &allowed_rooms[gi] {
            for &(p, q) in &adjacency[ki] {
                for (&si, &sj) in members.iter().tuple_combinations() {
                    for (first, second) in [(si, sj), (sj, si)] {
                        if separation_constraints >= input.config.separation_cap {
                            separation_cap_hit = true;
                            warn!(
                                "Separation cap of {} reached while processing exam '{}'; \
                                 same-exam adjacency is no longer fully enforced.",
                                input.config.separation_cap, exam
                            );
                            break 'exams;
                        }
                        let a = seat_vars[&(first, ki, p)];
                        let b = seat_vars[&(second, ki, q)];
                        model.add_constraint(constraint!(a + b <= 1));
                        separation_constraints += 1;
                    }
                }
            }
        }
    }
    trace!(
        "Added {} separation constraints (cap: {}).",
        separation_constraints,
        input.config.separation_cap
    );

    let students = input.students.len();
    let rooms = input.rooms.len();
    let variables = candidate_triples.len();
    let build_diagnostics = |rooms_used: usize, status: SolveStatus, solve_time_ms: u64| {
        Diagnostics {
            students,
            rooms,
            total_capacity,
            variables,
            separation_constraints,
            separation_cap_hit,
            symmetry_constraints,
            rooms_used,
            status,
            solve_time_ms,
        }
    };

    // solve
    info!("Starting seating solver...");
    let solve_start = Instant::now();
    let solution = match model.solve() {
        Ok(solution) => solution,
        Err(e) => {
            let solve_time_ms = solve_start.elapsed().as_millis() as u64;
            info!("Solver finished without a seating: {}", e);
            // HiGHS surfaces running out of wall clock without an incumbent
            // as a generic resolution failure
            return Err(match e {
                ResolutionError::Infeasible => SolveError::SolverInfeasible(build_diagnostics(
                    0,
                    SolveStatus::Infeasible,
                    solve_time_ms,
                )),
                _ => SolveError::SolverTimeout(build_diagnostics(
                    0,
                    SolveStatus::Timeout,
                    solve_time_ms,
                )),
            });
        }
    };
    let solve_time = solve_start.elapsed();
    info!("Solution found in {:.2?}", solve_time);

    // decode the truth assignment; each student must occupy exactly one seat
    let mut assignments = Vec::with_capacity(input.students.len());
    for (si, student) in input.students.iter().enumerate() {
        let mut chosen = None;
        let mut seats_held = 0;
        for &ki in &allowed_rooms[group_of[si]] {
            for pi in 0..positions[ki].len() {
                if solution.value(seat_vars[&(si, ki, pi)]) > 0.5 {
                    seats_held += 1;
                    if chosen.is_none() {
                        chosen = Some((ki, pi));
                    }
                }
            }
        }
        match (chosen, seats_held) {
            (Some((ki, pi)), 1) => {
                let (row, col) = positions[ki][pi];
                assignments.push(Assignment {
                    student_id: student.id,
                    room_id: input.rooms[ki].id.clone(),
                    row,
                    col,
                });
            }
            _ => {
                return Err(SolveError::SolverInvariantViolated(format!(
                    "student {} holds {} seats",
                    student.id, seats_held
                )));
            }
        }
    }
    assignments.sort();

    let rooms_used = room_vars
        .iter()
        .filter(|&&var| solution.value(var) > 0.5)
        .count();
    for assignment in &assignments {
        trace!("{}", assignment);
    }

    let diagnostics = build_diagnostics(
        rooms_used,
        SolveStatus::Optimal,
        solve_time.as_millis() as u64,
    );
    info!(
        "Seated {} students in {} rooms in {:.2?}",
        assignments.len(),
        rooms_used,
        start_time.elapsed()
    );

    Ok(SeatingOutput {
        assignments,
        diagnostics,
    })
}

fn validate(input: &SeatingInput) -> Result<(), SolveError> {
    let mut seen_students = HashSet::new();
    for student in &input.students {
        if !seen_students.insert(student.id) {
            return Err(SolveError::InvalidInput(format!(
                "duplicate student id {}",
                student.id
            )));
        }
    }
    let mut seen_rooms = HashSet::new();
    for room in &input.rooms {
        if room.rows == 0 || room.cols == 0 {
            return Err(SolveError::InvalidInput(format!(
                "room {} has an empty {}x{} grid",
                room.id, room.rows, room.cols
            )));
        }
        if !seen_rooms.insert(room.id.as_str()) {
            return Err(SolveError::InvalidInput(format!(
                "duplicate room id {}",
                room.id
            )));
        }
    }
    Ok(())
}

// exam groups in first-seen order; constraint emission depends on this
// order staying a pure function of the input
fn exam_groups(students: &[Student]) -> Vec<(String, Vec<usize>)> {
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for (si, student) in students.iter().enumerate() {
        match index.get(student.exam.as_str()) {
            Some(&gi) => groups[gi].1.push(si),
            None => {
                index.insert(student.exam.as_str(), groups.len());
                groups.push((student.exam.clone(), vec![si]));
            }
        }
    }
    groups
}

// two rooms may be swapped in any solution when their grids match and no
// restriction tells them apart
fn rooms_interchangeable(
    a: &Room,
    b: &Room,
    restrictions: &HashMap<String, Vec<RoomId>>,
) -> bool {
    a.rows == b.rows
        && a.cols == b.cols
        && a.skip_rows == b.skip_rows
        && a.skip_cols == b.skip_cols
        && restrictions
            .values()
            .all(|allowed| allowed.contains(&a.id) == allowed.contains(&b.id))
}
