use axum::{routing::post, Router, Json};
use crate::data::{SeatingInput, SeatingOutput};
use crate::solver::{self, SolveError};

async fn solve_handler(Json(input): Json<SeatingInput>) -> Result<Json<SeatingOutput>, (axum::http::StatusCode, String)> {
    match solver::solve(&input) {
        Ok(output) => Ok(Json(output)),
        // an inconsistent solver response is our bug, not the caller's
        Err(e @ SolveError::SolverInvariantViolated(_)) => {
            Err((axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
        Err(e) => Err((axum::http::StatusCode::BAD_REQUEST, e.to_string())),
    }
}

pub async fn run_server() {
    let app = Router::new()
        .route("/v1/seating/solve", post(solve_handler));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:8080")
        .await
        .unwrap();

    println!("Server running at http://{}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}
