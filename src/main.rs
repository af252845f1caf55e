mod data;
mod positions;
mod solver;
mod server;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    server::run_server().await;
}
