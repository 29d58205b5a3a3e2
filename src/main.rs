use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use tokio::net::TcpListener;

mod config;
mod handler;
mod http;
mod logger;
mod mock;
mod server;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config::Config::load()?;
    logger::init(&cfg)?;

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;
    let listener = server::create_reusable_listener(addr)?;

    let (state, routes) = config::AppState::new(cfg);
    let state = Arc::new(state);
    let connections = Arc::new(AtomicUsize::new(0));

    logger::log_server_start(&addr, &state.config, routes);

    run_accept_loop(listener, state, connections).await
}

async fn run_accept_loop(
    listener: TcpListener,
    state: Arc<config::AppState>,
    connections: Arc<AtomicUsize>,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        match listener.accept().await {
            Ok((stream, peer_addr)) => {
                server::accept_connection(stream, peer_addr, &state, &connections);
            }
            Err(e) => {
                logger::log_error(&format!("Failed to accept connection: {e}"));
            }
        }
    }
}
