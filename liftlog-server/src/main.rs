use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;
use log::info;

use liftlog_server::cache::PageCache;
use liftlog_server::{AppState, routes};

#[derive(Parser, Debug)]
#[command(version, about = "LiftLog - workout tracking API", long_about = None)]
struct Args {
    /// Path to the SQLite database file.
    #[arg(long, env = "DATABASE_URL", default_value = "liftlog.db")]
    db: String,

    /// Address to listen on.
    #[arg(long, env = "LIFTLOG_ADDR", default_value = "127.0.0.1:3000")]
    addr: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();
    let args = Args::parse();

    let pool = liftlog_core::db::connect(&args.db).await?;
    liftlog_core::db::init_database(&pool).await?;

    let state = Arc::new(AppState {
        pool,
        cache: PageCache::new(),
    });
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&args.addr).await?;
    info!("listening on {}", args.addr);
    axum::serve(listener, app).await?;

    Ok(())
}
