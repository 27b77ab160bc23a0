use std::net::SocketAddr;

use clap::Parser;
use tasktracker::cli::{
    Args, build_config, init_logging, open_database, scrub_secret_env, validate_frontend_url,
};
use tasktracker::{create_app, init_cleanup};
use tracing::{error, info};

fn main() {
    let args = Args::parse();
    scrub_secret_env();

    init_logging(&args.log_format);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| {
            error!(error = %e, "Failed to start async runtime");
            std::process::exit(1);
        });
    runtime.block_on(serve(args));
}

async fn serve(args: Args) {
    let Some(frontend_url) = validate_frontend_url(&args.frontend_url) else {
        std::process::exit(1);
    };

    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    let addr = format!("0.0.0.0:{}", args.port);
    let config = build_config(args, db, frontend_url);

    let app = create_app(&config).unwrap_or_else(|e| {
        error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });

    init_cleanup(&config.db).await;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    match listener.local_addr() {
        Ok(local_addr) => info!(address = %local_addr, "Listening"),
        Err(e) => info!(address = %addr, error = %e, "Listening"),
    }

    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    if let Err(e) = axum::serve(listener, make_service).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
