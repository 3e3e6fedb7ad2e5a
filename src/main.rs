//! habitd - habit-tracking REST backend

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use habitd::{
    config::Args,
    db::{MongoClient, MongoHabitStore, MongoUserStore},
    engine::{HabitEngine, UserRegistry},
    server::{self, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("habitd={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Print startup banner
    info!("======================================");
    info!("  habitd - Habit Tracker Backend");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {}", args.mongodb_uri);
    info!("Database: {}", args.mongodb_db);
    info!("======================================");

    // Connect to MongoDB (optional in dev mode)
    let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => {
            info!("MongoDB connected successfully");
            Some(client)
        }
        Err(e) => {
            if args.dev_mode {
                warn!("MongoDB connection failed (dev mode, continuing without): {}", e);
                None
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    // Wire the engine and registry over the Mongo-backed stores
    let (engine, users) = match &mongo {
        Some(client) => {
            let habits = match MongoHabitStore::new(client).await {
                Ok(store) => store,
                Err(e) => {
                    error!("Failed to open habits collection: {}", e);
                    std::process::exit(1);
                }
            };
            let accounts = match MongoUserStore::new(client).await {
                Ok(store) => store,
                Err(e) => {
                    error!("Failed to open users collection: {}", e);
                    std::process::exit(1);
                }
            };
            (
                Some(Arc::new(HabitEngine::new(Arc::new(habits)))),
                Some(Arc::new(UserRegistry::new(Arc::new(accounts)))),
            )
        }
        None => (None, None),
    };

    let state = Arc::new(AppState::new(args, mongo, engine, users));

    // Run until the server fails or a shutdown signal arrives
    tokio::select! {
        result = server::run(Arc::clone(&state)) => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    if let Some(client) = state.mongo.clone() {
        client.shutdown().await;
        info!("MongoDB connection pool closed");
    }

    Ok(())
}
