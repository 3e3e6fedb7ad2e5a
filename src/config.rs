//! Configuration for habitd
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

/// habitd - habit-tracking REST backend
#[derive(Parser, Debug, Clone)]
#[command(name = "habitd")]
#[command(about = "REST backend for habit tracking and public habit sharing")]
pub struct Args {
    /// Unique node identifier for this instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "habitTracker")]
    pub mongodb_db: String,

    /// JWT secret for bearer token verification (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// Expected token issuer (optional; skipped when unset)
    #[arg(long, env = "JWT_ISSUER")]
    pub jwt_issuer: Option<String>,

    /// Enable development mode (default JWT secret, non-fatal MongoDB outage at startup)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Get effective JWT secret (uses default in dev mode)
    ///
    /// `validate()` rejects a production configuration without a secret
    /// before the server starts.
    pub fn jwt_secret(&self) -> String {
        match (&self.jwt_secret, self.dev_mode) {
            (Some(secret), _) => secret.clone(),
            (None, true) => "dev-only-insecure-secret".to_string(),
            (None, false) => String::new(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.jwt_secret.is_none() {
            return Err("JWT_SECRET is required in production mode".to_string());
        }

        Ok(())
    }
}
