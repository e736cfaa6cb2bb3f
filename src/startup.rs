//! Application Startup
//!
//! Application building and server initialization.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use redis::aio::ConnectionManager;
use sqlx::PgPool;
use tokio::net::TcpListener;

use crate::application::services::{LogMailer, Mailer};
use crate::config::Settings;
use crate::infrastructure::cache::{PresenceStore, RedisPresenceStore};
use crate::infrastructure::repositories::{
    PgDiscussionRepository, PgMessageRepository, PgUserRepository,
};
use crate::infrastructure::{cache, database};
use crate::presentation::http::routes;
use crate::presentation::middleware::{cors, logging};
use crate::presentation::websocket::{RoomCoordinator, SessionAuthenticator};
use crate::shared::snowflake::SnowflakeGenerator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub redis: ConnectionManager,
    pub snowflake: Arc<SnowflakeGenerator>,
    pub coordinator: Arc<RoomCoordinator>,
    pub authenticator: Arc<SessionAuthenticator>,
    pub presence: Arc<dyn PresenceStore>,
    pub mailer: Arc<dyn Mailer>,
    pub settings: Arc<Settings>,
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        // Create database pool
        let db = database::create_pool(&settings.database).await?;
        tracing::info!("Database connection pool created");

        // Create Redis client
        let redis = cache::create_redis_client(&settings.redis).await?;
        tracing::info!("Redis connection established");

        // Create snowflake generator
        let snowflake = Arc::new(SnowflakeGenerator::new(settings.snowflake.machine_id as u64));

        // Presence store shared by the authenticator path and coordinator
        let presence: Arc<dyn PresenceStore> =
            Arc::new(RedisPresenceStore::new(redis.clone()));

        // Room coordinator over the discussion registry, presence store
        // and message store
        let coordinator = Arc::new(RoomCoordinator::new(
            Arc::new(PgDiscussionRepository::new(db.clone())),
            presence.clone(),
            Arc::new(PgMessageRepository::new(db.clone(), snowflake.clone())),
        ));

        // Connection-time identity resolution
        let authenticator = Arc::new(SessionAuthenticator::new(
            Arc::new(PgUserRepository::new(db.clone())),
            settings.jwt.secret.clone(),
        ));

        let mailer: Arc<dyn Mailer> = Arc::new(LogMailer);

        // Create app state
        let state = AppState {
            db,
            redis,
            snowflake,
            coordinator,
            authenticator,
            presence,
            mailer,
            settings: Arc::new(settings.clone()),
        };

        // Build router with middleware
        let router = routes::create_router(state)
            .layer(logging::create_trace_layer())
            .layer(cors::create_cors_layer(&settings.cors));

        // Bind to address
        let addr = SocketAddr::from(([0, 0, 0, 0], settings.server.port));
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Listening on {}", addr);

        Ok(Self { listener, router })
    }

    /// Run the server until stopped
    pub async fn run_until_stopped(self) -> Result<()> {
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}
