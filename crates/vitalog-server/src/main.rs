use std::{env, net::SocketAddr, sync::Arc};

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vitalog_core::{
    Config, Database, DrugRepository, MatchService, RuleRepository, SqlRuleRepository,
    init_telemetry, migrations,
};

mod api;

#[derive(Clone)]
pub struct AppState {
    db: Database,
    matcher: MatchService,
    drugs: DrugRepository,
}

impl AppState {
    pub fn new(db: Database, matcher: MatchService) -> Self {
        Self {
            drugs: DrugRepository::new(db.clone()),
            db,
            matcher,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    let config = Config::load(&config_path)?;

    let _guard = init_telemetry(&config.app, &config.telemetry)?;

    let db = Database::from_paths(&config.paths).await?;
    migrations::run_migrations(&db).await?;

    let rules: Arc<dyn RuleRepository> = Arc::new(SqlRuleRepository::new(db.clone()));
    let matcher = MatchService::from_config(rules, &config.chatbot);
    let app = router(AppState::new(db, matcher));

    let shutdown = CancellationToken::new();
    let addr = SocketAddr::from(([0, 0, 0, 0], config.app.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("VitaLog listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .nest("/api", api::router())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    database: String,
}

async fn healthz(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let healthy = match state.db.health_check().await {
        Ok(()) => true,
        Err(e) => {
            warn!("database health check failed: {}", e);
            false
        }
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: if healthy { "ok" } else { "unhealthy" }.to_string(),
        }),
    )
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for ctrl+c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("received ctrl+c, shutting down");
        }
        _ = terminate => {
            warn!("received terminate signal, shutting down");
        }
        _ = shutdown.cancelled() => {}
    }

    shutdown.cancel();
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::state_with;
    use vitalog_core::MemoryRuleRepository;

    #[tokio::test]
    async fn healthz_reports_ok_when_database_is_reachable() {
        let (state, _dir) = state_with(MemoryRuleRepository::new()).await;
        let (status, Json(body)) = healthz(State(state)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "healthy");
        assert_eq!(body.database, "ok");
    }

    #[test]
    fn router_builds_with_all_routes() {
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        let (state, _dir) = rt.block_on(state_with(MemoryRuleRepository::new()));
        let _app: Router = router(state);
    }
}
