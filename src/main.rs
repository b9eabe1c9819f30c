use std::net::SocketAddr;
use tonic::transport::Server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_grpc::{ApiKeyInterceptor, VigilService, pb::vigil_server::VigilServer};
use api_rest::{AppState, router};

/// Main entry point for the Vigil application
///
/// Starts both gRPC and REST servers concurrently:
/// - gRPC server on port 50051 (configurable via VIGIL_ADDR)
/// - REST server on port 3000 (configurable via VIGIL_REST_ADDR)
///
/// The gRPC server requires authentication via x-api-key header.
/// The REST server identifies callers through the x-user-* headers.
///
/// # Environment Variables
/// - `VIGIL_ADDR`: gRPC server address (default: "0.0.0.0:50051")
/// - `VIGIL_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `PATIENT_DATA_DIR`: Directory for patient data storage (default: "patient_data")
/// - `VIGIL_GLYCEMIC_POLICY`: `legacy` or `not-applicable-controlled`
/// - `VIGIL_APPOINTMENT_WINDOW_DAYS`: dashboard look-ahead (default: 7)
/// - `API_KEY`: API key for gRPC authentication
///
/// # Returns
/// * `Ok(())` - If servers start and run successfully
/// * `Err(anyhow::Error)` - If server startup or runtime fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vigil_run=info".parse()?)
                .add_directive("vigil_core=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("api_grpc=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let grpc_addr: SocketAddr = std::env::var("VIGIL_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:50051".into())
        .parse()?;
    let rest_addr = std::env::var("VIGIL_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let api_key = std::env::var("API_KEY")
        .map_err(|_| anyhow::anyhow!("API_KEY must be set for the gRPC server"))?;

    let cfg = api_shared::config::core_config_from_env()?;

    tracing::info!("++ Starting Vigil gRPC on {}", grpc_addr);
    tracing::info!("++ Starting Vigil REST on {}", rest_addr);

    let rest_app = router(AppState::new(cfg.clone()));
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    let rest_server = tokio::spawn(async move { axum::serve(listener, rest_app).await });

    let grpc_server = Server::builder()
        .add_service(VigilServer::with_interceptor(
            VigilService::new(cfg),
            ApiKeyInterceptor::new(api_key),
        ))
        .serve(grpc_addr);

    // Run both
    let (rest_result, grpc_result) = tokio::join!(rest_server, grpc_server);
    rest_result??;
    grpc_result?;

    Ok(())
}
