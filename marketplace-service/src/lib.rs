pub mod config;
pub mod handlers;
pub mod models;
pub mod services;

use axum::middleware::{from_fn, from_fn_with_state};
use axum::{
    Router,
    routing::{get, post},
};
use secrecy::ExposeSecret;
use service_core::auth::{JwtService, auth_middleware};
use service_core::middleware::request_id_middleware;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use config::Config;
use services::{Database, MarketplaceRepository, RazorpayClient, RegistryClient};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub repository: MarketplaceRepository,
    pub registry: RegistryClient,
    pub razorpay: RazorpayClient,
    pub jwt: JwtService,
}

impl AsRef<JwtService> for AppState {
    fn as_ref(&self) -> &JwtService {
        &self.jwt
    }
}

pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let database = Database::new(
            config.database.url.expose_secret(),
            config.database.max_connections,
            config.database.min_connections,
        )
        .await?;
        database.run_migrations().await?;

        let repository = MarketplaceRepository::new(&database);
        let registry = RegistryClient::new(config.registry.clone())?;
        let razorpay = RazorpayClient::new(config.razorpay.clone())?;
        let jwt = JwtService::new(&config.auth.jwt_secret);

        if razorpay.is_configured() {
            tracing::info!("Razorpay client initialized");
        } else {
            tracing::warn!("Razorpay credentials not configured - checkout is disabled");
        }
        if !registry.is_configured() {
            tracing::warn!("Operator registry not configured - PNR verification is disabled");
        }

        let state = AppState {
            config: config.clone(),
            repository,
            registry,
            razorpay,
            jwt,
        };

        let public = Router::new()
            .route("/health", get(handlers::health_check))
            .route("/ready", get(handlers::readiness_check))
            .route("/metrics", get(handlers::metrics_endpoint))
            .route("/tickets", get(handlers::tickets::list_tickets))
            .route("/tickets/:id", get(handlers::tickets::get_ticket))
            .route("/webhooks/razorpay", post(handlers::webhook::webhook));

        let protected = Router::new()
            .route("/tickets", post(handlers::tickets::create_ticket))
            .route(
                "/tickets/verify-pnr",
                post(handlers::verification::verify_pnr),
            )
            .route(
                "/tickets/:id/cancel",
                post(handlers::tickets::cancel_ticket),
            )
            .route(
                "/tickets/sync-registry",
                post(handlers::tickets::sync_registry),
            )
            .route("/orders", post(handlers::orders::create_order))
            .route("/payments/verify", post(handlers::payments::verify_payment))
            .route(
                "/transactions/:id",
                get(handlers::transactions::get_transaction),
            )
            .route("/payouts", get(handlers::transactions::list_payouts))
            .route(
                "/notifications",
                get(handlers::transactions::list_notifications),
            )
            .route_layer(from_fn_with_state(
                state.clone(),
                auth_middleware::<AppState>,
            ));

        let router = public
            .merge(protected)
            .layer(from_fn(request_id_middleware))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("-");

                    tracing::info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                        version = ?request.version(),
                    )
                }),
            )
            .layer(CorsLayer::permissive())
            .with_state(state);

        // Port 0 binds a random port, which the tests rely on.
        let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
        let listener = TcpListener::bind(addr).await?;
        let port = listener.local_addr()?.port();

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        tracing::info!("Listening on port {}", self.port);
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }
}
