pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use axum::middleware::from_fn;
use axum::{
    Router,
    routing::{get, patch, post, put},
};
use mongodb::{Client, options::ClientOptions};
use secrecy::ExposeSecret;
use service_core::middleware::{
    metrics::metrics_middleware, tracing::request_id_middleware,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use config::Config;
use services::{CouponEngine, EnrollmentService, EnrollmentStore, MongoStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn EnrollmentStore>,
    pub enrollment: EnrollmentService,
    pub coupons: CouponEngine,
}

pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Production wiring: MongoDB-backed store.
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let mut client_options = ClientOptions::parse(config.database.url.expose_secret()).await?;
        client_options.app_name = Some("enrollment-service".to_string());

        let client = Client::with_options(client_options)?;
        let store = MongoStore::new(&client, &config.database.db_name);
        store.init_indexes().await?;

        Self::with_store(config, Arc::new(store)).await
    }

    /// Builds the application around any store implementation; the test
    /// harness passes the in-memory one.
    pub async fn with_store(
        config: Config,
        store: Arc<dyn EnrollmentStore>,
    ) -> anyhow::Result<Self> {
        services::init_metrics();

        let state = AppState {
            enrollment: EnrollmentService::new(store.clone()),
            coupons: CouponEngine::new(store.clone()),
            store,
            config: config.clone(),
        };

        let router = Router::new()
            .route("/health", get(handlers::health_check))
            .route("/metrics", get(handlers::metrics))
            // Class batches
            .route(
                "/classBatches",
                get(handlers::batches::list_batches).post(handlers::batches::create_batch),
            )
            .route(
                "/classBatches/:id",
                get(handlers::batches::get_batch)
                    .put(handlers::batches::update_batch)
                    .delete(handlers::batches::deactivate_batch),
            )
            .route(
                "/classBatches/teacher/:teacher_id",
                get(handlers::batches::teacher_batches),
            )
            // Bookings
            .route(
                "/bookings",
                get(handlers::bookings::list_bookings).post(handlers::bookings::create_booking),
            )
            .route(
                "/bookings/:id",
                get(handlers::bookings::get_booking).delete(handlers::bookings::cancel_booking),
            )
            .route("/bookings/stage-two/:id", put(handlers::bookings::stage_two))
            .route(
                "/bookings/stage-three/:id",
                put(handlers::bookings::stage_three),
            )
            // Coupons
            .route(
                "/coupons",
                get(handlers::coupons::list_coupons).post(handlers::coupons::create_coupon),
            )
            .route("/coupons/validate", post(handlers::coupons::validate_coupon))
            .route("/coupons/apply", post(handlers::coupons::apply_coupon))
            .route(
                "/coupons/:id",
                get(handlers::coupons::get_coupon)
                    .put(handlers::coupons::update_coupon)
                    .delete(handlers::coupons::delete_coupon),
            )
            .route("/coupons/:id/toggle", patch(handlers::coupons::toggle_coupon))
            .layer(from_fn(metrics_middleware))
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
                        user_id = tracing::field::Empty,
                    )
                }),
            )
            .with_state(state);

        // Port 0 binds a random free port, which the test harness relies on.
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
