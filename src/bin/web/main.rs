use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::{BoxError, Router};

use influmarket::adapters::repositories::pg::PgMarketStore;
use influmarket::database::connection_pool;
use influmarket::dependencies::config;
use influmarket::routes::{create_routes, AppState};
use influmarket::services::notifier::LogNotifier;

use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn handle_middleware_error(err: BoxError) -> StatusCode {
	if err.is::<tower::timeout::error::Elapsed>() {
		StatusCode::REQUEST_TIMEOUT
	} else {
		StatusCode::INTERNAL_SERVER_ERROR
	}
}

#[tokio::main]
async fn main() {
	dotenv::dotenv().ok();

	// ! Tracing
	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config().log_level)),
		)
		.with(tracing_subscriber::fmt::layer())
		.init();

	// ! Connection
	tracing::info!("Connections Are Being Pooled...");
	let pool = connection_pool().await;
	sqlx::migrate!("./migrations").run(pool).await.expect("migrations must apply");

	let state = AppState::new(
		Arc::new(PgMarketStore::new(pool)),
		Arc::new(LogNotifier),
		config().unread_window_days,
	);

	let origins: Vec<HeaderValue> = config()
		.allow_origins
		.split(',')
		.filter_map(|origin| origin.trim().parse().ok())
		.collect();

	let service_name = "/influmarket";
	let app = Router::new()
		.nest_service(service_name, create_routes(state))
		.layer(
			CorsLayer::new()
				.allow_origin(AllowOrigin::list(origins))
				.allow_methods([Method::GET, Method::POST, Method::PATCH, Method::PUT, Method::DELETE]),
		)
		.layer(TraceLayer::new_for_http())
		.layer(
			ServiceBuilder::new()
				.layer(HandleErrorLayer::new(handle_middleware_error))
				.timeout(Duration::from_secs(10)),
		);

	tracing::info!("Start Web Server...");
	axum::Server::bind(&SocketAddr::from_str(&config().server_ip_port).unwrap())
		.serve(app.into_make_service())
		.await
		.unwrap();
}
