use std::sync::OnceLock;

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::dependencies::config;

pub async fn connection_pool() -> &'static PgPool {
	static POOL: OnceLock<PgPool> = OnceLock::new();
	let p = match POOL.get() {
		None => {
			let url = &config().database_url;
			let pool = PgPoolOptions::new()
				.max_connections(30)
				.connect(url)
				.await
				.expect("database connection must succeed");
			POOL.get_or_init(|| pool)
		}
		Some(pool) => pool,
	};
	p
}
