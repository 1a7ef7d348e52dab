use std::{env, str::FromStr, sync::Arc};

use actix_web::{middleware, web, App, HttpServer};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use barberpro::{
    configure_api, db, json_config,
    state::AppState,
    storage::{MemStorage, SqliteStorage, Storage},
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(err) = run().await {
        eprintln!("Startup error: {err}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| "changeme".to_string());
    if jwt_secret == "changeme" {
        log::warn!("JWT_SECRET not set. Using default secret. Set JWT_SECRET in production.");
    }

    let storage: Arc<dyn Storage> = match env::var("STORAGE").as_deref() {
        Ok("memory") => {
            log::info!("Using in-memory storage with demo data");
            Arc::new(
                MemStorage::with_demo_data()
                    .map_err(|err| format!("demo seed failed: {err}"))?,
            )
        }
        _ => {
            let db_url = env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://./data/barberpro.db".to_string());
            db::ensure_sqlite_dir(&db_url)?;

            let connect_options =
                SqliteConnectOptions::from_str(&db_url)?.create_if_missing(true);
            let pool = SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(connect_options)
                .await?;

            db::run_migrations(&pool).await?;
            db::seed_defaults(&pool).await?;
            Arc::new(SqliteStorage::new(pool))
        }
    };

    let state = AppState::new(storage, jwt_secret);

    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(8080);

    let address = format!("0.0.0.0:{port}");
    log::info!("Starting BarberPro API on http://{address}");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .app_data(json_config())
            .wrap(middleware::Logger::default())
            .configure(configure_api)
    })
    .bind(address)?
    .run()
    .await?;

    Ok(())
}
