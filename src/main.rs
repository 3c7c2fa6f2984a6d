use conduit::config::Settings;
use conduit::db;
use rocket::{Build, Rocket};
use tracing_subscriber::EnvFilter;

#[rocket::launch]
fn launch() -> Rocket<Build> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env().expect("Failed to load settings");
    let pool = db::init_pool(&settings.database_url).expect("Failed to create database pool");
    tracing::info!("database ready");
    conduit::rocket(settings, pool)
}
