use redis::aio::ConnectionManager;
use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;

use payzen::configuration::get_configuration;
use payzen::startup::run;
use payzen::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&configuration.database.connection_string())
        .await
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "Database connection error",
            )
        })?;

    tracing::info!("Database connection pool created");

    let redis_client = redis::Client::open(configuration.redis.connection_string())
        .map_err(|e| {
            tracing::error!("Invalid redis configuration: {}", e);
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "Redis configuration error")
        })?;
    let redis = ConnectionManager::new(redis_client).await.map_err(|e| {
        tracing::error!("Failed to connect to redis: {}", e);
        std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "Redis connection error")
    })?;

    tracing::info!("Redis connection established");

    std::fs::create_dir_all(&configuration.uploads.dir)?;

    let address = format!("127.0.0.1:{}", configuration.application.port);
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let server = run(listener, pool, redis, configuration)?;
    server.await
}
