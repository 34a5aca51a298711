use actix_web::{web, App, HttpServer};
use actix_web::dev::Server;
use redis::aio::ConnectionManager;
use sqlx::PgPool;
use std::net::TcpListener;

use crate::configuration::Settings;
use crate::email_client::EmailClient;
use crate::middleware::{AuthGate, RateLimiter};
use crate::pdf::PdfClient;
use crate::request_logging::RequestLogger;
use crate::routes::{
    create_invoice, download_invoice, health_check, invoice_summary, list_invoices, login, logout,
    refresh_token, register, resend_verification, upload_logo, verify_email,
};

const MAX_PAYLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn run(
    listener: TcpListener,
    connection: PgPool,
    redis: ConnectionManager,
    settings: Settings,
) -> Result<Server, std::io::Error> {
    let connection = web::Data::new(connection);
    let redis_data = web::Data::new(redis.clone());
    let jwt_config = settings.jwt.clone();
    let jwt_config_data = web::Data::new(jwt_config.clone());
    let email_client = web::Data::new(EmailClient::new(
        settings.email.base_url.clone(),
        settings.email.sender.clone(),
        settings.email.client_url.clone(),
        reqwest::Client::new(),
    ));
    let pdf_client = web::Data::new(PdfClient::new(
        settings.pdf.render_url.clone(),
        reqwest::Client::new(),
    ));
    let settings_data = web::Data::new(settings);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(RequestLogger)
            // Shared state
            .app_data(connection.clone())
            .app_data(redis_data.clone())
            .app_data(jwt_config_data.clone())
            .app_data(email_client.clone())
            .app_data(pdf_client.clone())
            .app_data(settings_data.clone())
            .app_data(web::PayloadConfig::new(MAX_PAYLOAD_BYTES))
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/api")
                    // Public auth routes
                    .route("/auth/register", web::post().to(register))
                    .route("/auth/logout", web::post().to(logout))
                    .service(
                        web::resource("/auth/login")
                            .wrap(RateLimiter::new("login", redis.clone()))
                            .route(web::post().to(login)),
                    )
                    .service(
                        web::resource("/auth/refresh-token")
                            .wrap(RateLimiter::new("refresh", redis.clone()))
                            .route(web::post().to(refresh_token)),
                    )
                    .service(
                        web::resource("/auth/verify-email")
                            .wrap(RateLimiter::new("verify-email", redis.clone()))
                            .route(web::post().to(verify_email)),
                    )
                    .service(
                        web::resource("/auth/resend-verification")
                            .wrap(RateLimiter::new("resend-verification", redis.clone()))
                            .route(web::post().to(resend_verification)),
                    )
                    // Protected invoice routes
                    .service(
                        web::scope("/invoices")
                            .wrap(AuthGate::new(jwt_config.clone(), redis.clone()))
                            .wrap(RateLimiter::new("invoices", redis.clone()))
                            .route("", web::post().to(create_invoice))
                            .route("", web::get().to(list_invoices))
                            .route("/summary", web::get().to(invoice_summary))
                            .route("/upload-logo", web::post().to(upload_logo))
                            .route("/{id}/download", web::get().to(download_invoice)),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
