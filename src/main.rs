use std::sync::Arc;

use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use anyhow::Context;
use clap::Parser;

/// Builds the full application around an `api::testing::TestApp` for handler tests.
#[cfg(test)]
macro_rules! init_app {
    ($ctx:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data($ctx.config_data())
                .app_data($ctx.store_data())
                .app_data($ctx.mailer_data())
                .app_data($ctx.index.clone())
                .configure(|cfg| crate::routes::configure(cfg, &$ctx.config)),
        )
        .await
    };
}

mod api;
mod auth;
mod cli;
mod config;
mod db;
mod docs;
mod error;
mod export;
mod mail;
mod model;
mod models;
mod routes;
mod service;
mod store;
mod utils;

use cli::{Cli, Command};
use config::Config;
use db::init_db;

use crate::docs::ApiDoc;
use crate::mail::Mailer;
use crate::mail::console::ConsoleMailer;
use crate::mail::smtp::SmtpMailer;
use crate::store::Store;
use crate::store::mysql::MySqlStore;
use crate::utils::username_index::UsernameIndex;
use tracing::{error, info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

/// Days of recent logins preloaded into the username cache.
const WARMUP_RECENT_DAYS: i64 = 30;

#[get("/")]
async fn index() -> impl Responder {
    "StaffHub is running"
}

fn init_logging(level: &str) -> tracing_appender::non_blocking::WorkerGuard {
    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let level = level.parse().unwrap_or(tracing::Level::DEBUG);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(level)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();
    guard
}

fn build_mailer(config: &Config) -> anyhow::Result<Arc<dyn Mailer>> {
    match &config.smtp {
        Some(smtp) => {
            info!(host = %smtp.host, port = smtp.port, "Using SMTP mailer");
            Ok(Arc::new(SmtpMailer::new(smtp, &config.default_from_email)?))
        }
        None => {
            warn!("SMTP_HOST not set; emails are only logged");
            Ok(Arc::new(ConsoleMailer::new(config.default_from_email.clone())))
        }
    }
}

async fn serve(config: Config, store: Arc<dyn Store>) -> anyhow::Result<()> {
    let mailer = build_mailer(&config)?;
    let username_index = Data::new(UsernameIndex::new());

    let warmup_index = username_index.clone();
    let warmup_store = store.clone();
    actix_web::rt::spawn(async move {
        if let Err(e) = warmup_index.warmup(warmup_store.as_ref(), WARMUP_RECENT_DAYS).await {
            error!(error = %e, "Failed to warm up username index");
        }
    });

    let store_data: Data<dyn Store> = Data::from(store);
    let mailer_data: Data<dyn Mailer> = Data::from(mailer);
    let server_addr = config.server_addr.clone();
    info!(addr = %server_addr, "Server starting...");

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(store_data.clone())
            .app_data(mailer_data.clone())
            .app_data(username_index.clone())
            .app_data(Data::new(config.clone()))
            .service(index)
            // Configure auth + protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, &config))
    })
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind {}", server_addr))?
    .run()
    .await?;
    Ok(())
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    let _guard = init_logging(&config.log_level);

    let pool = init_db(&config.database_url)
        .await
        .context("Failed to initialise database")?;
    let store: Arc<dyn Store> = Arc::new(MySqlStore::new(pool));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, store).await,
        Command::CreateAdmin(args) => {
            let user = cli::create_admin(store.as_ref(), args).await?;
            println!("Created admin {} <{}>", user.username, user.email);
            Ok(())
        }
    }
}
