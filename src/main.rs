use std::sync::Arc;

use anyhow::Context;

use sprintdesk::{api, auth, config::Config, db, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();

    let _log_guard = logging::init_logging(&config.log_dir)?;
    tracing::info!("Sprintdesk starting up...");

    if config.jwt_secret_generated {
        tracing::warn!("SPRINTDESK_JWT_SECRET not set; using a random secret, tokens will not survive a restart");
    }

    let database = Arc::new(
        db::Database::open(config.db_path.clone()).context("Failed to open database")?,
    );

    match (&config.admin_email, &config.admin_password) {
        (Some(email), Some(password)) => {
            auth::ensure_admin(&database, email, password, config.bcrypt_cost)
                .context("Failed to seed admin user")?;
        }
        _ if database.count_users()? == 0 => {
            tracing::warn!(
                "No users exist; set SPRINTDESK_ADMIN_EMAIL and SPRINTDESK_ADMIN_PASSWORD to create the first admin"
            );
        }
        _ => {}
    }

    let handle = api::start_server(database, &config).await?;
    tracing::info!("API server started at {}", handle.addr);

    tokio::signal::ctrl_c().await.context("Failed to listen for shutdown signal")?;
    handle.shutdown().await;

    tracing::info!("Sprintdesk stopped");
    Ok(())
}
