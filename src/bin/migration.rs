//! Applies or rolls back the schema without starting the server.
//!
//! Usage: `migration [up|down|status]` (defaults to `up`).

use sea_orm_migration::MigratorTrait;
use tracing::info;

use fulfillment_api::{config, db, migrator::Migrator};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config::load_config()?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    let pool = db::establish_connection_from_app_config(&cfg).await?;
    let action = std::env::args().nth(1).unwrap_or_else(|| "up".to_string());

    match action.as_str() {
        "up" => {
            Migrator::up(&pool, None).await?;
            info!("migrations applied");
        }
        "down" => {
            Migrator::down(&pool, Some(1)).await?;
            info!("last migration rolled back");
        }
        "status" => Migrator::status(&pool).await?,
        other => return Err(format!("unknown action '{}'; expected up, down or status", other).into()),
    }

    Ok(())
}
