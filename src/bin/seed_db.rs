use domain::identity;
use log::{error, info};
use migration::{Migrator, MigratorTrait};
use service::{config::Config, logging::Logger};

const SEEDED_USERS: [&str; 4] = ["alice", "bob", "carol", "dave"];

#[tokio::main]
async fn main() {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to initialize logger: {e}");
    }

    info!(
        "Seeding database [{}]...",
        config.database_url().unwrap_or("<unset>")
    );

    let db = match service::init_database(&config).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to establish database connection: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = Migrator::up(&db, None).await {
        error!("Failed to run database migrations: {e}");
        std::process::exit(1);
    }

    if let Err(e) = entity_api::seed_database(&db).await {
        error!("Failed to seed database: {e:?}");
        std::process::exit(1);
    }

    // Development tokens so the seeded users can call the API right away
    for user_id in SEEDED_USERS {
        match identity::issue_token(config.jwt_secret(), user_id, chrono::Duration::days(30)) {
            Ok(token) => println!("{user_id}: {token}"),
            Err(e) => error!("Failed to issue a token for {user_id}: {e:?}"),
        }
    }
}
