use std::sync::Arc;

use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    tokio::time::Duration,
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::{
    db::{election::MongoStore, member::MongoDirectory},
    mongodb::ensure_indexes_exist,
};
use crate::retry::RetryPolicy;
use crate::voting::Voting;

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    #[serde(default = "default_reconcile_interval")]
    reconcile_interval: u64,
    #[serde(default = "default_store_retries")]
    store_retries: u32,
    #[serde(default = "default_store_retry_delay_ms")]
    store_retry_delay_ms: u64,
    // secrets
    jwt_secret: String,
}

fn default_reconcile_interval() -> u64 {
    3600
}

fn default_store_retries() -> u32 {
    3
}

fn default_store_retry_delay_ms() -> u64 {
    100
}

impl Config {
    /// How often the reconciler looks for closed elections.
    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval.max(1))
    }

    /// Backoff applied to store calls that fail transiently.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.store_retries,
            Duration::from_millis(self.store_retry_delay_ms),
        )
    }

    /// Secret key used to verify JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }
}

/// Example data for tests.
#[cfg(test)]
pub mod examples {
    use super::*;

    impl Config {
        pub fn example() -> Self {
            Self {
                reconcile_interval: 3600,
                store_retries: 2,
                store_retry_delay_ms: 1,
                jwt_secret: "chapel-test-secret".to_string(),
            }
        }
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // non-secrets
    #[serde(default = "default_db_name")]
    db_name: String,
    // secrets
    db_uri: String,
}

fn default_db_name() -> String {
    "chapel".to_string()
}

/// A fairing that loads the MongoDB config, connects to the database,
/// performs any setup necessary, and places the [`Voting`] service over it
/// into managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        // Construct the connection.
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&config.db_name);

        // Ensure the required indexes exist.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to connect to database: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        // The retry policy comes from the application config, if it loaded.
        let retry = rocket
            .state::<Config>()
            .map(Config::retry_policy)
            .unwrap_or_default();
        let voting = Voting::new(
            Arc::new(MongoStore::new(&db)),
            Arc::new(MongoDirectory::new(&db)),
            retry,
        );

        // Manage the state.
        rocket = rocket.manage(voting);
        Ok(rocket)
    }
}
