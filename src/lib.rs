#[macro_use]
extern crate log;
#[macro_use]
extern crate rocket;

use rocket::{Build, Rocket};

use crate::config::{ConfigFairing, DatabaseFairing};
use crate::voting::ReconcilerFairing;

pub mod api;
pub mod config;
pub mod error;
pub mod model;
pub mod retry;
pub mod scheduled_task;
pub mod voting;

/// Assemble the server. Fairings attach in order: configuration, then the
/// database and voting service, then the reconciler that depends on both.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(ReconcilerFairing)
        .mount("/", api::routes())
}

/// Shared harness for route tests: the full API over an in-memory service.
#[cfg(test)]
mod test_support {
    use chrono::Duration;
    use rocket::{http::Cookie, local::asynchronous::Client};

    use crate::config::Config;
    use crate::model::{
        api::auth::{AuthToken, Rights, Voter},
        mongodb::Id,
    };
    use crate::voting::{examples::TestVoting, Reconciler, ReconcilerFairing};

    pub fn init_logging() {
        log4rs_test_utils::test_logging::init_logging_once_for(["chapel_votes"], None, None);
    }

    /// A client for the API over `test`'s store, once the reconciler's first
    /// run has finished.
    pub async fn client_for(test: &TestVoting) -> Client {
        init_logging();
        let rocket = rocket::build()
            .manage(Config::example())
            .manage(test.voting.clone())
            .attach(ReconcilerFairing)
            .mount("/", super::api::routes());
        let client = Client::tracked(rocket)
            .await
            .expect("valid rocket instance");

        if let Some(reconciler) = client.rocket().state::<Reconciler>() {
            for _ in 0..200 {
                if reconciler.last_report().await.is_some() {
                    break;
                }
                rocket::tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        }
        client
    }

    /// A signed auth cookie for the given principal.
    pub fn auth_cookie(id: Id, rights: Rights) -> Cookie<'static> {
        AuthToken::<Voter>::new(id, rights).into_cookie(&Config::example())
    }

    pub fn member_cookie() -> (Id, Cookie<'static>) {
        let id = Id::new();
        (id, auth_cookie(id, Rights::Member))
    }

    pub fn admin_cookie() -> Cookie<'static> {
        auth_cookie(Id::new(), Rights::Admin)
    }

    pub fn super_admin_cookie() -> Cookie<'static> {
        auth_cookie(Id::new(), Rights::SuperAdmin)
    }

    /// A point comfortably in the future, for request bodies.
    pub fn next_week() -> chrono::DateTime<chrono::Utc> {
        chrono::Utc::now() + Duration::days(7)
    }
}
