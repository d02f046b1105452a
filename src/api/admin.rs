use chrono::Utc;
use rocket::{response::status::Created, serde::json::Json, Route, State};

use crate::error::Result;
use crate::model::{
    api::{
        auth::{Admin, AuthToken},
        election::{
            ElectionPatch, ElectionResults, ElectionSpec, ElectionSummary, Publication,
            WinnerEntry,
        },
    },
    db::election::ElectionQuery,
    mongodb::Id,
};
use crate::voting::{Publisher, ReconciliationReport, Reconciler, ReconcilerStatus, Voting};

pub fn routes() -> Vec<Route> {
    routes![
        create_election,
        update_election,
        delete_election,
        all_elections,
        publish_results,
        election_results,
        all_winners,
        reconciler_status,
        run_reconciler,
    ]
}

#[post("/votes/admin/create", data = "<spec>", format = "json")]
async fn create_election(
    _token: AuthToken<Admin>,
    spec: Json<ElectionSpec>,
    voting: &State<Voting>,
) -> Result<Created<Json<ElectionSummary>>> {
    let now = Utc::now();
    let election = voting.create_election(spec.0, now).await?;
    let summary = voting.summarize(&election, now).await?;
    let location = uri!(super::voting::election_status(election.id)).to_string();
    Ok(Created::new(location).body(Json(summary)))
}

#[put("/votes/admin/update/<election_id>", data = "<patch>", format = "json")]
async fn update_election(
    _token: AuthToken<Admin>,
    election_id: Id,
    patch: Json<ElectionPatch>,
    voting: &State<Voting>,
) -> Result<Json<ElectionSummary>> {
    let now = Utc::now();
    let election = voting.update_election(election_id, patch.0, now).await?;
    Ok(Json(voting.summarize(&election, now).await?))
}

#[delete("/votes/admin/delete/<election_id>")]
async fn delete_election(
    _token: AuthToken<Admin>,
    election_id: Id,
    voting: &State<Voting>,
) -> Result<()> {
    voting.delete_election(election_id).await
}

#[get("/votes/admin/all")]
async fn all_elections(
    _token: AuthToken<Admin>,
    voting: &State<Voting>,
) -> Result<Json<Vec<ElectionSummary>>> {
    Ok(Json(voting.list_all(Utc::now()).await?))
}

#[post("/votes/admin/publish/<election_id>")]
async fn publish_results(
    token: AuthToken<Admin>,
    election_id: Id,
    voting: &State<Voting>,
) -> Result<Json<Publication>> {
    let publisher = Publisher::Admin {
        id: token.member_id(),
        super_admin: token.is_super_admin(),
    };
    let election = voting
        .publish_results(election_id, publisher, Utc::now())
        .await?;
    Ok(Json(voting.publication(&election).await?))
}

#[get("/votes/admin/results/<election_id>")]
async fn election_results(
    _token: AuthToken<Admin>,
    election_id: Id,
    voting: &State<Voting>,
) -> Result<Json<ElectionResults>> {
    Ok(Json(voting.results(election_id, Utc::now()).await?))
}

/// Every published winner, including early publications still inside their window.
#[get("/votes/admin/winners")]
async fn all_winners(
    _token: AuthToken<Admin>,
    voting: &State<Voting>,
) -> Result<Json<Vec<WinnerEntry>>> {
    Ok(Json(voting.winners(ElectionQuery::Published).await?))
}

#[get("/votes/admin/reconciler")]
async fn reconciler_status(
    _token: AuthToken<Admin>,
    reconciler: &State<Reconciler>,
) -> Json<ReconcilerStatus> {
    Json(reconciler.status().await)
}

#[post("/votes/admin/reconciler/run")]
async fn run_reconciler(
    _token: AuthToken<Admin>,
    reconciler: &State<Reconciler>,
    voting: &State<Voting>,
) -> Json<ReconciliationReport> {
    Json(reconciler.run_now(voting).await)
}
