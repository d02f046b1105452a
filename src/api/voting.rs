use chrono::Utc;
use rocket::{serde::json::Json, Route, State};

use crate::error::Result;
use crate::model::{
    api::{
        auth::{AuthToken, Voter},
        ballot::BallotSpec,
        election::{ElectionStatusView, MemberElection, WinnerEntry},
    },
    db::election::ElectionQuery,
    mongodb::Id,
};
use crate::voting::Voting;

pub fn routes() -> Vec<Route> {
    routes![
        cast_ballot,
        current_elections,
        active_election,
        election_status,
        published_winners,
    ]
}

#[post("/votes/cast", data = "<ballot>", format = "json")]
async fn cast_ballot(
    token: AuthToken<Voter>,
    ballot: Json<BallotSpec>,
    voting: &State<Voting>,
) -> Result<Json<MemberElection>> {
    let now = Utc::now();
    let member = token.member_id();
    let election = voting
        .cast_ballot(ballot.election_id, member, ballot.candidate_id, now)
        .await?;
    Ok(Json(voting.member_view(&election, member, now).await?))
}

#[get("/votes/current")]
async fn current_elections(
    token: AuthToken<Voter>,
    voting: &State<Voting>,
) -> Result<Json<Vec<MemberElection>>> {
    Ok(Json(
        voting
            .list_for_member(token.member_id(), Utc::now())
            .await?,
    ))
}

#[get("/votes/active")]
async fn active_election(
    token: AuthToken<Voter>,
    voting: &State<Voting>,
) -> Result<Json<MemberElection>> {
    Ok(Json(
        voting
            .active_for_member(token.member_id(), Utc::now())
            .await?,
    ))
}

#[get("/votes/<election_id>/status")]
pub(super) async fn election_status(
    _token: AuthToken<Voter>,
    election_id: Id,
    voting: &State<Voting>,
) -> Result<Json<ElectionStatusView>> {
    Ok(Json(voting.status(election_id, Utc::now()).await?))
}

/// Winners of elections whose voting has closed.
#[get("/votes/winners")]
async fn published_winners(
    _token: AuthToken<Voter>,
    voting: &State<Voting>,
) -> Result<Json<Vec<WinnerEntry>>> {
    let winners = voting
        .winners(ElectionQuery::PublishedBefore(Utc::now()))
        .await?;
    Ok(Json(winners))
}
