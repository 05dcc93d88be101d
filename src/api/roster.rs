use mongodb::Client;
use rocket::{serde::json::Json, Route, State};

use crate::error::Result;
use crate::model::{
    api::{
        auth::{AuthToken, Organizer},
        roster::RosterStatus,
    },
    db::roster::{RosterEntry, VoterRoster},
    mongodb::Coll,
};

pub fn routes() -> Vec<Route> {
    routes![get_roster, replace_roster, refresh_roster]
}

#[get("/roster")]
async fn get_roster(
    _token: AuthToken<Organizer>,
    roster: &State<VoterRoster>,
) -> Json<RosterStatus> {
    Json(RosterStatus {
        entries: roster.len().await,
    })
}

#[put("/roster", data = "<entries>", format = "json")]
async fn replace_roster(
    token: AuthToken<Organizer>,
    entries: Json<Vec<RosterEntry>>,
    entries_coll: Coll<RosterEntry>,
    roster: &State<VoterRoster>,
    db_client: &State<Client>,
) -> Result<Json<RosterStatus>> {
    let count = roster
        .replace(db_client, &entries_coll, entries.into_inner())
        .await?;
    info!("{} replaced the voter roster ({count} entries)", token.user_id);
    Ok(Json(RosterStatus { entries: count }))
}

#[post("/roster/refresh")]
async fn refresh_roster(
    _token: AuthToken<Organizer>,
    entries: Coll<RosterEntry>,
    roster: &State<VoterRoster>,
) -> Result<Json<RosterStatus>> {
    let count = roster.refresh(&entries).await?;
    Ok(Json(RosterStatus { entries: count }))
}
