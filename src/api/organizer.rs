use chrono::Utc;
use mongodb::{bson::doc, Client, Database};
use rocket::{serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::{AuthToken, Organizer},
        candidate::{CandidateDescription, CandidateSpec},
        election::{DisplayFlags, ElectionSpec, ElectionSummary},
        position::{PositionDescription, PositionSpec},
    },
    common::election::ElectionPhase,
    db::{
        candidate::{CandidacyRegistry, Candidate},
        election::{Election, NewElection},
        position::{NewPosition, Position},
        stats::{ElectionCounts, ElectionStats},
        vote::Vote,
    },
    mongodb::{Coll, Id},
};

use super::common::{candidate_in, election_by_id, position_in, require_upcoming};

pub fn routes() -> Vec<Route> {
    routes![
        create_election,
        modify_election,
        set_display,
        delete_election,
        create_position,
        modify_position,
        delete_position,
        register_candidate,
        modify_candidate,
        approve_candidate,
        delete_candidate,
    ]
}

#[post("/elections", data = "<spec>", format = "json")]
async fn create_election(
    token: AuthToken<Organizer>,
    spec: Json<ElectionSpec>,
    elections: Coll<Election>,
) -> Result<Json<ElectionSummary>> {
    spec.validate()?;
    let election = Election {
        id: Id::new(),
        election: spec.0.into_election(&token.user_id),
    };
    elections.insert_one(&election, None).await?;
    info!(
        "{} created election '{}' ({})",
        token.user_id, election.title, election.id
    );
    let counts = ElectionCounts::default();
    Ok(Json(ElectionSummary::new(election, false, counts, Utc::now())))
}

#[put("/elections/<election_id>", data = "<spec>", format = "json")]
async fn modify_election(
    _token: AuthToken<Organizer>,
    election_id: Id,
    spec: Json<ElectionSpec>,
    elections: Coll<Election>,
    new_elections: Coll<NewElection>,
    votes: Coll<Vote>,
    db: &State<Database>,
) -> Result<Json<ElectionSummary>> {
    let existing = election_by_id(&elections, election_id, true).await?;
    require_upcoming(&existing, "modify election")?;
    let filter = doc! {
        "election_id": election_id,
    };
    if votes.find_one(filter, None).await?.is_some() {
        return Err(Error::ElectionLocked(format!(
            "election '{}' already has votes",
            existing.title
        )));
    }
    spec.validate()?;

    let election = spec.0.into_election(&existing.created_by);
    new_elections
        .replace_one(election_id.as_doc(), &election, None)
        .await?;
    let election = Election {
        id: election_id,
        election,
    };
    let counts = ElectionStats::new(db).for_election(election_id).await?;
    Ok(Json(ElectionSummary::new(election, false, counts, Utc::now())))
}

#[patch("/elections/<election_id>/display", data = "<flags>", format = "json")]
async fn set_display(
    _token: AuthToken<Organizer>,
    election_id: Id,
    flags: Json<DisplayFlags>,
    elections: Coll<Election>,
    db: &State<Database>,
) -> Result<Json<ElectionSummary>> {
    let update = flags
        .as_update()
        .ok_or_else(|| Error::BadRequest("no display flags given".to_string()))?;
    let result = elections
        .update_one(election_id.as_doc(), update, None)
        .await?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!("Election {election_id}")));
    }
    let election = election_by_id(&elections, election_id, true).await?;
    let counts = ElectionStats::new(db).for_election(election_id).await?;
    Ok(Json(ElectionSummary::new(election, false, counts, Utc::now())))
}

#[delete("/elections/<election_id>")]
#[allow(clippy::too_many_arguments)]
async fn delete_election(
    token: AuthToken<Organizer>,
    election_id: Id,
    elections: Coll<Election>,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
    db_client: &State<Client>,
) -> Result<()> {
    let election = election_by_id(&elections, election_id, true).await?;
    if election.phase() == ElectionPhase::Active {
        return Err(Error::ElectionLocked(format!(
            "cannot delete '{}' while voting is open",
            election.title
        )));
    }

    // Atomically delete the election and everything it owns.
    {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;

        let filter = doc! {
            "election_id": election_id,
        };
        votes
            .delete_many_with_session(filter.clone(), None, &mut session)
            .await?;
        candidates
            .delete_many_with_session(filter.clone(), None, &mut session)
            .await?;
        positions
            .delete_many_with_session(filter, None, &mut session)
            .await?;
        elections
            .delete_one_with_session(election_id.as_doc(), None, &mut session)
            .await?;

        session.commit_transaction().await?;
    }

    info!(
        "{} deleted election '{}' ({election_id})",
        token.user_id, election.title
    );
    Ok(())
}

#[post("/elections/<election_id>/positions", data = "<spec>", format = "json")]
async fn create_position(
    _token: AuthToken<Organizer>,
    election_id: Id,
    spec: Json<PositionSpec>,
    elections: Coll<Election>,
    positions: Coll<Position>,
) -> Result<Json<PositionDescription>> {
    let election = election_by_id(&elections, election_id, true).await?;
    require_upcoming(&election, "add positions")?;
    spec.validate()?;

    let position = Position {
        id: Id::new(),
        position: spec.0.into_position(election_id),
    };
    positions.insert_one(&position, None).await?;
    Ok(Json(PositionDescription::new(position, Vec::new())))
}

#[put(
    "/elections/<election_id>/positions/<position_id>",
    data = "<spec>",
    format = "json"
)]
async fn modify_position(
    _token: AuthToken<Organizer>,
    election_id: Id,
    position_id: Id,
    spec: Json<PositionSpec>,
    elections: Coll<Election>,
    new_positions: Coll<NewPosition>,
) -> Result<Json<PositionDescription>> {
    let election = election_by_id(&elections, election_id, true).await?;
    require_upcoming(&election, "modify positions")?;
    spec.validate()?;

    let filter = doc! {
        "_id": position_id,
        "election_id": election_id,
    };
    let position = spec.0.into_position(election_id);
    let result = new_positions.replace_one(filter, &position, None).await?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!("Position {position_id}")));
    }
    let position = Position {
        id: position_id,
        position,
    };
    Ok(Json(PositionDescription::new(position, Vec::new())))
}

#[delete("/elections/<election_id>/positions/<position_id>")]
#[allow(clippy::too_many_arguments)]
async fn delete_position(
    _token: AuthToken<Organizer>,
    election_id: Id,
    position_id: Id,
    elections: Coll<Election>,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
    db_client: &State<Client>,
) -> Result<()> {
    let election = election_by_id(&elections, election_id, true).await?;
    require_upcoming(&election, "delete positions")?;
    position_in(&positions, election_id, position_id).await?;

    let mut session = db_client.start_session(None).await?;
    session.start_transaction(None).await?;
    let filter = doc! {
        "position_id": position_id,
    };
    votes
        .delete_many_with_session(filter.clone(), None, &mut session)
        .await?;
    candidates
        .delete_many_with_session(filter, None, &mut session)
        .await?;
    positions
        .delete_one_with_session(position_id.as_doc(), None, &mut session)
        .await?;
    session.commit_transaction().await?;
    Ok(())
}

#[post(
    "/elections/<election_id>/positions/<position_id>/candidates",
    data = "<spec>",
    format = "json",
    rank = 1
)]
#[allow(clippy::too_many_arguments)]
async fn register_candidate(
    token: AuthToken<Organizer>,
    election_id: Id,
    position_id: Id,
    spec: Json<CandidateSpec>,
    elections: Coll<Election>,
    positions: Coll<Position>,
    db_client: &State<Client>,
    db: &State<Database>,
) -> Result<Json<CandidateDescription>> {
    let election = election_by_id(&elections, election_id, true).await?;
    require_upcoming(&election, "register candidates")?;
    let position = position_in(&positions, election_id, position_id).await?;
    spec.validate()?;

    let approved = spec.approved.unwrap_or(true);
    let candidate = spec.0.into_candidate(&position, approved, &token.user_id);
    let candidate = CandidacyRegistry::new(db_client, db)
        .register(candidate)
        .await?;
    Ok(Json(candidate.into()))
}

#[put(
    "/elections/<election_id>/positions/<position_id>/candidates/<candidate_id>",
    data = "<spec>",
    format = "json"
)]
#[allow(clippy::too_many_arguments)]
async fn modify_candidate(
    _token: AuthToken<Organizer>,
    election_id: Id,
    position_id: Id,
    candidate_id: Id,
    spec: Json<CandidateSpec>,
    elections: Coll<Election>,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
    db_client: &State<Client>,
    db: &State<Database>,
) -> Result<Json<CandidateDescription>> {
    let election = election_by_id(&elections, election_id, true).await?;
    require_upcoming(&election, "modify candidates")?;
    let position = position_in(&positions, election_id, position_id).await?;
    let existing = candidate_in(&candidates, position_id, candidate_id).await?;
    spec.validate()?;

    let approved = spec.approved.unwrap_or(existing.approved);
    let candidate = spec
        .0
        .into_candidate(&position, approved, &existing.registered_by);
    let candidate = CandidacyRegistry::new(db_client, db)
        .update(candidate_id, candidate)
        .await?;
    Ok(Json(candidate.into()))
}

#[post("/elections/<election_id>/positions/<position_id>/candidates/<candidate_id>/approve")]
async fn approve_candidate(
    token: AuthToken<Organizer>,
    election_id: Id,
    position_id: Id,
    candidate_id: Id,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
) -> Result<Json<CandidateDescription>> {
    let election = election_by_id(&elections, election_id, true).await?;
    let phase = election.phase();
    if phase == ElectionPhase::Completed {
        return Err(Error::ElectionLocked(format!(
            "cannot approve candidates: election '{}' is {phase:?}",
            election.title
        )));
    }

    let filter = doc! {
        "_id": candidate_id,
        "position_id": position_id,
        "election_id": election_id,
    };
    let update = doc! {
        "$set": {
            "approved": true,
        }
    };
    let result = candidates.update_one(filter, update, None).await?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!("Candidate {candidate_id}")));
    }
    let candidate = candidate_in(&candidates, position_id, candidate_id).await?;
    info!(
        "{} approved candidate {} for position {position_id}",
        token.user_id, candidate.roll_no
    );
    Ok(Json(candidate.into()))
}

#[delete("/elections/<election_id>/positions/<position_id>/candidates/<candidate_id>")]
async fn delete_candidate(
    _token: AuthToken<Organizer>,
    election_id: Id,
    position_id: Id,
    candidate_id: Id,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
) -> Result<()> {
    let election = election_by_id(&elections, election_id, true).await?;
    require_upcoming(&election, "delete candidates")?;

    let filter = doc! {
        "_id": candidate_id,
        "position_id": position_id,
        "election_id": election_id,
    };
    let result = candidates.delete_one(filter, None).await?;
    if result.deleted_count == 0 {
        return Err(Error::not_found(format!("Candidate {candidate_id}")));
    }
    Ok(())
}
