use chrono::Utc;
use mongodb::{bson::doc, options::FindOptions, Client, Database};
use rocket::{futures::TryStreamExt, serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::{AuthToken, Organizer, Voter},
        candidate::CandidateDescription,
        election::{ElectionDescription, ElectionResults, ElectionSummary},
    },
    db::{
        candidate::Candidate, election::Election, position::Position, results::ResultAggregator,
        stats::ElectionStats, vote::VoteLedger,
    },
    mongodb::{Coll, Id},
};

use super::common::{describe_positions, election_by_id, position_in};

pub fn routes() -> Vec<Route> {
    routes![
        elections_organizer,
        elections_voter,
        election_organizer,
        election_voter,
        candidates_organizer,
        candidates_voter,
        results_organizer,
        results_voter,
    ]
}

/// Most recent elections first.
fn newest_first() -> FindOptions {
    FindOptions::builder()
        .sort(doc! { "start_time": -1, "_id": 1 })
        .build()
}

#[get("/elections", rank = 1)]
async fn elections_organizer(
    _token: AuthToken<Organizer>,
    elections: Coll<Election>,
    db: &State<Database>,
) -> Result<Json<Vec<ElectionSummary>>> {
    let all: Vec<Election> = elections
        .find(None, newest_first())
        .await?
        .try_collect()
        .await?;

    let ids: Vec<Id> = all.iter().map(|election| election.id).collect();
    let counts = ElectionStats::new(db).for_elections(&ids).await?;
    let now = Utc::now();
    let summaries = all
        .into_iter()
        .map(|election| {
            let counts = counts.get(&election.id).copied().unwrap_or_default();
            ElectionSummary::new(election, false, counts, now)
        })
        .collect();
    Ok(Json(summaries))
}

#[get("/elections", rank = 2)]
async fn elections_voter(
    token: AuthToken<Voter>,
    elections: Coll<Election>,
    db: &State<Database>,
) -> Result<Json<Vec<ElectionSummary>>> {
    let filter = doc! {
        "display_election": true,
    };
    let visible: Vec<Election> = elections
        .find(filter, newest_first())
        .await?
        .try_collect()
        .await?;

    let ids: Vec<Id> = visible.iter().map(|election| election.id).collect();
    let counts = ElectionStats::new(db).for_elections(&ids).await?;
    let ledger = VoteLedger::new(db);
    let now = Utc::now();
    let mut summaries = Vec::with_capacity(visible.len());
    for election in visible {
        let has_voted = ledger.has_voted(&token.user_id, election.id).await?;
        let counts = counts.get(&election.id).copied().unwrap_or_default();
        summaries.push(ElectionSummary::new(election, has_voted, counts, now));
    }
    Ok(Json(summaries))
}

#[get("/elections/<election_id>", rank = 1)]
async fn election_organizer(
    _token: AuthToken<Organizer>,
    election_id: Id,
    elections: Coll<Election>,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
    db: &State<Database>,
) -> Result<Json<ElectionDescription>> {
    let election = election_by_id(&elections, election_id, true).await?;
    let counts = ElectionStats::new(db).for_election(election_id).await?;
    let positions = describe_positions(&positions, &candidates, election_id, false).await?;
    Ok(Json(ElectionDescription {
        summary: ElectionSummary::new(election, false, counts, Utc::now()),
        positions,
    }))
}

#[get("/elections/<election_id>", rank = 2)]
async fn election_voter(
    token: AuthToken<Voter>,
    election_id: Id,
    elections: Coll<Election>,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
    db: &State<Database>,
) -> Result<Json<ElectionDescription>> {
    let election = election_by_id(&elections, election_id, false).await?;
    let has_voted = VoteLedger::new(db)
        .has_voted(&token.user_id, election_id)
        .await?;
    let counts = ElectionStats::new(db).for_election(election_id).await?;
    let positions = describe_positions(&positions, &candidates, election_id, true).await?;
    Ok(Json(ElectionDescription {
        summary: ElectionSummary::new(election, has_voted, counts, Utc::now()),
        positions,
    }))
}

async fn list_candidates(
    election_id: Id,
    position_id: Id,
    include_hidden: bool,
    elections: Coll<Election>,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
) -> Result<Json<Vec<CandidateDescription>>> {
    election_by_id(&elections, election_id, include_hidden).await?;
    position_in(&positions, election_id, position_id).await?;

    let mut filter = doc! {
        "position_id": position_id,
    };
    if !include_hidden {
        filter.insert("approved", true);
    }
    let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
    let standing = candidates
        .find(filter, options)
        .await?
        .map_ok(CandidateDescription::from)
        .try_collect()
        .await?;
    Ok(Json(standing))
}

#[get("/elections/<election_id>/positions/<position_id>/candidates", rank = 1)]
async fn candidates_organizer(
    _token: AuthToken<Organizer>,
    election_id: Id,
    position_id: Id,
    elections: Coll<Election>,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
) -> Result<Json<Vec<CandidateDescription>>> {
    list_candidates(election_id, position_id, true, elections, positions, candidates).await
}

#[get("/elections/<election_id>/positions/<position_id>/candidates", rank = 2)]
async fn candidates_voter(
    _token: AuthToken<Voter>,
    election_id: Id,
    position_id: Id,
    elections: Coll<Election>,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
) -> Result<Json<Vec<CandidateDescription>>> {
    list_candidates(election_id, position_id, false, elections, positions, candidates).await
}

#[get("/elections/<election_id>/results", rank = 1)]
async fn results_organizer(
    _token: AuthToken<Organizer>,
    election_id: Id,
    elections: Coll<Election>,
    db_client: &State<Client>,
    db: &State<Database>,
) -> Result<Json<ElectionResults>> {
    let election = election_by_id(&elections, election_id, true).await?;
    let results = ResultAggregator::new(db_client, db)
        .results(&election, Utc::now())
        .await?;
    Ok(Json(results))
}

#[get("/elections/<election_id>/results", rank = 2)]
async fn results_voter(
    _token: AuthToken<Voter>,
    election_id: Id,
    elections: Coll<Election>,
    db_client: &State<Client>,
    db: &State<Database>,
) -> Result<Json<ElectionResults>> {
    let election = election_by_id(&elections, election_id, false).await?;
    if !election.results_visible() {
        return Err(Error::not_found(format!(
            "Results of election {election_id}"
        )));
    }
    let results = ResultAggregator::new(db_client, db)
        .results(&election, Utc::now())
        .await?;
    Ok(Json(results))
}

#[cfg(test)]
mod tests {
    use rocket::{http::Status, local::asynchronous::Client};

    use super::*;
    use crate::api::test_util::{
        expect, first_year_cse, insert_candidate, insert_election, insert_position, organizer,
        send_json, voter,
    };
    use crate::model::{
        api::{id::ApiId, vote::VoteIntent},
        common::election::{ElectionPhase, RestrictionSet},
        db::election::NewElection,
    };

    #[backend_test]
    async fn listings_depend_on_audience(client: Client, db: Database) {
        let current = insert_election(&db, NewElection::current_example()).await;
        let mut hidden = NewElection::future_example();
        hidden.display_election = false;
        let hidden = insert_election(&db, hidden).await;
        let position = insert_position(&db, &current, "President", RestrictionSet::default()).await;
        let alice = insert_candidate(&db, &position, "Alice", "21B001", true).await;
        insert_candidate(&db, &position, "Carol", "21B003", false).await;

        let email = first_year_cse(5);
        let response = client
            .get("/elections")
            .cookie(voter(&client, "voter-1", &email))
            .dispatch()
            .await;
        let listed: Vec<ElectionSummary> = expect(response, Status::Ok).await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, ApiId::from(current.id));
        assert!(listed[0].is_active);
        assert!(!listed[0].has_voted);
        assert_eq!(listed[0].candidates_count, 2);
        assert_eq!(listed[0].votes_count, 0);

        let response = client
            .get("/elections")
            .cookie(organizer(&client))
            .dispatch()
            .await;
        let listed: Vec<ElectionSummary> = expect(response, Status::Ok).await;
        assert_eq!(listed.len(), 2);
        // Newest first.
        assert_eq!(listed[0].id, ApiId::from(hidden.id));
        assert_eq!(listed[0].candidates_count, 0);
        assert_eq!(listed[1].candidates_count, 2);

        // Voters only see approved candidates; organizers see everyone.
        let response = client
            .get(format!("/elections/{}", current.id))
            .cookie(voter(&client, "voter-1", &email))
            .dispatch()
            .await;
        let description: ElectionDescription = expect(response, Status::Ok).await;
        assert_eq!(description.positions[0].candidates.len(), 1);
        let response = client
            .get(format!("/elections/{}", current.id))
            .cookie(organizer(&client))
            .dispatch()
            .await;
        let description: ElectionDescription = expect(response, Status::Ok).await;
        assert_eq!(description.positions[0].candidates.len(), 2);

        // Voting flips `has_voted`.
        let intents = [VoteIntent {
            candidate: alice.id.into(),
            position: Some(position.id.into()),
        }];
        let response = send_json(
            &client,
            rocket::http::Method::Post,
            "/votes".to_string(),
            voter(&client, "voter-1", &email),
            &intents,
        )
        .await;
        assert_eq!(response.status(), Status::Ok);
        let response = client
            .get(format!("/elections/{}", current.id))
            .cookie(voter(&client, "voter-1", &email))
            .dispatch()
            .await;
        let description: ElectionDescription = expect(response, Status::Ok).await;
        assert!(description.summary.has_voted);
        assert_eq!(description.summary.votes_count, 1);
        assert_eq!(description.summary.candidates_count, 2);

        let response = client
            .get(format!("/elections/{}", hidden.id))
            .cookie(voter(&client, "voter-1", &email))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);
    }

    #[backend_test]
    async fn results_visibility(client: Client, db: Database) {
        let current = insert_election(&db, NewElection::current_example()).await;
        let finished = insert_election(&db, NewElection::past_example()).await;
        let position = insert_position(&db, &finished, "President", RestrictionSet::default()).await;
        insert_candidate(&db, &position, "Alice", "21B001", true).await;

        let cookie = voter(&client, "voter-1", &first_year_cse(5));
        let response = client
            .get(format!("/elections/{}/results", current.id))
            .cookie(cookie.clone())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);

        let response = client
            .get(format!("/elections/{}/results", current.id))
            .cookie(organizer(&client))
            .dispatch()
            .await;
        let results: ElectionResults = expect(response, Status::Ok).await;
        assert_eq!(results.phase, ElectionPhase::Active);
        assert!(results.positions.is_empty());

        let response = client
            .get(format!("/elections/{}/results", finished.id))
            .cookie(cookie.clone())
            .dispatch()
            .await;
        let first: ElectionResults = expect(response, Status::Ok).await;
        assert_eq!(first.positions.len(), 1);
        assert_eq!(first.positions[0].candidates[0].vote_count, 0);

        let response = client
            .get(format!("/elections/{}/results", finished.id))
            .cookie(cookie)
            .dispatch()
            .await;
        let second: ElectionResults = expect(response, Status::Ok).await;
        assert_eq!(first.digest, second.digest);
    }

    #[backend_test]
    async fn anonymous_requests_are_unauthorized(client: Client) {
        let response = client.get("/elections").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
        let body: crate::error::ErrorBody = expect(response, Status::Unauthorized).await;
        assert_eq!(body.reason, "Unauthorized");
    }
}
