use mongodb::{bson::doc, Client, Database};
use rocket::{futures::TryStreamExt, serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::logging::RequestId;
use crate::model::{
    api::{
        auth::{AuthToken, Voter},
        candidate::{CandidateDescription, CandidateSpec},
        position::{EligibleBallot, EligiblePosition, PositionDescription},
        vote::{BatchFailure, VoteIntent, VoteReceipt},
    },
    common::{election::ElectionPhase, identity::IdentityDecoder},
    db::{
        candidate::{normalise_roll_no, CandidacyRegistry, Candidate},
        election::Election,
        position::Position,
        roster::VoterRoster,
        vote::VoteLedger,
    },
    mongodb::{Coll, Id},
};

use super::common::{election_by_id, position_in, voter_identity};

pub fn routes() -> Vec<Route> {
    routes![eligible_positions, register_self, cast_votes, my_votes]
}

#[get("/elections/<election_id>/positions/eligible")]
#[allow(clippy::too_many_arguments)]
async fn eligible_positions(
    token: AuthToken<Voter>,
    election_id: Id,
    elections: Coll<Election>,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
    roster: &State<VoterRoster>,
    decoder: &State<IdentityDecoder>,
    db: &State<Database>,
) -> Result<Json<EligibleBallot>> {
    let identity = voter_identity(&token, roster, decoder).await?;
    election_by_id(&elections, election_id, false).await?;

    let filter = doc! {
        "election_id": election_id,
    };
    let mut open: Vec<Position> = positions
        .find(filter, None)
        .await?
        .try_filter(|position| std::future::ready(position.restrictions.check(&identity).is_ok()))
        .try_collect()
        .await?;
    open.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));

    let ledger = VoteLedger::new(db);
    let mut eligible = Vec::with_capacity(open.len());
    for position in open {
        let filter = doc! {
            "position_id": position.id,
            "approved": true,
        };
        let mut standing: Vec<Candidate> = candidates.find(filter, None).await?.try_collect().await?;
        standing.sort_by_key(|c| c.id);
        let used = ledger.slots_used(&token.user_id, position.id).await?.len() as u32;
        let votes_remaining = position.max_votes_per_voter.saturating_sub(used);
        let standing = standing.into_iter().map(CandidateDescription::from).collect();
        eligible.push(EligiblePosition {
            position: PositionDescription::new(position, standing),
            votes_remaining,
        });
    }

    Ok(Json(EligibleBallot {
        voter: identity,
        positions: eligible,
    }))
}

#[post(
    "/elections/<election_id>/positions/<position_id>/candidates",
    data = "<spec>",
    format = "json",
    rank = 2
)]
#[allow(clippy::too_many_arguments)]
async fn register_self(
    token: AuthToken<Voter>,
    election_id: Id,
    position_id: Id,
    spec: Json<CandidateSpec>,
    elections: Coll<Election>,
    positions: Coll<Position>,
    roster: &State<VoterRoster>,
    decoder: &State<IdentityDecoder>,
    db_client: &State<Client>,
    db: &State<Database>,
) -> Result<Json<CandidateDescription>> {
    spec.validate()?;
    let election = election_by_id(&elections, election_id, false).await?;
    let phase = election.phase();
    if phase != ElectionPhase::Active {
        return Err(Error::ElectionNotActive(format!(
            "candidates can only register themselves while '{}' is active, not {phase:?}",
            election.title
        )));
    }
    let position = position_in(&positions, election_id, position_id).await?;

    // Voters may only stand as themselves.
    let identity = voter_identity(&token, roster, decoder).await?;
    if normalise_roll_no(&spec.roll_no) != identity.roll_no {
        return Err(Error::BadRequest(format!(
            "roll number {} does not belong to {}",
            spec.roll_no.trim(),
            identity.email
        )));
    }
    let mut spec = spec.into_inner();
    spec.branch = identity.branch;
    spec.degree = Some(identity.degree);

    let candidate = spec.into_candidate(&position, false, &token.user_id);
    let candidate = CandidacyRegistry::new(db_client, db)
        .register(candidate)
        .await?;
    Ok(Json(candidate.into()))
}

#[post("/votes", data = "<intents>", format = "json")]
async fn cast_votes(
    token: AuthToken<Voter>,
    intents: Json<Vec<VoteIntent>>,
    roster: &State<VoterRoster>,
    decoder: &State<IdentityDecoder>,
    db: &State<Database>,
    req_id: &RequestId,
) -> std::result::Result<Json<Vec<VoteReceipt>>, BatchFailure> {
    if intents.is_empty() {
        return Err(Error::BadRequest("no vote intents submitted".to_string()).into());
    }
    let identity = voter_identity(&token, roster, decoder).await?;

    let outcome = VoteLedger::new(db)
        .cast_batch(&token.user_id, &identity, &intents)
        .await;
    let committed: Vec<VoteReceipt> = outcome.committed.into_iter().map(Into::into).collect();
    if !committed.is_empty() {
        info!(
            "req{req_id}: {} recorded {} of {} vote(s)",
            token.user_id,
            committed.len(),
            intents.len()
        );
    }

    match outcome.failure {
        None => Ok(Json(committed)),
        Some((index, error)) => Err(BatchFailure {
            error,
            intent: Some(index),
            committed,
        }),
    }
}

#[get("/votes?<election_id>")]
async fn my_votes(
    token: AuthToken<Voter>,
    election_id: Option<Id>,
    db: &State<Database>,
) -> Result<Json<Vec<VoteReceipt>>> {
    let votes = VoteLedger::new(db)
        .votes_by(&token.user_id, election_id)
        .await?;
    Ok(Json(votes.into_iter().map(Into::into).collect()))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{Method, Status},
        local::asynchronous::Client,
        serde::json::Value,
    };

    use super::*;
    use crate::api::test_util::{
        expect, first_year_cse, first_year_ee, first_year_roll, insert_candidate, insert_election,
        insert_position, send_json, voter,
    };
    use crate::error::ErrorBody;
    use crate::model::{
        api::{id::ApiId, vote::BatchFailureBody},
        common::election::RestrictionSet,
        db::election::NewElection,
    };

    fn intent(candidate: &Candidate) -> VoteIntent {
        VoteIntent {
            candidate: candidate.id.into(),
            position: None,
        }
    }

    async fn cast<'c>(
        client: &'c Client,
        user_id: &str,
        email: &str,
        intents: &[VoteIntent],
    ) -> rocket::local::asynchronous::LocalResponse<'c> {
        send_json(
            client,
            Method::Post,
            "/votes".to_string(),
            voter(client, user_id, email),
            &intents,
        )
        .await
    }

    #[backend_test]
    async fn eligibility_shapes_the_ballot(client: Client, db: Database) {
        let election = insert_election(&db, NewElection::current_example()).await;
        let president = insert_position(&db, &election, "President", RestrictionSet::default()).await;
        let freshers = RestrictionSet {
            batch_restriction: vec!["1st Year".to_string()],
            branch_restriction: vec!["CSE".to_string()],
            ..RestrictionSet::default()
        };
        insert_position(&db, &election, "CSE Freshers Rep", freshers).await;
        let electrical = RestrictionSet {
            branch_restriction: vec!["EE".to_string()],
            ..RestrictionSet::default()
        };
        insert_position(&db, &election, "EE Rep", electrical).await;
        let alice = insert_candidate(&db, &president, "Alice", "21B001", true).await;
        insert_candidate(&db, &president, "Carol", "21B003", false).await;

        let email = first_year_cse(45);
        let uri = format!("/elections/{}/positions/eligible", election.id);
        let response = client
            .get(uri.clone())
            .cookie(voter(&client, "voter-1", &email))
            .dispatch()
            .await;
        let ballot: Value = expect(response, Status::Ok).await;
        assert_eq!(ballot["voter"]["branch"], "CSE");
        assert_eq!(ballot["voter"]["academic_status"], "1st Year");
        let titles: Vec<&str> = ballot["positions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["CSE Freshers Rep", "President"]);
        let president_entry = &ballot["positions"][1];
        assert_eq!(president_entry["votes_remaining"], 1);
        assert_eq!(president_entry["candidates"].as_array().unwrap().len(), 1);

        let response = cast(&client, "voter-1", &email, &[intent(&alice)]).await;
        let receipts: Vec<VoteReceipt> = expect(response, Status::Ok).await;
        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].candidate_id, ApiId::from(alice.id));

        let response = client
            .get(uri)
            .cookie(voter(&client, "voter-1", &email))
            .dispatch()
            .await;
        let ballot: Value = expect(response, Status::Ok).await;
        assert_eq!(ballot["positions"][1]["votes_remaining"], 0);

        let response = client
            .get(format!("/votes?election_id={}", election.id))
            .cookie(voter(&client, "voter-1", &email))
            .dispatch()
            .await;
        let mine: Vec<VoteReceipt> = expect(response, Status::Ok).await;
        // Stored timestamps are truncated to milliseconds, so compare IDs.
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, receipts[0].id);
    }

    #[backend_test]
    async fn ineligible_and_undecodable_voters(client: Client, db: Database) {
        let election = insert_election(&db, NewElection::current_example()).await;
        let electrical = RestrictionSet {
            branch_restriction: vec!["EE".to_string()],
            ..RestrictionSet::default()
        };
        let ee_rep = insert_position(&db, &election, "EE Rep", electrical).await;
        let dave = insert_candidate(&db, &ee_rep, "Dave", "21B004", true).await;

        let response = cast(&client, "voter-1", &first_year_cse(1), &[intent(&dave)]).await;
        let failure: BatchFailureBody = expect(response, Status::Forbidden).await;
        assert_eq!(failure.error.reason, "Ineligible");
        assert_eq!(failure.intent, Some(0));
        assert!(failure.committed.is_empty());

        let response = cast(&client, "voter-2", &first_year_ee(1), &[intent(&dave)]).await;
        assert_eq!(response.status(), Status::Ok);

        let response = cast(&client, "staff-1", "registrar@iiti.ac.in", &[intent(&dave)]).await;
        let failure: BatchFailureBody = expect(response, Status::BadRequest).await;
        assert_eq!(failure.error.reason, "InvalidFormat");
        assert_eq!(failure.intent, None);
    }

    #[backend_test]
    async fn batches_commit_up_to_the_first_failure(client: Client, db: Database) {
        let election = insert_election(&db, NewElection::current_example()).await;
        let president = insert_position(&db, &election, "President", RestrictionSet::default()).await;
        let treasurer = insert_position(&db, &election, "Treasurer", RestrictionSet::default()).await;
        let alice = insert_candidate(&db, &president, "Alice", "21B001", true).await;
        let bob = insert_candidate(&db, &president, "Bob", "21B002", true).await;
        let dave = insert_candidate(&db, &treasurer, "Dave", "21B004", true).await;

        let email = first_year_cse(7);
        let intents = [intent(&alice), intent(&bob), intent(&dave)];
        let response = cast(&client, "voter-1", &email, &intents).await;
        let failure: BatchFailureBody = expect(response, Status::Conflict).await;
        assert_eq!(failure.error.reason, "AlreadyVoted");
        assert_eq!(failure.intent, Some(1));
        assert_eq!(failure.committed.len(), 1);
        assert_eq!(failure.committed[0].candidate_id, ApiId::from(alice.id));

        // Resubmitting only the untried intent works.
        let response = cast(&client, "voter-1", &email, &[intent(&dave)]).await;
        assert_eq!(response.status(), Status::Ok);

        let response = cast(&client, "voter-1", &email, &[]).await;
        let failure: BatchFailureBody = expect(response, Status::BadRequest).await;
        assert_eq!(failure.intent, None);
    }

    #[backend_test]
    async fn concurrent_requests_for_one_position(client: Client, db: Database) {
        let election = insert_election(&db, NewElection::current_example()).await;
        let president = insert_position(&db, &election, "President", RestrictionSet::default()).await;
        let alice = insert_candidate(&db, &president, "Alice", "21B001", true).await;
        let bob = insert_candidate(&db, &president, "Bob", "21B002", true).await;

        let email = first_year_cse(9);
        let (for_alice, for_bob) = ([intent(&alice)], [intent(&bob)]);
        let (a, b) = rocket::tokio::join!(
            cast(&client, "voter-1", &email, &for_alice),
            cast(&client, "voter-1", &email, &for_bob),
        );
        let statuses = [a.status(), b.status()];
        assert!(statuses.contains(&Status::Ok), "{statuses:?}");
        assert!(statuses.contains(&Status::Conflict), "{statuses:?}");
        let loser = if a.status() == Status::Conflict { a } else { b };
        let failure: BatchFailureBody = expect(loser, Status::Conflict).await;
        assert_eq!(failure.error.reason, "AlreadyVoted");
    }

    #[backend_test]
    async fn closed_elections_refuse_votes(client: Client, db: Database) {
        let election = insert_election(&db, NewElection::past_example()).await;
        let president = insert_position(&db, &election, "President", RestrictionSet::default()).await;
        let alice = insert_candidate(&db, &president, "Alice", "21B001", true).await;

        let response = cast(&client, "voter-1", &first_year_cse(3), &[intent(&alice)]).await;
        let failure: BatchFailureBody = expect(response, Status::Conflict).await;
        assert_eq!(failure.error.reason, "ElectionNotActive");
    }

    #[backend_test]
    async fn self_registration(client: Client, db: Database) {
        let active = insert_election(&db, NewElection::current_example()).await;
        let president = insert_position(&db, &active, "President", RestrictionSet::default()).await;
        let upcoming = insert_election(&db, NewElection::future_example()).await;
        let later = insert_position(&db, &upcoming, "President", RestrictionSet::default()).await;

        let email = first_year_cse(45);
        let spec = CandidateSpec::example("Alice", &first_year_roll(45).to_lowercase());
        let response = send_json(
            &client,
            Method::Post,
            format!("/elections/{}/positions/{}/candidates", active.id, president.id),
            voter(&client, "voter-1", &email),
            &spec,
        )
        .await;
        let candidate: CandidateDescription = expect(response, Status::Ok).await;
        assert!(!candidate.approved);
        assert_eq!(candidate.roll_no, first_year_roll(45));
        // Programme details come from the voter's identity, not the request.
        assert_eq!(candidate.branch.as_deref(), Some("CSE"));

        // Pending candidacies are not shown to voters.
        let response = client
            .get(format!("/elections/{}/positions/{}/candidates", active.id, president.id))
            .cookie(voter(&client, "voter-2", &first_year_cse(46)))
            .dispatch()
            .await;
        let listed: Vec<CandidateDescription> = expect(response, Status::Ok).await;
        assert!(listed.is_empty());

        let response = send_json(
            &client,
            Method::Post,
            format!("/elections/{}/positions/{}/candidates", upcoming.id, later.id),
            voter(&client, "voter-1", &email),
            &spec,
        )
        .await;
        let err: ErrorBody = expect(response, Status::Conflict).await;
        assert_eq!(err.reason, "ElectionNotActive");
    }

    #[backend_test]
    async fn voters_cannot_stand_as_someone_else(client: Client, db: Database) {
        let election = insert_election(&db, NewElection::current_example()).await;
        let president =
            insert_position(&db, &election, "President", RestrictionSet::default()).await;
        let treasurer =
            insert_position(&db, &election, "Treasurer", RestrictionSet::default()).await;

        // Voter 46 tries to file a candidacy under voter 45's roll number.
        let stolen = CandidateSpec::example("Mallory", &first_year_roll(45));
        let response = send_json(
            &client,
            Method::Post,
            format!("/elections/{}/positions/{}/candidates", election.id, president.id),
            voter(&client, "voter-46", &first_year_cse(46)),
            &stolen,
        )
        .await;
        let err: ErrorBody = expect(response, Status::BadRequest).await;
        assert_eq!(err.reason, "BadRequest");
        let stored = Coll::<Candidate>::from_db(&db)
            .count_documents(doc! { "roll_no": first_year_roll(45) }, None)
            .await
            .unwrap();
        assert_eq!(stored, 0);

        // The real owner of the roll number is unaffected.
        let own = CandidateSpec::example("Alice", &first_year_roll(45));
        let response = send_json(
            &client,
            Method::Post,
            format!("/elections/{}/positions/{}/candidates", election.id, treasurer.id),
            voter(&client, "voter-45", &first_year_cse(45)),
            &own,
        )
        .await;
        let candidate: CandidateDescription = expect(response, Status::Ok).await;
        assert_eq!(candidate.roll_no, first_year_roll(45));
    }
}
