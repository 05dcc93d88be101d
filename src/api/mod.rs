use rocket::{serde::json::Json, Catcher, Request, Route};

use crate::error::ErrorBody;

mod common;
mod organizer;
mod public;
mod roster;
mod voter;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(public::routes());
    routes.extend(voter::routes());
    routes.extend(organizer::routes());
    routes.extend(roster::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![
        bad_request,
        unauthorized,
        forbidden,
        not_found,
        unprocessable,
        internal_error,
    ]
}

fn error_body(reason: &str, message: String) -> Json<ErrorBody> {
    Json(ErrorBody {
        reason: reason.to_string(),
        message,
    })
}

#[catch(400)]
fn bad_request(req: &Request) -> Json<ErrorBody> {
    error_body("BadRequest", format!("Malformed request to {}", req.uri()))
}

#[catch(401)]
fn unauthorized() -> Json<ErrorBody> {
    error_body(
        "Unauthorized",
        "A valid auth token is required".to_string(),
    )
}

#[catch(403)]
fn forbidden(req: &Request) -> Json<ErrorBody> {
    error_body("Ineligible", format!("Access to {} is forbidden", req.uri()))
}

#[catch(404)]
fn not_found(req: &Request) -> Json<ErrorBody> {
    error_body("NotFound", format!("Nothing found at {} {}", req.method(), req.uri()))
}

#[catch(422)]
fn unprocessable(req: &Request) -> Json<ErrorBody> {
    error_body("BadRequest", format!("Unreadable request body for {}", req.uri()))
}

#[catch(500)]
fn internal_error() -> Json<ErrorBody> {
    error_body("Storage", "Internal server error".to_string())
}
