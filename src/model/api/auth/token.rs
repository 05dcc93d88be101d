use std::marker::PhantomData;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, TokenData, Validation};
use rocket::{
    http::Status,
    outcome::try_outcome,
    request::{FromRequest, Outcome},
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Error;

use super::user::{Rights, User};

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// An authentication token, issued by the authentication service, representing
/// a specific user with specific rights.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthToken<U> {
    /// Stable user ID.
    #[serde(rename = "sub")]
    pub user_id: String,
    pub email: String,
    #[serde(rename = "rgt")]
    pub rights: Rights,
    #[serde(skip)]
    phantom: PhantomData<U>,
}

impl<U> AuthToken<U> {
    /// Does this token permit the given rights?
    pub fn permits(&self, target: Rights) -> bool {
        self.rights == target
    }
}

impl<U> AuthToken<U>
where
    U: User,
{
    /// Verify and decode a raw JWT.
    pub fn decode(raw: &str, config: &Config) -> Result<Self, Error> {
        let token = jsonwebtoken::decode(
            raw,
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims<U>>| claims.claims.token)?;
        Ok(token)
    }
}

/// Token claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims<U> {
    #[serde(flatten, bound = "")]
    token: AuthToken<U>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

/// Find the raw token in the cookie or, failing that, a bearer `Authorization` header.
fn raw_token<'r>(req: &'r Request<'_>) -> Option<String> {
    if let Some(cookie) = req.cookies().get(AUTH_TOKEN_COOKIE) {
        return Some(cookie.value().to_string());
    }
    req.headers()
        .get_one("Authorization")
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

#[rocket::async_trait]
impl<'r, U> FromRequest<'r> for AuthToken<U>
where
    U: User + Send,
{
    type Error = Error;

    /// Get an [`AuthToken`] from the request and verify that it has the correct
    /// rights for this user type.
    ///
    /// Missing or invalid tokens fail; tokens with other rights forward, so a
    /// lower-ranked route for that audience can pick the request up.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwrap is safe as `Config` is always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();

        let raw = match raw_token(req) {
            Some(raw) => raw,
            None => {
                let err = Error::Unauthorized("no auth token presented".to_string());
                return Outcome::Failure((Status::Unauthorized, err));
            }
        };

        let token: Self = try_outcome!(match Self::decode(&raw, config) {
            Ok(token) => Outcome::Success(token),
            Err(err) => {
                debug!("Rejected auth token: {err}");
                Outcome::Failure((Status::Unauthorized, err))
            }
        });

        if !token.permits(U::RIGHTS) {
            return Outcome::Forward(());
        }
        Outcome::Success(token)
    }
}
