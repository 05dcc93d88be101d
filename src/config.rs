use mongodb::{Client as MongoClient, Database};
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::{
    common::identity::IdentityDecoder,
    db::roster::VoterRoster,
    mongodb::{ensure_indexes_exist, Coll},
};

const DEFAULT_INSTITUTION_DOMAIN: &str = "iiti.ac.in";
const DEFAULT_DATABASE: &str = "gymkhana";

fn default_institution_domain() -> String {
    DEFAULT_INSTITUTION_DOMAIN.to_string()
}

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    #[serde(default = "default_institution_domain")]
    institution_domain: String,
    // secrets
    jwt_secret: String,
}

impl Config {
    /// The e-mail domain voters must belong to.
    pub fn institution_domain(&self) -> &str {
        &self.institution_domain
    }

    /// Secret key used to verify JWTs issued by the authentication service.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }
}

/// A fairing that loads the application config and puts it in managed state,
/// along with an [`IdentityDecoder`] for the configured institution.
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
        let decoder = IdentityDecoder::new(config.institution_domain());
        info!("Accepting voters from @{}", decoder.domain());

        // Manage the state.
        rocket = rocket.manage(config).manage(decoder);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // non-secrets
    #[serde(default)]
    db_name: Option<String>,
    // secrets
    db_uri: String,
}

/// A fairing that loads the MongoDB config, connects to the database,
/// performs any setup necessary, and places both a `Client` and a `Database`
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
        let db_name = config
            .db_name
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string());
        let db = client.database(&db_name);

        // Ensure the required indexes exist.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to connect to database: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        // Manage the state.
        rocket = rocket.manage(client).manage(db);
        Ok(rocket)
    }
}

/// A fairing that loads the voter roster from the database into managed state.
///
/// Must be attached after the database is managed.
pub struct RosterFairing;

#[rocket::async_trait]
impl Fairing for RosterFairing {
    fn info(&self) -> Info {
        Info {
            name: "Voter roster",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let entries = match rocket.state::<Database>() {
            Some(db) => Coll::from_db(db),
            None => {
                error!("Voter roster requires a managed database");
                return Err(rocket);
            }
        };
        let roster = VoterRoster::default();
        if let Err(e) = roster.refresh(&entries).await {
            error!("Failed to load voter roster: {e}");
            return Err(rocket);
        }

        Ok(rocket.manage(roster))
    }
}
