use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{KleioError, KleioResult};

const QUERY_ENDPOINT_KEY: &str = "sparql.query.endpoint";
const UPDATE_ENDPOINT_KEY: &str = "sparql.update.endpoint";
const DB_URL_KEY: &str = "db.url";
const DB_USER_KEY: &str = "db.user";
const DB_PASSWORD_KEY: &str = "db.password";

/// Endpoints and credentials read from a Java-style properties file.
///
/// Every field is optional at load time; the `require_*` accessors raise a
/// config error when an operation needs a value that was never provided.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    pub sparql_query_endpoint: Option<String>,
    pub sparql_update_endpoint: Option<String>,
    pub db_url: Option<String>,
    pub db_user: Option<String>,
    pub db_password: Option<String>,
}

impl StoreConfig {
    pub fn from_properties_file(path: &Path) -> KleioResult<Self> {
        let text = fs::read_to_string(path).map_err(|err| {
            KleioError::config(format!("cannot read properties file {}: {err}", path.display()))
        })?;
        Ok(Self::from_properties(&text))
    }

    /// Parse `key = value` lines; `#` and `!` start comments, unknown keys
    /// are ignored.
    pub fn from_properties(text: &str) -> Self {
        let mut config = Self::default();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let Some((key, value)) = line.split_once(['=', ':']) else {
                continue;
            };
            let key = key.trim();
            let value = value.trim().to_string();
            match key {
                QUERY_ENDPOINT_KEY => config.sparql_query_endpoint = Some(value),
                UPDATE_ENDPOINT_KEY => config.sparql_update_endpoint = Some(value),
                DB_URL_KEY => config.db_url = Some(value),
                DB_USER_KEY => config.db_user = Some(value),
                DB_PASSWORD_KEY => config.db_password = Some(value),
                other => log::debug!("ignoring unknown property '{other}'"),
            }
        }
        config
    }

    pub fn require_query_endpoint(&self) -> KleioResult<&str> {
        require(&self.sparql_query_endpoint, QUERY_ENDPOINT_KEY)
    }

    pub fn require_update_endpoint(&self) -> KleioResult<&str> {
        require(&self.sparql_update_endpoint, UPDATE_ENDPOINT_KEY)
    }

    pub fn require_db_url(&self) -> KleioResult<&str> {
        require(&self.db_url, DB_URL_KEY)
    }

    pub fn require_db_user(&self) -> KleioResult<&str> {
        require(&self.db_user, DB_USER_KEY)
    }

    pub fn require_db_password(&self) -> KleioResult<&str> {
        require(&self.db_password, DB_PASSWORD_KEY)
    }
}

fn require<'a>(value: &'a Option<String>, key: &str) -> KleioResult<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| KleioError::config(format!("property '{key}' is not set")))
}
