// Copyright (c) 2026-present
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Connection configuration for the block store.

use serde::{Deserialize, Serialize};

/// Parameters needed to open a connection to the Postgres instance backing
/// the block store. Mirrors the fields every job description's `"config"`
/// object carries (spec §6).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DbConfig {
    /// Database host.
    pub host: String,
    /// Database port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Database name.
    pub dbname: String,
    /// Connecting user.
    pub user: String,
    /// Password; never logged or included in `Debug` output beyond this
    /// derive (job descriptions are short-lived, in-process values).
    pub password: String,
}

fn default_port() -> u16 {
    5432
}

impl DbConfig {
    /// Builds the `postgres` crate connection string for this config.
    #[must_use]
    pub fn connection_string(&self) -> String {
        format!(
            "host={} port={} dbname={} user={} password={}",
            self.host, self.port, self.dbname, self.user, self.password
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn builds_connection_string() {
        let config = DbConfig {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "points".to_string(),
            user: "ingest".to_string(),
            password: "secret".to_string(),
        };
        assert_eq!(
            config.connection_string(),
            "host=localhost port=5432 dbname=points user=ingest password=secret"
        );
    }

    #[test]
    fn default_port_is_postgres_standard() {
        let text = r#"{"host":"db","dbname":"points","user":"ingest","password":"x"}"#;
        let config: DbConfig = serde_json::from_str(text).unwrap();
        assert_eq!(config.port, 5432);
    }
}
