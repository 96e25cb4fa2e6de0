//! Connection resolution
//!
//! Runs on every request: a non-empty override field wins, anything else falls
//! back to the client default. Nothing is inferred beyond what the caller set.

use crate::error::CoreError;
use crate::models::{Connection, ConnectionDefaults, Overrides};

/// Wire names of the required connection fields, in reporting order
pub const REQUIRED_CONNECTION_PARAMETERS: [&str; 3] = ["dataSource", "database", "collection"];

fn pick(over: Option<&str>, default: Option<&str>) -> Option<String> {
    over.filter(|v| !v.is_empty())
        .or(default.filter(|v| !v.is_empty()))
        .map(str::to_string)
}

/// Merge `overrides` on top of `defaults`.
///
/// Fails with [`CoreError::MissingParameter`] listing every field that is
/// still unset afterwards.
pub fn resolve(
    defaults: &ConnectionDefaults,
    overrides: Option<&Overrides>,
) -> Result<Connection, CoreError> {
    let data_source = pick(
        overrides.and_then(|o| o.data_source.as_deref()),
        defaults.data_source.as_deref(),
    );
    let database = pick(
        overrides.and_then(|o| o.database.as_deref()),
        defaults.database.as_deref(),
    );
    let collection = pick(
        overrides.and_then(|o| o.collection.as_deref()),
        defaults.collection.as_deref(),
    );

    match (data_source, database, collection) {
        (Some(data_source), Some(database), Some(collection)) => Ok(Connection {
            data_source,
            database,
            collection,
        }),
        (data_source, database, collection) => {
            let missing = [data_source.is_none(), database.is_none(), collection.is_none()]
                .iter()
                .zip(REQUIRED_CONNECTION_PARAMETERS)
                .filter(|(unset, _)| **unset)
                .map(|(_, name)| name.to_string())
                .collect();
            Err(CoreError::MissingParameter { missing })
        }
    }
}
