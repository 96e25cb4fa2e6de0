use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Untyped document as returned by the gateway (EJSON relaxed form)
pub type Document = Map<String, Value>;

/// Action names understood by the gateway, used as the last URL segment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    FindOne,
    Find,
    InsertOne,
    InsertMany,
    UpdateOne,
    UpdateMany,
    ReplaceOne,
    DeleteOne,
    DeleteMany,
    Aggregate,
}

impl Action {
    pub const ALL: [Action; 10] = [
        Action::FindOne,
        Action::Find,
        Action::InsertOne,
        Action::InsertMany,
        Action::UpdateOne,
        Action::UpdateMany,
        Action::ReplaceOne,
        Action::DeleteOne,
        Action::DeleteMany,
        Action::Aggregate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::FindOne => "findOne",
            Action::Find => "find",
            Action::InsertOne => "insertOne",
            Action::InsertMany => "insertMany",
            Action::UpdateOne => "updateOne",
            Action::UpdateMany => "updateMany",
            Action::ReplaceOne => "replaceOne",
            Action::DeleteOne => "deleteOne",
            Action::DeleteMany => "deleteMany",
            Action::Aggregate => "aggregate",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully resolved target of a single request. All fields are non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub data_source: String,
    pub database: String,
    pub collection: String,
}

impl Connection {
    /// Write the connection fields into a request body, replacing same-named keys
    pub fn merge_into(&self, body: &mut Map<String, Value>) {
        body.insert("dataSource".to_string(), Value::String(self.data_source.clone()));
        body.insert("database".to_string(), Value::String(self.database.clone()));
        body.insert("collection".to_string(), Value::String(self.collection.clone()));
    }
}

/// Client-level connection defaults. Any field may be deferred to per-call overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionDefaults {
    pub data_source: Option<String>,
    pub database: Option<String>,
    pub collection: Option<String>,
}

/// Per-call connection overrides. A non-empty field wins over the client default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overrides {
    #[serde(default, alias = "cluster")]
    pub data_source: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub collection: Option<String>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data_source(mut self, data_source: impl Into<String>) -> Self {
        self.data_source = Some(data_source.into());
        self
    }

    /// Older gateway variants call the data source a cluster
    pub fn cluster(self, cluster: impl Into<String>) -> Self {
        self.data_source(cluster)
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }
}

/// What the interposition hook sees and returns.
///
/// Only `body` of the returned envelope is used; the action always comes from
/// the verb that was called.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    pub action: Action,
    pub body: Value,
}

// ---------------------------------------------------------------------------
// Verb parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindOneParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<Value>,
    /// e.g. `{ "completed": -1 }`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InsertOneParams {
    pub document: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct InsertManyParams {
    pub documents: Vec<Value>,
}

/// Parameters shared by `updateOne` and `updateMany`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateParams {
    pub filter: Value,
    pub update: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upsert: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceOneParams {
    pub filter: Value,
    pub replacement: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upsert: Option<bool>,
}

/// Parameters shared by `deleteOne` and `deleteMany`
#[derive(Debug, Clone, Serialize)]
pub struct DeleteParams {
    pub filter: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregateParams {
    pub pipeline: Vec<Value>,
}

// ---------------------------------------------------------------------------
// Verb results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: serde::de::DeserializeOwned"))]
pub struct FindOneResult<T = Document> {
    #[serde(default)]
    pub document: Option<T>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: serde::de::DeserializeOwned"))]
pub struct FindResult<T = Document> {
    pub documents: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOneResult {
    /// Raw identifier; may be a string or an EJSON object
    pub inserted_id: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertManyResult {
    pub inserted_ids: Vec<Value>,
}

/// Result of `updateOne`, `updateMany` and `replaceOne`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
    #[serde(default)]
    pub upserted_id: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    pub deleted_count: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: serde::de::DeserializeOwned"))]
pub struct AggregateResult<T = Document> {
    pub documents: Vec<T>,
}
