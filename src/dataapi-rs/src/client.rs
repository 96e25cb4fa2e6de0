use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use dataapi_core::models::*;
use dataapi_core::ClientConfig;

use crate::pipeline::Pipeline;
use crate::transport::{ReqwestTransport, Transport};
use crate::Result;

pub use crate::pipeline::Interpose;

/// DataApi gateway client
///
/// Cheap to clone; clones share the transport and the interposition hook.
#[derive(Clone)]
pub struct Client {
    pipeline: Pipeline,
}

impl Client {
    /// Validate `config` and build a client over the default `reqwest` transport.
    ///
    /// Fails without touching the network when `apiUrl` or `apiKey` is missing.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let credentials = config.validate()?;
        Ok(Self {
            pipeline: Pipeline {
                credentials,
                defaults: config.connection_defaults(),
                transport: Arc::new(ReqwestTransport::new()),
                interpose: None,
                sniff_plaintext_errors: config.sniff_plaintext_errors,
            },
        })
    }

    /// Replace the transport used to reach the gateway
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.pipeline.transport = transport;
        self
    }

    /// Register a hook that may rewrite every outgoing request body
    pub fn with_interpose<F>(mut self, interpose: F) -> Self
    where
        F: Fn(RequestEnvelope) -> RequestEnvelope + Send + Sync + 'static,
    {
        self.pipeline.interpose = Some(Arc::new(interpose));
        self
    }

    /// Run any action with raw parameters and return the undecoded JSON payload
    pub async fn execute<P: Serialize + Sync + ?Sized>(
        &self,
        action: Action,
        params: &P,
        overrides: Option<&Overrides>,
    ) -> Result<serde_json::Value> {
        self.pipeline.execute(action, params, overrides).await
    }

    async fn call<P, R>(&self, action: Action, params: &P, overrides: Option<&Overrides>) -> Result<R>
    where
        P: Serialize + Sync,
        R: DeserializeOwned,
    {
        let value = self.pipeline.execute(action, params, overrides).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Find the first document matching the filter
    pub async fn find_one<T: DeserializeOwned>(
        &self,
        params: FindOneParams,
        overrides: Option<&Overrides>,
    ) -> Result<FindOneResult<T>> {
        self.call(Action::FindOne, &params, overrides).await
    }

    /// Find documents matching the filter, with optional projection, sort, limit and skip
    pub async fn find<T: DeserializeOwned>(
        &self,
        params: FindParams,
        overrides: Option<&Overrides>,
    ) -> Result<FindResult<T>> {
        self.call(Action::Find, &params, overrides).await
    }

    pub async fn insert_one(
        &self,
        params: InsertOneParams,
        overrides: Option<&Overrides>,
    ) -> Result<InsertOneResult> {
        self.call(Action::InsertOne, &params, overrides).await
    }

    pub async fn insert_many(
        &self,
        params: InsertManyParams,
        overrides: Option<&Overrides>,
    ) -> Result<InsertManyResult> {
        self.call(Action::InsertMany, &params, overrides).await
    }

    pub async fn update_one(
        &self,
        params: UpdateParams,
        overrides: Option<&Overrides>,
    ) -> Result<UpdateResult> {
        self.call(Action::UpdateOne, &params, overrides).await
    }

    /// Update every matching document, or upsert a single one
    pub async fn update_many(
        &self,
        params: UpdateParams,
        overrides: Option<&Overrides>,
    ) -> Result<UpdateResult> {
        self.call(Action::UpdateMany, &params, overrides).await
    }

    pub async fn replace_one(
        &self,
        params: ReplaceOneParams,
        overrides: Option<&Overrides>,
    ) -> Result<UpdateResult> {
        self.call(Action::ReplaceOne, &params, overrides).await
    }

    pub async fn delete_one(
        &self,
        params: DeleteParams,
        overrides: Option<&Overrides>,
    ) -> Result<DeleteResult> {
        self.call(Action::DeleteOne, &params, overrides).await
    }

    pub async fn delete_many(
        &self,
        params: DeleteParams,
        overrides: Option<&Overrides>,
    ) -> Result<DeleteResult> {
        self.call(Action::DeleteMany, &params, overrides).await
    }

    /// Run an aggregation pipeline and return the final stage's documents
    pub async fn aggregate<T: DeserializeOwned>(
        &self,
        params: AggregateParams,
        overrides: Option<&Overrides>,
    ) -> Result<AggregateResult<T>> {
        self.call(Action::Aggregate, &params, overrides).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{TransportRequest, TransportResponse};
    use crate::ClientError;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Records every request and replays one canned response
    struct RecordingTransport {
        response: TransportResponse,
        requests: Mutex<Vec<TransportRequest>>,
    }

    impl RecordingTransport {
        fn new(response: TransportResponse) -> Arc<Self> {
            Arc::new(Self {
                response,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<TransportRequest> {
            self.requests.lock().unwrap().clone()
        }

        fn last_body(&self) -> Value {
            let requests = self.requests();
            serde_json::from_str(&requests.last().unwrap().body).unwrap()
        }
    }

    #[async_trait::async_trait]
    impl Transport for RecordingTransport {
        async fn post(&self, request: TransportRequest) -> anyhow::Result<TransportResponse> {
            self.requests.lock().unwrap().push(request);
            Ok(self.response.clone())
        }
    }

    struct FailingTransport;

    #[async_trait::async_trait]
    impl Transport for FailingTransport {
        async fn post(&self, _request: TransportRequest) -> anyhow::Result<TransportResponse> {
            anyhow::bail!("dns lookup failed")
        }
    }

    fn config() -> ClientConfig {
        ClientConfig::new("https://gateway.test/app/x/endpoint/data/v1", "secret")
            .with_data_source("Cluster0")
            .with_database("middle-earth")
            .with_collection("hobbits")
    }

    fn client_with(transport: Arc<RecordingTransport>) -> Client {
        Client::new(config()).unwrap().with_transport(transport)
    }

    #[test]
    fn test_construction_requires_credentials() {
        let err = Client::new(ClientConfig::default()).err().unwrap();
        assert!(matches!(err, ClientError::Configuration(_)));

        let deferred = ClientConfig::new("https://gateway.test", "secret");
        assert!(Client::new(deferred).is_ok());
    }

    #[tokio::test]
    async fn test_insert_one_end_to_end() {
        let transport = RecordingTransport::new(TransportResponse::new(201, r#"{"insertedId":"abc"}"#));
        let client = client_with(transport.clone());

        let result = client
            .insert_one(InsertOneParams { document: json!({ "name": "Bilbo" }) }, None)
            .await
            .unwrap();
        assert_eq!(result.inserted_id, "abc");

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "https://gateway.test/app/x/endpoint/data/v1/action/insertOne");
        assert_eq!(
            transport.last_body(),
            json!({
                "document": { "name": "Bilbo" },
                "dataSource": "Cluster0",
                "database": "middle-earth",
                "collection": "hobbits",
            })
        );
    }

    #[tokio::test]
    async fn test_find_with_collection_override() {
        let transport = RecordingTransport::new(TransportResponse::new(200, r#"{"documents":[]}"#));
        let client = client_with(transport.clone());

        let overrides = Overrides::new().collection("override");
        let result: FindResult = client
            .find(
                FindParams {
                    filter: Some(json!({ "type": "hobbit" })),
                    ..Default::default()
                },
                Some(&overrides),
            )
            .await
            .unwrap();
        assert!(result.documents.is_empty());

        let body = transport.last_body();
        assert_eq!(body["collection"], "override");
        assert_eq!(body["dataSource"], "Cluster0");
        assert_eq!(body["database"], "middle-earth");
        assert_eq!(body["filter"], json!({ "type": "hobbit" }));
    }

    #[tokio::test]
    async fn test_missing_parameters_never_dispatch() {
        let transport = RecordingTransport::new(TransportResponse::new(200, "{}"));
        let client = Client::new(ClientConfig::new("https://gateway.test", "secret"))
            .unwrap()
            .with_transport(transport.clone());

        let err = client
            .delete_many(DeleteParams { filter: json!({}) }, Some(&Overrides::new().database("db")))
            .await
            .unwrap_err();
        let inner = match err {
            ClientError::MissingParameter(inner) => inner,
            other => panic!("expected missing parameter error, got {other:?}"),
        };
        assert_eq!(inner.missing(), ["dataSource", "collection"]);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_interpose_replaces_body() {
        let transport = RecordingTransport::new(TransportResponse::new(
            200,
            r#"{"document":{"name":"Bilbo Baggins","type":"hobbit"}}"#,
        ));
        let replacement = json!({
            "filter": { "name": "Bilbo Baggins" },
            "dataSource": "Cluster1",
            "database": "shire",
            "collection": "bagginses",
        });
        let expected = replacement.clone();
        let seen = Arc::new(Mutex::new(None));
        let seen_in_hook = seen.clone();

        let client = client_with(transport.clone()).with_interpose(move |envelope| {
            *seen_in_hook.lock().unwrap() = Some(envelope.clone());
            RequestEnvelope {
                action: envelope.action,
                body: replacement.clone(),
            }
        });

        let result: FindOneResult = client
            .find_one(
                FindOneParams {
                    filter: Some(json!({ "name": "Frodo" })),
                    projection: None,
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(result.document.unwrap()["type"], "hobbit");

        let seen = seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.action, Action::FindOne);
        assert_eq!(seen.body["filter"], json!({ "name": "Frodo" }));
        assert_eq!(seen.body["collection"], "hobbits");

        let requests = transport.requests();
        assert_eq!(requests[0].body, serde_json::to_string(&expected).unwrap());
        assert!(requests[0].url.ends_with("/action/findOne"));
    }

    #[tokio::test]
    async fn test_service_error_from_gateway() {
        let transport = RecordingTransport::new(
            TransportResponse::new(401, r#"{"error":"bad","error_code":"InvalidSession"}"#)
                .with_header("content-type", "application/json"),
        );
        let client = client_with(transport);

        let err = client
            .find::<Document>(FindParams::default(), None)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.code(), Some("InvalidSession"));
        assert_eq!(err.remote().unwrap().message, "bad");
    }

    #[tokio::test]
    async fn test_database_error_from_gateway() {
        let transport = RecordingTransport::new(TransportResponse::new(400, "unknown top level operator"));
        let client = client_with(transport);

        let err = client
            .update_one(
                UpdateParams {
                    filter: json!({ "$the_hobbits": "to isengard" }),
                    update: json!({ "$set": { "pipe": true } }),
                    upsert: None,
                },
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Database(_)));
        assert!(err.to_string().contains("unknown top level operator"));
        assert!(err.code().is_none());
    }

    #[tokio::test]
    async fn test_transport_error_is_propagated() {
        let client = Client::new(config())
            .unwrap()
            .with_transport(Arc::new(FailingTransport));

        let err = client
            .aggregate::<Document>(AggregateParams { pipeline: vec![] }, None)
            .await
            .unwrap_err();
        let inner = match err {
            ClientError::Transport(inner) => inner,
            other => panic!("expected transport error, got {other:?}"),
        };
        assert_eq!(inner.to_string(), "dns lookup failed");
    }

    #[tokio::test]
    async fn test_verbs_hit_their_actions() {
        let transport = RecordingTransport::new(TransportResponse::new(
            200,
            r#"{"matchedCount":2,"modifiedCount":1,"deletedCount":3,"insertedIds":["a","b"]}"#,
        ));
        let client = client_with(transport.clone());

        let updated = client
            .update_many(
                UpdateParams {
                    filter: json!({ "type": "hobbit" }),
                    update: json!({ "$set": { "teaTime": true } }),
                    upsert: Some(false),
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!((updated.matched_count, updated.modified_count), (2, 1));
        assert_eq!(transport.last_body()["upsert"], false);

        let replaced = client
            .replace_one(
                ReplaceOneParams {
                    filter: json!({ "name": "Bilbo Baggins" }),
                    replacement: json!({ "name": "Bilbo Baggins", "age": "111" }),
                    upsert: None,
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(replaced.matched_count, 2);
        assert!(transport.last_body().get("upsert").is_none());

        let deleted = client
            .delete_one(DeleteParams { filter: json!({ "name": "Gollum" }) }, None)
            .await
            .unwrap();
        assert_eq!(deleted.deleted_count, 3);

        let inserted = client
            .insert_many(
                InsertManyParams {
                    documents: vec![json!({ "name": "Merry" }), json!({ "name": "Pippin" })],
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(inserted.inserted_ids.len(), 2);

        let actions: Vec<String> = transport
            .requests()
            .iter()
            .map(|r| r.url.rsplit('/').next().unwrap().to_string())
            .collect();
        assert_eq!(actions, ["updateMany", "replaceOne", "deleteOne", "insertMany"]);
    }

    #[tokio::test]
    async fn test_execute_returns_raw_payload() {
        let transport = RecordingTransport::new(TransportResponse::new(200, r#"{"documents":[{"n":1}]}"#));
        let client = client_with(transport);

        let value = client
            .execute(Action::Aggregate, &json!({ "pipeline": [] }), None)
            .await
            .unwrap();
        assert_eq!(value, json!({ "documents": [{ "n": 1 }] }));
    }
}
