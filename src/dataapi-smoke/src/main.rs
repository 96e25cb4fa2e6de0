//! Live smoke test against a real Data API gateway.
//!
//! Reads `MONGODB_API_URL`, `MONGODB_API_KEY`, `MONGODB_CLUSTER_NAME`,
//! `MONGODB_DATABASE_NAME` and `MONGODB_COLLECTION_NAME` from the environment.
//! Every document it writes is tagged with a per-run id and removed at the end.

use anyhow::{bail, ensure, Context, Result};
use dataapi::*;
use serde_json::{json, Value};

mod telemetry;

fn id_filter(id: &Value) -> Value {
    json!({ "_id": { "$oid": id } })
}

async fn expect_rejections(config: &ClientConfig) -> Result<()> {
    let bad_key = Client::new(ClientConfig {
        api_key: Some("battery-horse-staple".to_string()),
        ..config.clone()
    })?;
    match bad_key.find::<Document>(FindParams::default(), None).await {
        Err(err @ ClientError::Service(_)) if err.code() == Some("InvalidSession") => {
            tracing::info!("✓ Bad API key rejected: {}", err);
        }
        other => bail!("expected InvalidSession, got {:?}", other.map(|r| r.documents.len())),
    }

    let client = Client::new(config.clone())?;
    let bad_filter = FindParams {
        filter: Some(json!({ "$the_hobbits_the_hobbits": "to isengard" })),
        ..Default::default()
    };
    match client.find::<Document>(bad_filter, None).await {
        Err(err @ ClientError::Database(_)) if err.to_string().contains("unknown top level operator") => {
            tracing::info!("✓ Bad operator rejected: {}", err);
        }
        other => bail!("expected a database error, got {:?}", other.map(|r| r.documents.len())),
    }
    Ok(())
}

fn check_construction(config: &ClientConfig) -> Result<()> {
    let url_only = ClientConfig {
        api_url: config.api_url.clone(),
        api_id: config.api_id.clone(),
        api_region: config.api_region.clone(),
        ..Default::default()
    };
    let key_only = ClientConfig {
        api_key: config.api_key.clone(),
        ..Default::default()
    };
    let both = ClientConfig {
        api_url: config.api_url.clone(),
        api_id: config.api_id.clone(),
        api_region: config.api_region.clone(),
        api_key: config.api_key.clone(),
        ..Default::default()
    };

    let cases = [
        ("With no options.", ClientConfig::default(), false),
        ("With a URL but no API key.", url_only, false),
        ("With an API key and no URL.", key_only, false),
        ("With an API key and URL.", both, true),
    ];
    for (description, case, success) in cases {
        tracing::info!("- {}", description);
        ensure!(Client::new(case).is_ok() == success, "construction: {}", description);
    }
    Ok(())
}

async fn check_request_params(config: &ClientConfig, db: &Client, run: &str) -> Result<()> {
    let credentials_only = ClientConfig {
        data_source: None,
        database: None,
        collection: None,
        ..config.clone()
    };
    let bad_defaults = ClientConfig {
        data_source: Some("BAD".to_string()),
        database: Some("BAD".to_string()),
        collection: Some("BAD".to_string()),
        ..config.clone()
    };
    let good = Overrides {
        data_source: config.data_source.clone(),
        database: config.database.clone(),
        collection: config.collection.clone(),
    };

    let cases = [
        ("All parameters are set at default.", config.clone(), None, true),
        ("None of the required parameters are provided.", credentials_only, None, false),
        ("All parameters are overridden.", bad_defaults, Some(good), true),
    ];
    for (description, case, overrides, success) in cases {
        tracing::info!("- {}", description);
        let client = Client::new(case)?;
        let document = json!({ "description": description, "run": run });
        let result = client
            .insert_one(InsertOneParams { document }, overrides.as_ref())
            .await;

        match (result, success) {
            (Ok(inserted), true) => {
                let deleted = db
                    .delete_one(DeleteParams { filter: id_filter(&inserted.inserted_id) }, None)
                    .await?;
                ensure!(deleted.deleted_count == 1, "failed to remove {}", inserted.inserted_id);
            }
            (Err(ClientError::MissingParameter(_)), false) => {}
            (Err(err), true) => return Err(err).context(description),
            (outcome, false) => bail!("{}: expected rejection, got {:?}", description, outcome.is_ok()),
        }
    }
    Ok(())
}

async fn check_verbs(config: &ClientConfig, db: &Client, run: &str) -> Result<()> {
    tracing::info!("db.insertOne");
    let inserted = db
        .insert_one(InsertOneParams { document: json!({ "name": "Bilbo Baggins", "run": run }) }, None)
        .await?;
    tracing::info!("Inserted ID: {}", inserted.inserted_id);

    tracing::info!("db.findOne");
    let found: FindOneResult = db
        .find_one(FindOneParams { filter: Some(id_filter(&inserted.inserted_id)), projection: None }, None)
        .await?;
    let found = found.document.context("inserted document should be found")?;
    ensure!(found.get("_id") == Some(&inserted.inserted_id), "findOne returned another document");

    tracing::info!("db.deleteOne");
    let deleted = db
        .delete_one(DeleteParams { filter: id_filter(&inserted.inserted_id) }, None)
        .await?;
    ensure!(deleted.deleted_count == 1, "deleteOne removed {}", deleted.deleted_count);

    tracing::info!("db.insertMany");
    let inserted = db
        .insert_many(
            InsertManyParams {
                documents: vec![
                    json!({ "name": "Bilbo Baggins", "type": "hobbit", "run": run }),
                    json!({ "name": "Samwise Gamgee", "type": "hobbit", "run": run }),
                ],
            },
            None,
        )
        .await?;
    ensure!(inserted.inserted_ids.len() == 2, "insertMany inserted {}", inserted.inserted_ids.len());

    tracing::info!("db.find");
    let hobbits = json!({ "type": "hobbit", "run": run });
    let found: FindResult = db
        .find(FindParams { filter: Some(hobbits.clone()), ..Default::default() }, None)
        .await?;
    ensure!(found.documents.len() == 2, "find returned {}", found.documents.len());
    let first_id = found.documents[0].get("_id").cloned().context("document without _id")?;

    tracing::info!("db.updateOne");
    let updated = db
        .update_one(
            UpdateParams {
                filter: id_filter(&first_id),
                update: json!({ "$set": { "pipe": true } }),
                upsert: None,
            },
            None,
        )
        .await?;
    ensure!(updated.matched_count == 1 && updated.modified_count == 1, "updateOne: {:?}", updated);

    tracing::info!("db.updateMany");
    let updated = db
        .update_many(
            UpdateParams {
                filter: hobbits.clone(),
                update: json!({ "$set": { "teaTime": true } }),
                upsert: None,
            },
            None,
        )
        .await?;
    ensure!(updated.matched_count == 2 && updated.modified_count == 2, "updateMany: {:?}", updated);

    tracing::info!("db.replaceOne");
    let bilbo = json!({ "type": "hobbit", "name": "Bilbo Baggins", "run": run });
    let found: FindResult = db
        .find(FindParams { filter: Some(bilbo.clone()), ..Default::default() }, None)
        .await?;
    ensure!(found.documents.len() == 1, "expected one Bilbo, found {}", found.documents.len());
    let mut replacement = found.documents[0].clone();
    replacement.remove("_id");
    replacement.insert("age".to_string(), json!("111"));
    let replaced = db
        .replace_one(
            ReplaceOneParams {
                filter: bilbo,
                replacement: Value::Object(replacement),
                upsert: None,
            },
            None,
        )
        .await?;
    ensure!(replaced.matched_count == 1 && replaced.modified_count == 1, "replaceOne: {:?}", replaced);

    tracing::info!("db.aggregate");
    let aggregated: AggregateResult = db
        .aggregate(
            AggregateParams {
                pipeline: vec![
                    json!({ "$match": hobbits }),
                    json!({ "$sort": { "name": 1 } }),
                    json!({ "$project": { "_id": 0 } }),
                ],
            },
            None,
        )
        .await?;
    ensure!(aggregated.documents.len() == 2, "aggregate returned {}", aggregated.documents.len());
    ensure!(
        Value::Object(aggregated.documents[0].clone())
            == json!({ "name": "Bilbo Baggins", "type": "hobbit", "run": run, "pipe": true, "teaTime": true, "age": "111" }),
        "unexpected aggregate output: {:?}",
        aggregated.documents[0]
    );

    tracing::info!("The interpose hook.");
    let current_date = chrono::Utc::now().to_rfc3339();
    let good = json!({
        "dataSource": config.data_source,
        "database": config.database,
        "collection": config.collection,
    });
    let run_tag = run.to_string();
    let interposed = Client::new(ClientConfig {
        data_source: Some("BAD".to_string()),
        database: Some("BAD".to_string()),
        collection: Some("BAD".to_string()),
        ..config.clone()
    })?
    .with_interpose(move |envelope| {
        let mut body = good.clone();
        body["filter"] = json!({ "name": "Bilbo Baggins", "run": run_tag });
        RequestEnvelope { action: envelope.action, body }
    });
    let found: FindOneResult = interposed
        .find_one(
            FindOneParams { filter: Some(json!({ "currentDate": current_date, "run": run })), projection: None },
            None,
        )
        .await?;
    let found = found.document.context("the rewritten query should find Bilbo")?;
    ensure!(found.get("type") == Some(&json!("hobbit")), "interposed query found {:?}", found);

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = telemetry::init_telemetry()?;

    let config = ClientConfig::from_env();
    config
        .validate()
        .context("MONGODB_API_URL (or MONGODB_API_ID) and MONGODB_API_KEY must be set")?;

    let run = uuid::Uuid::new_v4().to_string();
    tracing::info!("dataapi smoke run {}", run);
    tracing::info!("  Gateway: {}", config.resolved_api_url().unwrap_or_default());
    tracing::info!(
        "  Target: {:?}/{:?}/{:?}",
        config.data_source,
        config.database,
        config.collection
    );

    let db = Client::new(config.clone())?;

    expect_rejections(&config).await?;

    tracing::info!("These are the different valid ways to initialize:");
    check_construction(&config)?;

    tracing::info!("These are the different ways you can set request params:");
    check_request_params(&config, &db, &run).await?;

    tracing::info!("Now testing out all methods.");
    let outcome = check_verbs(&config, &db, &run).await;

    tracing::info!("db.deleteMany");
    let deleted = db
        .delete_many(DeleteParams { filter: json!({ "run": run }) }, None)
        .await?;
    tracing::info!("Removed {} documents", deleted.deleted_count);
    outcome?;
    ensure!(deleted.deleted_count == 2, "deleteMany removed {}", deleted.deleted_count);

    let leftover: FindResult = db
        .find(FindParams { filter: Some(json!({ "run": run })), ..Default::default() }, None)
        .await?;
    ensure!(leftover.documents.is_empty(), "{} documents left behind", leftover.documents.len());

    tracing::info!("✓ Smoke run complete");
    Ok(())
}
