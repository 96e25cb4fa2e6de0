//! Basic Client Example
//!
//! A minimal example showing how to talk to a Data API gateway.
//!
//! Run with: MONGODB_API_URL=... MONGODB_API_KEY=... cargo run --example basic_usage

use dataapi::*;
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("Basic dataapi Client Example\n");

    // Credentials come from the environment, the target is set here
    let config = ClientConfig::from_env()
        .with_data_source("Cluster0")
        .with_database("middle-earth")
        .with_collection("hobbits");

    // Log every outgoing action before it is sent
    let db = Client::new(config)?.with_interpose(|envelope| {
        println!("→ {} {}", envelope.action, envelope.body);
        envelope
    });
    println!("✅ Client initialized\n");

    let inserted = db
        .insert_one(InsertOneParams { document: json!({ "name": "Bilbo Baggins", "type": "hobbit" }) }, None)
        .await?;
    println!("📝 Inserted document: {}", inserted.inserted_id);

    // Same database, another collection for this call only
    let elves = Overrides::new().collection("elves");
    let found: FindResult = db
        .find(FindParams { filter: Some(json!({})), limit: Some(5), ..Default::default() }, Some(&elves))
        .await?;
    println!("🔍 {} elves found", found.documents.len());

    match db
        .find::<Document>(FindParams { filter: Some(json!({ "$hobbits": 1 })), ..Default::default() }, None)
        .await
    {
        Ok(_) => println!("unexpected success"),
        Err(err) => println!("❌ Rejected with status {:?}: {}", err.status(), err),
    }

    let deleted = db
        .delete_one(DeleteParams { filter: json!({ "_id": { "$oid": inserted.inserted_id } }) }, None)
        .await?;
    println!("🗑  Deleted {} document(s)", deleted.deleted_count);

    Ok(())
}
