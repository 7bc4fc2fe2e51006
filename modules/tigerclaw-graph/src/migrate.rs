use neo4rs::query;
use tracing::{info, warn};

use tigerclaw_common::Label;

use crate::GraphClient;

/// Create one uniqueness constraint per label key. Safe to re-run.
pub async fn migrate(client: &GraphClient) -> Result<(), neo4rs::Error> {
    let g = &client.graph;

    info!("Running schema migrations...");

    for label in Label::ALL {
        let field = label.key_field();
        let name = format!("{}_{}_unique", label.as_str().to_lowercase(), field);
        let cypher = format!(
            "CREATE CONSTRAINT {name} IF NOT EXISTS FOR (n:{label}) REQUIRE n.{field} IS UNIQUE"
        );
        run_ignoring_exists(g, &cypher).await?;
    }
    info!("Key uniqueness constraints created");

    // Walks filter on last_seen and action; index them for the detectors.
    let indexes = [
        "CREATE INDEX person_action IF NOT EXISTS FOR (n:Person) ON (n.action)",
        "CREATE INDEX person_last_seen IF NOT EXISTS FOR (n:Person) ON (n.last_seen)",
    ];
    for idx in &indexes {
        run_ignoring_exists(g, idx).await?;
    }

    info!("Schema migrations complete");
    Ok(())
}

/// Run a DDL statement, ignoring "already exists" errors.
async fn run_ignoring_exists(g: &neo4rs::Graph, cypher: &str) -> Result<(), neo4rs::Error> {
    match g.run(query(cypher)).await {
        Ok(_) => Ok(()),
        Err(e) => {
            let msg = e.to_string().to_lowercase();
            if msg.contains("already exists") || msg.contains("equivalent") {
                warn!("Already exists (skipped): {}", cypher.chars().take(80).collect::<String>());
                Ok(())
            } else {
                Err(e)
            }
        }
    }
}
