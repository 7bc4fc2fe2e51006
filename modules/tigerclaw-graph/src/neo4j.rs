use async_trait::async_trait;
use neo4rs::query;
use tracing::debug;

use tigerclaw_common::{Label, RelType};

use crate::migrate::migrate;
use crate::props::{EdgeRecord, GraphCounts, Neighbor, NodeRecord, NodeRef, PropValue, Props};
use crate::store::{GraphError, GraphStore};
use crate::GraphClient;

/// `GraphStore` backed by Neo4j.
///
/// Labels, key fields and relationship types come from closed enums, so
/// they are formatted into the Cypher text; every value is a parameter.
#[derive(Clone)]
pub struct Neo4jStore {
    client: GraphClient,
}

impl Neo4jStore {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &GraphClient {
        &self.client
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn ensure_schema(&self) -> Result<(), GraphError> {
        migrate(&self.client).await?;
        Ok(())
    }

    async fn merge_node(&self, node: &NodeRef, on_create: &Props, attrs: &Props) -> Result<(), GraphError> {
        let cypher = format!(
            "MERGE (n:{label} {{{field}: $key}})
             ON CREATE SET n += $create
             SET n += $props",
            label = node.label,
            field = node.label.key_field(),
        );
        let q = query(&cypher)
            .param("key", node.key.as_str())
            .param("create", on_create.to_bolt())
            .param("props", attrs.to_bolt());
        self.client.write(q).await?;
        Ok(())
    }

    async fn upsert_edge(&self, from: &NodeRef, rel: RelType, to: &NodeRef, props: &Props) -> Result<(), GraphError> {
        let cypher = format!(
            "MATCH (a:{fl} {{{ff}: $from}})
             MATCH (b:{tl} {{{tf}: $to}})
             MERGE (a)-[r:{rel}]->(b)
             SET r += $props
             RETURN count(r) AS written",
            fl = from.label,
            ff = from.label.key_field(),
            tl = to.label,
            tf = to.label.key_field(),
        );
        let q = query(&cypher)
            .param("from", from.key.as_str())
            .param("to", to.key.as_str())
            .param("props", props.to_bolt());

        let rows = self.client.read(q).await?;
        let written = rows
            .first()
            .map(|row| row.get::<i64>("written").unwrap_or(0))
            .unwrap_or(0);
        if written == 0 {
            return Err(GraphError::MissingEndpoint {
                from: from.clone(),
                rel,
                to: to.clone(),
            });
        }
        Ok(())
    }

    async fn node(&self, node: &NodeRef) -> Result<Option<NodeRecord>, GraphError> {
        let cypher = format!(
            "MATCH (n:{label} {{{field}: $key}}) RETURN n LIMIT 1",
            label = node.label,
            field = node.label.key_field(),
        );
        let rows = self.client.read(query(&cypher).param("key", node.key.as_str())).await?;
        Ok(rows
            .first()
            .and_then(|row| row.get::<neo4rs::Node>("n").ok())
            .and_then(|n| node_record(&n)))
    }

    async fn neighbors(&self, node: &NodeRef) -> Result<Vec<Neighbor>, GraphError> {
        let cypher = format!(
            "MATCH (s:{label} {{{field}: $key}})-[r]-(o)
             RETURN type(r) AS rel, startNode(r) = s AS outgoing, o, r",
            label = node.label,
            field = node.label.key_field(),
        );
        let rows = self.client.read(query(&cypher).param("key", node.key.as_str())).await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let rel_name: String = row.get("rel").unwrap_or_default();
            let Ok(rel) = rel_name.parse::<RelType>() else {
                debug!(rel = %rel_name, "Skipping unknown relationship type");
                continue;
            };
            let Some(other) = row.get::<neo4rs::Node>("o").ok().and_then(|n| node_record(&n)) else {
                continue;
            };
            let props = row
                .get::<neo4rs::Relation>("r")
                .map(|r| relation_props(&r))
                .unwrap_or_default();
            out.push(Neighbor {
                rel,
                outgoing: row.get::<bool>("outgoing").unwrap_or(true),
                node: other,
                props,
            });
        }
        Ok(out)
    }

    async fn nodes(&self, label: Label) -> Result<Vec<NodeRecord>, GraphError> {
        let cypher = format!("MATCH (n:{label}) RETURN n");
        let rows = self.client.read(query(&cypher)).await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get::<neo4rs::Node>("n").ok())
            .filter_map(|n| node_record(&n))
            .collect())
    }

    async fn edges(&self, rel: RelType) -> Result<Vec<EdgeRecord>, GraphError> {
        let cypher = format!("MATCH (a)-[r:{rel}]->(b) RETURN a, r, b");
        let rows = self.client.read(query(&cypher)).await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let from = row.get::<neo4rs::Node>("a").ok().and_then(|n| node_record(&n));
            let to = row.get::<neo4rs::Node>("b").ok().and_then(|n| node_record(&n));
            let (Some(from), Some(to)) = (from, to) else {
                continue;
            };
            let props = row
                .get::<neo4rs::Relation>("r")
                .map(|r| relation_props(&r))
                .unwrap_or_default();
            out.push(EdgeRecord {
                from: from.node,
                rel,
                to: to.node,
                props,
            });
        }
        Ok(out)
    }

    async fn counts(&self) -> Result<GraphCounts, GraphError> {
        let mut counts = GraphCounts::default();
        for label in Label::ALL {
            let cypher = format!("MATCH (n:{label}) RETURN count(n) AS cnt");
            let rows = self.client.read(query(&cypher)).await?;
            let cnt = rows.first().map(|r| r.get::<i64>("cnt").unwrap_or(0)).unwrap_or(0);
            counts.nodes.insert(label, cnt as usize);
        }
        for rel in RelType::ALL {
            let cypher = format!("MATCH ()-[r:{rel}]->() RETURN count(r) AS cnt");
            let rows = self.client.read(query(&cypher)).await?;
            let cnt = rows.first().map(|r| r.get::<i64>("cnt").unwrap_or(0)).unwrap_or(0);
            if cnt > 0 {
                counts.edges.insert(rel, cnt as usize);
            }
        }
        Ok(counts)
    }
}

/// Parse a neo4rs Node into a record keyed by its first known label.
fn node_record(n: &neo4rs::Node) -> Option<NodeRecord> {
    let label = n.labels().iter().find_map(|l| l.parse::<Label>().ok())?;
    let key: String = n.get(label.key_field()).ok()?;

    let props = n
        .keys()
        .into_iter()
        .filter_map(|k| {
            let value = n
                .get::<String>(k)
                .map(PropValue::Str)
                .or_else(|_| n.get::<i64>(k).map(PropValue::Int))
                .or_else(|_| n.get::<f64>(k).map(PropValue::Float))
                .or_else(|_| n.get::<bool>(k).map(PropValue::Bool))
                .ok()?;
            Some((k.to_string(), value))
        })
        .collect();

    Some(NodeRecord::new(NodeRef::new(label, key), props))
}

fn relation_props(r: &neo4rs::Relation) -> Props {
    r.keys()
        .into_iter()
        .filter_map(|k| {
            let value = r
                .get::<String>(k)
                .map(PropValue::Str)
                .or_else(|_| r.get::<i64>(k).map(PropValue::Int))
                .or_else(|_| r.get::<f64>(k).map(PropValue::Float))
                .or_else(|_| r.get::<bool>(k).map(PropValue::Bool))
                .ok()?;
            Some((k.to_string(), value))
        })
        .collect()
}
