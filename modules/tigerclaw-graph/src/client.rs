use neo4rs::{ConfigBuilder, Graph, Query, Row};

/// Thin wrapper around neo4rs::Graph providing connection setup and
/// parameterized query execution.
#[derive(Clone)]
pub struct GraphClient {
    pub(crate) graph: Graph,
}

impl GraphClient {
    /// Connect to Neo4j with the given credentials.
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self, neo4rs::Error> {
        let config = ConfigBuilder::default()
            .uri(uri)
            .user(user)
            .password(password)
            .fetch_size(500)
            .max_connections(10)
            .build()?;
        let graph = Graph::connect(config).await?;
        Ok(Self { graph })
    }

    /// Get a reference to the underlying neo4rs Graph.
    pub fn inner(&self) -> &Graph {
        &self.graph
    }

    /// Run a read query and collect every row.
    pub async fn read(&self, q: Query) -> Result<Vec<Row>, neo4rs::Error> {
        let mut stream = self.graph.execute(q).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Run a write query, discarding any result rows.
    pub async fn write(&self, q: Query) -> Result<(), neo4rs::Error> {
        self.graph.run(q).await
    }
}
