pub mod adjacency;
pub mod client;
pub mod compound;
pub mod ingest;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod migrate;
pub mod neighborhood;
pub mod neo4j;
pub mod network;
pub mod props;
pub mod proximity;
pub mod query;
pub mod ripple;
pub mod store;
pub mod sync;
pub mod themes;
#[cfg(feature = "test-utils")]
pub mod testutil;

pub use client::GraphClient;
pub use compound::{detect, detect_all, CompoundHit, Detector};
pub use ingest::{ingest, CoauthorSource, IngestOptions, IngestStats, NoCoauthors};
pub use neo4j::Neo4jStore;
pub use network::{network_rubric, NetworkScore};
pub use props::{EdgeRecord, GraphCounts, Neighbor, NodeRecord, NodeRef, PropValue, Props};
pub use proximity::{proximity_bonus, ProximityResult};
pub use ripple::{record_audit, ripple, RippleReport, RippleTarget, Verdict};
pub use store::{find_entity, upsert_mirrored, GraphError, GraphStore};
pub use sync::{seed_from_index, sync_entry, SyncStats};
pub use themes::{discover, DiscoveryCandidate, DiscoveryConfig, Strategy, ThemeProposal};
