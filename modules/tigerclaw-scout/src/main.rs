use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tigerclaw_common::{Config, SignalRecord, SignalStrength};
use tigerclaw_graph::adjacency::derive_adjacency;
use tigerclaw_graph::query::{adjacent_theme_experts, entity_neighborhood, stats, theme_roster};
use tigerclaw_graph::{
    detect, detect_all, discover, find_entity, ingest, network_rubric, proximity_bonus, ripple, seed_from_index,
    CompoundHit, Detector, DiscoveryCandidate, DiscoveryConfig, GraphClient, GraphStore, IngestOptions, Neo4jStore,
    Strategy,
};
use tigerclaw_scout::cache::EnrichmentCache;
use tigerclaw_scout::catalog::ThemeCatalog;
use tigerclaw_scout::effects::{self, RippleEffects};
use tigerclaw_scout::feed::{DiscoveryFeed, FeedEntry, FeedStatus, SuggestionLog};
use tigerclaw_scout::index::IndexStore;
use tigerclaw_scout::merge::prepare;
use tigerclaw_scout::rubric::{decide_action, score_extended, ScoringAttrs};
use tigerclaw_scout::scan::{self, ScanDeps, ScanOptions};
use tigerclaw_scout::scanner::{CommandScanner, Source};

#[derive(Parser)]
#[command(name = "tigerclaw-scout", about = "Prospect signal graph: scan, score, propagate")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Score a prospect: rubric, graph proximity and optionally the network rubric.
    Score {
        slug: String,
        /// Rubric attributes as JSON.
        #[arg(long)]
        attrs: Option<String>,
        #[arg(long)]
        already_funded: bool,
        #[arg(long)]
        network: bool,
    },
    /// Propagate an event from a person or company to its neighborhood.
    Ripple {
        slug: String,
        #[arg(long)]
        event: String,
        #[arg(long, default_value = "medium")]
        strength: SignalStrength,
        /// Record RIPPLE_SCORED audit edges.
        #[arg(long)]
        write: bool,
        /// Write feed entries and escalation suggestions.
        #[arg(long)]
        persist: bool,
    },
    /// Ingest a batch of signal records into the graph.
    Ingest {
        /// JSON array, or @path to a file holding one.
        signals: String,
        #[arg(long)]
        dry_run: bool,
    },
    /// Fan out scanners, then merge, diff, score and persist.
    Scan {
        /// Theme keys; all catalog themes when empty.
        themes: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        domains: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        sources: Vec<Source>,
        #[arg(long)]
        concurrency: Option<usize>,
        #[arg(long)]
        no_persist: bool,
        #[arg(long)]
        discover: bool,
        #[arg(long)]
        dry_run: bool,
    },
    /// Run compound pattern detectors.
    Detect {
        #[arg(long)]
        detector: Option<Detector>,
        /// Write hits to the discovery feed.
        #[arg(long)]
        write: bool,
    },
    /// Propose new themes.
    Discover {
        #[arg(long, default_value = "all")]
        strategy: Strategy,
        #[arg(long)]
        min_cluster: Option<usize>,
        /// Scored candidates for orphan clustering (JSON array or @path).
        #[arg(long)]
        signals: Option<String>,
    },
    /// Canned graph traversals.
    Query {
        #[command(subcommand)]
        query: QueryCommand,
    },
    /// Sync the pipeline index into the graph.
    Seed,
    /// Derive ADJACENT_TO edges between themes.
    Adjacency,
    /// Enrichment cache maintenance.
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },
}

#[derive(Subcommand)]
enum QueryCommand {
    Entity { slug: String },
    Theme { key: String },
    Adjacent { key: String },
    Stats,
}

#[derive(Subcommand)]
enum CacheCommand {
    Stats,
    Prune,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn read_signals(arg: &str) -> Result<Vec<SignalRecord>> {
    let raw = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?,
        None => arg.to_string(),
    };
    serde_json::from_str(&raw).context("signals must be a JSON array of records")
}

/// Graph store when configured and reachable. Graph-backed steps degrade
/// when this is `None`.
async fn open_graph(config: &Config) -> Option<Arc<dyn GraphStore>> {
    let Some((uri, user, password)) = config.graph_credentials() else {
        warn!("NEO4J_PASSWORD not set, running without the graph");
        return None;
    };
    let client = match GraphClient::connect(uri, user, password).await {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "Graph unavailable, continuing without it");
            return None;
        }
    };
    let store = Neo4jStore::new(client);
    if let Err(e) = store.ensure_schema().await {
        warn!(error = %e, "Schema migration failed, continuing without the graph");
        return None;
    }
    Some(Arc::new(store))
}

async fn require_graph(config: &Config) -> Result<Arc<dyn GraphStore>> {
    match open_graph(config).await {
        Some(store) => Ok(store),
        None => bail!("this command needs the graph (set NEO4J_URI, NEO4J_USER, NEO4J_PASSWORD)"),
    }
}

fn index_store(config: &Config) -> IndexStore {
    IndexStore::new(
        config.index_path.clone(),
        config.lock_path.clone(),
        config.lock_wait,
        config.lock_stale,
    )
}

#[derive(Serialize)]
struct ScoreOutput {
    slug: String,
    rubric: tigerclaw_scout::rubric::RubricScore,
    proximity: Option<tigerclaw_graph::ProximityResult>,
    network: Option<tigerclaw_graph::NetworkScore>,
    decision: tigerclaw_scout::rubric::Decision,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("tigerclaw=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    config.log_redacted();

    match cli.command {
        Command::Score {
            slug,
            attrs,
            already_funded,
            network,
        } => {
            let mut attrs: ScoringAttrs = match attrs {
                Some(raw) => serde_json::from_str(&raw).context("--attrs must be a JSON object")?,
                None => ScoringAttrs::default(),
            };
            attrs.already_funded |= already_funded;
            let mut rubric = score_extended(&attrs);

            let mut proximity = None;
            let mut network_score = None;
            if let Some(store) = open_graph(&config).await {
                match find_entity(store.as_ref(), &slug).await {
                    Ok(subject) => {
                        match proximity_bonus(store.as_ref(), &subject.node, attrs.already_funded).await {
                            Ok(p) => {
                                rubric.apply_proximity(&p);
                                proximity = Some(p);
                            }
                            Err(e) => warn!(error = %e, "Proximity failed, scoring without graph bonus"),
                        }
                        if network {
                            network_score = Some(network_rubric(store.as_ref(), &subject.node, today()).await);
                        }
                    }
                    Err(e) => warn!(error = %e, slug = %slug, "Not in graph, scoring without graph bonus"),
                }
            }
            let decision = decide_action(&rubric, None);
            print_json(&ScoreOutput {
                slug,
                rubric,
                proximity,
                network: network_score,
                decision,
            })?;
        }

        Command::Ripple {
            slug,
            event,
            strength,
            write,
            persist,
        } => {
            let store = require_graph(&config).await?;
            let report = ripple(store.as_ref(), &slug, &event, strength).await?;
            info!("\n{report}");

            let (feed, writer) = if persist {
                let (feed, writer) = DiscoveryFeed::open(config.feed_path.clone());
                (Some(feed), Some(writer))
            } else {
                (None, None)
            };
            let log = persist.then(|| SuggestionLog::new(config.suggestions_path.clone()));
            effects::apply(
                &report,
                RippleEffects {
                    feed: feed.as_ref(),
                    suggestions: log.as_ref(),
                    audit: write.then_some(store.as_ref()),
                },
            )
            .await;
            drop(feed);
            if let Some(writer) = writer {
                writer.finish().await;
            }
            print_json(&report)?;
        }

        Command::Ingest { signals, dry_run } => {
            let records = read_signals(&signals)?;
            let store = require_graph(&config).await?;
            let cache = EnrichmentCache::new(config.cache_dir.clone());
            let stats = ingest(
                store.as_ref(),
                &cache,
                &records,
                IngestOptions {
                    today: today(),
                    dry_run,
                },
            )
            .await?;
            print_json(&stats)?;
        }

        Command::Scan {
            themes,
            domains,
            sources,
            concurrency,
            no_persist,
            discover,
            dry_run,
        } => {
            let catalog = Arc::new(ThemeCatalog::load(&config.themes_path)?);
            let mut opts = ScanOptions::new(today());
            opts.themes = themes;
            opts.domains = domains;
            if !sources.is_empty() {
                opts.sources = sources;
            }
            opts.concurrency = concurrency.unwrap_or(config.concurrency);
            opts.persist = !no_persist;
            opts.discover = discover;
            opts.dry_run = dry_run;

            if dry_run {
                print_json(&scan::plan(&catalog, &opts)?)?;
                return Ok(());
            }

            let graph = open_graph(&config).await;
            let (feed, writer) = DiscoveryFeed::open(config.feed_path.clone());
            let deps = ScanDeps::builder()
                .scanner(Arc::new(CommandScanner::from_config(&config)))
                .catalog(catalog)
                .index(Arc::new(index_store(&config)))
                .graph(graph)
                .coauthors(Arc::new(EnrichmentCache::new(config.cache_dir.clone())))
                .feed(feed)
                .search_timeout(config.search_timeout)
                .aux_timeout(config.aux_timeout)
                .build();

            let abort = scan::install_interrupt_handler();
            let report = scan::run(&deps, &opts, abort).await;
            drop(deps);
            writer.finish().await;
            print_json(&report?)?;
        }

        Command::Detect { detector, write } => {
            let store = require_graph(&config).await?;
            let hits: Vec<CompoundHit> = match detector {
                Some(d) => detect(store.as_ref(), d, today()).await?,
                None => detect_all(store.as_ref(), today()).await,
            };
            if write {
                let (feed, writer) = DiscoveryFeed::open(config.feed_path.clone());
                for hit in &hits {
                    feed.emit(
                        FeedEntry::new(FeedStatus::Compound, &hit.name, &hit.detail)
                            .with_strength(hit.strength.as_str().to_uppercase()),
                    );
                }
                drop(feed);
                writer.finish().await;
            }
            print_json(&hits)?;
        }

        Command::Discover {
            strategy,
            min_cluster,
            signals,
        } => {
            let catalog = ThemeCatalog::load(&config.themes_path)?;
            let mut discovery = DiscoveryConfig::default();
            if let Some(n) = min_cluster {
                discovery.min_cluster = n;
            }
            let records = match signals {
                Some(arg) => read_signals(&arg)?,
                None => Vec::new(),
            };
            let candidates: Vec<DiscoveryCandidate> = records
                .into_iter()
                .map(|mut record| {
                    let domain = record.provenance.domain.clone().unwrap_or_else(|| "ai".to_string());
                    prepare(&mut record, &domain, &catalog.in_domain(&domain));
                    DiscoveryCandidate {
                        score: score_extended(&ScoringAttrs::from_signal(&record)).score,
                        best_relevance: record.best_relevance(),
                        keywords: record.provenance.keywords.iter().cloned().collect(),
                        name: record.name,
                    }
                })
                .collect();
            let graph = open_graph(&config).await;
            let proposals = discover(graph.as_deref(), &candidates, strategy, &discovery, &catalog.titles()).await;
            print_json(&proposals)?;
        }

        Command::Query { query } => {
            let store = require_graph(&config).await?;
            match query {
                QueryCommand::Entity { slug } => print_json(&entity_neighborhood(store.as_ref(), &slug).await?)?,
                QueryCommand::Theme { key } => print_json(&theme_roster(store.as_ref(), &key).await?)?,
                QueryCommand::Adjacent { key } => print_json(&adjacent_theme_experts(store.as_ref(), &key).await?)?,
                QueryCommand::Stats => print_json(&stats(store.as_ref()).await?)?,
            }
        }

        Command::Seed => {
            let index = index_store(&config).load()?;
            let store = require_graph(&config).await?;
            let catalog = ThemeCatalog::load(&config.themes_path)?;
            catalog.sync_to_graph(store.as_ref()).await;
            let stats = seed_from_index(store.as_ref(), &index).await;
            print_json(&stats)?;
        }

        Command::Adjacency => {
            let store = require_graph(&config).await?;
            print_json(&derive_adjacency(store.as_ref()).await?)?;
        }

        Command::Cache { action } => {
            let cache = EnrichmentCache::new(config.cache_dir.clone());
            match action {
                CacheCommand::Stats => print_json(&cache.stats().await)?,
                CacheCommand::Prune => {
                    let pruned = cache.prune().await?;
                    print_json(&serde_json::json!({ "pruned": pruned }))?;
                }
            }
        }
    }

    Ok(())
}
