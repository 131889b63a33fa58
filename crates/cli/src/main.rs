use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::signal;
use tokio::time::{timeout, Instant};
use tracing::{info, warn};
use yakd_core::{Kind, Resource};
use yakd_select::crds::{self, CrdFilter};
use yakd_select::pods::{self, PodFilter};
use yakd_select::rbac::{bindings_by, BindingFilter};
use yakd_select::{by_uid_or_name, resources_by, sorted, Filter, Selection};
use yakd_store::{channel, State, StoreReader};
use yakd_watch::{ApiProbe, HttpApi, WatchConfig, WatchManager, DEFAULT_API_URL};

/// Upper bound on waiting for the first connection plus the initial burst.
const SYNC_DEADLINE: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "yakdctl", version, about = "yakd dashboard watch client")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Dashboard backend API base
    #[arg(long = "api-url", env = "YAKD_API_URL", global = true, default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Delay between liveness probes
    #[arg(long = "poll-interval-ms", env = "YAKD_POLL_INTERVAL_MS", global = true, default_value_t = 3000)]
    poll_interval_ms: u64,

    /// Quiet period that marks the end of the initial ADDED burst
    #[arg(long = "settle-ms", global = true, default_value_t = 1500)]
    settle_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Keep the store in sync and log every change until Ctrl-C
    Watch,
    /// List resources of one kind, newest first
    Ls {
        /// Kind, e.g. "Pod", "pods" or "deployment"
        kind: String,
        /// Exact namespace
        #[arg(long = "ns")]
        namespace: Option<String>,
        /// Case-insensitive name substring
        #[arg(long = "name-like")]
        name_like: Option<String>,
        /// Only resources owned by this uid
        #[arg(long = "owner-uid")]
        owner_uid: Option<String>,
        /// Pods only: exact spec.nodeName
        #[arg(long = "node")]
        node: Option<String>,
        /// (Cluster)RoleBindings only: exact roleRef.name
        #[arg(long = "role-ref")]
        role_ref: Option<String>,
        /// CustomResourceDefinitions only: exact spec.group
        #[arg(long = "group")]
        group: Option<String>,
    },
    /// Print one resource, looked up by uid or name
    Get {
        kind: String,
        uid_or_name: String,
    },
    /// List the API groups served by the cluster
    Groups,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    let config = WatchConfig::default()
        .with_api_url(cli.api_url.clone())
        .with_poll_interval(Duration::from_millis(cli.poll_interval_ms));
    config.validate()?;
    let settle = Duration::from_millis(cli.settle_ms);

    match cli.command {
        Commands::Watch => watch(&config).await?,
        Commands::Ls { kind, namespace, name_like, owner_uid, node, role_ref, group } => {
            let kind = parse_kind(&kind)?;
            info!(%kind, "ls invoked");
            let state = snapshot(&config, settle).await?;
            let store = state.resources.get(kind);
            let mut filter = Filter::new();
            filter.namespace = namespace;
            filter.name_like = name_like;
            filter.owner_uid = owner_uid;
            let selection = select(kind, store.values(), filter, node, role_ref, group)?;
            let items = sorted(selection.values());
            match cli.output {
                Output::Human => print_table(kind, &items),
                Output::Json => {
                    let items: Vec<&Resource> = items.iter().map(Arc::as_ref).collect();
                    println!("{}", serde_json::to_string_pretty(&items)?);
                }
            }
        }
        Commands::Get { kind, uid_or_name } => {
            let kind = parse_kind(&kind)?;
            info!(%kind, %uid_or_name, "get invoked");
            let state = snapshot(&config, settle).await?;
            let Some(resource) = by_uid_or_name(state.resources.get(kind), &uid_or_name) else {
                bail!("{kind} {uid_or_name:?} not found");
            };
            println!("{}", serde_json::to_string_pretty(resource.as_ref())?);
        }
        Commands::Groups => {
            let groups = HttpApi::new(&config)?.list_groups().await.context("listing api groups")?;
            match cli.output {
                Output::Human => groups.iter().for_each(|g| println!("{g}")),
                Output::Json => println!("{}", serde_json::to_string_pretty(&groups)?),
            }
        }
    }
    Ok(())
}

fn init_tracing() {
    let env = std::env::var("YAKD_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("YAKD_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid YAKD_METRICS_ADDR; expected host:port");
        }
    }
}

fn parse_kind(s: &str) -> Result<Kind> {
    Kind::parse_loose(s).ok_or_else(|| anyhow!("unknown kind {s:?}"))
}

fn select<'a>(
    kind: Kind,
    resources: impl IntoIterator<Item = &'a Arc<Resource>>,
    filter: Filter,
    node: Option<String>,
    role_ref: Option<String>,
    group: Option<String>,
) -> Result<Selection> {
    let misplaced = |flag: &str, wants: &str| anyhow!("--{flag} only applies to {wants}");
    if node.is_some() && kind != Kind::Pod {
        return Err(misplaced("node", "pods"));
    }
    if role_ref.is_some() && !matches!(kind, Kind::RoleBinding | Kind::ClusterRoleBinding) {
        return Err(misplaced("role-ref", "rolebindings and clusterrolebindings"));
    }
    if group.is_some() && kind != Kind::CustomResourceDefinition {
        return Err(misplaced("group", "customresourcedefinitions"));
    }
    Ok(match kind {
        Kind::Pod => pods::pods_by(resources, &PodFilter { filter, node_name: node }),
        Kind::RoleBinding | Kind::ClusterRoleBinding => {
            bindings_by(resources, &BindingFilter { filter, role_ref_name: role_ref })
        }
        Kind::CustomResourceDefinition => crds::crds_by(resources, &CrdFilter { filter, group }),
        _ => resources_by(resources, &filter),
    })
}

/// Run a manager until the first connection is open and the initial burst
/// has gone quiet for `settle`, then stop it and return the last state.
async fn snapshot(config: &WatchConfig, settle: Duration) -> Result<Arc<State>> {
    let (writer, reader) = channel();
    let manager = WatchManager::start(config, writer)?;
    let synced = wait_for_sync(&reader, settle).await;
    manager.stop().await;
    let state = synced?;
    if let Some(error) = &state.ui.error {
        warn!(%error, "backend reported an error while syncing");
    }
    Ok(state)
}

/// The stream has opened at least once and is not known to be down. The
/// store was reset when it opened, so everything after is a fresh sync.
fn stream_is_open(state: &State) -> bool {
    state.ui.stream_opens > 0 && !state.ui.offline
}

async fn wait_for_sync(reader: &StoreReader, settle: Duration) -> Result<Arc<State>> {
    let deadline = Instant::now() + SYNC_DEADLINE;
    let opened = timeout(SYNC_DEADLINE, reader.wait_until(stream_is_open))
        .await
        .map_err(|_| anyhow!("no connection to the dashboard backend within {SYNC_DEADLINE:?}"))?;
    if !stream_is_open(&opened) {
        bail!("watch manager ended before the stream opened");
    }
    let mut rx = reader.subscribe_epoch();
    let _ = rx.borrow_and_update();
    while Instant::now() < deadline {
        match timeout(settle, rx.changed()).await {
            Ok(Ok(())) => continue,
            Ok(Err(_)) | Err(_) => break,
        }
    }
    let state = reader.current();
    if state.ui.offline {
        bail!("lost the connection to the dashboard backend while syncing");
    }
    Ok(state)
}

async fn watch(config: &WatchConfig) -> Result<()> {
    let (writer, reader) = channel();
    let manager = WatchManager::start(config, writer)?;
    info!(api_url = %config.api_url, "watch invoked");
    let mut rx = reader.subscribe_epoch();
    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    warn!("watch manager ended; exiting watch loop");
                    break;
                }
                let epoch = *rx.borrow_and_update();
                log_state(epoch, &reader.current());
            }
            _ = signal::ctrl_c() => {
                info!("Ctrl-C received; shutting down watch loop");
                break;
            }
        }
    }
    manager.stop().await;
    Ok(())
}

fn log_state(epoch: u64, state: &State) {
    let counts = kind_counts(state);
    info!(
        epoch,
        total = state.resources.total(),
        offline = state.ui.offline,
        error = state.ui.error.as_deref().unwrap_or(""),
        counts = %counts,
        "store updated"
    );
}

/// `Kind=count` pairs for every non-empty store.
fn kind_counts(state: &State) -> String {
    state
        .resources
        .iter()
        .filter(|(_, store)| !store.is_empty())
        .map(|(kind, store)| format!("{kind}={}", store.len()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn print_table(kind: Kind, items: &[Arc<Resource>]) {
    let now = Utc::now();
    if kind == Kind::Pod {
        println!("{:<20} {:<40} {:<10} {:<9} AGE", "NAMESPACE", "NAME", "STATUS", "RESTARTS");
        for pod in items {
            println!(
                "{:<20} {:<40} {:<10} {:<9} {}",
                or_dash(pod.namespace()),
                pod.name(),
                or_dash(pods::status_phase(pod)),
                pods::restart_count(pod),
                render_age(pod.creation_timestamp(), now)
            );
        }
        return;
    }
    println!("{:<20} {:<40} AGE", "NAMESPACE", "NAME");
    for item in items {
        println!(
            "{:<20} {:<40} {}",
            or_dash(item.namespace()),
            item.name(),
            render_age(item.creation_timestamp(), now)
        );
    }
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() { "-" } else { s }
}

fn render_age(created: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(created) = created else { return "-".to_string() };
    let mut secs = (now - created).num_seconds().max(0) as u64;
    let days = secs / 86_400; secs %= 86_400;
    let hours = secs / 3600; secs %= 3600;
    let mins = secs / 60; secs %= 60;
    if days > 0 { format!("{}d{}h", days, hours) }
    else if hours > 0 { format!("{}h{}m", hours, mins) }
    else if mins > 0 { format!("{}m", mins) }
    else { format!("{}s", secs) }
}
