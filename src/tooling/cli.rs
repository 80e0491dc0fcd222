//! CLI Tooling
//!
//! Command-line interface for running the operator, one-shot reconciliation
//! of a manifest directory, status inspection and name normalization.

use crate::api::{Agent, Function};
use crate::config::OperatorConfig;
use crate::controller::{Controller, Event};
use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::manifest::{apply_all, load_dir};
use crate::reconcile::{normalize_agent_name, ReconcileOutcome};
use crate::store::Client;
use crate::tooling::watch::{ManifestWatcher, WatchConfig};
use crate::types::ObjectKey;
use clap::{Parser, Subcommand};
use comfy_table::Table;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;
use tokio::sync::watch;
use tracing::info;

/// Agent operator - reconciles agents into executable functions
#[derive(Parser)]
#[command(name = "agent-operator")]
#[command(about = "Reconciles declared agents into executable function definitions")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (layered over the global config file)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Logging config with command-line overrides applied
    pub fn logging_config(&self, base: &LoggingConfig) -> LoggingConfig {
        let mut config = base.clone();
        if let Some(level) = &self.log_level {
            config.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            config.output = output.clone();
        }
        if let Some(file) = &self.log_file {
            config.file = Some(file.clone());
        }
        config
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the controller until interrupted
    Run {
        /// Apply the manifests in this directory before starting
        #[arg(long)]
        manifests: Option<PathBuf>,
        /// Re-apply manifests when files change
        #[arg(long, requires = "manifests")]
        watch: bool,
    },
    /// Apply manifests, reconcile every agent once and print the derived functions
    Reconcile {
        /// Manifest directory or file
        #[arg(long)]
        manifests: PathBuf,
        /// Output format (yaml or json)
        #[arg(long, default_value = "yaml")]
        format: String,
    },
    /// Show agents and the status mirrored from their functions
    Status {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
        /// Restrict to one namespace
        #[arg(long)]
        namespace: Option<String>,
    },
    /// Print the identifier an agent name normalizes to
    Normalize {
        /// Agent name
        name: String,
    },
}

#[derive(Debug, Serialize)]
struct ReconcileFailure {
    agent: String,
    reason: String,
    error: String,
    count: u32,
    last_seen: String,
}

impl ReconcileFailure {
    fn from_event(key: &ObjectKey, event: Event) -> Self {
        Self {
            agent: key.to_string(),
            reason: event.reason,
            error: event.message,
            count: event.count,
            last_seen: event.last_seen.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ReconcileReport {
    functions: Vec<Function>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failures: Vec<ReconcileFailure>,
}

#[derive(Debug, Clone, Serialize)]
struct AgentStatusEntry {
    namespace: String,
    agent: String,
    tools: usize,
    function: bool,
    replicas: i32,
    ready_replicas: i32,
    available_replicas: i32,
}

/// CLI context holding the loaded config, the store client and a runtime
pub struct CliContext {
    config: OperatorConfig,
    client: Client,
    runtime: Runtime,
}

impl CliContext {
    /// Create a new CLI context over the configured store
    pub fn new(config: OperatorConfig) -> Result<Self, ApiError> {
        let store = config.store.open()?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            config,
            client: Client::new(store),
            runtime,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Execute a CLI command
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Run { manifests, watch } => {
                self.handle_run(manifests.as_deref(), *watch)
            }
            Commands::Reconcile { manifests, format } => self.handle_reconcile(manifests, format),
            Commands::Status { format, namespace } => {
                self.handle_status(format, namespace.as_deref())
            }
            Commands::Normalize { name } => Ok(normalize_agent_name(name)),
        }
    }

    fn controller(&self) -> Controller {
        Controller::new(
            self.client.clone(),
            self.config.pulsar.clone(),
            self.config.controller.clone(),
        )
    }

    fn handle_run(&self, manifests: Option<&Path>, watch_manifests: bool) -> Result<String, ApiError> {
        self.runtime.block_on(async {
            if let Some(dir) = manifests {
                let loaded = load_dir(dir)?;
                apply_all(&self.client, &loaded).await?;
            }

            let (stop_tx, stop_rx) = watch::channel(false);
            let stopped = |mut rx: watch::Receiver<bool>| async move {
                let _ = rx.wait_for(|stop| *stop).await;
            };

            let controller = self.controller();
            let watcher = match (manifests, watch_manifests) {
                (Some(dir), true) => Some(ManifestWatcher::new(
                    self.client.clone(),
                    WatchConfig::new(dir.to_path_buf()),
                )),
                _ => None,
            };

            let signal = async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => info!("Interrupt received"),
                    Err(e) => tracing::error!(error = %e, "Failed to listen for interrupt"),
                }
                let _ = stop_tx.send(true);
            };
            let watching = async {
                match &watcher {
                    Some(watcher) => watcher.run(stopped(stop_rx.clone())).await,
                    None => Ok(()),
                }
            };

            let (run_result, watch_result, _) =
                tokio::join!(controller.run(stopped(stop_rx.clone())), watching, signal);
            run_result?;
            watch_result?;

            let mut output = "Controller stopped".to_string();
            let outstanding = controller.recorder().outstanding();
            if !outstanding.is_empty() {
                output.push('\n');
                output.push_str(&format_warnings_table(&outstanding));
            }
            Ok::<_, ApiError>(output)
        })
    }

    fn handle_reconcile(&self, manifests: &Path, format: &str) -> Result<String, ApiError> {
        let loaded = load_dir(manifests)?;
        let controller = self.controller();

        let report = self.runtime.block_on(async {
            apply_all(&self.client, &loaded).await?;
            let results = controller.reconcile_all().await?;

            let mut functions = Vec::new();
            for (key, result) in results {
                if let Ok(ReconcileOutcome::Synced { .. }) = result {
                    functions.push(self.client.get::<Function>(&key).await?);
                }
            }
            Ok::<_, ApiError>(ReconcileReport {
                functions,
                failures: controller
                    .recorder()
                    .outstanding()
                    .into_iter()
                    .map(|(key, event)| ReconcileFailure::from_event(&key, event))
                    .collect(),
            })
        })?;

        match format {
            "json" => serde_json::to_string_pretty(&report)
                .map_err(|e| ApiError::Serialization(e.to_string())),
            "yaml" => serde_yaml::to_string(&report).map_err(|e| ApiError::Serialization(e.to_string())),
            other => Err(ApiError::ConfigError(format!(
                "Invalid output format: {} (must be 'yaml' or 'json')",
                other
            ))),
        }
    }

    fn handle_status(&self, format: &str, namespace: Option<&str>) -> Result<String, ApiError> {
        let (agents, functions) = self.runtime.block_on(async {
            let agents: Vec<Agent> = self.client.list(namespace).await?;
            let functions: Vec<Function> = self.client.list(namespace).await?;
            Ok::<_, ApiError>((agents, functions))
        })?;

        let owned: HashMap<ObjectKey, &Function> = functions
            .iter()
            .filter(|f| {
                agents
                    .iter()
                    .any(|a| f.metadata.is_owned_by(&a.metadata.uid))
            })
            .map(|f| (f.metadata.key(), f))
            .collect();

        let entries: Vec<AgentStatusEntry> = agents
            .iter()
            .map(|agent| {
                let status = &agent.status.function_status;
                AgentStatusEntry {
                    namespace: agent.metadata.namespace.clone(),
                    agent: agent.metadata.name.clone(),
                    tools: agent.spec.tools.len(),
                    function: owned.contains_key(&agent.metadata.key()),
                    replicas: status.replicas,
                    ready_replicas: status.ready_replicas,
                    available_replicas: status.available_replicas,
                }
            })
            .collect();

        match format {
            "json" => serde_json::to_string_pretty(&entries)
                .map_err(|e| ApiError::Serialization(e.to_string())),
            "text" => Ok(format_status_table(&entries)),
            other => Err(ApiError::ConfigError(format!(
                "Invalid output format: {} (must be 'text' or 'json')",
                other
            ))),
        }
    }
}

/// Latest warning of every agent that did not reconcile cleanly
fn format_warnings_table(outstanding: &[(ObjectKey, Event)]) -> String {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Agent", "Reason", "Count", "Last Seen", "Message"]);
    for (key, event) in outstanding {
        table.add_row(vec![
            key.to_string(),
            event.reason.clone(),
            event.count.to_string(),
            event.last_seen.format("%Y-%m-%d %H:%M:%S").to_string(),
            event.message.clone(),
        ]);
    }
    table.to_string()
}

fn format_status_table(entries: &[AgentStatusEntry]) -> String {
    if entries.is_empty() {
        return "No agents found.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec![
        "Namespace",
        "Agent",
        "Tools",
        "Function",
        "Replicas",
        "Ready",
        "Available",
    ]);
    for entry in entries {
        table.add_row(vec![
            entry.namespace.clone(),
            entry.agent.clone(),
            entry.tools.to_string(),
            if entry.function { "yes" } else { "-" }.to_string(),
            entry.replicas.to_string(),
            entry.ready_replicas.to_string(),
            entry.available_replicas.to_string(),
        ]);
    }
    table.to_string()
}
