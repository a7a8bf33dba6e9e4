use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use ironwright::cli::{Cli, Command};
use ironwright::config::IronwrightConfig;
use ironwright::ironic::{IronicClient, NodeAdapter, ProvisionPayload};
use ironwright::payload::PayloadFile;
use ironwright::state_machine::{Planner, TransitionAction, TransitionTable};
use ironwright::telemetry::init_telemetry;
use ironwright::ui::{self, ProvisionProgress};
use ironwright::workflow::ProvisionWorkflow;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_telemetry(cli.verbose, cli.json_logs)?;

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(timeout) = cli.timeout {
        config.workflow.timeout_secs = timeout;
    }

    match cli.command {
        Command::Transitions { state } => {
            ui::print_transitions(&TransitionTable::default(), state);
        }
        Command::State { node } => {
            let adapter = connect(&config)?;
            let status = adapter.get_state(&node).await?;
            ui::print_status(&node, &status);
        }
        Command::Provision {
            nodes,
            target,
            payload,
        } => {
            let goal = TransitionAction::from(target);
            let payload = match payload {
                Some(path) => {
                    PayloadFile::load(&path)?
                        .resolve(config.microversion()?, &config.iso_builder())
                        .await?
                }
                None => ProvisionPayload::default(),
            };
            if goal == TransitionAction::Clean && !payload.has_clean_steps() {
                warn!("payload has no clean steps; nodes will only be made manageable");
            }

            let workflow = ProvisionWorkflow::new(
                connect(&config)?,
                Planner::default(),
                config.workflow_options(),
            );
            provision(workflow, nodes, goal, payload).await?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<IronwrightConfig> {
    match path {
        Some(path) if !path.exists() => bail!("config file {} does not exist", path.display()),
        Some(path) => IronwrightConfig::load_from(path),
        None => IronwrightConfig::load(),
    }
}

fn connect(config: &IronwrightConfig) -> Result<NodeAdapter<IronicClient>> {
    let endpoint = config.endpoint()?;
    let client = IronicClient::new(endpoint, config.microversion()?, config.auth()?)
        .context("failed to build Ironic client")?;
    info!(endpoint, microversion = %client.microversion(), "using Ironic API");
    Ok(NodeAdapter::new(client, config.busy_retry.clone()))
}

/// Drive every node concurrently; Ctrl-C cancels all of them.
async fn provision(
    workflow: ProvisionWorkflow<IronicClient>,
    nodes: Vec<String>,
    goal: TransitionAction,
    payload: ProvisionPayload,
) -> Result<()> {
    let workflow = Arc::new(workflow);
    let payload = Arc::new(payload);
    let progress = Arc::new(ProvisionProgress::start(&nodes, goal));
    let cancel = CancellationToken::new();

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling workflows");
            interrupt.cancel();
        }
    });

    let mut tasks = JoinSet::new();
    for node in nodes {
        let workflow = Arc::clone(&workflow);
        let payload = Arc::clone(&payload);
        let progress = Arc::clone(&progress);
        let cancel = cancel.clone();
        tasks.spawn(async move {
            let result = workflow
                .run_observed(&node, goal, &payload, &cancel, progress.as_ref())
                .await;
            progress.finish(&node, &result);
            result
        });
    }

    let mut failed = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined.context("workflow task panicked")? {
            Ok(report) => ui::print_report(&report),
            Err(e) => {
                error!(error = %e, "provisioning failed");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{failed} node(s) did not reach '{goal}'");
    }
    Ok(())
}
