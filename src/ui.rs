//! Interface de terminal do ironwright: spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`ProvisionProgress`] acompanha visualmente
//! cada nó enquanto o workflow o conduz até o estado desejado.

use std::collections::HashMap;
use std::time::Duration;

use console::Style;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::error::WorkflowError;
use crate::ironic::NodeStatus;
use crate::state_machine::{ProvisionState, TransitionAction, TransitionTable, WorkflowReport};
use crate::workflow::{WorkflowEvent, WorkflowObserver};

/// Indicador visual de progresso para um conjunto de nós.
///
/// Um spinner por nó; mensagens coloridas para sucesso (verde), falha
/// (vermelho) e recuperação (amarelo).
pub struct ProvisionProgress {
    bars: HashMap<String, ProgressBar>,
    green: Style,
    red: Style,
    yellow: Style,
}

impl ProvisionProgress {
    /// Inicia um spinner por nó, desenhando em stderr.
    pub fn start(nodes: &[String], goal: TransitionAction) -> Self {
        Self::with_target(nodes, goal, ProgressDrawTarget::stderr())
    }

    pub fn with_target(nodes: &[String], goal: TransitionAction, target: ProgressDrawTarget) -> Self {
        let multi = MultiProgress::with_draw_target(target);
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {prefix:.bold} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());

        let bars = nodes
            .iter()
            .map(|node| {
                let pb = multi.add(ProgressBar::new_spinner());
                pb.set_style(style.clone());
                pb.set_prefix(node.clone());
                pb.set_message(format!("starting ({goal})"));
                pb.enable_steady_tick(Duration::from_millis(100));
                (node.clone(), pb)
            })
            .collect();

        Self {
            bars,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Mensagem atual do spinner de um nó.
    pub fn message(&self, node_id: &str) -> Option<String> {
        self.bars.get(node_id).map(ProgressBar::message)
    }

    /// Finaliza o spinner do nó, deixando o resultado no lugar dele.
    ///
    /// Sucesso é mostrado em verde com checkmark; falha em vermelho com X.
    pub fn finish(&self, node_id: &str, result: &Result<WorkflowReport, WorkflowError>) {
        let Some(pb) = self.bars.get(node_id) else {
            return;
        };
        let message = match result {
            Ok(report) => format!(
                "{} {} after {} action(s)",
                self.green.apply_to("✓"),
                report
                    .final_state
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "done".to_string()),
                report.actions_issued.len()
            ),
            Err(e) => format!("{} {e}", self.red.apply_to("✗")),
        };
        pb.finish_with_message(message);
    }
}

impl WorkflowObserver for ProvisionProgress {
    fn on_event(&self, node_id: &str, event: &WorkflowEvent) {
        let Some(pb) = self.bars.get(node_id) else {
            return;
        };
        match event {
            WorkflowEvent::Observed(state) => pb.set_message(state.to_string()),
            WorkflowEvent::Issued(action) => pb.set_message(format!("requested {action}")),
            WorkflowEvent::Recovering { state, action } => {
                pb.set_message(format!("recovering from {state}"));
                pb.println(format!(
                    "  {} {node_id}: {state}, issuing {action}",
                    self.yellow.apply_to("↻")
                ));
            }
            WorkflowEvent::PollFailed(reason) => {
                pb.set_message(format!("poll failed: {reason}"));
            }
        }
    }
}

/// Imprime o relatório do workflow formatado em JSON.
pub fn print_report(report: &WorkflowReport) {
    println!(
        "{}",
        serde_json::to_string_pretty(report).unwrap_or_default()
    );
}

pub fn print_status(node_id: &str, status: &NodeStatus) {
    let style = if status.state.is_terminal_failure() {
        Style::new().red().bold()
    } else if status.state.is_transient() {
        Style::new().yellow()
    } else {
        Style::new().green()
    };
    println!("node:         {node_id}");
    println!("state:        {}", style.apply_to(status.state));
    println!("target:       {}", status.target.as_deref().unwrap_or("-"));
    println!("last error:   {}", status.last_error.as_deref().unwrap_or("-"));
}

/// Linhas da tabela de transições, opcionalmente só as que saem de `from`.
pub fn transition_lines(table: &TransitionTable, from: Option<ProvisionState>) -> Vec<String> {
    table
        .transitions()
        .iter()
        .filter(|t| from.is_none_or(|s| t.from == s))
        .map(|t| format!("{:<18} --{}--> {}", t.from.as_str(), t.action, t.to))
        .collect()
}

pub fn print_transitions(table: &TransitionTable, from: Option<ProvisionState>) {
    let dim = Style::new().dim();
    let lines = transition_lines(table, from);
    if lines.is_empty() {
        println!("{}", dim.apply_to("no client actions from this state"));
    }
    for line in lines {
        println!("{line}");
    }
}
