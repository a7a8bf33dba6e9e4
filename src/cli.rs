//! Interface de linha de comando do ironwright baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (provision, state,
//! transitions) e flags globais (--config, --timeout, --verbose, --json-logs).

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::state_machine::{ProvisionState, TransitionAction};

/// ironwright: conduz nós bare-metal do Ironic até o estado de provisionamento desejado.
#[derive(Debug, Parser)]
#[command(name = "ironwright", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração (padrão: ./ironwright.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Tempo máximo, em segundos, para cada nó atingir o alvo.
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Emite logs estruturados em JSON.
    #[arg(long, global = true, default_value_t = false)]
    pub json_logs: bool,
}

/// Estado final aceito pela CLI, mapeado para [`TransitionAction`] internamente.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TargetArg {
    /// Leva o nó a `manageable`.
    Manage,
    /// Leva o nó a `available`.
    Provide,
    /// Faz o deploy do nó até `active`.
    Active,
    /// Desfaz o deploy; termina em `available`, `manageable` ou `enroll`.
    Deleted,
    /// Limpeza manual com os clean steps do payload.
    Clean,
    /// Inspeção de hardware.
    Inspect,
    /// Service steps em um nó ativo.
    Service,
}

impl From<TargetArg> for TransitionAction {
    fn from(target: TargetArg) -> Self {
        match target {
            TargetArg::Manage => TransitionAction::Manage,
            TargetArg::Provide => TransitionAction::Provide,
            TargetArg::Active => TransitionAction::Active,
            TargetArg::Deleted => TransitionAction::Deleted,
            TargetArg::Clean => TransitionAction::Clean,
            TargetArg::Inspect => TransitionAction::Inspect,
            TargetArg::Service => TransitionAction::Service,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Conduz um ou mais nós até o estado alvo.
    Provision {
        /// UUIDs ou nomes dos nós.
        #[arg(required = true)]
        nodes: Vec<String>,

        /// Resultado desejado.
        #[arg(long, value_enum)]
        target: TargetArg,

        /// Arquivo JSON ou TOML com config drive e steps.
        #[arg(long)]
        payload: Option<PathBuf>,
    },

    /// Mostra o estado de provisionamento atual de um nó.
    State {
        node: String,
    },

    /// Lista as transições conhecidas, opcionalmente a partir de um estado.
    Transitions {
        /// Estado de origem, ex.: "deploy failed".
        state: Option<ProvisionState>,
    },
}
