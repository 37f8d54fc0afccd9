use super::AppError;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliVerb {
    InitDb,
    Enqueue,
    ProcessOnce,
    Worker,
    Handle,
    Nickname,
    ShowCustomer,
    ShowOrder,
    Help,
    Unknown,
}

pub fn parse_cli_verb(input: &str) -> CliVerb {
    match input {
        "init-db" => CliVerb::InitDb,
        "enqueue" => CliVerb::Enqueue,
        "process-once" => CliVerb::ProcessOnce,
        "worker" => CliVerb::Worker,
        "handle" => CliVerb::Handle,
        "nickname" => CliVerb::Nickname,
        "show-customer" => CliVerb::ShowCustomer,
        "show-order" => CliVerb::ShowOrder,
        "help" | "--help" | "-h" => CliVerb::Help,
        _ => CliVerb::Unknown,
    }
}

/// Options accepted before or after the verb.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalOptions {
    /// Run against the in-memory remote instead of the real API.
    pub dry_run: bool,
    pub config_path: Option<PathBuf>,
}

/// Pulls `--dry-run` and `--config <path>` out of `args`, returning the rest.
pub fn split_global_options(args: Vec<String>) -> Result<(GlobalOptions, Vec<String>), AppError> {
    let mut options = GlobalOptions::default();
    let mut rest = Vec::new();
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--dry-run" => options.dry_run = true,
            "--config" => {
                let path = iter
                    .next()
                    .ok_or_else(|| AppError::Usage("`--config` requires a path".to_string()))?;
                options.config_path = Some(PathBuf::from(path));
            }
            _ => rest.push(arg),
        }
    }
    Ok((options, rest))
}

pub fn cli_help_lines() -> Vec<String> {
    vec![
        "Usage: provisio [--dry-run] [--config <path>] <command>".to_string(),
        String::new(),
        "Commands:".to_string(),
        "  init-db                              Create the state root, config and database"
            .to_string(),
        "  enqueue <file>                       Queue a customer or order message".to_string(),
        "  process-once                         Handle the next due queued message".to_string(),
        "  worker                               Process the queue until stopped".to_string(),
        "  handle <file>                        Run a message's workflow without queueing"
            .to_string(),
        "  nickname <name> <externalId> <type>  Print the derived mail nickname".to_string(),
        "  show-customer <externalId> <type>    Print the stored customer record".to_string(),
        "  show-order <externalId>              Print the stored order record".to_string(),
    ]
}

pub(crate) fn help_text() -> String {
    cli_help_lines().join("\n")
}
