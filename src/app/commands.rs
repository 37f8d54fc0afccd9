use super::cli::{help_text, parse_cli_verb, split_global_options, CliVerb, GlobalOptions};
use super::AppError;
use crate::config::{
    default_global_config_path, default_global_state_root, load_settings, save_settings, Settings,
};
use crate::provisioning::{
    mail_nickname, normalize_order_external_id, CustomerType, OrderType, Provisioner,
    WorkflowReport,
};
use crate::queue::worker::run_workflow;
use crate::queue::{
    enqueue, recover_processing, Delivery, Disposition, ProvisioningMessage, QueueError,
    QueuePaths, QueueWorker,
};
use crate::remote::{GraphClient, InMemoryGraph, ResourceClient, RetryPolicy};
use crate::shared::ids::now_secs;
use crate::shared::logging::init_logging;
use crate::shared::pause::{RecordingPause, ThreadPause};
use crate::store::RecordStore;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub fn run_cli(args: Vec<String>) -> Result<String, String> {
    dispatch(args).map_err(|err| err.to_string())
}

fn dispatch(args: Vec<String>) -> Result<String, AppError> {
    let (options, args) = split_global_options(args)?;
    let Some(verb) = args.first() else {
        return Ok(help_text());
    };

    match parse_cli_verb(verb) {
        CliVerb::Help => Ok(help_text()),
        CliVerb::Nickname => cmd_nickname(&args[1..]),
        CliVerb::InitDb => cmd_init_db(&options),
        CliVerb::Enqueue => cmd_enqueue(&options, &args[1..]),
        CliVerb::ProcessOnce => cmd_process_once(&options),
        CliVerb::Worker => cmd_worker(&options),
        CliVerb::Handle => cmd_handle(&options, &args[1..]),
        CliVerb::ShowCustomer => cmd_show_customer(&options, &args[1..]),
        CliVerb::ShowOrder => cmd_show_order(&options, &args[1..]),
        CliVerb::Unknown => Err(AppError::Usage(format!("unknown command `{verb}`"))),
    }
}

struct AppContext {
    settings: Settings,
    store: RecordStore,
    queue: QueuePaths,
    dry_run: bool,
}

impl AppContext {
    fn open(options: &GlobalOptions) -> Result<Self, AppError> {
        let settings = load_or_default_settings(options)?;
        init_logging(&settings.logging);

        let db_path = if options.dry_run {
            settings.state_root.join("dry-run").join("provisio.db")
        } else {
            settings.resolved_database_path()
        };
        let store = RecordStore::open(&db_path)?;
        store.ensure_schema()?;

        let queue = QueuePaths::from_state_root(&settings.state_root);
        queue.ensure_dirs().map_err(|source| QueueError::Io {
            path: settings.state_root.join("queue").display().to_string(),
            source,
        })?;

        Ok(Self {
            settings,
            store,
            queue,
            dry_run: options.dry_run,
        })
    }

    fn provisioner(&self) -> Result<Provisioner, AppError> {
        let policy = RetryPolicy::from_settings(&self.settings.retry);
        let client = if self.dry_run {
            tracing::info!("dry run: remote calls go to an in-memory platform");
            ResourceClient::new(
                Arc::new(InMemoryGraph::new()),
                policy,
                Arc::new(RecordingPause::new()),
            )
        } else {
            let api = GraphClient::from_settings(&self.settings.graph)?;
            ResourceClient::new(Arc::new(api), policy, Arc::new(ThreadPause::new()))
        };
        Ok(Provisioner::new(self.store.clone(), client, &self.settings))
    }

    fn worker(&self) -> Result<QueueWorker, AppError> {
        Ok(QueueWorker::new(
            self.queue.clone(),
            self.provisioner()?,
            self.settings.queue.clone(),
        ))
    }
}

fn config_path(options: &GlobalOptions) -> Result<PathBuf, AppError> {
    match &options.config_path {
        Some(path) => Ok(path.clone()),
        None => Ok(default_global_config_path()?),
    }
}

/// A missing config file means defaults rooted at `~/.provisio`.
fn load_or_default_settings(options: &GlobalOptions) -> Result<Settings, AppError> {
    let path = config_path(options)?;
    if path.exists() {
        return Ok(load_settings(&path)?);
    }
    Ok(Settings::with_state_root(&default_global_state_root()?))
}

fn cmd_init_db(options: &GlobalOptions) -> Result<String, AppError> {
    let path = config_path(options)?;
    let created_config = if path.exists() {
        false
    } else {
        let settings = Settings::with_state_root(&default_global_state_root()?);
        save_settings(&settings, &path)?;
        true
    };
    let context = AppContext::open(options)?;
    Ok(format!(
        "initialized\nconfig={}\nconfig_created={created_config}\nstate_root={}\ndatabase={}",
        path.display(),
        context.settings.state_root.display(),
        context.store.db_path().display()
    ))
}

fn read_message(path: &str) -> Result<ProvisioningMessage, AppError> {
    let raw = fs::read_to_string(path).map_err(|source| AppError::Read {
        path: path.to_string(),
        source,
    })?;
    ProvisioningMessage::parse(&raw).map_err(|reason| AppError::InvalidMessage {
        path: path.to_string(),
        reason,
    })
}

fn single_path_arg<'a>(args: &'a [String], usage: &str) -> Result<&'a str, AppError> {
    match args {
        [path] => Ok(path.as_str()),
        _ => Err(AppError::Usage(format!("usage: {usage}"))),
    }
}

fn cmd_enqueue(options: &GlobalOptions, args: &[String]) -> Result<String, AppError> {
    let path = single_path_arg(args, "provisio enqueue <file>")?;
    let message = read_message(path)?;
    let context = AppContext::open(options)?;
    let queued = enqueue(&context.queue, &message, now_secs())?;
    Ok(format!(
        "enqueued\nkind={}\nexternal_id={}\npath={}",
        message.kind(),
        message.external_id(),
        queued.display()
    ))
}

fn cmd_process_once(options: &GlobalOptions) -> Result<String, AppError> {
    let context = AppContext::open(options)?;
    match context.worker()?.process_once()? {
        Some(delivery) => Ok(render_delivery(&delivery)),
        None => Ok("idle\nprocessed=0".to_string()),
    }
}

fn cmd_worker(options: &GlobalOptions) -> Result<String, AppError> {
    let context = AppContext::open(options)?;
    let recovered = recover_processing(&context.queue)?;
    if recovered > 0 {
        tracing::warn!(recovered, "returned stranded messages to incoming");
    }
    let stop = AtomicBool::new(false);
    let processed = context.worker()?.run(&stop);
    Ok(format!("stopped\nprocessed={processed}"))
}

fn cmd_handle(options: &GlobalOptions, args: &[String]) -> Result<String, AppError> {
    let path = single_path_arg(args, "provisio handle <file>")?;
    let message = read_message(path)?;
    let context = AppContext::open(options)?;
    let report = run_workflow(&context.provisioner()?, &message);
    Ok(render_report(&report))
}

fn cmd_nickname(args: &[String]) -> Result<String, AppError> {
    let [name, external_id, kind] = args else {
        return Err(AppError::Usage(
            "usage: provisio nickname <name> <externalId> <Customer|Supplier>".to_string(),
        ));
    };
    let customer_type = CustomerType::parse(kind).map_err(AppError::Usage)?;
    Ok(mail_nickname(name, external_id, customer_type))
}

fn cmd_show_customer(options: &GlobalOptions, args: &[String]) -> Result<String, AppError> {
    let [external_id, kind] = args else {
        return Err(AppError::Usage(
            "usage: provisio show-customer <externalId> <Customer|Supplier>".to_string(),
        ));
    };
    let customer_type = CustomerType::parse(kind).map_err(AppError::Usage)?;
    let context = AppContext::open(options)?;
    let store = &context.store;
    match store.find_customer(external_id, customer_type, None) {
        Some(customer) => Ok(to_pretty_json(&customer)),
        None => Err(AppError::Usage(format!(
            "no {customer_type} with external id `{external_id}`"
        ))),
    }
}

fn cmd_show_order(options: &GlobalOptions, args: &[String]) -> Result<String, AppError> {
    let (external_id, order_type) = match args {
        [external_id] => (external_id.as_str(), OrderType::Order),
        [external_id, kind] => (
            external_id.as_str(),
            OrderType::parse(kind).map_err(AppError::Usage)?,
        ),
        _ => {
            return Err(AppError::Usage(
                "usage: provisio show-order <externalId> [type]".to_string(),
            ))
        }
    };
    let normalized = normalize_order_external_id(external_id, order_type);
    let context = AppContext::open(options)?;
    match context.store.find_order(&normalized) {
        Some(order) => Ok(to_pretty_json(&order)),
        None => Err(AppError::Usage(format!(
            "no order with external id `{normalized}`"
        ))),
    }
}

fn to_pretty_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|err| format!("unrenderable: {err}"))
}

fn render_report(report: &WorkflowReport) -> String {
    format!(
        "workflow={}\nexternal_id={}\nrecord_id={}\nstatus={}\noutcome={}",
        report.workflow,
        report.external_id,
        report.record_id.as_deref().unwrap_or("none"),
        report.status,
        outcome_label(report)
    )
}

fn outcome_label(report: &WorkflowReport) -> &'static str {
    use crate::provisioning::Outcome;
    match report.outcome {
        Outcome::Completed => "completed",
        Outcome::AlreadyHandled => "already_handled",
        Outcome::Unprocessable { .. } => "unprocessable",
    }
}

fn render_delivery(delivery: &Delivery) -> String {
    let (result, path, detail) = match &delivery.disposition {
        Disposition::Completed { path } => ("completed", path.as_path(), String::new()),
        Disposition::Requeued { path, not_before } => (
            "requeued",
            path.as_path(),
            format!("\nnot_before={not_before}"),
        ),
        Disposition::DeadLettered { path, reason } => (
            "dead_lettered",
            path.as_path(),
            format!("\nreason={reason}"),
        ),
    };
    format!(
        "{result}\nmessage_id={}\nattempt={}\npath={}{detail}",
        delivery.message_id,
        delivery.attempt,
        path.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nickname_command_prints_derived_nickname() {
        let out = run_cli(vec![
            "nickname".to_string(),
            "Ärlig & Co.".to_string(),
            "4711".to_string(),
            "Customer".to_string(),
        ])
        .expect("nickname");
        assert_eq!(out, "rligCo-4711-Kund");
    }

    #[test]
    fn unknown_command_is_an_error() {
        let err = run_cli(vec!["frobnicate".to_string()]).expect_err("unknown");
        assert!(err.contains("unknown command `frobnicate`"));
    }

    #[test]
    fn no_arguments_prints_help() {
        let out = run_cli(Vec::new()).expect("help");
        assert!(out.contains("process-once"));
    }
}
