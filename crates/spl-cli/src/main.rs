//! spl CLI
//!
//! Command-line interface for Splunk development and maintenance operations:
//! listing and syncing knowledge objects, event samples, local apps and the
//! development container.

mod cli;
mod commands;
mod error;
mod interactive;
mod logging;
mod session;

use std::path::Path;

use clap::Parser;
use colored::Colorize;
use spl_core::{
    AppInspectClient, AppsManager, ObjectKind, SamplesManager, SyncEngine, SyncOptions,
};

use cli::{Cli, Commands, ManagerAction, NamespaceArgs, SamplesAction};
use error::{CliError, Result};
use session::Session;

/// Connection of `manager` when neither --conn nor --src is given
const DEFAULT_CONNECTION: &str = "localhost";

fn main() {
    match run() {
        Ok(()) => {}
        Err(e) if e.is_interrupt() => {
            println!("Bye!");
            std::process::exit(130);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command.clone() else {
        // No command provided - show help hint
        println!("{} Splunk management utility", "spl".green().bold());
        println!();
        println!("Run {} for available commands.", "spl --help".cyan());
        return Ok(());
    };

    let cwd = std::env::current_dir()?;
    let _guard = logging::init(&cli.level, &cwd)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        tokio::select! {
            result = execute_command(&cli, command, &cwd) => result,
            _ = tokio::signal::ctrl_c() => Err(CliError::Interrupted),
        }
    })
}

async fn execute_command(cli: &Cli, cmd: Commands, cwd: &Path) -> Result<()> {
    if matches!(cmd, Commands::Sync { .. }) {
        sync_connections(cli)?;
    }

    let session = Session::load(cli, cwd)?;
    match cmd {
        Commands::Connections => commands::run_connections(session.settings()),
        Commands::Manager {
            conn,
            namespace,
            action,
        } => {
            let name = conn
                .or_else(|| cli.src.clone())
                .unwrap_or_else(|| DEFAULT_CONNECTION.to_string());
            cmd_manager(&session, &name, &namespace, action).await
        }
        Commands::Sync {
            kind,
            create,
            update,
            delete,
            simulate,
            conf,
            namespace,
        } => {
            let options = SyncOptions {
                create,
                update,
                delete,
                simulate,
            };
            cmd_sync(cli, &session, &kind, options, conf.as_deref(), &namespace).await
        }
        Commands::Samples { path, action } => cmd_samples(cli, &session, &path, action).await,
        Commands::Apps { path, name, action } => {
            cmd_apps(&session, &path, name.as_deref(), action).await
        }
        Commands::Docker { action } => commands::run_docker(
            &session.docker(),
            &session.settings().docker.image,
            action,
            session.prompter(),
        ),
    }
}

async fn cmd_manager(
    session: &Session,
    name: &str,
    namespace: &NamespaceArgs,
    action: ManagerAction,
) -> Result<()> {
    let adapter = session.connect(name, namespace).await?;
    match action {
        ManagerAction::List { kind, details } => commands::run_list(&adapter, &kind, details).await,
        ManagerAction::Restart => commands::run_restart(&adapter).await,
        ManagerAction::Info => commands::run_info(&adapter),
    }
}

async fn cmd_sync(
    cli: &Cli,
    session: &Session,
    kind: &str,
    options: SyncOptions,
    conf: Option<&str>,
    namespace: &NamespaceArgs,
) -> Result<()> {
    // Validate arguments before any connection is made
    let target = match (kind, conf) {
        ("confs", Some(conf)) => SyncTarget::Conf(conf),
        ("confs", None) => return Err(CliError::user("sync confs needs --conf <NAME>")),
        (kind, _) => SyncTarget::Objects(commands::parse_kind(kind)?),
    };
    let (src, dest) = sync_connections(cli)?;

    let src = session.connect(src, namespace).await?;
    let dest = session.connect(dest, namespace).await?;
    let engine = SyncEngine::new(
        &src,
        &dest,
        session.prompter(),
        session.interactive(),
        &session.settings().sync,
    );
    match target {
        SyncTarget::Objects(kind) => commands::run_sync(&engine, kind, options).await,
        SyncTarget::Conf(conf) => commands::run_confs(&engine, conf).await,
    }
}

enum SyncTarget<'a> {
    Objects(ObjectKind),
    Conf(&'a str),
}

fn sync_connections(cli: &Cli) -> Result<(&str, &str)> {
    match (cli.src.as_deref(), cli.dest.as_deref()) {
        (Some(src), Some(dest)) => Ok((src, dest)),
        _ => Err(CliError::user(
            "sync needs both a source and a destination, use --src and --dest",
        )),
    }
}

async fn cmd_samples(
    cli: &Cli,
    session: &Session,
    path: &Path,
    action: SamplesAction,
) -> Result<()> {
    let manager = SamplesManager::new(&session.settings().samples, path, session.interactive());
    match action {
        SamplesAction::List => commands::run_samples_list(&manager),
        SamplesAction::Download { name, connection } => {
            let connection =
                SamplesManager::resolve_connection(connection.as_deref(), cli.src.as_deref())?;
            let adapter = session.connect(&connection, &NamespaceArgs::default()).await?;
            commands::run_samples_download(&manager, &adapter, name.as_deref(), session.prompter())
                .await
        }
    }
}

async fn cmd_apps(
    session: &Session,
    path: &Path,
    name: Option<&str>,
    action: cli::AppsAction,
) -> Result<()> {
    let settings = session.settings();
    let manager = AppsManager::new(
        path,
        name,
        session.interactive(),
        session.docker_api(),
        &settings.docker.package_image,
        AppInspectClient::new(&settings.splunkbase)?,
    )?;
    match action {
        cli::AppsAction::List { csv } => commands::run_apps_list(&manager, csv.as_deref()),
        cli::AppsAction::Validate { force, cloudvet } => {
            commands::run_apps_validate(&manager, force, cloudvet, session.prompter()).await
        }
    }
}
