//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

/// spl - Splunk development and maintenance operations
#[derive(Parser, Debug)]
#[command(name = "spl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Ask before changing anything and offer selections
    #[arg(long, global = true, default_value_t = true, action = ArgAction::Set)]
    pub interactive: bool,

    /// Log level (trace, debug, info, warn, error), RUST_LOG wins
    #[arg(long, global = true, default_value = "info")]
    pub level: String,

    /// Source connection from the settings
    #[arg(long, global = true)]
    pub src: Option<String>,

    /// Destination connection from the settings
    #[arg(long, global = true)]
    pub dest: Option<String>,

    /// Ask for the namespace context (app, sharing, owner) of connections
    #[arg(long, global = true)]
    pub context: bool,

    /// Directory holding settings.yaml (defaults to the working directory)
    #[arg(long, global = true)]
    pub settings_dir: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// List the connections defined in the settings
    Connections,

    /// Inspect and operate one Splunk instance
    Manager {
        /// Connection to use (falls back to --src, then 'localhost')
        #[arg(long)]
        conn: Option<String>,

        #[command(flatten)]
        namespace: NamespaceArgs,

        #[command(subcommand)]
        action: ManagerAction,
    },

    /// Reconcile knowledge objects from --src onto --dest
    ///
    /// Without --create, --update or --delete only the differences are shown.
    ///
    /// Examples:
    ///   spl --src prod --dest dev sync roles --create --update
    ///   spl --src prod --dest dev sync users --delete --simulate
    ///   spl --src prod --dest dev sync confs --conf props
    Sync {
        /// Object kind (apps, eventtypes, indexes, inputs, roles, savedsearches, users)
        /// or 'confs'
        kind: String,

        /// Create objects missing on the destination
        #[arg(long)]
        create: bool,

        /// Update properties differing on the destination
        #[arg(long)]
        update: bool,

        /// Delete objects missing on the source
        #[arg(long)]
        delete: bool,

        /// Log every decision without writing
        #[arg(long)]
        simulate: bool,

        /// Configuration file to compare with 'confs' (e.g. props)
        #[arg(long)]
        conf: Option<String>,

        #[command(flatten)]
        namespace: NamespaceArgs,
    },

    /// Download event samples from configured searches
    Samples {
        /// Working directory for sample files
        #[arg(long, default_value = ".")]
        path: PathBuf,

        #[command(subcommand)]
        action: SamplesAction,
    },

    /// Local app discovery, packaging and validation
    Apps {
        /// Directory holding the app folders
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Glob over app folder names
        #[arg(long)]
        name: Option<String>,

        #[command(subcommand)]
        action: AppsAction,
    },

    /// Local Splunk development container
    Docker {
        #[command(subcommand)]
        action: DockerAction,
    },
}

/// Namespace context of a connection
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceArgs {
    /// App context ('-' for all apps)
    #[arg(long)]
    pub app: Option<String>,

    /// Sharing context (global, system, app, user or '-')
    #[arg(long)]
    pub sharing: Option<String>,

    /// Owner context ('-' for all owners)
    #[arg(long)]
    pub owner: Option<String>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ManagerAction {
    /// List knowledge objects of one kind
    List {
        /// Object kind (apps, eventtypes, indexes, inputs, roles, savedsearches, users)
        kind: String,

        /// Show detail columns and access control
        #[arg(long)]
        details: bool,
    },

    /// Restart splunkd (requires allow_restart for the connection)
    Restart,

    /// Show the connection and its namespace
    Info,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum SamplesAction {
    /// Show the configured samples
    List,

    /// Run sample searches and store the results as CSV
    Download {
        /// Sample to download (required when not interactive)
        #[arg(long)]
        name: Option<String>,

        /// Connection to search on (falls back to --src)
        #[arg(long)]
        connection: Option<String>,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum AppsAction {
    /// Show the discovered apps
    List {
        /// Also write the listing to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Package, AppInspect and optionally cloud-vet apps
    Validate {
        /// Rebuild packages and reports that already exist
        #[arg(long)]
        force: bool,

        /// Submit packages to cloud vetting (asked when not given)
        #[arg(long, action = ArgAction::Set)]
        cloudvet: Option<bool>,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum DockerAction {
    /// Show image, container and volumes
    Status,

    /// Create or start the container
    Start,

    /// Stop the container
    Stop,

    /// List custom apps installed in the container
    List,

    /// Copy local apps into the container
    Upload {
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Glob over app folder names
        #[arg(long)]
        app: Option<String>,
    },

    /// Copy apps from the container
    Download {
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Substring of container app names
        #[arg(long)]
        app: Option<String>,
    },

    /// Reset ownership and modes of app files in the container
    FixPermissions {
        #[arg(long)]
        app: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_sync_with_globals() {
        let cli = Cli::try_parse_from([
            "spl",
            "--src",
            "prod",
            "--dest",
            "dev",
            "--interactive",
            "false",
            "sync",
            "roles",
            "--create",
            "--simulate",
        ])
        .unwrap();
        assert!(!cli.interactive);
        assert_eq!(cli.src.as_deref(), Some("prod"));
        match cli.command {
            Some(Commands::Sync {
                kind,
                create,
                update,
                simulate,
                ..
            }) => {
                assert_eq!(kind, "roles");
                assert!(create && simulate && !update);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn interactive_defaults_to_true() {
        let cli = Cli::try_parse_from(["spl", "connections"]).unwrap();
        assert!(cli.interactive);
        assert_eq!(cli.level, "info");
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["spl", "docker", "list", "--interactive", "false"]).unwrap();
        assert!(!cli.interactive);
        assert_eq!(
            cli.command,
            Some(Commands::Docker {
                action: DockerAction::List
            })
        );
    }

    #[test]
    fn apps_validate_cloudvet_value() {
        let cli = Cli::try_parse_from([
            "spl", "apps", "--name", "TA-*", "validate", "--cloudvet", "true",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Apps { name, action, .. }) => {
                assert_eq!(name.as_deref(), Some("TA-*"));
                assert_eq!(
                    action,
                    AppsAction::Validate {
                        force: false,
                        cloudvet: Some(true)
                    }
                );
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn manager_namespace_flags() {
        let cli = Cli::try_parse_from([
            "spl", "manager", "--conn", "local", "--app", "search", "list", "roles", "--details",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Manager {
                conn,
                namespace,
                action,
            }) => {
                assert_eq!(conn.as_deref(), Some("local"));
                assert_eq!(namespace.app.as_deref(), Some("search"));
                assert_eq!(
                    action,
                    ManagerAction::List {
                        kind: "roles".into(),
                        details: true
                    }
                );
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
