//! Development container commands

use colored::Colorize;
use spl_core::{DockerManager, Prompter, StartAction};
use spl_docker::ContainerInfo;

use crate::cli::DockerAction;
use crate::error::Result;

/// Run a docker subcommand against the development container
pub fn run_docker(
    manager: &DockerManager,
    image: &str,
    action: DockerAction,
    prompter: &dyn Prompter,
) -> Result<()> {
    match action {
        DockerAction::Status => {
            print!("{}", render_status(image, manager.status()?.as_ref()));
        }
        DockerAction::Start => match manager.start(prompter)? {
            Some(StartAction::Started) => println!("{} Container started.", "OK".green().bold()),
            Some(StartAction::Restarted) => {
                println!("{} Container restarted.", "OK".green().bold())
            }
            Some(StartAction::AlreadyRunning) => {
                println!("{} Container already running.", "info:".cyan().bold())
            }
            None => println!("{} No container created.", "info:".cyan().bold()),
        },
        DockerAction::Stop => {
            if manager.stop()? {
                println!("{} Container stopped.", "OK".green().bold());
            }
        }
        DockerAction::List => print_apps("Apps in container", &manager.list()?),
        DockerAction::Upload { path, app } => {
            let uploaded = manager.upload(&path, app.as_deref(), prompter)?;
            print_apps("Uploaded", &uploaded);
        }
        DockerAction::Download { path, app } => {
            let downloaded = manager.download(&path, app.as_deref(), prompter)?;
            print_apps("Downloaded", &downloaded);
        }
        DockerAction::FixPermissions { app } => {
            let fixed = manager.fix_app_permissions(app.as_deref(), prompter)?;
            print_apps("Fixed permissions of", &fixed);
        }
    }
    Ok(())
}

fn render_status(image: &str, container: Option<&ContainerInfo>) -> String {
    let container = match container {
        Some(c) => format!("'{}' ({})", c.state, c.status),
        None => "not created".to_string(),
    };
    format!(" - Image:          '{image}'\n - Container:      {container}\n")
}

fn print_apps(label: &str, apps: &[String]) {
    if apps.is_empty() {
        println!("{} {}: none", "info:".cyan().bold(), label);
        return;
    }
    println!("{}:", label.bold());
    for app in apps {
        println!("  {}", app.green());
    }
}
