//! Connections listing

use spl_core::{Settings, Table};

use crate::error::Result;

/// Table of the configured connections, credentials left out.
pub fn connections_table(settings: &Settings) -> Table {
    let mut table = Table::new("Connections", ["Name", "Address", "Auth", "Restart"]);
    for (name, conn) in &settings.connections {
        let auth = match (&conn.token, &conn.username) {
            (Some(_), _) => "token".to_string(),
            (None, Some(user)) => format!("user '{user}'"),
            (None, None) => "-".to_string(),
        };
        table.push(vec![
            name.clone(),
            format!("{}://{}:{}", conn.scheme, conn.host, conn.port),
            auth,
            if conn.allow_restart { "allowed" } else { "-" }.to_string(),
        ]);
    }
    table
}

/// Run the connections command
pub fn run_connections(settings: &Settings) -> Result<()> {
    print!("{}", connections_table(settings));
    println!();
    println!(
        "Possible connections are: '{}'.",
        settings.connection_names().join("', '")
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spl_test_utils::TestSettings;

    #[test]
    fn test_table_hides_credentials() {
        let dir = TestSettings::minimal();
        let settings = spl_core::SettingsLoader::new(dir.root())
            .with_global_config_dir(dir.root().join("global"))
            .with_env(Vec::new())
            .load()
            .unwrap();

        let table = connections_table(&settings);
        assert_eq!(table.column("Name"), vec!["local", "remote"]);
        assert_eq!(table.column("Auth"), vec!["user 'admin'", "token"]);
        assert_eq!(table.column("Restart"), vec!["allowed", "-"]);
        let rendered = table.to_string();
        assert!(!rendered.contains("changeme"));
        assert!(!rendered.contains("abc123"));
    }
}
