use crate::output::print_json;
use anyhow::Context;
use reqflow_core::{config::Config, io, paths};
use std::path::Path;

const ACCOUNTS_TEMPLATE: &str = "\
# Accounts tickets can be filed against.
#
# - id: 1
#   name: Payments
[]
";

const USERS_TEMPLATE: &str = "\
# Users known to reqflow. role: USER, DEVELOPER, MANAGER, SCRUM_MASTER or ADMIN.
#
# - ntid: jdoe
#   email: jdoe@example.com
#   role: DEVELOPER
#   account_id: 1
#   handled_accounts: [1, 2]   # scrum masters only
[]
";

pub fn run(root: &Path, name: Option<&str>, json: bool) -> anyhow::Result<()> {
    let project_name = name.map(str::to_string).unwrap_or_else(|| {
        root.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string())
    });

    let dir = paths::reqflow_dir(root);
    io::ensure_dir(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let mut created = Vec::new();

    if !paths::config_path(root).exists() {
        Config::new(&project_name)
            .save(root)
            .context("failed to write config.yaml")?;
        created.push(paths::CONFIG_FILE);
    }
    if io::write_if_missing(&paths::accounts_path(root), ACCOUNTS_TEMPLATE.as_bytes())? {
        created.push(paths::ACCOUNTS_FILE);
    }
    if io::write_if_missing(&paths::users_path(root), USERS_TEMPLATE.as_bytes())? {
        created.push(paths::USERS_FILE);
    }

    if json {
        print_json(&serde_json::json!({
            "root": root.display().to_string(),
            "project": project_name,
            "created": created,
        }))?;
        return Ok(());
    }

    println!("Initializing reqflow in: {}", root.display());
    for file in [paths::CONFIG_FILE, paths::ACCOUNTS_FILE, paths::USERS_FILE] {
        if created.contains(&file) {
            println!("  created: {file}");
        } else {
            println!("  exists:  {file}");
        }
    }
    Ok(())
}
