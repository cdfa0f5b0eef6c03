//! Init and Config commands.

use std::path::Path;

use anyhow::Context;

use crate::config::{CONFIG_DIR, CONFIG_FILE, Settings};
use crate::documents::init_data_dir;

/// Create the settings file (unless present) and the data folders.
pub fn run_init(settings: &Settings, force: bool) -> anyhow::Result<()> {
    let config_path = Path::new(CONFIG_DIR).join(CONFIG_FILE);

    if config_path.exists() && !force {
        println!(
            "Configuration file already exists at: {} (use --force to overwrite)",
            config_path.display()
        );
    } else {
        let path = Settings::init_config_file(".", force)
            .map_err(|e| anyhow::anyhow!("failed to write configuration: {e}"))?;
        println!("Created configuration file at: {}", path.display());
    }

    let root = settings.data_root();
    let created = init_data_dir(&root, &settings.storage.folders)
        .with_context(|| format!("failed to create {}", root.display()))?;
    if created.is_empty() {
        println!("Data tree already present at: {}", root.display());
    } else {
        println!(
            "Created {} folder(s) under {}: {}",
            created.len(),
            root.display(),
            created.join(", ")
        );
    }
    Ok(())
}

/// Print the active configuration as TOML.
pub fn run_config(settings: &Settings) -> anyhow::Result<()> {
    println!("Current Configuration:");
    println!("{}", "=".repeat(50));
    println!("{}", toml::to_string_pretty(settings)?);
    Ok(())
}
