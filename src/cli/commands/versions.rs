//! Versions and Restore commands.

use crate::config::Settings;
use crate::documents::DocumentStore;

pub fn run_versions(settings: &Settings, base: &str) -> anyhow::Result<()> {
    let store = DocumentStore::new(settings.data_root());
    let versions = store.versions(base)?;
    let listed: Vec<String> = versions.iter().map(|v| format!("v{v}")).collect();
    println!("{base}: {}", listed.join(", "));
    Ok(())
}

pub fn run_restore(settings: &Settings, base: &str, version: u32) -> anyhow::Result<()> {
    let store = DocumentStore::new(settings.data_root());
    let outcome = store.restore(base, version)?;
    println!(
        "Restored {base} v{version} as v{} ({})",
        outcome.document.version,
        outcome.document.path.display()
    );
    Ok(())
}
