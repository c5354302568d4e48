//! Handlers for the `config` commands

use std::path::Path;

use crate::cli::OutputFormatter;
use crate::config::{DeskConfig, default_config_path};
use crate::error::Result;

const MASK: &str = "********";

/// Load and validate the configuration, then summarize it
///
/// # Errors
///
/// Returns an error if the file cannot be read or a required setting is
/// missing or inconsistent.
pub fn handle_config_check(config_path: Option<&Path>, output: &OutputFormatter) -> Result<()> {
    let config = DeskConfig::load(config_path)?;
    config.validate()?;

    if output.is_json() {
        return output.print_json(&serde_json::json!({
            "status": "ok",
            "categories": config.categories,
            "log_channel": config.log_channel,
            "staff_roles": config.staff_roles,
            "store": config.store.backend,
            "publisher": config.transcript.publisher,
        }));
    }

    output.success("Configuration is valid");
    output.field("Report category", &config.categories.report);
    output.field("Appeal category", &config.categories.appeal);
    output.field("Inquiry category", &config.categories.inquiry);
    output.field("Log channel", &config.log_channel);
    output.field("Staff roles", &config.staff_roles.join(", "));
    output.field("Store", &format!("{:?}", config.store.backend).to_lowercase());
    output.field(
        "Transcripts",
        &format!("{:?}", config.transcript.publisher).to_lowercase(),
    );
    if config.staff_roles.is_empty() {
        output.warning("No staff roles configured; only administrators can claim tickets");
    }
    Ok(())
}

/// Print the resolved configuration with credentials masked
pub fn handle_config_show(config_path: Option<&Path>, output: &OutputFormatter) -> Result<()> {
    let config = masked(DeskConfig::load(config_path)?);
    if output.is_json() {
        return output.print_json(&config);
    }
    output.info(serde_yaml::to_string(&config)?.trim_end());
    Ok(())
}

/// Print where the configuration file is looked up by default
pub fn handle_config_path(output: &OutputFormatter) -> Result<()> {
    let path = default_config_path();
    if output.is_json() {
        return output.print_json(&serde_json::json!({ "path": path }));
    }
    match path {
        Some(path) => output.info(&path.display().to_string()),
        None => output.warning("No home directory; pass --config explicitly"),
    }
    Ok(())
}

fn masked(mut config: DeskConfig) -> DeskConfig {
    for secret in [
        &mut config.store.jsonbin.master_key,
        &mut config.transcript.s3.access_key,
        &mut config.transcript.s3.secret_key,
    ] {
        if !secret.is_empty() {
            *secret = MASK.to_string();
        }
    }
    config
}
