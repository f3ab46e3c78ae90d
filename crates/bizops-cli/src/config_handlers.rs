//! Handler functions for `bizops config` subcommands.
//!
//! These run before any state file is opened, so a broken store never
//! prevents inspecting or repairing the configuration.

use std::io::Write;
use std::path::PathBuf;

use bizops_core::{BizopsConfig, Error};

use crate::Result;
use crate::cli::ConfigAction;

const REDACTED: &str = "<redacted>";

// ============================================================================
// Command dispatch
// ============================================================================

/// Handle a config subcommand.
pub fn handle_config_command(
    config_path: Option<&str>,
    action: ConfigAction,
    out: &mut dyn Write,
) -> Result<()> {
    match action {
        ConfigAction::Path => cmd_config_path(config_path, out),
        ConfigAction::Get { key } => cmd_config_get(config_path, &key, out),
        ConfigAction::Show => cmd_config_show(config_path, out),
        ConfigAction::Init { file, force } => cmd_config_init(file.as_deref(), force, out),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Show the resolved config file path.
pub fn cmd_config_path(config_path: Option<&str>, out: &mut dyn Write) -> Result<()> {
    let path = BizopsConfig::resolve_config_path(config_path)
        .ok_or_else(|| Error::config("Could not determine config directory for this platform"))?;
    writeln!(out, "{}", path.display())?;
    if !path.exists() {
        eprintln!("(file does not exist, run `bizops config init` to create it)");
    }
    Ok(())
}

/// Print one effective value by dotted key.
pub fn cmd_config_get(config_path: Option<&str>, key: &str, out: &mut dyn Write) -> Result<()> {
    let value = effective_value(config_path)?;
    let found = get_nested_value(&value, key)
        .ok_or_else(|| Error::config(format!("Key '{key}' not found in configuration")))?;
    writeln!(out, "{}", format_toml_value(found))?;
    Ok(())
}

/// Print the effective configuration.
pub fn cmd_config_show(config_path: Option<&str>, out: &mut dyn Write) -> Result<()> {
    let value = effective_value(config_path)?;
    let text = toml::to_string_pretty(&value).map_err(|e| Error::config(e.to_string()))?;
    write!(out, "{text}")?;
    Ok(())
}

/// Write a default configuration file.
pub fn cmd_config_init(file: Option<&str>, force: bool, out: &mut dyn Write) -> Result<()> {
    let path = match file {
        Some(p) => PathBuf::from(p),
        None => BizopsConfig::default_config_path()
            .ok_or_else(|| Error::config("Could not determine config directory"))?,
    };

    if path.exists() && !force {
        return Err(Error::config(format!(
            "Config file already exists at {}. Use --force to overwrite.",
            path.display()
        ))
        .into());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(e, parent))?;
    }

    let toml_str = BizopsConfig::default().to_toml_string()?;
    std::fs::write(&path, &toml_str).map_err(|e| Error::io_with_path(e, &path))?;

    writeln!(out, "Config file created at {}", path.display())?;
    Ok(())
}

/// Effective configuration as a TOML tree with secrets masked.
fn effective_value(config_path: Option<&str>) -> Result<toml::Value> {
    let config = BizopsConfig::load(config_path)?;
    let mut value = toml::Value::try_from(&config).map_err(|e| Error::config(e.to_string()))?;
    if let Some(admin) = value
        .get_mut("auth")
        .and_then(|auth| auth.get_mut("bootstrap_admin"))
        .and_then(toml::Value::as_table_mut)
    {
        admin.insert("password".into(), toml::Value::String(REDACTED.into()));
    }
    Ok(value)
}

// ============================================================================
// TOML dotted-key helpers
// ============================================================================

/// Navigate a dotted key path in a TOML value tree.
pub fn get_nested_value<'a>(value: &'a toml::Value, key: &str) -> Option<&'a toml::Value> {
    let mut current = value;
    for part in key.split('.') {
        current = current.as_table()?.get(part)?;
    }
    Some(current)
}

/// Format a TOML value for display on stdout.
pub fn format_toml_value(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Integer(i) => i.to_string(),
        toml::Value::Float(f) => f.to_string(),
        toml::Value::Boolean(b) => b.to_string(),
        toml::Value::Datetime(dt) => dt.to_string(),
        toml::Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(format_toml_value).collect();
            parts.join(", ")
        }
        toml::Value::Table(_) => {
            toml::to_string_pretty(value).unwrap_or_else(|_| format!("{value:?}"))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
