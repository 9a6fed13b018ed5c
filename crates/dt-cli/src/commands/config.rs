//! Config command implementations

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::output::{print_error, print_info, print_success, print_warning};
use dt_core::config::{self, ConfigFile};

/// The `--config` path, or the default config file
pub fn resolve_config_path(config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config::default_config_path)
}

/// Read the config file as a raw TOML table, or the defaults when it is missing
fn read_table(path: &Path) -> Result<toml::Table> {
    if !path.exists() {
        let defaults = toml::to_string(&ConfigFile::default())
            .context("Failed to serialize default configuration")?;
        return toml::from_str(&defaults).context("Failed to parse default configuration");
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    toml::from_str(&content).with_context(|| "Failed to parse config file")
}

/// Follow a dotted key path (e.g. "viewer.dvr.ip") through nested tables
fn lookup<'a>(table: &'a toml::Table, key: &str) -> Option<&'a toml::Value> {
    let mut parts = key.split('.');
    let mut current = table.get(parts.next()?)?;
    for part in parts {
        current = current.as_table()?.get(part)?;
    }
    Some(current)
}

/// Interpret a command-line value as TOML, falling back to a plain string
///
/// `true`, `12`, `2.5` and `[1, 2]` keep their types; anything that is not a
/// TOML literal (`192.168.0.9`, `admin`) is stored as a string.
fn parse_value(value: &str) -> toml::Value {
    format!("value = {}", value)
        .parse::<toml::Table>()
        .ok()
        .and_then(|mut table| table.remove("value"))
        .unwrap_or_else(|| toml::Value::String(value.to_string()))
}

fn render_value(value: &toml::Value) -> Result<String> {
    Ok(match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Table(_) => toml::to_string_pretty(value)?.trim_end().to_string(),
        other => other.to_string(),
    })
}

/// Get a config value by key
pub fn config_get(config_path: Option<&Path>, key: &str) -> Result<()> {
    let path = resolve_config_path(config_path);
    let table = read_table(&path)?;

    match lookup(&table, key) {
        Some(value) => {
            println!("{}", render_value(value)?);
            Ok(())
        }
        None => anyhow::bail!("Key not found: {}", key),
    }
}

/// Set a config value by key
///
/// The result must still load as a valid configuration; otherwise the file
/// is left untouched.
pub fn config_set(config_path: Option<&Path>, key: &str, value: &str) -> Result<()> {
    let path = resolve_config_path(config_path);

    if !path.exists() {
        print_info("Creating default configuration...");
        config_init(Some(path.as_path()), false)?;
    }

    let mut table = read_table(&path)?;

    let parts: Vec<&str> = key.split('.').collect();
    let (last_key, parents) = parts
        .split_last()
        .filter(|(last, _)| !last.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Invalid key: {}", key))?;

    let mut current = &mut table;
    for part in parents {
        if !current.contains_key(*part) {
            current.insert(part.to_string(), toml::Value::Table(toml::Table::new()));
        }
        current = current
            .get_mut(*part)
            .and_then(|v| v.as_table_mut())
            .ok_or_else(|| anyhow::anyhow!("Cannot navigate to key: {}", key))?;
    }
    current.insert(last_key.to_string(), parse_value(value));

    let new_content = toml::to_string_pretty(&table)?;
    if let Err(e) = toml::from_str::<ConfigFile>(&new_content) {
        print_error(&format!("Rejected {} = {}", key, value));
        return Err(anyhow::anyhow!(e).context("The new value does not fit the configuration"));
    }

    std::fs::write(&path, new_content)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    print_success(&format!("Set {} = {}", key, value));
    Ok(())
}

/// Show current configuration
pub fn config_show(config_path: Option<&Path>) -> Result<()> {
    let path = resolve_config_path(config_path);

    if !path.exists() {
        print_warning(&format!("No configuration file found at {:?}", path));
        print_info("Showing built-in defaults. Run 'dvr-tunnel config init' to create one");
        println!();
        println!("{}", toml::to_string_pretty(&ConfigFile::default())?);
        return Ok(());
    }

    print_info(&format!("Configuration file: {:?}", path));
    println!();

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    println!("{}", content);

    Ok(())
}

/// Print the config file path
pub fn config_path(config_path: Option<&Path>) -> Result<()> {
    println!("{}", resolve_config_path(config_path).display());
    Ok(())
}

/// Initialize default configuration
pub fn config_init(config_path: Option<&Path>, force: bool) -> Result<()> {
    let config_file = resolve_config_path(config_path);

    if let Some(config_dir) = config_file.parent().filter(|d| !d.as_os_str().is_empty()) {
        if !config_dir.exists() {
            std::fs::create_dir_all(config_dir).with_context(|| {
                format!("Failed to create config directory: {:?}", config_dir)
            })?;
            print_success(&format!("Created config directory: {:?}", config_dir));
        }
    }

    if config_file.exists() && !force {
        print_error(&format!("Config file already exists: {:?}", config_file));
        print_info("Use --force to overwrite");
        return Ok(());
    }

    let content = generate_default_config()?;
    std::fs::write(&config_file, content)
        .with_context(|| format!("Failed to write config file: {:?}", config_file))?;

    print_success(&format!("Created configuration file: {:?}", config_file));
    Ok(())
}

/// Generate default configuration content
fn generate_default_config() -> Result<String> {
    let body = toml::to_string_pretty(&ConfigFile::default())?;
    Ok(format!(
        "# dvr-tunnel configuration\n\
         # Every value below is the built-in default; remove what you do not change.\n\
         # bootstrap.artifact.url and bootstrap.artifact.path are derived from the\n\
         # package manager and CPU architecture unless set here.\n\n{}",
        body
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_types() {
        assert_eq!(parse_value("true"), toml::Value::Boolean(true));
        assert_eq!(parse_value("12"), toml::Value::Integer(12));
        assert_eq!(
            parse_value("[3, 4]"),
            toml::Value::Array(vec![toml::Value::Integer(3), toml::Value::Integer(4)])
        );
        assert_eq!(
            parse_value("192.168.0.9"),
            toml::Value::String("192.168.0.9".to_string())
        );
        assert_eq!(parse_value("admin"), toml::Value::String("admin".to_string()));
    }

    #[test]
    fn test_lookup_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let table = read_table(&dir.path().join("missing.toml")).unwrap();

        let url = lookup(&table, "bootstrap.tunnel.local_url").unwrap();
        assert_eq!(render_value(url).unwrap(), "http://localhost:8000");
        assert!(lookup(&table, "viewer.dvr.nope").is_none());
        assert!(lookup(&table, "bootstrap.tunnel.local_url.deeper").is_none());
    }

    #[test]
    fn test_init_then_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("config.toml");

        config_init(Some(path.as_path()), false).unwrap();
        let config: ConfigFile = config::load_config(&path).unwrap();
        assert_eq!(config.viewer.fps, 12);

        config_set(Some(path.as_path()), "viewer.dvr.channels", "[4, 3]").unwrap();
        config_set(Some(path.as_path()), "viewer.dvr.ip", "10.1.1.1").unwrap();
        config_set(Some(path.as_path()), "bootstrap.package_manager", "dnf").unwrap();

        let config: ConfigFile = config::load_config(&path).unwrap();
        assert_eq!(config.viewer.dvr.channels, vec![4, 3]);
        assert_eq!(config.viewer.dvr.ip, "10.1.1.1");
        assert_eq!(
            config.bootstrap.package_manager,
            dt_core::PackageManagerKind::Dnf
        );
    }

    #[test]
    fn test_set_rejects_wrong_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        config_init(Some(path.as_path()), false).unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        assert!(config_set(Some(path.as_path()), "viewer.fps", "fast").is_err());
        assert!(config_set(Some(path.as_path()), "bootstrap.package_manager", "pacman").is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }
}
