use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info};

use arbiter::{ExtensionRegistry, PdpConfig, PdpError};

/// Arbiter: XACML-style policy decision point
#[derive(Parser, Debug)]
#[command(name = "arbiter", version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a configuration file and the extensions it names without
    /// creating any cache storage
    CheckConfig {
        /// Path to the TOML configuration
        path: PathBuf,
    },

    /// List registered functions, combining algorithms, caches and filters
    Extensions {
        /// Include XACML 1.x combining algorithms
        #[arg(long)]
        legacy: bool,
    },
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("arbiter=debug,arbiter_policy=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("arbiter=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), PdpError> {
    let registry = ExtensionRegistry::standard();
    match cli.command {
        Commands::CheckConfig { path } => cmd_check_config(&registry, &path),
        Commands::Extensions { legacy } => {
            cmd_extensions(&registry, legacy);
            Ok(())
        }
    }
}

fn cmd_check_config(registry: &ExtensionRegistry, path: &Path) -> Result<(), PdpError> {
    if !path.exists() {
        return Err(PdpError::Config(format!(
            "{} does not exist",
            path.display()
        )));
    }
    let config = PdpConfig::load(path)?;
    registry.result_filter(&config.result_filter.kind)?;
    if let Some(cache_config) = &config.decision_cache {
        registry.validate_cache(cache_config)?;
    }
    let algorithms = registry.combining_algorithms(&config);
    info!(
        path = %path.display(),
        filter = %config.result_filter.kind,
        cache = config.decision_cache.as_ref().map(|c| c.kind.as_str()),
        legacy = algorithms.legacy_enabled(),
        "configuration OK"
    );
    println!("{}: OK", path.display());
    Ok(())
}

fn cmd_extensions(registry: &ExtensionRegistry, legacy: bool) {
    let config = PdpConfig {
        enable_legacy_combining_algorithms: legacy,
        ..PdpConfig::default()
    };
    println!("Functions:");
    for id in registry.functions().ids() {
        println!("  {}", id);
    }
    println!("Combining algorithms:");
    for id in registry.combining_algorithms(&config).ids() {
        println!("  {}", id);
    }
    println!("Decision caches:");
    for id in registry.cache_ids() {
        println!("  {}", id);
    }
    println!("Result filters:");
    for id in registry.result_filter_ids() {
        println!("  {}", id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(feature = "sqlite")]
    fn test_check_config_creates_no_cache_storage() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("cache/decisions.db");
        let config = dir.path().join("arbiter.toml");
        let db_path = toml::Value::String(db.to_string_lossy().into_owned());
        std::fs::write(
            &config,
            format!("[decision_cache]\ntype = \"sqlite\"\npath = {}\n", db_path),
        )
        .unwrap();

        cmd_check_config(&ExtensionRegistry::standard(), &config).unwrap();
        assert!(!dir.path().join("cache").exists());
    }

    #[test]
    fn test_check_config_rejects_bad_cache_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("arbiter.toml");
        std::fs::write(&config, "[decision_cache]\ntype = \"in-memory\"\nttl_secs = 0\n").unwrap();
        assert!(matches!(
            cmd_check_config(&ExtensionRegistry::standard(), &config),
            Err(PdpError::Config(_))
        ));
    }
}
