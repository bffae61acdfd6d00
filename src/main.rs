use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Pylon Gateway — traffic-control pipeline
#[derive(Parser)]
#[command(name = "pylon-gateway", version, about)]
struct Cli {
    /// Path to configuration file (.hcl)
    #[arg(short, long, default_value = "pylon.hcl")]
    config: String,

    /// Override listen address (e.g., 0.0.0.0:8088)
    #[arg(short, long)]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file without starting the pipeline
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long, default_value = "pylon.hcl")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> pylon_gateway::Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Validate { config: config_path }) = &cli.command {
        return validate_config(config_path).await;
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    tracing::info!("Pylon Gateway v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = if std::path::Path::new(&cli.config).exists() {
        tracing::info!(config = cli.config, "Loading configuration");
        pylon_gateway::config::PipelineConfig::from_file(&cli.config).await?
    } else {
        tracing::warn!("Config file not found, using defaults");
        pylon_gateway::config::PipelineConfig::default()
    };

    if let Some(listen) = cli.listen {
        config.listen = listen;
    }

    // Assemble the pipeline; configuration errors fail here, never at
    // request time
    let chain = Arc::new(pylon_gateway::FilterChain::from_config(&config)?);
    tracing::info!(
        stages = chain.len(),
        jwt = config.jwt.enabled,
        rate_limit = config.rate_limit.enabled,
        gray = config.gray.enabled,
        "Pipeline assembled"
    );

    // Start the revocation feed if configured
    if let (Some(cache), Some(url)) = (chain.credential_cache(), &config.jwt.revocation_url) {
        let (feed, _listener) = pylon_gateway::auth::spawn_revocation_listener(cache, 64);
        let _subscriber = pylon_gateway::auth::spawn_revocation_subscriber(
            url,
            config.jwt.revocation_channel.as_str(),
            feed,
        )?;
    }

    pylon_gateway::entrypoint::serve(&config.listen, chain).await
}

/// Validate a configuration file and print diagnostics
async fn validate_config(path: &str) -> pylon_gateway::Result<()> {
    if !std::path::Path::new(path).exists() {
        eprintln!("✗ Config file not found: {}", path);
        std::process::exit(1);
    }

    let config = match pylon_gateway::config::PipelineConfig::from_file(path).await {
        Ok(c) => {
            println!("✓ Config parsed successfully ({})", path);
            c
        }
        Err(e) => {
            eprintln!("✗ Parse error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("✗ Validation error: {}", e);
        std::process::exit(1);
    }

    println!("✓ Configuration is valid");
    println!();
    println!("  Listen:      {}", config.listen);
    println!(
        "  JWT:         {}",
        if config.jwt.enabled {
            format!(
                "enabled (issuer: {}, {} ignore paths)",
                config.jwt.issuer,
                config.jwt.ignore_paths.len()
            )
        } else {
            "disabled".to_string()
        }
    );
    println!(
        "  Rate limit:  {}",
        if config.rate_limit.enabled {
            format!(
                "enabled ({}/s, capacity {}, {})",
                config.rate_limit.default_rate,
                config.rate_limit.capacity(),
                match &config.rate_limit.redis_url {
                    Some(_) if config.rate_limit.enable_fallback => "distributed + fallback",
                    Some(_) => "distributed, fail-closed",
                    None => "local only",
                }
            )
        } else {
            "disabled".to_string()
        }
    );
    println!(
        "  Gray:        {}",
        if config.gray.enabled {
            format!(
                "enabled (weight {}%, {} rules)",
                config.gray.weight,
                config.gray.rules.len()
            )
        } else {
            "disabled".to_string()
        }
    );

    Ok(())
}
