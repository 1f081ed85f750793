use clap::Parser;
use modelcache::cli::{Cli, Commands};
use modelcache::types::config::Config;
use modelcache::ModelCacheResult;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> ModelCacheResult<()> {
    let cli = Cli::parse();

    // Load configuration first (no logging yet)
    let config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        Config::default_config()
    };

    // CLI flags take precedence over config
    let log_level = if cli.quiet {
        "error".to_string()
    } else if cli.verbose {
        "debug".to_string()
    } else {
        config.general.log_level.clone()
    };

    let filter = EnvFilter::from_default_env().add_directive(
        format!("modelcache={}", log_level)
            .parse()
            .unwrap_or_else(|_| "modelcache=info".parse().expect("fallback directive is valid")),
    );

    let registry = tracing_subscriber::registry().with(filter);
    if config.general.log_format == "json" {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    tracing::debug!("Configuration loaded from: {}", cli.config.display());

    match cli.command {
        Commands::Init { path } => {
            modelcache::cli::commands::init(path).await?;
        }
        Commands::Key {
            model_config,
            inputs,
            discrete,
        } => {
            modelcache::cli::commands::key(&model_config, &inputs, discrete.as_deref()).await?;
        }
        Commands::Show { key } => {
            modelcache::cli::commands::show(&key, &config).await?;
        }
        Commands::List => {
            modelcache::cli::commands::list(&config).await?;
        }
        Commands::Verify => {
            modelcache::cli::commands::verify(&config).await?;
        }
        Commands::Run { model, wind_speed } => {
            modelcache::cli::commands::run(&model, &wind_speed, &config).await?;
        }
        Commands::Sweep { model, cases, jobs } => {
            modelcache::cli::commands::sweep(&model, &cases, jobs, &config).await?;
        }
        Commands::Version => {
            modelcache::cli::commands::version();
        }
    }

    Ok(())
}
