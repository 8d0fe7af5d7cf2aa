use std::path::PathBuf;

use anyhow::{Context, Result};
use aws_config::{BehaviorVersion, Region};
use aws_route53::Route53ZoneLookup;
use clap::{Parser, Subcommand};
use dotenv_reader::ProcessEnv;
use tracing::info;
use tracing_subscriber::EnvFilter;
use website_stack::{resolve_zone, Deployer, Settings, WebsiteStack};

/// Synthesizes and deploys the personal website stack.
#[derive(Parser)]
#[command(name = "website_stack", version)]
struct Cli {
    /// settings file loaded into the environment before reading settings.
    #[arg(long, global = true, default_value = ".env")]
    env_file: PathBuf,

    /// tracing filter, ignored when RUST_LOG is set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// print the CloudFormation template
    Synth {
        /// write the template here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
        /// write the us-east-1 certificate template here, when the stack has one
        #[arg(long)]
        certificates_out: Option<PathBuf>,
    },
    /// upload code, apply the stack, then sync bucket content
    Deploy,
    /// delete the stack
    Destroy,
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level).with_context(|| format!("invalid log level filter: {log_level}"))?
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

async fn build_stack(settings: &Settings, config: &aws_config::SdkConfig) -> Result<WebsiteStack> {
    let lookup = Route53ZoneLookup::new(config);
    let zone = resolve_zone(settings, &lookup).await.context("failed to resolve hosted zone")?;
    let stack = WebsiteStack::from_settings(settings, zone.as_ref())?;
    Ok(stack)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;
    let loaded = dotenv_reader::hydrate(&cli.env_file)?;
    if loaded {
        info!(path = %cli.env_file.display(), "loaded settings file");
    }
    let settings = Settings::from_source(&ProcessEnv).context("invalid settings")?;
    let config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(settings.region.clone()))
        .load()
        .await;

    match cli.command {
        Command::Synth { out, certificates_out } => {
            let stack = build_stack(&settings, &config).await?;
            let body = stack.to_json()?;
            match out {
                Some(path) => {
                    std::fs::write(&path, body).with_context(|| format!("failed to write {}", path.display()))?;
                    info!(path = %path.display(), "template written");
                }
                None => println!("{body}"),
            }
            match (stack.synth_certificates()?, certificates_out) {
                (Some(template), Some(path)) => {
                    std::fs::write(&path, template.to_body()?)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    info!(path = %path.display(), "certificate template written");
                }
                (Some(_), None) => info!("the site certificate lives in a us-east-1 stack, pass --certificates-out to write it"),
                (None, _) => {}
            }
        }
        Command::Deploy => {
            let stack = build_stack(&settings, &config).await?;
            let report = Deployer::new(&config).deploy(&stack).await.context("deployment failed")?;
            let mut outputs: Vec<_> = report.outputs.iter().collect();
            outputs.sort();
            for (key, value) in outputs {
                println!("{}.{key} = {value}", stack.name);
            }
        }
        Command::Destroy => {
            let name = aws_cfn_stack::validate_stack_name(&settings.stack_name).map_err(anyhow::Error::msg)?;
            Deployer::new(&config).destroy(&name).await.context("failed to delete stack")?;
        }
    }
    Ok(())
}
