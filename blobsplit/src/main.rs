mod cli;

use anyhow::Context;
use blobsplit::cadapter::localfs::LocalFsBackend;
use blobsplit::cadapter::s3::{S3Backend, S3Config};
use blobsplit::{HeaderComposer, ObjectBackend, ObjectClient, Splitter};
use clap::Parser;
use cli::{BackendKind, Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let Cli {
        backend,
        bucket,
        root,
        endpoint,
        region,
        command,
    } = Cli::parse();

    match backend {
        BackendKind::Local => run(ObjectClient::new(LocalFsBackend::new(root)), command).await,
        BackendKind::S3 => {
            let bucket = bucket
                .context("--bucket (or BLOBSPLIT_BUCKET) is required for the s3 backend")?;
            let config = S3Config {
                region,
                endpoint,
                ..S3Config::default()
            };
            let s3 = S3Backend::new(bucket, config).await?;
            tracing::info!(bucket = s3.bucket(), "using s3 backend");
            run(ObjectClient::new(s3), command).await
        }
    }
}

async fn run<B: ObjectBackend>(client: ObjectClient<B>, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Split { object, tuning } => {
            let config = tuning.to_config();
            config.validate()?;
            let splitter = Splitter::new(client, object.as_str(), config);
            let names = splitter
                .split()
                .await
                .with_context(|| format!("failed to split {object}"))?;
            for name in names {
                println!("{name}");
            }
        }
        Commands::Plan { object, tuning } => {
            let config = tuning.to_config();
            config.validate()?;
            let splitter = Splitter::new(client, object.as_str(), config);
            let size = splitter.object().size().await?;
            let plan = splitter
                .plan(size, config.target_size)
                .await
                .with_context(|| format!("failed to plan split of {object}"))?;
            for (index, range) in plan.iter().enumerate() {
                println!("{index}\t{}\t{}\t{}", range.start, range.end, range.len());
            }
        }
        Commands::PrependHeader {
            object,
            header,
            output,
        } => {
            let composer = HeaderComposer::new(client);
            let name = match output {
                Some(output) => composer.prepend_header_to(&header, &object, &output).await,
                None => composer.prepend_header(&header, &object).await,
            }
            .with_context(|| format!("failed to prepend header to {object}"))?;
            println!("{name}");
        }
    }
    Ok(())
}
