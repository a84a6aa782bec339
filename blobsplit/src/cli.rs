use blobsplit::SplitConfig;
use blobsplit::config::{DEFAULT_MAX_CONCURRENCY, DEFAULT_PROBE_WIDTH, DEFAULT_TARGET_SIZE};
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "blobsplit")]
#[command(
    version,
    about = "Split or prefix large text objects in an object store",
    long_about = None
)]
pub(crate) struct Cli {
    /// Storage backend type
    #[arg(long, env = "BLOBSPLIT_BACKEND", value_enum, default_value = "s3")]
    pub(crate) backend: BackendKind,

    /// Bucket holding the objects (s3 backend)
    #[arg(long, env = "BLOBSPLIT_BUCKET")]
    pub(crate) bucket: Option<String>,

    /// Root directory standing in for the bucket (local backend)
    #[arg(long, env = "BLOBSPLIT_ROOT", default_value = ".")]
    pub(crate) root: String,

    /// S3-compatible endpoint, e.g. http://127.0.0.1:9000
    #[arg(long, env = "BLOBSPLIT_ENDPOINT")]
    pub(crate) endpoint: Option<String>,

    #[arg(long, env = "BLOBSPLIT_REGION")]
    pub(crate) region: Option<String>,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum BackendKind {
    S3,
    Local,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    #[command(about = "Split an object into line-safe segments using ./blobsplit split data.csv")]
    Split {
        #[arg(value_name = "OBJECT")]
        object: String,
        #[command(flatten)]
        tuning: SplitArgs,
    },
    #[command(about = "Print the segment ranges without copying anything")]
    Plan {
        #[arg(value_name = "OBJECT")]
        object: String,
        #[command(flatten)]
        tuning: SplitArgs,
    },
    #[command(
        about = "Prepend a header line using ./blobsplit prepend-header data.csv --header a,b,c"
    )]
    PrependHeader {
        #[arg(value_name = "OBJECT")]
        object: String,
        #[arg(long)]
        header: String,
        /// Output object name, defaults to <OBJECT>-with-header
        #[arg(long)]
        output: Option<String>,
    },
}

#[derive(Args, Debug)]
pub(crate) struct SplitArgs {
    /// Maximum segment size in bytes
    #[arg(long, env = "BLOBSPLIT_TARGET_SIZE", default_value_t = DEFAULT_TARGET_SIZE)]
    pub(crate) target_size: u64,

    /// Width of each backward probe when looking for a line break
    #[arg(long, env = "BLOBSPLIT_PROBE_WIDTH", default_value_t = DEFAULT_PROBE_WIDTH)]
    pub(crate) probe_width: u64,

    /// Segment copies in flight at once
    #[arg(long, env = "BLOBSPLIT_MAX_CONCURRENCY", default_value_t = DEFAULT_MAX_CONCURRENCY)]
    pub(crate) max_concurrency: usize,
}

impl SplitArgs {
    pub(crate) fn to_config(&self) -> SplitConfig {
        SplitConfig {
            max_concurrency: self.max_concurrency,
            ..SplitConfig::default()
        }
        .with_target_size(self.target_size)
        .with_probe_width(self.probe_width)
    }
}
