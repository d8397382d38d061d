use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "chunkflow",
    about = "chunkflow — pull-based chunked content streaming",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream a file through the chunk driver.
    ///
    /// The file is located through the configured storage backends and
    /// pulled chunk by chunk over an in-process transport. Content goes to
    /// --output, or to stdout with the summary on stderr.
    Stream {
        /// Path of the file, relative to the storage root (e.g. /index.html)
        path: String,
        /// Config file (default: ./chunkflow.toml if present)
        #[arg(short, long)]
        config: Option<String>,
        /// Override [storage].flash_root
        #[arg(long)]
        root: Option<String>,
        /// Storage backend: auto, flash, unbuffered, or removable
        #[arg(short, long, default_value = "auto")]
        backend: String,
        /// Override [streaming].buffer_size (512..=8192)
        #[arg(long)]
        buffer_size: Option<usize>,
        /// Most bytes the transport accepts per pull (default: buffer size)
        #[arg(long)]
        chunk: Option<usize>,
        /// Write content to this file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
        /// Summary format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Generate a chunkflow.toml scaffold
    Init {
        #[arg(short, long, default_value = ".")]
        path: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chunkflow=info".parse()?)
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Stream {
            path,
            config,
            root,
            backend,
            buffer_size,
            chunk,
            output,
            format,
        } => commands::stream::stream(&commands::stream::StreamArgs {
            path: &path,
            config: config.as_deref(),
            root: root.as_deref(),
            backend: &backend,
            buffer_size,
            chunk,
            output: output.as_deref(),
            format: &format,
        }),
        Commands::Init { path } => commands::init::init(&path),
    }
}
