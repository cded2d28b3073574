//! CLI arguments and validated server configuration.
//!
//! Flags can also be supplied via environment variables (and a `.env` file,
//! loaded before parsing). `CliArgs` is the raw clap surface; `ServerConfig`
//! is the validated form the rest of the server consumes.

use clap::Parser;
use shipstream_tonic_core::types::DEFAULT_ORDER_BATCH_SIZE;

/// Command-line arguments for the shipstream server.
#[derive(Debug, Parser)]
#[command(name = "shipstream-tonic-server", version, about)]
pub struct CliArgs {
    /// Address to bind: a TCP `host:port`, or a filesystem path with `--uds`.
    #[arg(long, env = "SHIPSTREAM_ADDR", default_value = "0.0.0.0:50051")]
    pub addr: String,

    /// Bind a Unix domain socket instead of TCP.
    #[arg(long, env = "SHIPSTREAM_UDS", default_value_t = false)]
    pub uds: bool,

    /// Orders per destination group before its combined shipment is emitted
    /// early.
    #[arg(long, env = "SHIPSTREAM_BATCH_SIZE", default_value_t = DEFAULT_ORDER_BATCH_SIZE)]
    pub batch_size: usize,

    /// Buffered messages per response stream before backpressure applies.
    #[arg(long, env = "SHIPSTREAM_STREAM_BUFFER", default_value_t = 16)]
    pub stream_buffer_size: usize,

    /// Seconds to wait for in-flight streams to drain during shutdown.
    #[arg(long, env = "SHIPSTREAM_SHUTDOWN_TIMEOUT", default_value_t = 3)]
    pub shutdown_timeout_secs: u64,

    /// Preload the order store with the demo data set.
    #[arg(long, env = "SHIPSTREAM_SEED", default_value_t = false)]
    pub seed: bool,
}

/// Validated runtime configuration derived from [`CliArgs`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub uds: bool,
    pub batch_size: usize,
    pub stream_buffer_size: usize,
    pub shutdown_timeout_secs: u64,
    pub seed: bool,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        anyhow::ensure!(args.batch_size >= 1, "batch size must be at least 1");
        anyhow::ensure!(
            args.stream_buffer_size >= 1,
            "stream buffer size must be at least 1"
        );
        anyhow::ensure!(!args.addr.is_empty(), "bind address must not be empty");

        Ok(Self {
            server_addr: args.addr,
            uds: args.uds,
            batch_size: args.batch_size,
            stream_buffer_size: args.stream_buffer_size,
            shutdown_timeout_secs: args.shutdown_timeout_secs,
            seed: args.seed,
        })
    }
}
