use std::path::PathBuf;

use btcbox_core::Topic;
use clap::{Parser, Subcommand};

/// btcbox: JSON-RPC and ZeroMQ client for Bitcoin-like nodes.
#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// Node RPC host.
    #[arg(long, default_value = "127.0.0.1", env = "BTCBOX_RPC_HOST", global = true)]
    pub rpc_host: String,

    /// Node RPC port. Omitted from the URL when unset.
    #[arg(long, default_value = "8332", env = "BTCBOX_RPC_PORT", global = true)]
    pub rpc_port: Option<u16>,

    /// URL scheme for the RPC endpoint (http or https).
    #[arg(long, default_value = "http", env = "BTCBOX_RPC_SCHEME", global = true)]
    pub rpc_scheme: String,

    /// RPC username.
    #[arg(long, env = "BTCBOX_RPC_USER", global = true)]
    pub rpc_user: Option<String>,

    /// RPC password.
    #[arg(long, env = "BTCBOX_RPC_PASS", global = true)]
    pub rpc_pass: Option<String>,

    /// Cookie file to authenticate with when no user/password is given.
    #[arg(long, env = "BTCBOX_RPC_COOKIE_FILE", global = true)]
    pub rpc_cookie_file: Option<PathBuf>,

    /// Maximum outbound RPC requests per second (unlimited when unset).
    #[arg(long, env = "BTCBOX_RPC_RPS", global = true)]
    pub rpc_rps: Option<u32>,

    /// Maximum number of requests per HTTP batch.
    #[arg(long, default_value = "100", env = "BTCBOX_CHUNK_SIZE", global = true)]
    pub chunk_size: usize,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check that the node answers RPC calls.
    Ping,

    /// Call an arbitrary RPC method and print the reply.
    Call {
        method: String,

        /// Positional parameters. Each is parsed as JSON, falling back to a
        /// plain string.
        params: Vec<String>,
    },

    /// Print block hashes for an inclusive height range using batched calls.
    BlockHashes {
        #[arg(long)]
        from: u64,

        #[arg(long)]
        to: u64,
    },

    /// Subscribe to node events and log them until interrupted.
    Listen {
        #[arg(long, default_value = "127.0.0.1", env = "BTCBOX_ZMQ_HOST")]
        zmq_host: String,

        #[arg(long, default_value = "28332", env = "BTCBOX_ZMQ_PORT")]
        zmq_port: u16,

        /// Topics to subscribe to (repeatable).
        #[arg(long = "topic", required = true)]
        topics: Vec<Topic>,
    },
}
