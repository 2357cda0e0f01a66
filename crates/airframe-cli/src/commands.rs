//! Main commands enum and per-command arguments.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// List catalog endpoints with their health
    Endpoints {
        /// Probe every endpoint before listing
        #[arg(long)]
        probe: bool,
    },

    /// Probe all endpoints, or only the named one
    Probe {
        /// Endpoint name
        name: Option<String>,
    },

    /// Send a prompt and print the reply
    Infer(InferArgs),

    /// Poll an endpoint document from a mounted ConfigMap directory
    Watch {
        /// Directory holding one file per key
        #[arg(long)]
        dir: PathBuf,
        /// Key (file name) of the endpoint document
        #[arg(long)]
        key: String,
        /// Seconds between polls
        #[arg(long)]
        interval: Option<u64>,
    },
}

/// Arguments of the `infer` command.
#[derive(Args, Debug, Clone)]
pub struct InferArgs {
    /// Endpoint to use; defaults to the first healthy one
    #[arg(short, long)]
    pub endpoint: Option<String>,

    /// Model name forwarded to the backend
    #[arg(short, long)]
    pub model: Option<String>,

    /// Maximum tokens to generate
    #[arg(long = "max-tokens")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature
    #[arg(short, long)]
    pub temperature: Option<f32>,

    /// Request a single buffered response instead of a stream
    #[arg(long = "no-stream")]
    pub no_stream: bool,

    /// System prompt sent before the user prompt
    #[arg(short, long)]
    pub system: Option<String>,

    /// Prompt text; words are joined with spaces
    #[arg(required = true, num_args = 1..)]
    pub prompt: Vec<String>,
}
