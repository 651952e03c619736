//! aggcat - concatenate files, literal strings and stdin through a stream aggregate
//!
//! ```text
//! aggcat header.txt text:--boundary - footer.txt > body.bin
//! aggcat --length a.bin b.bin
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use streamagg::{Aggregate, AggregateConfig, AggregateError, TextEncoding};
use tracing::{debug, error, info};

#[derive(Parser, Debug)]
#[clap(name = "aggcat")]
#[clap(about = "Concatenate inputs into one stream on stdout", long_about = None)]
struct Cli {
    /// Size in bytes of the buffer between the inputs and stdout
    #[clap(long)]
    buffer_size: Option<usize>,

    /// Leave stdout open after the last input
    #[clap(long)]
    no_close: bool,

    /// Print the total length of the inputs (or "unknown") instead of their contents
    #[clap(long)]
    length: bool,

    /// Inputs in output order: a file path, `-` for stdin, or `text:LITERAL`
    inputs: Vec<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Stdin,
    Text(String),
    File(PathBuf),
}

impl Input {
    fn parse(arg: &str) -> Self {
        if arg == "-" {
            Input::Stdin
        } else if let Some(text) = arg.strip_prefix("text:") {
            Input::Text(text.to_string())
        } else {
            Input::File(PathBuf::from(arg))
        }
    }
}

fn build(cli: &Cli) -> Result<Aggregate, AggregateError> {
    let mut config = AggregateConfig::from_env();
    if let Some(size) = cli.buffer_size {
        config = config.with_buffer_size(size);
    }
    if cli.no_close {
        config = config.with_close_sink_on_finish(false);
    }

    let aggregate = Aggregate::with_config(config);
    for arg in &cli.inputs {
        let input = Input::parse(arg);
        debug!(?input, "adding input");
        match input {
            Input::Stdin => aggregate.add_stream_unknown_length(std::io::stdin())?,
            Input::Text(text) => aggregate.add_string(&text, TextEncoding::Utf8)?,
            Input::File(path) => aggregate.add_file(path)?,
        }
    }
    Ok(aggregate)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let aggregate = match build(&cli) {
        Ok(aggregate) => aggregate,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if cli.length {
        println!("{}", aggregate.length());
        return ExitCode::SUCCESS;
    }

    let result = match aggregate.open_for_output_to(tokio::io::stdout()) {
        Ok(adapter) => adapter.run().await,
        Err(e) => Err(e),
    };

    match result {
        Ok(bytes) => {
            info!(bytes, sources = aggregate.source_count(), "done");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
