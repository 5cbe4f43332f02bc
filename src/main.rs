use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use scriptcast::markers::marker_list;
use scriptcast::pty::OutputHandler;
use scriptcast::{EventStream, Script, ScriptFormat, runner};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "scriptcast",
    about = "Generate scripted asciinema recordings",
    version
)]
#[command(group(ArgGroup::new("format").args(["json", "toml", "yaml"])))]
struct Args {
    /// The scripted session to record
    script_file: PathBuf,

    /// Don't run the script
    #[arg(short, long)]
    dont_run: bool,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// More log output (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Mirror the terminal session to stdout while recording
    #[arg(long)]
    echo: bool,

    /// Print markers of the output file as a Markdown list
    #[arg(short = 'm', long)]
    print_markers: bool,

    /// HTML element ID of the video player for marker links
    #[arg(long, requires = "print_markers")]
    data_id: Option<String>,

    /// The script is stored in JSON format
    #[arg(long)]
    json: bool,

    /// The script is stored in TOML format
    #[arg(long)]
    toml: bool,

    /// The script is stored in YAML format
    #[arg(long)]
    yaml: bool,
}

impl Args {
    fn format(&self) -> Option<ScriptFormat> {
        if self.json {
            Some(ScriptFormat::Json)
        } else if self.toml {
            Some(ScriptFormat::Toml)
        } else if self.yaml {
            Some(ScriptFormat::Yaml)
        } else {
            None
        }
    }

    fn log_level(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            _ => "trace",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("scriptcast={}", args.log_level())));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let script = Script::load(&args.script_file, args.format())
        .with_context(|| format!("Failed to load script file: {}", args.script_file.display()))?;

    if !args.dont_run {
        let echo: Option<OutputHandler> = args.echo.then(|| {
            let handler: OutputHandler = Arc::new(|data: &[u8]| {
                let mut stdout = std::io::stdout().lock();
                let _ = stdout.write_all(data);
                let _ = stdout.flush();
            });
            handler
        });
        runner::record(&script, echo)
            .await
            .context("Failed to record script")?;
    }

    if args.print_markers {
        let session = EventStream::load(&script.output_file).with_context(|| {
            format!("Failed to read recording: {}", script.output_file.display())
        })?;
        print!("{}", marker_list(&session, args.data_id.as_deref()));
    }

    Ok(())
}
