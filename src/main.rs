// Jobworker - job execution worker
// Main entry point

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use jobworker::client::run_tmpl;
use jobworker::config::load_config;
use jobworker::job::JobContext;
use jobworker::server::ControlServer;
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "worker")]
#[command(about = "Job execution worker", version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser, Debug)]
enum Command {
    /// Replace job variables in a file: worker tmpl inputFile outputFile
    #[command(long_about = TMPL_LONG_ABOUT)]
    Tmpl {
        /// Template file to read
        source: String,
        /// File to write the result to
        destination: String,
    },
    /// Run the worker control server for a job
    Daemon {
        /// Bind address (default from config: 127.0.0.1:0)
        #[arg(long)]
        bind: Option<String>,
        /// TOML file with the job's build variables and parameters
        #[arg(long = "job-file")]
        job_file: Option<PathBuf>,
    },
}

const TMPL_LONG_ABOUT: &str = "\
Replace job variables with their values in a file, from inside a step script.

    # create a file
    cat << EOF > myFile
    this is a line in the file, with a variable {{.cds.version}}
    EOF

    # worker tmpl <input file> <output file>
    worker tmpl ./myFile ./outputFile

outputFile will contain:

    this is a line in the file, with a variable 2

if this is run number 2 of the workflow. Job parameters take precedence over
build variables with the same name. References to unknown variables are left
as they are.";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Tmpl {
            source,
            destination,
        } => {
            // Quiet by default: a successful tmpl prints nothing
            init_tracing("warn");
            if let Err(e) = run_tmpl_command(&source, &destination).await {
                eprintln!("{:#}", e);
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Daemon { bind, job_file } => {
            init_tracing("info");
            run_daemon(bind, job_file).await
        }
    }
}

async fn run_tmpl_command(source: &str, destination: &str) -> Result<()> {
    let config = load_config()?;
    run_tmpl(&config.client, source, destination).await?;
    Ok(())
}

/// Run the control server until ctrl-c
async fn run_daemon(bind: Option<String>, job_file: Option<PathBuf>) -> Result<()> {
    let mut config = load_config()?;
    if let Some(bind) = bind {
        config.server.bind_address = bind;
    }

    let job = match job_file {
        Some(path) => JobContext::load(&path)?,
        None => JobContext::default(),
    };
    tracing::info!(
        build_variables = job.build_variables.len(),
        parameters = job.parameters.len(),
        "Loaded job context"
    );

    let server = ControlServer::new(job, config.server.clone())
        .bind()
        .await
        .context("Failed to start control server")?;

    // The job runner exports this to step processes
    println!("{}={}", config.client.port_env_var, server.local_addr().port());

    server
        .serve_with_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down control server");
        })
        .await
}

/// Initialize tracing to stderr, honouring RUST_LOG
fn init_tracing(default_filter: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Bridge `log` records from dependencies
    tracing_log::LogTracer::init().ok();
}
