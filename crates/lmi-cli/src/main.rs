mod inputs;
mod report;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use lmi_core::{ModuleKind, SharingMode};
use lmi_pipeline::{ModuleProgress, ModuleRegistry, Orchestrator, PipelineStatus, RunRequest};
use lmi_sheets::SheetsSink;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "lmi")]
#[command(about = "Labor-market intelligence pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List registered modules and whether their credentials are configured
    Modules,
    /// Check one module's inputs without running it
    Validate {
        /// Module name (jobs, courses, trends, skills)
        #[arg(long)]
        module: String,

        /// JSON file with the module's fields, or a map of module name to fields
        #[arg(long)]
        inputs: PathBuf,
    },
    /// Run the selected modules and publish a spreadsheet
    Run {
        /// Email address the artifact is shared with
        #[arg(long)]
        requester: String,

        /// Research topic, used as the artifact title
        #[arg(long)]
        topic: String,

        /// Modules to run; repeat for several
        #[arg(long = "module", required = true)]
        modules: Vec<String>,

        /// JSON file mapping module name to its fields
        #[arg(long)]
        inputs: Option<PathBuf>,

        /// Override one field: module.field=value
        #[arg(long = "set", value_name = "MODULE.FIELD=VALUE")]
        overrides: Vec<String>,

        /// Who can open the artifact (restricted or anyone)
        #[arg(long)]
        sharing: Option<SharingMode>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let config = lmi_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let registry = ModuleRegistry::from_config(&config)?;

    match cli.command {
        Commands::Modules => {
            report::print_modules(&registry.available_modules());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate { module, inputs } => {
            let kind: ModuleKind = module.parse()?;
            let collector = registry
                .get(kind)
                .ok_or_else(|| anyhow::anyhow!("module '{kind}' is not registered"))?;
            let raw = inputs::load_module_inputs(&inputs, kind)?;
            let validation = collector.validate(&raw);
            report::print_validation(kind, &validation);
            Ok(if validation.is_valid() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Run {
            requester,
            topic,
            modules,
            inputs,
            overrides,
            sharing,
        } => {
            let mut per_module = match inputs {
                Some(path) => inputs::load_inputs_file(&path)?,
                None => std::collections::BTreeMap::new(),
            };
            for raw in &overrides {
                inputs::apply_override(&mut per_module, raw)?;
            }

            let mut request = RunRequest::new(requester, topic, modules)
                .with_sharing_mode(sharing.unwrap_or(config.default_sharing_mode));
            for (name, fields) in per_module {
                request = request.with_inputs(name, fields);
            }

            if !inputs::validate_request(&registry, &request)? {
                return Ok(ExitCode::FAILURE);
            }

            let sink = SheetsSink::from_config(&config)?;
            let orchestrator = Orchestrator::new(registry, Arc::new(sink))
                .with_notify(config.notify_on_share)
                .with_progress(Arc::new(|_run_id: &str, progress: &ModuleProgress| {
                    report::print_progress(progress);
                }));

            let run = orchestrator.execute(request).await;
            report::print_run(&run);

            Ok(if run.status == PipelineStatus::Failed {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
    }
}
