use clap::{Parser, Subcommand, ValueEnum};
use form_spec::{Answers, Form, FormConfig, FormOptions, SetOptions, render_text};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

const DEFAULT_LOG_FILTER: &str = "form_engine=warn,form_spec=warn";

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Form engine CLI",
    long_about = "Checks form configs, renders form snapshots and exports answers from JSON files"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum RenderMode {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Check a form config and print the report.
    Check {
        /// Path to the form config JSON.
        #[arg(long, value_name = "CONFIG")]
        config: PathBuf,
        /// Also require every referenced id to exist.
        #[arg(long)]
        strict: bool,
    },
    /// Build a form, import answers and print its render snapshot.
    Render {
        /// Path to the form config JSON.
        #[arg(long, value_name = "CONFIG")]
        config: PathBuf,
        /// Optional JSON object of answers keyed by question id.
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
        /// Output format for the snapshot.
        #[arg(long, value_enum, default_value_t = RenderMode::Text)]
        format: RenderMode,
    },
    /// Import answers and print current answers, validated answers and errors.
    Answers {
        /// Path to the form config JSON.
        #[arg(long, value_name = "CONFIG")]
        config: PathBuf,
        /// JSON object of answers keyed by question id.
        #[arg(long, value_name = "ANSWERS")]
        answers: PathBuf,
    },
    /// Print the JSON Schema of the form config format.
    Schema,
}

fn main() -> CliResult<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Check { config, strict } => run_check(&config, strict),
        Command::Render {
            config,
            answers,
            format,
        } => run_render(&config, answers.as_deref(), format),
        Command::Answers { config, answers } => run_answers(&config, &answers),
        Command::Schema => run_schema(),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_check(config_path: &Path, strict: bool) -> CliResult<()> {
    let config = load_config(config_path)?;
    let report = Form::validate_configs(&config, strict);
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.valid {
        Ok(())
    } else {
        Err(format!("form config is invalid: {report}").into())
    }
}

fn run_render(config_path: &Path, answers_path: Option<&Path>, format: RenderMode) -> CliResult<()> {
    let form = load_form(config_path, answers_path)?;
    let instructions = form.get_render_instructions();
    match format {
        RenderMode::Text => println!("{}", render_text(&instructions)),
        RenderMode::Json => println!("{}", serde_json::to_string_pretty(&instructions)?),
    }
    Ok(())
}

fn run_answers(config_path: &Path, answers_path: &Path) -> CliResult<()> {
    let form = load_form(config_path, Some(answers_path))?;
    let output = json!({
        "current": form.get_current_answers(),
        "validated": form.get_validated_answers(),
        "errors": form.get_errors(),
        "clean": form.is_clean(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_schema() -> CliResult<()> {
    let schema = schemars::schema_for!(FormConfig);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

fn load_config(path: &Path) -> CliResult<FormConfig> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn load_form(config_path: &Path, answers_path: Option<&Path>) -> CliResult<Form> {
    let config = load_config(config_path)?;
    let form = Form::new(&config, FormOptions::new())?;

    if let Some(path) = answers_path {
        let contents = fs::read_to_string(path)?;
        let answers: Answers = serde_json::from_str(&contents)?;
        debug!(count = answers.len(), "importing answers");
        form.import_answers(&answers, SetOptions::default());
    }

    Ok(form)
}
