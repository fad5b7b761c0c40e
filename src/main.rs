use github_agents::{
    agent::{build_model, ModelClient},
    cli::{
        commands::{
            HistoryCommand, InteractiveCommand, ReviewPrCommand, TriageIssueCommand, UpdateDocsCommand,
            ValidateCommand,
        },
        output::*,
        Cli, Command,
    },
    core::{config::PipelineConfig, Settings},
    execution::ExecutionEngine,
    orchestration::Coordinator,
    session::{InMemorySessionStore, SessionStore},
    tools::ToolRegistry,
    workflows::{builtin, GitHubWorkflows},
};

use anyhow::{bail, Context, Result};
use indicatif::ProgressBar;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const EXIT_WORDS: [&str; 3] = ["exit", "quit", "q"];

/// Everything a command needs, built once from settings
struct App {
    settings: Settings,
    model: Arc<dyn ModelClient>,
    engine: Arc<ExecutionEngine>,
    workflows: GitHubWorkflows,
}

impl App {
    fn new(settings: Settings) -> Result<Self> {
        let model = build_model(&settings.model_config(), settings.retry.clone());
        let tools = Arc::new(ToolRegistry::with_mock_catalogue());
        let engine = Arc::new(ExecutionEngine::new(model.clone(), tools, settings.step_timeout_secs));
        let pipelines = builtin::registry(settings.max_iterations)?;
        let workflows = GitHubWorkflows::new(engine.clone(), pipelines);
        Ok(Self {
            settings,
            model,
            engine,
            workflows,
        })
    }

    /// Print engine events above the spinner
    async fn show_progress(&self, spinner: &ProgressBar) {
        let spinner = spinner.clone();
        self.engine
            .add_event_handler(move |event| spinner.println(format_execution_event(&event)))
            .await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{} {}", CROSS, style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    };

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { settings.log_level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set logging subscriber")?;

    if !settings.step_timeout_covers_retries() {
        warn!(
            step_timeout_secs = settings.step_timeout_secs,
            backoff_secs = settings.retry.backoff_window().as_secs(),
            "Step timeout is shorter than the retry backoff; later attempts will be cut off"
        );
    }

    let interactive = cli.is_interactive();
    let outcome = tokio::select! {
        result = run(&cli, settings) => result,
        _ = tokio::signal::ctrl_c(), if !interactive => {
            eprintln!("\n{} Interrupted", WARN);
            std::process::exit(1);
        }
    };

    if let Err(e) = outcome {
        error!("{:#}", e);
        eprintln!("{} {}", CROSS, style(format!("{:#}", e)).red());
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cli: &Cli, settings: Settings) -> Result<()> {
    match &cli.command {
        Command::Validate(cmd) => validate_pipeline(cmd),
        Command::History(cmd) => show_history(cmd, &settings).await,
        command => {
            let app = App::new(settings)?;
            match command {
                Command::ReviewPr(cmd) => review_pr(&app, cmd).await,
                Command::TriageIssue(cmd) => triage_issues(&app, cmd).await,
                Command::UpdateDocs(cmd) => update_docs(&app, cmd).await,
                Command::Interactive(cmd) => interactive(&app, cmd).await,
                Command::Validate(_) | Command::History(_) => Ok(()),
            }
        }
    }
}

async fn review_pr(app: &App, cmd: &ReviewPrCommand) -> Result<()> {
    let spinner = create_spinner(format!("Reviewing {}#{}", cmd.repo, cmd.pr_number));
    app.show_progress(&spinner).await;

    let result = app
        .workflows
        .review_pull_request(&cmd.repo, cmd.pr_number, cmd.post_comments)
        .await;
    spinner.finish_and_clear();

    let result = result.with_context(|| format!("Review of {}#{} failed", cmd.repo, cmd.pr_number))?;
    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("\n{}", format_review(&result));
    }
    Ok(())
}

async fn triage_issues(app: &App, cmd: &TriageIssueCommand) -> Result<()> {
    let spinner = create_spinner(format!("Triaging {} issue(s) in {}", cmd.issue_numbers.len(), cmd.repo));
    app.show_progress(&spinner).await;

    let outcomes = app
        .workflows
        .triage_issues(&cmd.repo, &cmd.issue_numbers, cmd.apply_labels)
        .await;
    spinner.finish_and_clear();

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
    } else {
        for outcome in &outcomes {
            println!("\n{}", format_issue_outcome(outcome));
        }
    }

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    if failed > 0 {
        bail!("{} of {} issue(s) failed to triage", failed, outcomes.len());
    }
    Ok(())
}

async fn update_docs(app: &App, cmd: &UpdateDocsCommand) -> Result<()> {
    let source = Path::new(&cmd.source);
    let is_pdf = source
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

    let spinner = create_spinner("Writing documentation");
    app.show_progress(&spinner).await;

    let result = if is_pdf {
        app.workflows.document_from_pdf(&cmd.source).await
    } else {
        let content = if source.is_file() {
            std::fs::read_to_string(source).with_context(|| format!("Failed to read {}", source.display()))?
        } else {
            cmd.source.clone()
        };
        app.workflows
            .improve_documentation(&content, cmd.context.as_deref())
            .await
    };
    spinner.finish_and_clear();

    let result = result.context("Documentation workflow failed")?;
    if !result.approved {
        warn!(iterations = result.iterations, "Documentation was not approved");
    }

    if let Some(path) = &cmd.output {
        std::fs::write(path, &result.documentation)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("{} Documentation written to {}", CHECK, style(path.display()).cyan());
    }

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if cmd.output.is_none() {
        println!("\n{}", format_docs(&result));
    } else {
        println!("{} Review loop: {}", LOOP, format_loop_state(result.loop_state));
    }
    Ok(())
}

async fn open_store(settings: &Settings, persist: bool) -> Result<Arc<dyn SessionStore>> {
    if persist {
        persistent_store(settings).await
    } else {
        Ok(Arc::new(InMemorySessionStore::new()))
    }
}

#[cfg(feature = "sqlite")]
async fn persistent_store(settings: &Settings) -> Result<Arc<dyn SessionStore>> {
    let path = settings
        .database_file()
        .context("No data directory available; set database_path")?;
    let store = github_agents::session::SqliteSessionStore::new(&path).await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "sqlite"))]
async fn persistent_store(_settings: &Settings) -> Result<Arc<dyn SessionStore>> {
    bail!("Persistent sessions need the 'sqlite' feature")
}

async fn interactive(app: &App, cmd: &InteractiveCommand) -> Result<()> {
    let sessions = open_store(&app.settings, cmd.persist).await?;
    let pipelines = builtin::registry(app.settings.max_iterations)?;
    let coordinator = Coordinator::new(app.model.clone(), app.engine.clone(), pipelines, sessions)
        .with_history_window(app.settings.history_window);

    let session_id = cmd
        .session
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    println!("{} GitHub agents, session {}", ROCKET, style(&session_id).cyan());
    println!("{} Type a request, or one of {} to leave.", INFO, EXIT_WORDS.join("/"));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", style(">").bold());
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };
        let request = line.trim();
        if request.is_empty() {
            continue;
        }
        if EXIT_WORDS.contains(&request.to_lowercase().as_str()) {
            break;
        }

        let response = coordinator.handle(request, &session_id).await;
        println!("{}\n", format_response(&response));
    }

    println!("{} Goodbye", INFO);
    Ok(())
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating pipeline...", INFO);

    match PipelineConfig::from_file(&cmd.file) {
        Ok(config) => {
            let pipeline = config.to_pipeline()?;
            println!("{} Pipeline configuration is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            println!("  Steps: {}", style(pipeline.steps().len()).cyan());
            println!("  Output: {}", style(&pipeline.output_key).cyan());
            let inputs: Vec<String> = pipeline.external_inputs().into_iter().collect();
            if !inputs.is_empty() {
                println!("  Inputs: {}", style(inputs.join(", ")).cyan());
            }

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}

#[cfg(feature = "sqlite")]
async fn show_history(cmd: &HistoryCommand, settings: &Settings) -> Result<()> {
    let store = open_store(settings, true).await?;

    let Some(session_id) = &cmd.session else {
        let sessions = store.list_sessions().await?;
        if cmd.json {
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "sessions": sessions }))?);
        } else if sessions.is_empty() {
            println!("{} No sessions found", INFO);
        } else {
            println!("{} Sessions:", INFO);
            for id in &sessions {
                println!("  {}", style(id).bold());
            }
        }
        return Ok(());
    };

    if !store.list_sessions().await?.contains(session_id) {
        println!("{} Session {} not found", WARN, style(session_id).cyan());
        return Ok(());
    }

    let session = store.get_or_create(session_id).await?;
    let skip = session.exchanges.len().saturating_sub(cmd.limit);
    let recent = &session.exchanges[skip..];

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(recent)?);
    } else if recent.is_empty() {
        println!("{} No exchanges in session {}", INFO, style(session_id).cyan());
    } else {
        println!(
            "{} Session {} (showing latest {}):",
            INFO,
            style(session_id).cyan(),
            recent.len()
        );
        for exchange in recent {
            println!("{}", format_exchange(exchange));
        }
    }
    Ok(())
}

#[cfg(not(feature = "sqlite"))]
async fn show_history(_cmd: &HistoryCommand, _settings: &Settings) -> Result<()> {
    bail!("Session history needs the 'sqlite' feature")
}
