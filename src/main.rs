use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use colored::*;

mod app;
mod handler;
mod logging;
mod tui;
mod ui;

use app::App;
use busguardian::ai::OllamaClient;
use busguardian::provider::build_client;
use busguardian::{
    CameraObservation, ChatRole, Config, Provider, SensorReading, Session, TurnController, TurnOutcome,
    VentilationQuality,
};

#[derive(Parser)]
#[command(name = "busguardian", version)]
#[command(about = "Simulated bus heat monitoring dashboard with an AI assistant")]
struct Cli {
    /// AI provider (gemini, ollama, claude, openai)
    #[arg(short, long, global = true)]
    provider: Option<String>,
    /// Model to use with the provider
    #[arg(short, long, global = true)]
    model: Option<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze the heat status of a simulated reading
    Analyze {
        #[command(flatten)]
        sensors: SensorArgs,
    },
    /// Ask the assistant a question about a simulated reading
    Ask {
        /// Your question
        question: String,
        #[command(flatten)]
        sensors: SensorArgs,
    },
    /// List models for the selected provider
    Models,
}

#[derive(Args)]
struct SensorArgs {
    /// Engine temperature in °C
    #[arg(long, default_value_t = 90.0)]
    engine: f64,
    /// Cabin temperature in °C
    #[arg(long, default_value_t = 22.0)]
    cabin: f64,
    /// Outside temperature in °C
    #[arg(long, default_value_t = 20.0, allow_negative_numbers = true)]
    outside: f64,
    /// Coolant level in percent
    #[arg(long, default_value_t = 80.0)]
    coolant: f64,
    /// Ventilation quality: good, moderate or poor
    #[arg(long, default_value = "good", value_parser = parse_ventilation)]
    ventilation: VentilationQuality,
    /// Camera observation: none, steam or blocked
    #[arg(long, default_value = "none", value_parser = parse_camera)]
    camera: CameraObservation,
}

impl SensorArgs {
    fn reading(&self) -> SensorReading {
        SensorReading {
            engine_temperature: self.engine,
            cabin_temperature: self.cabin,
            outside_temperature: self.outside,
            coolant_level: self.coolant,
            ventilation_quality: self.ventilation,
            camera_observations: self.camera,
        }
    }
}

fn parse_ventilation(s: &str) -> Result<VentilationQuality, String> {
    VentilationQuality::from_str(s).ok_or_else(|| format!("unknown ventilation quality `{}`", s))
}

fn parse_camera(s: &str) -> Result<CameraObservation, String> {
    CameraObservation::from_str(s).ok_or_else(|| format!("unknown camera observation `{}`", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load().unwrap_or_else(|_| Config::new());
    let provider = match cli.provider.as_deref() {
        Some(name) => Provider::from_str(name).ok_or_else(|| anyhow!("Unknown provider: {}", name))?,
        None => config.provider(),
    };
    let model = cli.model.clone().unwrap_or_else(|| config.model_for(provider));

    match cli.command {
        None => {
            logging::init_file()?;
            run_dashboard(config, provider, model).await
        }
        Some(Commands::Analyze { sensors }) => {
            logging::init_stderr()?;
            run_turn(&config, provider, &model, sensors.reading(), None).await
        }
        Some(Commands::Ask { question, sensors }) => {
            logging::init_stderr()?;
            run_turn(&config, provider, &model, sensors.reading(), Some(&question)).await
        }
        Some(Commands::Models) => {
            logging::init_stderr()?;
            list_models(&config, provider).await
        }
    }
}

async fn run_dashboard(config: Config, provider: Provider, model: String) -> Result<()> {
    tracing::info!(provider = provider.as_str(), model = %model, "starting dashboard");

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();
    let mut app = App::new(config, provider, model);

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;
            if let Some(event) = events.next().await {
                handler::handle_event(&mut app, event).await?;
            }
            app.poll_tasks().await;
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    result
}

async fn run_turn(
    config: &Config,
    provider: Provider,
    model: &str,
    reading: SensorReading,
    question: Option<&str>,
) -> Result<()> {
    let client = build_client(provider, model, config)
        .ok_or_else(|| anyhow!("{} API key not configured", provider.display_name()))?;
    let controller = TurnController::new(client);
    let mut session = Session::new(reading);

    println!("🤖 Querying {} with {}...\n", provider.display_name().bold().magenta(), model.bold());

    let outcome = match question {
        Some(question) => controller.ask(&mut session, question).await,
        None => controller.analyze(&mut session).await,
    };

    match outcome {
        TurnOutcome::Committed => {
            if let Some(reply) = session.history().last().filter(|m| m.role == ChatRole::Assistant) {
                println!("{}", "Response:".bold().green());
                println!("{}", reply.content);
            }
            Ok(())
        }
        TurnOutcome::RolledBack => {
            let description = session
                .latest_notice()
                .map(|n| n.description.clone())
                .unwrap_or_default();
            println!("{}: {}", "Error".red().bold(), description);
            Err(anyhow!("completion failed"))
        }
        TurnOutcome::Skipped => {
            println!("{}", "Nothing to ask: the question is empty".yellow());
            Ok(())
        }
    }
}

async fn list_models(config: &Config, provider: Provider) -> Result<()> {
    println!("\n{}", format!("🤖 {} models", provider.display_name()).bold().blue());
    println!("{}", "=".repeat(30).dimmed());

    let models = match provider {
        Provider::Ollama => {
            let ollama = OllamaClient::new(&config.ollama_url(), provider.default_model());
            match ollama.list_models().await {
                Ok(models) => models,
                Err(e) => {
                    println!("{}: {}", "Error connecting to Ollama".red(), e);
                    println!("Make sure Ollama is running: {}", "ollama serve".bold());
                    return Ok(());
                }
            }
        }
        _ => provider.known_models(),
    };

    if models.is_empty() {
        println!("{}", "No models found. Pull a model with: ollama pull llama3.2".yellow());
    }
    for model in models {
        println!("  • {}", model.green());
    }

    Ok(())
}
