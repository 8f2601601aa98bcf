use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};
use vibe_assist::logging::{self, LogTarget};
use vibe_assist::{ChatController, Config, HttpTransport};

#[derive(Parser)]
#[command(name = "vibe-assist")]
#[command(about = "Chat with the Vibe Assist support endpoint from the terminal")]
#[command(version)]
struct Cli {
    /// Server base URL (overrides the config file and VIBE_ASSIST_URL)
    #[arg(long, global = true)]
    url: Option<String>,
    /// Chat endpoint path
    #[arg(long, global = true)]
    path: Option<String>,
    /// Allow only one request in flight; later messages wait their turn
    #[arg(long, global = true)]
    serialize: bool,
    /// Request timeout in seconds (default: none)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive chat (default)
    Chat,
    /// Send one message and print the reply
    Ask {
        /// Message text
        message: Vec<String>,
        /// Print the whole transcript as JSON
        #[arg(long)]
        json: bool,
        /// Log diagnostics to stderr instead of the log file
        #[arg(short, long)]
        verbose: bool,
    },
    /// Write the effective settings to the config file
    Init {
        /// Replace an existing config file
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    fn apply_overrides(&self, config: Config) -> Config {
        let mut config = config.with_url_override(self.url.clone());
        if let Some(path) = &self.path {
            config.chat_path = Some(path.clone());
        }
        if self.serialize {
            config.serialize_submissions = Some(true);
        }
        if let Some(timeout) = self.timeout {
            config.request_timeout_secs = Some(timeout);
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.apply_overrides(Config::load()?.with_env_overrides());

    let command = cli.command.unwrap_or(Commands::Chat);

    let log_target = match &command {
        Commands::Ask { verbose: true, .. } => LogTarget::Stderr,
        _ => config.log_file().map(LogTarget::File).unwrap_or(LogTarget::Discard),
    };
    if let Some(err) = logging::init_or_discard(log_target)? {
        eprintln!("warning: diagnostics disabled, log file unavailable: {:#}", err);
    }

    match command {
        Commands::Chat => run_chat(&config).await,
        Commands::Ask { message, json, .. } => {
            if !ask(&config, &message.join(" "), json).await? {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Init { force } => init_config(&config, force),
    }
}

fn transport_for(config: &Config) -> HttpTransport {
    let transport = HttpTransport::from_config(config);
    tracing::info!(endpoint = %transport.endpoint(), mode = ?config.submit_mode(), "chat endpoint configured");
    transport
}

async fn run_chat(config: &Config) -> Result<()> {
    let transport = transport_for(config);
    let endpoint = transport.endpoint().to_string();
    let controller = ChatController::new(Arc::new(transport), config.submit_mode());
    let mut app = App::new(controller, endpoint);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new(tui::TICK_RATE);

    let result = run_loop(&mut terminal, &mut app, &mut events).await;

    // Replies still in flight are dropped with the app
    tui::restore()?;
    result
}

async fn run_loop(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        tokio::select! {
            Some(completion) = app.controller.next_completion(), if app.controller.in_flight() > 0 => {
                app.apply_completion(completion);
            }
            event = events.next() => match event {
                Some(event) => handler::handle_event(app, event),
                None => break,
            },
        }
    }
    Ok(())
}

/// One-shot exchange. Returns false when the reply is the error message.
async fn ask(config: &Config, message: &str, json: bool) -> Result<bool> {
    let outcome = vibe_assist::ask(Arc::new(transport_for(config)), message).await;

    if let Some(output) = outcome.render(json)? {
        println!("{}", output);
    }
    Ok(outcome.succeeded())
}

fn init_config(config: &Config, force: bool) -> Result<()> {
    let path = Config::get_config_path()?;
    if config.resolved().save_new(&path, force)? {
        println!("Wrote {}", path.display());
    } else {
        anyhow::bail!("{} already exists (use --force to replace it)", path.display());
    }
    Ok(())
}
