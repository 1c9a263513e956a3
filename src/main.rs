use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use islplay::catalog::Catalog;
use islplay::cli::{CatalogAction, Cli, Commands, ConfigAction};
use islplay::config::Config;
use islplay::daemon::run_daemon;
use islplay::input::{
    FallbackSource, InputEvent, LineSource, SentenceSource, TranscriptionSource,
};
use islplay::ipc::client::send_command;
use islplay::ipc::protocol::{Command, Response};
use islplay::ipc::server::IpcServer;
use islplay::output::{format_event, format_queue, format_resolution, format_status};
use islplay::parser::{PassthroughParser, SentenceParser};
use islplay::player::build_player;
use islplay::queue::Admission;
use islplay::resolver::{Resolver, normalize_token};
use islplay::sequencer::PlaybackEvent;
use islplay::session::{Session, is_stop_phrase};
use islplay::tokenize::Language;
use islplay::transcribe::{HttpTranscriber, TranscriptionService};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    let verbose = cli.verbose > 0;
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Resolve { sentence, json } => {
            let config = load_config(config_path, cli.language)?;
            handle_resolve(&config, &sentence.join(" "), json)?;
        }
        Commands::Play { sentence, no_parse } => {
            let config = load_config(config_path, cli.language)?;
            handle_play(&config, &sentence.join(" "), no_parse, verbose).await?;
        }
        Commands::Listen { chunks } => {
            let config = load_config(config_path, cli.language)?;
            handle_listen(&config, chunks.as_deref(), verbose).await?;
        }
        Commands::Transcribe { file } => {
            let config = load_config(config_path, cli.language)?;
            handle_transcribe(&config, &file).await?;
        }
        Commands::Daemon { socket } => {
            let config = load_config(config_path, cli.language)?;
            run_daemon(config, socket).await?;
        }
        Commands::Submit { sentence, socket } => {
            handle_ipc_command(
                socket,
                Command::Submit {
                    text: sentence.join(" "),
                },
                false,
            )
            .await?;
        }
        Commands::Queue { json, socket } => {
            handle_ipc_command(socket, Command::Queue, json).await?;
        }
        Commands::Status { socket } => {
            handle_ipc_command(socket, Command::Status, false).await?;
        }
        Commands::Shutdown { socket } => {
            handle_ipc_command(socket, Command::Shutdown, false).await?;
        }
        Commands::Catalog { action } => {
            let config = load_config(config_path, cli.language)?;
            handle_catalog_command(&config, action)?;
        }
        Commands::Config { action } => {
            handle_config_command(action, config_path, cli.language)?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "islplay",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// Log to stderr. `RUST_LOG` wins over the -q/-v flags.
fn init_logging(quiet: bool, verbose: u8) {
    let level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/islplay/config.toml)
/// 3. Built-in defaults
///
/// Environment overrides apply on top, then the --language flag.
fn load_config(
    custom_path: Option<&Path>,
    language: Option<Language>,
) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::load_or_default(&Config::default_path())?,
    };

    let mut config = config.with_env_overrides();
    if let Some(language) = language {
        config.input.language = language;
    }
    Ok(config)
}

fn load_resolver(config: &Config) -> Result<Resolver> {
    let catalog = Catalog::load(&config.catalog.path)?;
    Ok(Resolver::new(
        Arc::new(catalog),
        config.input.language.tokenizer(),
    ))
}

fn handle_resolve(config: &Config, sentence: &str, json: bool) -> Result<()> {
    let resolver = load_resolver(config)?;
    let resolution = resolver.resolve(sentence);

    if json {
        println!("{}", serde_json::to_string_pretty(&resolution)?);
    } else {
        println!("{}", format_resolution(&resolution));
    }
    Ok(())
}

/// Print playback events until every session handle is dropped.
fn spawn_event_printer(
    mut rx: mpsc::UnboundedReceiver<PlaybackEvent>,
    verbose: bool,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Some(line) = format_event(&event, verbose) {
                println!("{line}");
            }
        }
    })
}

/// Wait for the queue to drain, then let the printer catch up.
async fn finish(session: Session, printer: JoinHandle<()>) {
    session.wait_idle().await;
    drop(session);
    if tokio::time::timeout(Duration::from_millis(500), printer)
        .await
        .is_err()
    {
        tracing::debug!("event printer still running at exit");
    }
}

async fn handle_play(
    config: &Config,
    sentence: &str,
    no_parse: bool,
    verbose: bool,
) -> Result<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    let session = if no_parse {
        let catalog = Arc::new(Catalog::load(&config.catalog.path)?);
        let parser: Arc<dyn SentenceParser> = Arc::new(PassthroughParser);
        Session::with_collaborators(
            config,
            catalog,
            parser,
            build_player(&config.player)?,
            Some(tx),
        )
    } else {
        Session::from_config(config, Some(tx))?
    };
    let printer = spawn_event_printer(rx, verbose);

    match session.submit(sentence).await {
        Admission::Accepted(_) => {}
        Admission::Empty | Admission::Duplicate => {
            eprintln!("{}", "Nothing to sign.".dimmed());
        }
    }

    finish(session, printer).await;
    Ok(())
}

async fn handle_listen(config: &Config, chunks: Option<&Path>, verbose: bool) -> Result<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    let session = Session::from_config(config, Some(tx))?;
    let printer = spawn_event_printer(rx, verbose);

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut source: Box<dyn SentenceSource> = match chunks {
        Some(dir) => {
            let transcriber = Arc::new(HttpTranscriber::new(
                config.service.transcribe_url.clone(),
                config.service.timeout,
            )?);
            let speech =
                TranscriptionSource::from_dir(transcriber, dir, config.input.chunk_interval)
                    .with_context(|| format!("failed to read chunks from {}", dir.display()))?;
            Box::new(FallbackSource::new(
                Box::new(speech),
                Some(Box::new(LineSource::new(stdin))),
                config.input.max_failures,
            ))
        }
        None => Box::new(LineSource::new(stdin)),
    };

    eprintln!(
        "Listening ({}). Say \"{}\" to stop.",
        source.name(),
        config.input.stop_phrase
    );

    loop {
        match source.next_event().await {
            Ok(Some(InputEvent::Interim(text))) => {
                if is_stop_phrase(&text, &config.input.stop_phrase) {
                    tracing::info!("stop phrase heard");
                    break;
                }
                eprintln!("{}", text.dimmed());
            }
            Ok(Some(InputEvent::Final(text))) => {
                if is_stop_phrase(&text, &config.input.stop_phrase) {
                    tracing::info!("stop phrase heard");
                    break;
                }
                session.submit(&text).await;
            }
            Ok(None) => break,
            Err(e) => {
                eprintln!("{}", format!("Input stopped: {}", e).red());
                break;
            }
        }
    }

    finish(session, printer).await;
    Ok(())
}

async fn handle_transcribe(config: &Config, file: &Path) -> Result<()> {
    let wav = std::fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let transcriber = HttpTranscriber::new(
        config.service.transcribe_url.clone(),
        config.service.timeout,
    )?;
    let text = transcriber.transcribe(wav).await?;
    println!("{text}");
    Ok(())
}

fn handle_catalog_command(config: &Config, action: CatalogAction) -> Result<()> {
    let path = &config.catalog.path;

    match action {
        CatalogAction::List { prefix } => {
            let catalog = Catalog::load(path)?;
            let prefix = prefix.map(|p| p.to_lowercase());
            let matches = catalog
                .iter()
                .filter(|e| prefix.as_deref().is_none_or(|p| e.name.starts_with(p)));
            for entry in matches {
                println!(
                    "{:>5}  {:<20} {}",
                    entry.id,
                    entry.name,
                    entry.file_name.dimmed()
                );
            }
        }
        CatalogAction::Lookup { word } => {
            let resolver = load_resolver(config)?;
            let token = normalize_token(&word);
            match resolver.catalog().lookup(&token) {
                Some(entry) => println!("{} → {}", entry.name.green(), entry.file_name),
                None => {
                    println!("{}", format!("No clip for '{token}'.").yellow());
                    println!("{}", format_resolution(&resolver.resolve(&token)));
                }
            }
        }
        CatalogAction::Add { name, file } => {
            let mut catalog = Catalog::load(path)?;
            let entry = catalog.insert(&name, file.as_deref())?;
            catalog.save(path)?;
            println!(
                "Added #{} {} → {}",
                entry.id,
                entry.name.green(),
                entry.file_name
            );
        }
    }
    Ok(())
}

/// Handle configuration commands.
fn handle_config_command(
    action: ConfigAction,
    custom_path: Option<&Path>,
    language: Option<Language>,
) -> Result<()> {
    let config_path = custom_path
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path);

    match action {
        ConfigAction::Show => {
            let config = load_config(custom_path, language)?;
            print!("{}", config.to_toml()?);
        }
        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
        ConfigAction::Init { force } => {
            if config_path.exists() && !force {
                eprintln!(
                    "Config already exists at {} (use --force to overwrite)",
                    config_path.display()
                );
                std::process::exit(1);
            }
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&config_path, Config::default().to_toml()?)?;
            println!("Wrote {}", config_path.display());
        }
    }
    Ok(())
}

/// Send IPC command to daemon and handle response.
async fn handle_ipc_command(socket: Option<PathBuf>, command: Command, json: bool) -> Result<()> {
    let socket_path = socket.unwrap_or_else(IpcServer::default_socket_path);

    match send_command(&socket_path, command).await {
        Ok(response) => match response {
            Response::Ok => println!("{}", "OK".green()),
            Response::Accepted { id } => println!("Queued as {}", format!("#{id}").green()),
            Response::Duplicate => {
                println!("{}", "Same as the previous sentence; not queued.".yellow())
            }
            Response::Ignored => println!("{}", "Nothing to sign.".dimmed()),
            Response::Queue { items } => {
                if json {
                    println!("{}", serde_json::to_string_pretty(&items)?);
                } else {
                    println!("{}", format_queue(&items));
                }
            }
            Response::Status {
                status,
                pacing,
                player,
            } => {
                println!("Status:");
                println!("  {}   {}", "Version:".dimmed(), islplay::version_string());
                println!("{}", format_status(&status, &pacing, &player));
            }
            Response::Error { message } => {
                eprintln!("{}", format!("Error: {}", message).red());
                std::process::exit(1);
            }
        },
        Err(e) => {
            eprintln!(
                "{}",
                format!("Failed to communicate with daemon: {}", e).red()
            );
            eprintln!("Is the daemon running? Start it with: islplay daemon");
            std::process::exit(1);
        }
    }

    Ok(())
}
