//! ClassLab CLI - terminal client for collaborative code environments
//!
//! Usage: lab <command> [options]

use anyhow::Context;
use clap::{Parser, Subcommand};
use lab_common::{CursorPos, EXIT_CONFIG_ERROR, EXIT_ERROR};
use lab_sync::{EditorSession, SessionConfig, SessionHandle};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "lab", version = "0.1.0", about = "ClassLab environment client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose/debug logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Join a collaborative environment and drive it interactively
    Join {
        /// Environment ID to join
        environment_id: String,

        /// WebSocket server URL (overrides config file)
        #[arg(long)]
        server: Option<String>,

        /// Path to a TOML session config
        #[arg(long)]
        config: Option<PathBuf>,

        /// File to open initially (overrides config file)
        #[arg(long)]
        file: Option<String>,
    },

    /// Validate a session config file and print the resolved values
    CheckConfig {
        /// Path to a TOML session config
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    lab_common::telemetry::init_tracing(cli.verbose, cli.json_logs);

    let result = match cli.command {
        Commands::Join {
            environment_id,
            server,
            config,
            file,
        } => join(environment_id, server, config, file).await,
        Commands::CheckConfig { config } => check_config(config),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        let code = if e.downcast_ref::<ConfigFailure>().is_some() {
            EXIT_CONFIG_ERROR
        } else {
            EXIT_ERROR
        };
        std::process::exit(code);
    }
}

/// Marker wrapper so config problems map to their own exit code.
#[derive(Debug)]
struct ConfigFailure(anyhow::Error);

impl std::fmt::Display for ConfigFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self.0)
    }
}

impl std::error::Error for ConfigFailure {}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<SessionConfig> {
    match path {
        Some(path) => SessionConfig::from_toml(&path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(SessionConfig::default()),
    }
}

fn check_config(path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(path).map_err(|e| anyhow::Error::new(ConfigFailure(e)))?;
    config
        .validate()
        .map_err(|e| anyhow::Error::new(ConfigFailure(e)))?;

    println!("Configuration OK");
    println!("  server_url:             {}", config.server_url);
    println!("  environment_id:         {}", config.environment_id);
    println!("  initial_file:           {}", config.initial_file);
    println!("  max_reconnect_attempts: {}", config.max_reconnect_attempts);
    println!(
        "  reconnect_interval:     {} ms",
        config.reconnect_interval.as_millis()
    );
    Ok(())
}

async fn join(
    environment_id: String,
    server: Option<String>,
    config_path: Option<PathBuf>,
    file: Option<String>,
) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    config.environment_id = environment_id;
    if let Some(server) = server {
        config.server_url = server;
    }
    if let Some(file) = file {
        config.initial_file = file;
    }
    tracing::debug!(?config, "resolved session config");

    let handle = EditorSession::spawn(config)?;
    println!(
        "Joined environment {} (type :help for commands)",
        handle.environment_id()
    );

    let printer = spawn_console_printer(&handle);
    let result = repl(&handle).await;
    printer.abort();
    handle.close().await;
    result
}

/// Mirror new console content to stdout as it arrives.
fn spawn_console_printer(handle: &SessionHandle) -> tokio::task::JoinHandle<()> {
    let state = handle.shared_state();
    tokio::spawn(async move {
        let mut seen = String::new();
        loop {
            {
                let st = state.lock().unwrap_or_else(|e| e.into_inner());
                let text = st.console.contents();
                if text != seen {
                    if let Some(appended) = text.strip_prefix(seen.as_str()) {
                        print!("{}", appended);
                        println!();
                    } else {
                        // Console was reset by a run banner; start over.
                        println!("{}", text);
                    }
                    seen = text.to_string();
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(150)).await;
        }
    })
}

async fn repl(handle: &SessionHandle) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim_end().to_string();
        let mut parts = line.splitn(3, ' ');
        let head = parts.next().unwrap_or("");

        match head {
            "" => {}
            ":help" => print_help(),
            ":quit" | ":q" => break,
            ":status" => {
                println!("link: {}", handle.status());
                let draft = handle.with_state(|s| s.input_draft.clone());
                if !draft.is_empty() {
                    println!("shared stdin draft: {}", draft);
                }
            }
            ":files" => {
                for name in handle.with_state(|s| s.files.file_names()) {
                    let marker = if name == handle.current_file() { "*" } else { " " };
                    println!("{} {}", marker, name);
                }
            }
            ":open" => match parts.next() {
                Some(name) => {
                    handle.set_current_file(name);
                    println!("opened {}", name);
                }
                None => println!("usage: :open <file>"),
            },
            ":new" => match parts.next() {
                Some(name) => {
                    if handle.add_file(name) {
                        println!("created {}", name);
                    } else {
                        println!("file {} already exists", name);
                    }
                }
                None => println!("usage: :new <file>"),
            },
            ":show" => {
                let file = handle.current_file();
                match handle.with_state(|s| s.files.get(&file).map(String::from)) {
                    Some(content) => println!("{}", content),
                    None => println!("{} has no local content yet", file),
                }
            }
            ":edit" => {
                println!("enter new content for {}; end with a single '.'", handle.current_file());
                let mut buffer: Vec<String> = Vec::new();
                while let Some(edit_line) = lines.next_line().await? {
                    if edit_line == "." {
                        break;
                    }
                    buffer.push(edit_line);
                }
                handle.apply_edit(&buffer.join("\n"));
                handle.move_cursor(CursorPos::new(buffer.len() as u32, 0));
            }
            ":run" => handle.run_code(),
            ":rename" => match (parts.next(), parts.next()) {
                (Some(old), Some(new)) => handle.rename_file(old, new),
                _ => println!("usage: :rename <old> <new>"),
            },
            ":delete" => match parts.next() {
                Some(name) => handle.delete_file(name),
                None => println!("usage: :delete <file>"),
            },
            ":dup" => match parts.next() {
                Some(name) => handle.duplicate_file(name),
                None => println!("usage: :dup <file>"),
            },
            ":cursors" => {
                let file = handle.current_file();
                handle.with_state(|s| {
                    for cursor in s.cursors.visible_in(&file) {
                        println!(
                            "{} {} at {}:{}",
                            cursor.color, cursor.session_id, cursor.pos.line, cursor.pos.ch
                        );
                    }
                });
            }
            ":draft" => {
                let draft = line.strip_prefix(":draft").unwrap_or("").trim_start();
                handle.broadcast_input_draft(draft);
            }
            _ if head.starts_with(':') => println!("unknown command {}; try :help", head),
            // Bare lines are stdin for the running program.
            _ => handle.send_input(&line),
        }
    }

    Ok(())
}

fn print_help() {
    println!(":files            list environment files (* = open)");
    println!(":open <file>      switch the open file");
    println!(":new <file>       create an empty file locally");
    println!(":show             print the open file");
    println!(":edit             replace the open file (end with '.')");
    println!(":run              run the environment's code");
    println!(":rename <o> <n>   ask the server to rename a file");
    println!(":delete <file>    ask the server to delete a file");
    println!(":dup <file>       ask the server to duplicate a file");
    println!(":cursors          show collaborator cursors in the open file");
    println!(":draft <text>     share an uncommitted stdin draft");
    println!(":status           show the link status");
    println!(":quit             leave the environment");
    println!("anything else is sent as stdin to the running program");
}
