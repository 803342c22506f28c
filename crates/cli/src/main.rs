use chatter::config::{self, Config};
use chatter::{ChatClient, Composer};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "chatter")]
#[command(about = "Chatter CLI", long_about = None)]
struct Cli {
    /// Config file path (default: CHATTER_CONFIG_PATH or ~/.chatter/config.json)
    #[arg(long, short, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config file.
    Init,

    /// Log in to the chat backend and store the access token.
    Login {
        #[arg(long, short)]
        username: String,
        /// Password (prompted on stdin when omitted)
        #[arg(long, env = "CHATTER_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Create an account (does not log in).
    Register {
        #[arg(long, short)]
        username: String,
        /// Password (prompted on stdin when omitted)
        #[arg(long, env = "CHATTER_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Forget the stored access token.
    Logout,

    /// List conversations.
    Chats,

    /// Create a conversation.
    New {
        title: String,
    },

    /// Rename a conversation.
    Rename {
        id: String,
        title: String,
    },

    /// Delete a conversation (asks for confirmation).
    Delete {
        id: String,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },

    /// Print a conversation's messages.
    Show {
        id: String,
    },

    /// Chat in a conversation (interactive). `/exit` or `/quit` leaves.
    Chat {
        id: String,

        /// Completion model (default from config)
        #[arg(long, short)]
        model: Option<String>,
    },

    /// List the suggested completion models.
    Models,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("Run with --help for usage");
        return;
    };
    if let Err(e) = run(command, cli.config).await {
        log::error!("{:#}", e);
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run(command: Commands, config_path: Option<PathBuf>) -> anyhow::Result<()> {
    match command {
        Commands::Version => {
            println!("chatter {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Init => run_init(config_path),
        Commands::Models => {
            for m in chatter::llm::MODELS {
                println!("{:<40} {}", m.name, m.task);
            }
            Ok(())
        }
        command => {
            let (config, path) = config::load_config(config_path)?;
            let client = ChatClient::from_config(&config, &path)?;
            run_with_client(command, &client, &config).await
        }
    }
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(config::default_config_path);
    let dir = chatter::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_with_client(
    command: Commands,
    client: &ChatClient,
    config: &Config,
) -> anyhow::Result<()> {
    match command {
        Commands::Login { username, password } => {
            let password = password_or_prompt(password)?;
            client.login(&username, &password).await?;
            println!("logged in as {}", username);
        }
        Commands::Register { username, password } => {
            let password = password_or_prompt(password)?;
            client.register(&username, &password).await?;
            println!("registered {}; run `chatter login` to sign in", username);
        }
        Commands::Logout => {
            client.logout().await?;
            println!("logged out");
        }
        Commands::Chats => {
            client.fetch_history().await?;
            let now = chrono::Utc::now();
            client
                .read(|s| {
                    if s.chat.history().is_empty() {
                        println!("no conversations yet; create one with `chatter new <title>`");
                    }
                    for c in s.chat.history() {
                        println!("{}  {}  ({})", c.id, c.title, c.activity_label(now));
                    }
                })
                .await;
        }
        Commands::New { title } => {
            let chat = client.add_conversation(&title).await?;
            println!("created {}  {}", chat.id, chat.title);
        }
        Commands::Rename { id, title } => {
            client.fetch_history().await?;
            let chat = client.update_conversation(&id, &title).await?;
            println!("renamed {} to {}", chat.id, chat.title);
        }
        Commands::Delete { id, yes } => {
            if !yes {
                client.fetch_history().await?;
                let title = client
                    .read(|s| s.chat.get(&id).map(|c| c.title.clone()))
                    .await
                    .ok_or_else(|| anyhow::anyhow!("unknown conversation: {}", id))?;
                let question = format!("Are you sure you want to delete \"{}\"?", title);
                if !confirm(&question)? {
                    println!("not deleted");
                    return Ok(());
                }
            }
            client.delete_conversation(&id).await?;
            println!("deleted {}", id);
        }
        Commands::Show { id } => {
            open_conversation(client, &id).await?;
            print_thread(client).await;
        }
        Commands::Chat { id, model } => {
            let model = model.unwrap_or_else(|| config.completion.default_model.clone());
            open_conversation(client, &id).await?;
            print_thread(client).await;
            chat_loop(client, &model).await?;
        }
        Commands::Version | Commands::Init | Commands::Models => unreachable!("handled in run"),
    }
    Ok(())
}

async fn open_conversation(client: &ChatClient, id: &str) -> anyhow::Result<()> {
    client.fetch_history().await?;
    client.select_conversation(Some(id)).await?;
    Ok(())
}

async fn print_thread(client: &ChatClient) {
    let now = chrono::Utc::now();
    client
        .read(|s| {
            let Some(chat) = s.chat.selected_chat() else {
                return;
            };
            println!("# {}", chat.title);
            for m in &chat.messages {
                let age = chatter::model::relative_age(m.created_at, now);
                println!("[{} | {} ago] {}", m.sender_type.as_role(), age, m.content);
            }
        })
        .await;
}

async fn chat_loop(client: &ChatClient, model: &str) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut composer = Composer::default();

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit") {
            break;
        }
        // An empty line resends a message kept after a failed turn.
        if !input.is_empty() {
            composer.set(input);
        } else if composer.is_blank() {
            continue;
        }

        match client.send_turn(&mut composer, model).await {
            Ok(turn) => println!("< {}", turn.reply.trim()),
            Err(e) => {
                eprintln!("chat error: {}", e);
                if !composer.is_blank() {
                    eprintln!("(message kept; press enter to retry)");
                }
            }
        }
    }

    Ok(())
}

fn confirm(question: &str) -> anyhow::Result<bool> {
    let mut stdout = io::stdout();
    write!(stdout, "{} [y/N] ", question)?;
    stdout.flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(is_yes(&line))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn password_or_prompt(password: Option<String>) -> anyhow::Result<String> {
    if let Some(p) = password {
        return Ok(p);
    }
    let mut stdout = io::stdout();
    write!(stdout, "password: ")?;
    stdout.flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
