use std::io::{self, BufRead, Write};

use anyhow::{bail, Context, Result};
use tracing::{debug, warn};

use guildpass_core::{ApiError, Config, GuardState, SessionService};

/// Environment variables consulted by `login`
const USERNAME_ENV: &str = "GUILDPASS_USERNAME";
const PASSWORD_ENV: &str = "GUILDPASS_PASSWORD";

/// Maximum length for username input
const MAX_USERNAME_LENGTH: usize = 150;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { username: Option<String>, remember: bool },
    Logout,
    Status,
    Whoami,
    Get { path: String },
    Shell,
    Help,
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        let Some((name, rest)) = args.split_first() else {
            return Ok(Command::Status);
        };

        match name.as_str() {
            "login" => {
                let mut username = None;
                let mut remember = false;
                for arg in rest {
                    match arg.as_str() {
                        "--remember" | "-r" => remember = true,
                        flag if flag.starts_with('-') => bail!("Unknown flag for login: {}", flag),
                        value if username.is_none() => username = Some(value.to_string()),
                        extra => bail!("Unexpected argument: {}", extra),
                    }
                }
                Ok(Command::Login { username, remember })
            }
            "logout" => Ok(Command::Logout),
            "status" => Ok(Command::Status),
            "whoami" => Ok(Command::Whoami),
            "get" => match rest {
                [path] => Ok(Command::Get { path: path.clone() }),
                _ => bail!("Usage: get <path>"),
            },
            "shell" => Ok(Command::Shell),
            "help" | "--help" | "-h" => Ok(Command::Help),
            other => bail!("Unknown command: {}", other),
        }
    }
}

pub fn print_usage() {
    eprintln!("Usage: guildpass <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  login [--remember] [username]   Sign in (remembered sessions survive restarts)");
    eprintln!("  logout                          Sign out and forget stored tokens");
    eprintln!("  status                          Check whether a session is active");
    eprintln!("  whoami                          Fetch and show your profile");
    eprintln!("  get <path>                      GET an API path and print the JSON");
    eprintln!("  shell                           Run commands interactively in one session");
    eprintln!("  help                            Show this message");
}

/// Run one command, returning the process exit code
pub async fn run(service: &SessionService, command: Command, in_shell: bool) -> i32 {
    match execute(service, command, in_shell).await {
        Ok(()) => 0,
        Err(e) => {
            let message = match e.downcast_ref::<ApiError>() {
                Some(api_error) => api_error.user_message(),
                None => format!("Error: {:#}", e),
            };
            eprintln!("{}", message);
            1
        }
    }
}

async fn execute(service: &SessionService, command: Command, in_shell: bool) -> Result<()> {
    match command {
        Command::Login { username, remember } => login(service, username, remember, in_shell).await,
        Command::Logout => {
            service.logout().context("Failed to clear stored session")?;
            println!("Logged out.");
            Ok(())
        }
        Command::Status => status(service).await,
        Command::Whoami => {
            let profile = service.fetch_profile().await?;
            println!("{}", profile.display_line());
            Ok(())
        }
        Command::Get { path } => {
            let value: serde_json::Value = service.client().get_json(&path).await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Command::Shell => bail!("Already in a shell"),
        Command::Help => {
            print_usage();
            Ok(())
        }
    }
}

async fn login(service: &SessionService, username: Option<String>, remember: bool, in_shell: bool) -> Result<()> {
    let username = match username
        .or_else(|| std::env::var(USERNAME_ENV).ok())
        .or_else(|| service.config().last_username.clone())
    {
        Some(name) => name,
        None => prompt_line("Username: ")?,
    };
    if username.is_empty() || username.len() > MAX_USERNAME_LENGTH {
        bail!("Username must be between 1 and {} characters", MAX_USERNAME_LENGTH);
    }

    let password = match std::env::var(PASSWORD_ENV) {
        Ok(password) => password,
        Err(_) => rpassword::prompt_password(format!("Password for {}: ", username))
            .context("Failed to read password")?,
    };

    service.login(&username, &password, remember).await?;
    remember_username(service.config(), &username);

    println!("Logged in as {}.", username);
    if !remember && !in_shell {
        println!("Session not remembered; it ends when this command exits. Use --remember or `guildpass shell`.");
    }
    Ok(())
}

async fn status(service: &SessionService) -> Result<()> {
    match service.guard().resolve().await? {
        GuardState::Authenticated => {
            let remembered = if service.remember_me()? { "remembered" } else { "this session only" };
            match service.cached_profile()? {
                Some(profile) => println!("Logged in as {} ({}).", profile.display_line(), remembered),
                None => println!("Logged in ({}).", remembered),
            }
        }
        GuardState::Unauthenticated { redirect } => {
            let status = service.signals().status();
            if let Some(message) = status.message {
                println!("{}", message);
            }
            println!("Not logged in. Run `guildpass login` (redirect: {}).", redirect);
        }
        GuardState::Unreachable { message } => println!("{}", message),
        GuardState::Loading => println!("Checking session..."),
    }
    Ok(())
}

fn remember_username(config: &Config, username: &str) {
    if config.last_username.as_deref() == Some(username) {
        return;
    }
    let mut updated = config.clone();
    updated.last_username = Some(username.to_string());
    if let Err(e) = updated.save() {
        warn!(error = %e, "Failed to save last username");
    }
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).context("Failed to read input")?;
    Ok(line.trim().to_string())
}

/// Interactive loop; the session tier lives as long as this loop does.
pub async fn run_shell(service: &SessionService) -> i32 {
    println!("guildpass shell - type `help` for commands, `exit` to quit.");
    let stdin = io::stdin();
    loop {
        print!("guildpass> ");
        if io::stdout().flush().is_err() {
            return 1;
        }

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => return 0,
            Ok(_) => {}
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        }

        let args: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        if args.is_empty() {
            continue;
        }
        if matches!(args[0].as_str(), "exit" | "quit") {
            return 0;
        }

        match Command::parse(&args) {
            Ok(Command::Shell) => println!("Already in a shell."),
            Ok(command) => {
                debug!(?command, "Shell command");
                run(service, command, true).await;
            }
            Err(e) => eprintln!("{}", e),
        }
    }
}
