//! querydeck - ask an analytics backend questions in plain language, chart
//! the answers, and keep the session as a dashboard
//!
//! This tool provides commands for:
//! - Logging in and out of the backend
//! - Asking one-off questions and printing the result
//! - Listing, showing and deleting saved dashboards
//! - An interactive studio session with charts and saving
//!
//! Uses XDG Base Directory specification for file locations:
//! - Config: $XDG_CONFIG_HOME/querydeck/config.toml (~/.config/querydeck/config.toml)
//! - Token: $XDG_DATA_HOME/querydeck/token.json (~/.local/share/querydeck/token.json)
//! - Logs: $XDG_STATE_HOME/querydeck/ (~/.local/state/querydeck/)

mod output;
mod studio;

use std::future::Future;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use querydeck_core::{ApiClient, Config, DashboardId, Error, Session, StoredToken, TokenStore};

#[derive(Parser)]
#[command(name = "querydeck")]
#[command(about = "Ask your database questions, chart the answers, save dashboards")]
#[command(version)]
struct Args {
    /// Write a debug log to the XDG state directory
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of the XDG default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and store the access token
    Login {
        username: String,

        /// Password (prompted on stdin when omitted)
        #[arg(long, env = "QUERYDECK_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Forget the stored access token
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Show configuration and login state
    Status,

    /// Ask one question and print the answer
    Ask {
        /// The question, in plain language
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,

        /// Database the question is about
        #[arg(long)]
        db: Option<i64>,

        /// Print the generated SQL without running it
        #[arg(long)]
        no_execute: bool,
    },

    /// Manage saved dashboards
    Dashboards {
        #[command(subcommand)]
        command: DashboardCommand,
    },

    /// Interactive session: ask, chart, save
    Studio {
        /// Open a saved dashboard
        #[arg(long)]
        dashboard: Option<DashboardId>,

        /// Database for a new session
        #[arg(long)]
        db: Option<i64>,
    },
}

#[derive(Subcommand)]
enum DashboardCommand {
    /// List dashboards
    List {
        /// List every dashboard visible to you, not just your client's
        #[arg(short, long)]
        all: bool,
    },

    /// Print a dashboard's chat history and charts
    Show { id: DashboardId },

    /// Delete a dashboard
    Delete { id: DashboardId },
}

/// Everything a command needs: configuration, the token store and a runtime
/// to drive the async client on
pub(crate) struct App {
    config: Config,
    config_path: PathBuf,
    tokens: TokenStore,
    runtime: tokio::runtime::Runtime,
}

impl App {
    fn new(config_override: Option<&Path>) -> Result<Self> {
        let (config, config_path) = load_config(config_override)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to create runtime")?;

        Ok(Self {
            config,
            config_path,
            tokens: TokenStore::default_location(),
            runtime,
        })
    }

    pub(crate) fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    fn client(&self, token: Option<&StoredToken>) -> Result<ApiClient> {
        ApiClient::new(&self.config.api, token.map(|t| t.access_token.as_str()))
            .context("failed to create API client")
    }

    /// Stored token plus a client that sends it
    fn authenticated(&self) -> Result<(StoredToken, ApiClient)> {
        let token = self
            .tokens
            .load()
            .context("failed to read stored token")?
            .ok_or(Error::NotAuthenticated)?;
        let client = self.client(Some(&token))?;
        Ok((token, client))
    }
}

fn load_config(path: Option<&Path>) -> Result<(Config, PathBuf)> {
    match path {
        Some(path) => {
            let mut config = Config::load_from(path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))?;
            config.apply_env();
            Ok((config, path.to_path_buf()))
        }
        None => Ok((
            Config::load().context("failed to load configuration")?,
            Config::config_path(),
        )),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            if let Some(hint) = core_error(&err).and_then(hint_for) {
                eprintln!();
                eprintln!("{}", hint);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let app = App::new(args.config.as_deref())?;

    // Keep the guard alive until the command finishes so the log is flushed
    let _log_guard = if args.verbose {
        let guard = querydeck_core::logging::init(&app.config.logging)
            .context("failed to initialize logging")?;
        eprintln!("Logging to {}", guard.log_dir().display());
        Some(guard)
    } else {
        None
    };

    let result = match args.command {
        Command::Login { username, password } => cmd_login(&app, &username, password),
        Command::Logout => cmd_logout(&app),
        Command::Whoami => cmd_whoami(&app),
        Command::Status => cmd_status(&app),
        Command::Ask {
            question,
            db,
            no_execute,
        } => cmd_ask(&app, &question.join(" "), db, no_execute),
        Command::Dashboards { command } => match command {
            DashboardCommand::List { all } => cmd_dashboards_list(&app, all),
            DashboardCommand::Show { id } => cmd_dashboards_show(&app, id),
            DashboardCommand::Delete { id } => cmd_dashboards_delete(&app, id),
        },
        Command::Studio { dashboard, db } => studio::run(&app, dashboard, db),
    };

    // A rejected token is useless from here on
    if let Err(err) = &result {
        if matches!(core_error(err), Some(Error::Unauthorized)) {
            app.tokens.clear().ok();
        }
    }
    result
}

fn core_error(err: &anyhow::Error) -> Option<&Error> {
    err.chain().find_map(|e| e.downcast_ref::<Error>())
}

/// What the user can do about an error, if anything
pub(crate) fn hint_for(err: &Error) -> Option<&'static str> {
    match err {
        Error::Unauthorized | Error::NotAuthenticated => {
            Some("Run `querydeck login <username>` to sign in.")
        }
        Error::ServiceUnavailable(_) => Some(
            "No database is connected. Connect one in the backend or open a dashboard tied to a database.",
        ),
        Error::NoDatabase => Some("Start the session with --db <id> to re-run queries."),
        _ => None,
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn cmd_login(app: &App, username: &str, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => prompt("Password: ")?,
    };

    let client = app.client(None)?;
    let response = match app.block_on(client.login(username, &password)) {
        Ok(response) => response,
        Err(Error::Unauthorized) => anyhow::bail!("incorrect username or password"),
        Err(e) => return Err(e).context("login failed"),
    };

    let name = response
        .user
        .as_ref()
        .map(|u| u.username.as_str())
        .unwrap_or(username);
    let client_id = response
        .client
        .as_ref()
        .map(|c| c.id)
        .or_else(|| response.user.as_ref().and_then(|u| u.client_id));

    let token = app
        .tokens
        .save(&response.access_token, Some(name), client_id)
        .context("failed to store access token")?;

    println!("Logged in as {}", name);
    if let Some(account) = &response.client {
        println!(
            "Client:     {} (#{})",
            account.client_name.as_deref().unwrap_or("-"),
            account.id
        );
    }
    println!("Expires:    {}", token.expires_at.format("%Y-%m-%d %H:%M:%S UTC"));
    Ok(())
}

fn cmd_logout(app: &App) -> Result<()> {
    if app.tokens.clear().context("failed to remove stored token")? {
        println!("Logged out.");
    } else {
        println!("Not logged in.");
    }
    Ok(())
}

fn cmd_whoami(app: &App) -> Result<()> {
    let (_, client) = app.authenticated()?;
    let identity = app
        .block_on(client.me())
        .context("failed to fetch current user")?;

    let user = &identity.user;
    println!("Backend:    {}", client.base_url());
    println!("Username:   {}", user.username);
    if let Some(full_name) = &user.full_name {
        println!("Name:       {}", full_name);
    }
    println!(
        "Role:       {} ({})",
        user.role.as_deref().unwrap_or("unknown"),
        if user.is_owner() { "owner" } else { "viewer" }
    );
    if let Some(account) = &identity.client {
        println!(
            "Client:     {} (#{})",
            account.client_name.as_deref().unwrap_or("-"),
            account.id
        );
        if let Some(email) = &account.email {
            println!("Email:      {}", email);
        }
    }
    Ok(())
}

fn cmd_status(app: &App) -> Result<()> {
    println!("querydeck Configuration");
    println!("=======================");
    println!();

    println!(
        "Config file:  {}{}",
        app.config_path.display(),
        if app.config_path.exists() {
            ""
        } else {
            " (not found, using defaults)"
        }
    );
    println!("Backend URL:  {}", app.config.api.base_url);
    println!("Timeout:      {}s", app.config.api.timeout_secs);
    println!("Token file:   {}", app.tokens.path().display());
    println!("Log file:     {}", querydeck_core::logging::log_file_path().display());

    println!();
    if let Err(e) = app.config.api.validate() {
        println!("Status: Misconfigured ({})", e);
        return Ok(());
    }

    match app.tokens.load().context("failed to read stored token")? {
        Some(token) => println!(
            "Status: Logged in as {} (expires {})",
            token.username.as_deref().unwrap_or("<unknown>"),
            token.expires_at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        None => println!("Status: Not logged in (run 'login')"),
    }
    Ok(())
}

fn cmd_ask(app: &App, question: &str, db: Option<i64>, no_execute: bool) -> Result<()> {
    let (token, client) = app.authenticated()?;
    let mut session = Session::new(db, token.client_id);

    let turn = app
        .block_on(session.ask(&client, question))
        .context("query failed")?;
    print!("{}", output::format_turn(None, turn));

    if no_execute {
        return Ok(());
    }

    let result = app
        .block_on(session.execute_active(&client))
        .context("execution failed")?
        .cloned();
    if let Some(result) = result {
        println!();
        print!("{}", output::format_result(&result));
    }
    Ok(())
}

fn cmd_dashboards_list(app: &App, all: bool) -> Result<()> {
    let (token, client) = app.authenticated()?;

    let dashboards = match token.client_id {
        Some(client_id) if !all => app.block_on(client.list_client_dashboards(client_id)),
        _ => app.block_on(client.list_dashboards()),
    }
    .context("failed to list dashboards")?;

    if dashboards.is_empty() {
        println!("No dashboards found.");
        return Ok(());
    }

    print!("{}", output::dashboard_list_header());
    for dashboard in &dashboards {
        print!("{}", output::format_dashboard_row(dashboard));
    }
    Ok(())
}

fn cmd_dashboards_show(app: &App, id: DashboardId) -> Result<()> {
    let (_, client) = app.authenticated()?;

    let dashboard = app
        .block_on(client.get_dashboard(id))
        .context("failed to load dashboard")?;
    let session = Session::from_dashboard(dashboard);

    print!("{}", output::format_session(&session));
    Ok(())
}

fn cmd_dashboards_delete(app: &App, id: DashboardId) -> Result<()> {
    let (_, client) = app.authenticated()?;

    app.block_on(client.delete_dashboard(id))
        .context("failed to delete dashboard")?;

    println!("Deleted dashboard #{}", id);
    Ok(())
}
