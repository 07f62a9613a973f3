//! Chirp CLI
//!
//! Command-line client for the Chirp micro-blogging service.
//!
//! # Commands
//!
//! - `login`, `register`, `logout`, `whoami` - Session management
//! - `feed` - Print the current feed
//! - `watch` - Follow the feed until Ctrl-C
//! - `post`, `delete` - Publish or remove a post
//! - `profile`, `update-profile`, `my-posts` - Account data
//! - `demo` - Two users talking to an in-process server

mod commands;

use chirp_server::ChirpServer;
use chirp_store::FileStore;
use chirp_sync_engine::{
    AuthGateway, Endpoints, FeedGateway, HttpGateway, ProfileGateway, ReqwestClient,
    SessionGuard, SyncConfig,
};
use clap::{Parser, Subcommand};
use commands::{CmdResult, Context};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Chirp command-line client.
#[derive(Parser)]
#[command(name = "chirp")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// API root URL
    #[arg(
        global = true,
        long,
        env = "CHIRP_API_URL",
        default_value = "http://localhost:3000/api"
    )]
    api_url: String,

    /// Path to the session file
    #[arg(
        global = true,
        short,
        long,
        env = "CHIRP_SESSION",
        default_value = "chirp-session.json"
    )]
    session: PathBuf,

    /// Request timeout in seconds
    #[arg(global = true, long, default_value = "30")]
    timeout: u64,

    /// Serve requests from an in-process reference server
    #[arg(global = true, long)]
    loopback: bool,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in
    Login {
        /// Account email
        email: String,

        /// Account password
        #[arg(long, env = "CHIRP_PASSWORD")]
        password: String,
    },

    /// Create an account and sign in
    Register {
        /// Display name
        username: String,

        /// Account email
        email: String,

        /// Account password
        #[arg(long, env = "CHIRP_PASSWORD")]
        password: String,
    },

    /// Sign out
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Print the current feed
    Feed {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Follow the feed until interrupted
    Watch {
        /// Seconds between change checks
        #[arg(short, long, default_value = "5", value_parser = clap::value_parser!(u64).range(1..))]
        interval: u64,
    },

    /// Publish a post
    Post {
        /// Post text
        content: String,
    },

    /// Delete one of your posts
    Delete {
        /// Post ID
        id: String,
    },

    /// Show your profile
    Profile,

    /// Change username and email
    UpdateProfile {
        /// New username
        username: String,

        /// New email
        email: String,
    },

    /// List your own posts
    MyPosts {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run a scripted session against an in-process server
    Demo,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> CmdResult {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Demo => return commands::demo::run().await,
        Commands::Version => {
            println!("Chirp CLI v{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    let store = Arc::new(FileStore::open(&cli.session)?);
    let session = Arc::new(SessionGuard::new(store));
    let timeout = Duration::from_secs(cli.timeout);

    if cli.loopback {
        let gateway = HttpGateway::loopback(Arc::new(ChirpServer::default()));
        dispatch(Context::new(session, Arc::new(gateway)), cli.command).await
    } else {
        let endpoints = Endpoints::from_base(&cli.api_url).with_timeout(timeout);
        let client = ReqwestClient::new(endpoints.timeout)?;
        let gateway = HttpGateway::new(endpoints, client);
        dispatch(Context::new(session, Arc::new(gateway)), cli.command).await
    }
}

async fn dispatch<G>(ctx: Context<G>, command: Commands) -> CmdResult
where
    G: FeedGateway + AuthGateway + ProfileGateway + 'static,
{
    match command {
        Commands::Login { email, password } => commands::auth::login(&ctx, &email, &password).await,
        Commands::Register {
            username,
            email,
            password,
        } => commands::auth::register(&ctx, &username, &email, &password).await,
        Commands::Logout => commands::auth::logout(&ctx),
        Commands::Whoami => commands::auth::whoami(&ctx),
        Commands::Feed { format } => commands::feed::show(&ctx, &format).await,
        Commands::Watch { interval } => {
            let config = SyncConfig::default().with_poll_interval(Duration::from_secs(interval));
            commands::feed::watch(&ctx.with_sync_config(config)).await
        }
        Commands::Post { content } => commands::feed::post(&ctx, &content).await,
        Commands::Delete { id } => commands::feed::delete(&ctx, &id).await,
        Commands::Profile => commands::profile::show(&ctx).await,
        Commands::UpdateProfile { username, email } => {
            commands::profile::update(&ctx, &username, &email).await
        }
        Commands::MyPosts { format } => commands::profile::my_posts(&ctx, &format).await,
        Commands::Demo | Commands::Version => Ok(()),
    }
}
