//! Session commands.

use super::{CmdResult, Context};
use chirp_sync_engine::{AuthGateway, FeedGateway, ProfileGateway};

/// Runs the login command.
pub async fn login<G>(ctx: &Context<G>, email: &str, password: &str) -> CmdResult
where
    G: FeedGateway + AuthGateway + ProfileGateway + 'static,
{
    let user = ctx.auth().login(email, password).await?;
    println!("Signed in as @{} <{}>", user.username, user.email);
    Ok(())
}

/// Runs the register command.
pub async fn register<G>(ctx: &Context<G>, username: &str, email: &str, password: &str) -> CmdResult
where
    G: FeedGateway + AuthGateway + ProfileGateway + 'static,
{
    let user = ctx.auth().register(username, email, password).await?;
    println!("Welcome, @{}! You are signed in.", user.username);
    Ok(())
}

/// Runs the logout command.
pub fn logout<G>(ctx: &Context<G>) -> CmdResult
where
    G: FeedGateway + AuthGateway + ProfileGateway + 'static,
{
    ctx.auth().logout()?;
    println!("Signed out");
    Ok(())
}

/// Runs the whoami command.
pub fn whoami<G>(ctx: &Context<G>) -> CmdResult
where
    G: FeedGateway + AuthGateway + ProfileGateway + 'static,
{
    match ctx.session.current_user() {
        Some(user) => {
            println!("@{} <{}>", user.username, user.email);
            println!("  id:     {}", user.id);
            println!("  joined: {}", user.created_at.format("%Y-%m-%d"));
        }
        None => println!("Not signed in"),
    }
    Ok(())
}
