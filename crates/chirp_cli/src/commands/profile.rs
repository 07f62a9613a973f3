//! Profile commands.

use super::{print_posts, CmdResult, Context};
use chirp_sync_engine::{AuthGateway, FeedGateway, ProfileGateway};

/// Runs the profile command.
pub async fn show<G>(ctx: &Context<G>) -> CmdResult
where
    G: FeedGateway + AuthGateway + ProfileGateway + 'static,
{
    let user = ctx.profile().load_profile().await?;
    println!("Profile");
    println!("=======");
    println!("Username: {}", user.username);
    println!("Email:    {}", user.email);
    println!("Joined:   {}", user.created_at.format("%Y-%m-%d %H:%M"));
    Ok(())
}

/// Runs the update-profile command.
pub async fn update<G>(ctx: &Context<G>, username: &str, email: &str) -> CmdResult
where
    G: FeedGateway + AuthGateway + ProfileGateway + 'static,
{
    let user = ctx.profile().update_profile(username, email).await?;
    println!("Profile updated: @{} <{}>", user.username, user.email);
    Ok(())
}

/// Runs the my-posts command.
pub async fn my_posts<G>(ctx: &Context<G>, format: &str) -> CmdResult
where
    G: FeedGateway + AuthGateway + ProfileGateway + 'static,
{
    let posts = ctx.profile().load_my_posts().await?;
    print_posts(&posts, format)
}
