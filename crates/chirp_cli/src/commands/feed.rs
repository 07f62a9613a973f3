//! Feed commands.

use super::{print_post, print_posts, CmdResult, Context};
use chirp_protocol::PostId;
use chirp_sync_engine::{AuthGateway, FeedEvent, FeedGateway, ProfileGateway};
use std::collections::HashSet;
use tokio::sync::broadcast::error::RecvError;

/// Runs the feed command.
pub async fn show<G>(ctx: &Context<G>, format: &str) -> CmdResult
where
    G: FeedGateway + AuthGateway + ProfileGateway + 'static,
{
    let sync = ctx.synchronizer();
    sync.start().await?;
    sync.stop();
    print_posts(sync.current_snapshot().posts(), format)
}

/// Runs the watch command.
///
/// Prints the feed, then every post that shows up afterwards, until
/// Ctrl-C or until the session is rejected.
pub async fn watch<G>(ctx: &Context<G>) -> CmdResult
where
    G: FeedGateway + AuthGateway + ProfileGateway + 'static,
{
    let sync = ctx.synchronizer();
    let mut events = sync.subscribe();
    sync.start().await?;

    let snapshot = sync.current_snapshot();
    print_posts(snapshot.posts(), "text")?;
    let mut seen: HashSet<PostId> = snapshot.posts().iter().map(|p| p.id.clone()).collect();
    println!(
        "-- watching every {:?}, Ctrl-C to stop --",
        sync.config().poll_interval
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            event = events.recv() => match event {
                Ok(FeedEvent::Refreshed { .. }) => {
                    let snapshot = sync.current_snapshot();
                    // Oldest first so the terminal reads top to bottom.
                    for post in snapshot.posts().iter().rev() {
                        if seen.insert(post.id.clone()) {
                            print_post(post);
                        }
                    }
                    seen.retain(|id| snapshot.contains(id));
                }
                Ok(FeedEvent::Error(err)) => eprintln!("warning: {err}"),
                Ok(FeedEvent::Unauthenticated) => {
                    eprintln!("Session expired, sign in again");
                    break;
                }
                Ok(FeedEvent::Published(_) | FeedEvent::Deleted(_)) => {}
                Err(RecvError::Lagged(missed)) => {
                    tracing::debug!(missed, "watch fell behind");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    sync.stop();
    Ok(())
}

/// Runs the post command.
pub async fn post<G>(ctx: &Context<G>, content: &str) -> CmdResult
where
    G: FeedGateway + AuthGateway + ProfileGateway + 'static,
{
    let post = ctx.synchronizer().publish(content).await?;
    println!("Posted {}", post.id);
    Ok(())
}

/// Runs the delete command.
pub async fn delete<G>(ctx: &Context<G>, id: &str) -> CmdResult
where
    G: FeedGateway + AuthGateway + ProfileGateway + 'static,
{
    let sync = ctx.synchronizer();
    sync.start().await?;
    let id = PostId::new(id);
    let deleted = sync.delete(&id).await;
    sync.stop();

    if deleted? {
        println!("Deleted {id}");
    } else {
        println!("Post {id} is not in the feed");
    }
    Ok(())
}
