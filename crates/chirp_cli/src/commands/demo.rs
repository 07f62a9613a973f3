//! Demo command implementation.
//!
//! Two users share one in-process reference server. Nothing touches the
//! network or the session file.

use super::{print_posts, CmdResult, Context};
use chirp_server::ChirpServer;
use chirp_store::InMemoryStore;
use chirp_sync_engine::{HttpGateway, LoopbackClient, SessionGuard};
use std::sync::Arc;

/// Runs the demo command.
pub async fn run() -> CmdResult {
    let server = Arc::new(ChirpServer::default());
    let ana = client(&server);
    let bob = client(&server);

    ana.auth().register("ana", "ana@example.com", "demo").await?;
    bob.auth().register("bob", "bob@example.com", "demo").await?;
    println!("Registered @ana and @bob");

    let feed = ana.synchronizer();
    feed.start().await?;
    feed.publish("Hello from ana").await?;
    bob.synchronizer().publish("Hi ana, bob here").await?;

    let outcome = feed.poll_once().await?;
    println!("ana polled: {outcome:?}");
    print_posts(feed.current_snapshot().posts(), "text")?;

    let outcome = feed.poll_once().await?;
    println!("ana polled again: {outcome:?}");

    let stats = feed.stats();
    feed.stop();
    println!(
        "{} refreshes, {} polls, {} users and {} posts on the server",
        stats.refreshes,
        stats.polls,
        server.user_count(),
        server.post_count()
    );
    Ok(())
}

type DemoGateway = HttpGateway<LoopbackClient<Arc<ChirpServer>>>;

fn client(server: &Arc<ChirpServer>) -> Context<DemoGateway> {
    let session = Arc::new(SessionGuard::new(Arc::new(InMemoryStore::new())));
    Context::new(session, Arc::new(HttpGateway::loopback(Arc::clone(server))))
}
