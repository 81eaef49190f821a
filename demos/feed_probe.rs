// Opens one feed and prints every screened frame, no supervisor, no reconnect.
// Run with: cargo run --example feed_probe -- secondary

use futures::StreamExt;
use quake_relay::config::FeedSettings;
use quake_relay::feeds::connection::{screen, Screened};
use quake_relay::{Connector, FeedIdentity, TungsteniteConnector};
use tokio_tungstenite::tungstenite::Message;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    quake_relay::telemetry::init_tracing("info");

    let feed = match std::env::args().nth(1).as_deref() {
        Some("secondary") | Some("p2p") => FeedIdentity::SecondaryQuake,
        _ => FeedIdentity::PrimaryEew,
    };
    let settings = FeedSettings::default();
    let endpoint = settings.endpoint(feed);
    println!("Connecting to {} feed at {}", feed, endpoint);

    let (_sink, mut stream) = TungsteniteConnector.connect(endpoint).await?;
    println!("Connected, waiting for frames (Ctrl+C to stop)");

    while let Some(frame) = stream.next().await {
        match frame? {
            Message::Text(text) => match screen(feed, &text) {
                Ok(Screened::Forward(payload)) => println!("forward: {}", payload),
                Ok(Screened::Reply(reply)) => println!("liveness probe (would reply {:?})", reply),
                Ok(Screened::Discard(why)) => println!("discard ({}): {}", why, text),
                Err(e) => println!("undecodable: {}", e),
            },
            Message::Close(frame) => println!("closed by server: {:?}", frame),
            other => println!("non-text frame: {:?}", other),
        }
    }
    Ok(())
}
