//! Queue probe utility
//!
//! Drives a full optimistic session against a live server: create or resume
//! a queue, append and move items, let reconciliation drain, then print the
//! resulting snapshot. Optionally lingers to exercise position telemetry.
//!
//! **Usage:**
//! ```bash
//! queue-probe --server http://host:7801 --source album:/library/albums/42
//! queue-probe --server http://host:7801 --add /library/tracks/7 --exercise-move
//! ```

use anyhow::{bail, Context, Result};
use cadenza_common::config::ConfigStore;
use cadenza_common::model::{MediaRef, Placement, PlayerState, QueueSnapshot, QueueSource};
use cadenza_queue::engine::{QueueEngine, QueuePhase};
use cadenza_queue::remote::HttpQueueClient;
use cadenza_queue::store::QueueStore;
use cadenza_queue::telemetry::TelemetryReporter;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for queue-probe
#[derive(Parser, Debug)]
#[command(name = "queue-probe")]
#[command(about = "Exercises the play queue engine against a live server")]
#[command(version)]
struct Args {
    /// Server base URL
    #[arg(short, long, env = "CADENZA_SERVER")]
    server: String,

    /// Session token
    #[arg(short, long, env = "CADENZA_TOKEN")]
    token: Option<String>,

    /// Session file (defaults to the per-user config directory)
    #[arg(long, value_name = "FILE")]
    session_file: Option<PathBuf>,

    /// Create a fresh queue from this source instead of resuming,
    /// e.g. "album:/library/albums/42"
    #[arg(long, value_name = "SOURCE")]
    source: Option<String>,

    /// Shuffle the new queue
    #[arg(long)]
    shuffle: bool,

    /// Media path to append; may be given several times
    #[arg(long = "add", value_name = "MEDIA")]
    add: Vec<String>,

    /// Move the head item to the tail once the queue is up
    #[arg(long)]
    exercise_move: bool,

    /// Seconds of simulated playback to report before exiting
    #[arg(long, default_value = "0")]
    play_seconds: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "queue_probe=info,cadenza_queue=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let session_path = match args.session_file.clone() {
        Some(path) => path,
        None => ConfigStore::default_path().context("No usable config directory")?,
    };
    let config = Arc::new(ConfigStore::open(session_path));
    config
        .set_connection(args.server.clone(), args.token.clone())
        .await
        .context("Could not persist connection settings")?;
    let session = config.session().await;

    let remote = Arc::new(
        HttpQueueClient::new(&args.server, session.client_id, args.token.as_deref())
            .context("Could not build the queue client")?,
    );
    let store = Arc::new(QueueStore::new());
    let engine = QueueEngine::new(Arc::clone(&store), remote.clone(), Arc::clone(&config));

    // Log store events as they land so reconciliation is visible.
    let mut events = store.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            info!("event: {}", event.event_type());
        }
    });

    if let Some(text) = &args.source {
        let source = parse_source(text)?;
        let snapshot = engine.replace_queue(&source, args.shuffle).await?;
        print_snapshot("created", &snapshot);
    } else if engine.resume().await? {
        print_snapshot("resumed", &store.read().await);
    } else {
        bail!("no persisted queue to resume; pass --source to create one");
    }

    for media in &args.add {
        engine
            .add(vec![MediaRef::new(media)], Placement::End)
            .await?;
    }

    if args.exercise_move {
        let snapshot = store.read().await;
        if let Some(first) = snapshot.items.first() {
            info!("Moving item {} to the tail", first.id);
            engine.move_many_to_end(vec![first.id]).await?;
        }
    }

    // Let spawned reconciliations drain before reading the outcome.
    while engine.phase().await == QueuePhase::Mutating {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    engine.refresh().await?;
    print_snapshot("final", &store.read().await);

    if args.play_seconds > 0 {
        let (reporter, player) = TelemetryReporter::new(Arc::clone(&store), remote);
        let task = reporter.with_interval(Duration::from_secs(2)).start();

        player.state_changed(PlayerState::Playing, 0);
        for second in 1..=args.play_seconds {
            tokio::time::sleep(Duration::from_secs(1)).await;
            player.progress(second * 1_000);
        }
        player.state_changed(PlayerState::Paused, args.play_seconds * 1_000);

        // Give the final report a moment to leave.
        tokio::time::sleep(Duration::from_millis(250)).await;
        task.shutdown().await;
    }

    Ok(())
}

fn parse_source(text: &str) -> Result<QueueSource> {
    let Some((kind, path)) = text.split_once(':') else {
        bail!("source must look like kind:media-path, e.g. album:/library/albums/42");
    };
    let media = MediaRef::new(path);
    Ok(match kind {
        "album" => QueueSource::Album { media },
        "artist" => QueueSource::Artist { media },
        "playlist" => QueueSource::Playlist { media },
        "genre" => QueueSource::Genre { media },
        "track" => QueueSource::Tracks { media: vec![media] },
        other => bail!("unknown source kind {other:?}"),
    })
}

fn print_snapshot(label: &str, snapshot: &QueueSnapshot) {
    println!(
        "--- {label}: queue {} v{} ({} items)",
        snapshot.queue_id,
        snapshot.version,
        snapshot.len()
    );
    for item in &snapshot.items {
        let marker = if Some(item.id) == snapshot.selected_item_id {
            ">"
        } else {
            " "
        };
        let title = item.title.as_deref().unwrap_or(item.media.as_str());
        println!("{marker} {:>6}  {title}", item.id.0);
    }
}
