mod actors;
mod catalog;
mod cli;
mod config;
mod feed;
mod logging;
mod media;
mod playback;
mod position;
mod preload;
mod result;
mod timer;
mod types;
mod utils;

use std::{thread, time::Duration};

use actors::{connect_actors, Actor, FeedActor, FeedEvent, UiActor, UserIntent};
use clap::Parser;
use crossbeam_channel::{unbounded, Receiver, Sender};
use media::{MediaContext, SimulatedBackend};
use miette::{Context, IntoDiagnostic};
use tracing::{debug, info};

use crate::{
    catalog::ClipCatalog,
    cli::Args,
    config::Settings,
    feed::Feed,
    result::{bail, Result},
};

/// Number of scroll samples sent for one swipe
const SWIPE_TICKS: u32 = 4;

fn main() -> miette::Result<()> {
    // Initialize the environment & CLI
    let args = Args::parse();
    logging::init_logging(args.log_level.into())?;

    let settings = Settings::load(args.config.as_deref())?;
    let mut catalog = ClipCatalog::read_from_path(&args.catalog)
        .map_err(|err| err.wrap_err_with(|| "Could not load the clip catalog"))?;
    info!("{} clips in the catalog", catalog.len());

    if args.shuffle {
        debug!("Shuffling the catalog");
        catalog.shuffle();
    }

    let backend = load_backend(&args)?;
    let swipes = args
        .swipes
        .unwrap_or(catalog.len().saturating_sub(1));
    let viewport_height = settings.feed.viewport_height;

    let rendered = thread::scope(|scope| -> Result<usize> {
        let (input, output) = load_actors(scope, catalog, &settings, backend)?;

        drive(&input, &args, swipes, viewport_height)?;

        // The feed stops on shutdown, closing the UI channel behind it
        input
            .send(FeedEvent::Shutdown)
            .into_diagnostic()
            .wrap_err("Feed stopped before shutdown")?;
        drop(input);

        Ok(output.iter().count())
    })?;

    info!("Swiped {swipes} times, {rendered} UI updates rendered");
    Ok(())
}

fn load_backend(args: &Args) -> Result<SimulatedBackend> {
    if !(0.0..=1.0).contains(&args.fail_rate) {
        return bail("The fail rate must be between 0 and 1");
    }

    if args.min_latency_ms > args.max_latency_ms {
        return bail("The minimum latency is above the maximum one");
    }

    Ok(SimulatedBackend::new(
        args.min_latency_ms..args.max_latency_ms + 1,
        args.fail_rate,
        Duration::from_millis(args.clip_length_ms),
    ))
}

/// Link and load the actors in the scope and return the input and output channels
fn load_actors<'scope>(
    scope: &'scope thread::Scope<'scope, '_>,
    catalog: ClipCatalog,
    settings: &Settings,
    backend: SimulatedBackend,
) -> Result<(Sender<FeedEvent>, Receiver<String>)> {
    // Media signals come back through the same channel as the user input
    let (input, receive) = unbounded();
    let media = MediaContext::new(Box::new(backend), input.clone());

    // Initialize the actors
    let mut feed_actor = FeedActor::new(Feed::new(catalog, settings, media));
    let mut ui_actor = UiActor::new();

    // Connect the actors together
    feed_actor.set_receive_channel(receive);
    connect_actors(&mut feed_actor, &mut ui_actor, unbounded());

    let (send, output) = unbounded();
    ui_actor.set_send_channel(send);

    // Start the actors
    spawn_actor(scope, "feed", feed_actor)?;
    spawn_actor(scope, "ui", ui_actor)?;

    Ok((input, output))
}

fn spawn_actor<'scope, In, Out>(
    scope: &'scope thread::Scope<'scope, '_>,
    name: &str,
    actor: impl Actor<In, Out> + Send + 'scope,
) -> Result<()> {
    thread::Builder::new()
        .name(name.to_owned())
        .spawn_scoped(scope, move || {
            if let Err(err) = actor.run() {
                tracing::error!("{:?}", miette::Report::from(err));
            }
        })
        .into_diagnostic()
        .wrap_err_with(|| format!("Could not spawn the {name} actor"))?;
    Ok(())
}

/// Play the user: dwell on each clip then swipe to the next one
fn drive(input: &Sender<FeedEvent>, args: &Args, swipes: usize, viewport_height: f64) -> Result<()> {
    let dwell = Duration::from_millis(args.dwell_ms);
    let send = |event| {
        input
            .send(event)
            .into_diagnostic()
            .wrap_err("Feed stopped unexpectedly")
    };

    for index in 0..=swipes {
        if args.comments_at == Some(index) {
            thread::sleep(dwell / 2);
            info!("Opening the comments on clip {index}");
            send(FeedEvent::Intent(UserIntent::OpenOverlay))?;
            thread::sleep(dwell / 2);
            send(FeedEvent::Intent(UserIntent::CloseOverlay))?;
            send(FeedEvent::Intent(UserIntent::TogglePlayback))?;
        }

        thread::sleep(dwell);
        if index == swipes {
            break;
        }

        // A swipe scrolls through intermediate offsets before settling
        let from = index as f64 * viewport_height;
        for tick in 1..=SWIPE_TICKS {
            let offset = from + viewport_height * f64::from(tick) / f64::from(SWIPE_TICKS);
            send(FeedEvent::Scroll { offset })?;
        }
    }

    Ok(())
}
