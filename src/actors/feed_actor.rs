use std::time::Instant;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use miette::{Context, IntoDiagnostic};
use tracing::{debug, info};

use crate::{
    feed::Feed,
    preload::PreloadStatus,
    result::{err_msg, Result},
};

use super::{Actor, FeedEvent, UiUpdate};

/// Owner of the feed: the only thread where preload and playback state change.
///
/// Scroll samples, user intents and media signals from any thread are
/// serialized through its receive channel. Pending timers are handled by
/// waiting for the next event no longer than the earliest deadline.
///
/// The feed itself keeps a sender to the channel for its media signals,
/// so the actor stops on [`FeedEvent::Shutdown`] rather than on disconnection.
#[derive(Debug)]
pub struct FeedActor {
    feed: Feed,

    receive_channel: Option<Receiver<FeedEvent>>,
    send_channel: Option<Sender<UiUpdate>>,
}

impl Actor<FeedEvent, UiUpdate> for FeedActor {
    fn set_receive_channel(&mut self, channel: Receiver<FeedEvent>) {
        self.receive_channel = Some(channel);
    }

    fn set_send_channel(&mut self, channel: Sender<UiUpdate>) {
        self.send_channel = Some(channel);
    }

    fn run(mut self) -> Result<()> {
        let receive_channel = self
            .receive_channel
            .take()
            .ok_or_else(|| err_msg("Receive channel not set"))?;

        let send_channel = self
            .send_channel
            .take()
            .ok_or_else(|| err_msg("Send channel not set"))?;

        debug!("Actor started, showing the first clip");
        self.feed.start(Instant::now());
        self.forward_updates(&send_channel)?;

        loop {
            let received = match self.feed.next_deadline() {
                Some(deadline) => receive_channel.recv_deadline(deadline),
                None => receive_channel
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected),
            };

            match received {
                Ok(FeedEvent::Shutdown) => {
                    debug!("Shutdown requested");
                    break;
                }
                Ok(event) => self.feed.handle(event, Instant::now()),
                Err(RecvTimeoutError::Timeout) => self.feed.fire_due_timers(Instant::now()),
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("All event senders dropped");
                    break;
                }
            }

            self.forward_updates(&send_channel)?;
        }

        let registry = self.feed.registry();
        let scheduler = self.feed.scheduler();
        info!(
            "Feed stopped on clip {:?} ({}): {} sources warm, {} failed, {}/{} warm-ups settled",
            self.feed.active_index(),
            self.feed
                .active()
                .map_or_else(|| "nothing shown".to_owned(), |clip| clip.state().to_string()),
            registry.count(PreloadStatus::Warm),
            registry.count(PreloadStatus::Failed),
            scheduler.launched() - scheduler.pending(),
            scheduler.launched(),
        );
        Ok(())
    }
}

impl FeedActor {
    pub fn new(feed: Feed) -> Self {
        Self {
            feed,
            receive_channel: None,
            send_channel: None,
        }
    }

    fn forward_updates(&mut self, send_channel: &Sender<UiUpdate>) -> Result<()> {
        for update in self.feed.take_updates() {
            send_channel
                .send(update)
                .into_diagnostic()
                .wrap_err("Could not send UI update")?;
        }
        Ok(())
    }
}
