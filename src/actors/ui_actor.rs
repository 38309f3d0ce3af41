use crossbeam_channel::{Receiver, Sender};
use miette::{Context, IntoDiagnostic};
use tracing::{debug, info, warn};

use crate::{
    playback::PlaybackState,
    result::{err_msg, Result},
};

use super::{Actor, ClipView, UiUpdate};

/// Stand-in for the real UI: renders every update as a text line,
/// logs it and passes it along.
#[derive(Debug, Default)]
pub struct UiActor {
    receive_channel: Option<Receiver<UiUpdate>>,
    send_channel: Option<Sender<String>>,
}

impl Actor<UiUpdate, String> for UiActor {
    fn set_receive_channel(&mut self, channel: Receiver<UiUpdate>) {
        self.receive_channel = Some(channel);
    }

    fn set_send_channel(&mut self, channel: Sender<String>) {
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

        debug!("Actor started, waiting for UI updates");

        for update in receive_channel {
            let line = render(&update);
            match &update {
                UiUpdate::Playback(ClipView {
                    state: PlaybackState::Errored,
                    ..
                }) => warn!("{line}"),
                UiUpdate::Playback(ClipView {
                    state: PlaybackState::Loading { .. },
                    ..
                }) => debug!("{line}"),
                _ => info!("{line}"),
            }

            send_channel
                .send(line)
                .into_diagnostic()
                .wrap_err("Could not send rendered line")?;
        }

        debug!("All updates rendered. Stopping the actor.");
        Ok(())
    }
}

impl UiActor {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn render(update: &UiUpdate) -> String {
    match update {
        UiUpdate::ActiveIndex { index, clip } => format!("[{index}] {clip} now in view"),
        UiUpdate::Playback(view) => {
            let badge = if view.preloaded { " (preloaded)" } else { "" };
            let status = match view.state {
                PlaybackState::Errored => "content unavailable".to_owned(),
                PlaybackState::Paused(cause) if cause.is_forced() => {
                    format!("paused by {cause:?}").to_lowercase()
                }
                state => state.to_string(),
            };

            let line = format!("[{}] {}{badge}: {status}", view.index, view.clip);
            match &view.poster {
                Some(poster) => format!("{line}, poster {poster}"),
                None => line,
            }
        }
    }
}
