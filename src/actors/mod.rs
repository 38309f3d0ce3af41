mod feed_actor;
mod message;
mod ui_actor;

use crossbeam_channel::{Receiver, Sender};
pub use feed_actor::FeedActor;
pub use message::*;
pub use ui_actor::UiActor;

use crate::result::Result;

pub trait Actor<From, To> {
    fn set_receive_channel(&mut self, channel: Receiver<From>);

    fn set_send_channel(&mut self, channel: Sender<To>);

    fn run(self) -> Result<()>;
}

pub fn connect_actors<From, Shared, To>(
    from: &mut dyn Actor<From, Shared>,
    to: &mut dyn Actor<Shared, To>,
    (send, receive): (Sender<Shared>, Receiver<Shared>),
) {
    from.set_send_channel(send);
    to.set_receive_channel(receive);
}
