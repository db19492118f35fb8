pub mod api;
pub mod client;
pub mod msg;
pub mod proto;
mod receiver;
mod sender;
pub mod server;
pub mod specs;

use tokio::io::{AsyncRead, AsyncWrite};

pub use api::{ApiErr, ParameterServerApi, SchedulerApi};
pub use receiver::{FrameTooLarge, OnoReceiver};
pub use sender::OnoSender;

type LenType = u64;
const LEN_TYPE_SIZE: usize = size_of::<LenType>();

/// The biggest frame a receiver will accept, anything above is treated as corrupted data.
const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Creates both `OnoReceiver` and `OnoSender` network channel parts.
///
/// Given a writer and reader creates and returns both ends of the communication.
///
/// # Arguments
/// * `rx` - An async readable.
/// * `tx` - An async writable.
///
/// # Returns
/// A communication stream in the form of an ono receiver and sender.
pub fn channel<R, W>(rx: R, tx: W) -> (OnoReceiver<R>, OnoSender<W>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    (OnoReceiver::new(rx), OnoSender::new(tx))
}
