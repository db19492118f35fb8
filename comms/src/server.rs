use std::{io, sync::Arc};

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpListener,
};

use crate::{
    FrameTooLarge, OnoReceiver, OnoSender,
    msg::Msg,
    proto::{Request, Response},
};

/// Answers routed requests, implemented by every component that exposes an endpoint.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(&self, request: Request) -> Response;
}

/// Accepts connections forever, serving each one on its own task.
///
/// # Arguments
/// * `listener` - A bound listener.
/// * `handler` - The handler answering every request.
///
/// # Returns
/// An io error if accepting a connection fails.
pub async fn serve<H: Handler>(listener: TcpListener, handler: Arc<H>) -> io::Result<()> {
    info!("serving at {}", listener.local_addr()?);

    loop {
        let (stream, addr) = listener.accept().await?;
        let (rx, tx) = stream.into_split();
        let (rx, tx) = crate::channel(rx, tx);
        let handler = Arc::clone(&handler);

        tokio::spawn(async move {
            if let Err(e) = connection(rx, tx, handler.as_ref()).await {
                warn!("connection with {addr} failed: {e}");
            }
        });
    }
}

/// Serves a single connection until the other end closes it.
///
/// Protocol violations are answered with a client error. Malformed payloads keep the
/// connection open, an oversized frame closes it since its payload is never read.
pub async fn connection<R, W, H>(
    mut rx: OnoReceiver<R>,
    mut tx: OnoSender<W>,
    handler: &H,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    H: Handler + ?Sized,
{
    loop {
        let msg = match rx.recv().await {
            Ok(Some(msg)) => msg,
            Ok(None) => return Ok(()),
            Err(e) if FrameTooLarge::is(&e) => {
                warn!("closing the connection: {e}");
                tx.send(&Response::bad_request(e).into()).await?;
                return Ok(());
            }
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                warn!("received a malformed message: {e}");
                tx.send(&Response::bad_request(e).into()).await?;
                continue;
            }
            Err(e) => return Err(e),
        };

        let response = match msg.into_request() {
            Ok(request) => {
                debug!("handling {}", request.route);
                handler.handle(request).await
            }
            Err(response) => {
                warn!("rejected message: {}", response.body);
                response
            }
        };

        tx.send(&Msg::from(response)).await?;
    }
}
