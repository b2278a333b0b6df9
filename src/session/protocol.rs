//! Post-handshake protocol seam
//!
//! Chunk stream framing and AMF commands are not part of this crate. The
//! application plugs them in by implementing [`SessionProtocol`]; the
//! implementation reads and writes the connection directly and reports
//! publish/play requests through the [`SessionContext`] it is given.

use std::future::Future;
use std::pin::Pin;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;
use crate::session::SessionContext;

/// Byte stream a session runs over
pub trait SessionIo: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> SessionIo for T {}

/// Future returned by [`SessionProtocol::serve`]
pub type ProtocolFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Protocol run on a connection once the handshake has completed
///
/// `serve` drives the connection until the peer leaves or an error occurs.
/// The returned future is dropped early if the server closes the session,
/// e.g. after a rejected publish.
pub trait SessionProtocol: Send + Sync + 'static {
    fn serve<'a>(&'a self, io: &'a mut dyn SessionIo, ctx: &'a SessionContext)
        -> ProtocolFuture<'a>;
}
