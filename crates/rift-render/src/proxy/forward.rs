//! Routing proxied calls through a forward proxy.
//!
//! Plain `http` targets are sent to the forward proxy itself and the
//! connection is marked as proxied, so the client writes an absolute-form
//! request target. `https` targets get a `CONNECT` tunnel through the proxy
//! and TLS runs inside it.

use hyper::rt::{Read, ReadBufCursor, Write};
use hyper::Uri;
use hyper_util::client::legacy::connect::proxy::Tunnel;
use hyper_util::client::legacy::connect::{Connected, Connection, HttpConnector};
use hyper_util::rt::TokioIo;
use std::future::{poll_fn, Future};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::net::TcpStream;
use tower::Service;
use tracing::trace;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Connector that either dials targets directly or goes through `via`.
#[derive(Clone)]
pub struct ForwardProxyConnector {
    direct: HttpConnector,
    via: Option<Uri>,
}

impl ForwardProxyConnector {
    pub fn new(direct: HttpConnector, via: Option<Uri>) -> Self {
        Self { direct, via }
    }
}

impl Service<Uri> for ForwardProxyConnector {
    type Response = ProxyStream;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<ProxyStream, BoxError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.direct.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        Box::pin(connect(self.direct.clone(), self.via.clone(), dst))
    }
}

async fn connect(
    mut direct: HttpConnector,
    via: Option<Uri>,
    dst: Uri,
) -> Result<ProxyStream, BoxError> {
    poll_fn(|cx| direct.poll_ready(cx)).await?;
    let via = match via {
        Some(via) => via,
        None => {
            let io = direct.call(dst).await?;
            return Ok(ProxyStream { io, proxied: false });
        }
    };

    if dst.scheme_str() == Some("https") {
        trace!("Tunnelling to {} through {}", dst, via);
        let mut tunnel = Tunnel::new(via, direct);
        poll_fn(|cx| tunnel.poll_ready(cx)).await?;
        let io = tunnel.call(dst).await?;
        Ok(ProxyStream { io, proxied: false })
    } else {
        trace!("Sending {} through {}", dst, via);
        let io = direct.call(via).await?;
        Ok(ProxyStream { io, proxied: true })
    }
}

/// TCP stream that remembers whether it leads to a forward proxy.
pub struct ProxyStream {
    io: TokioIo<TcpStream>,
    proxied: bool,
}

impl Connection for ProxyStream {
    fn connected(&self) -> Connected {
        self.io.connected().proxy(self.proxied)
    }
}

impl Read for ProxyStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_read(cx, buf)
    }
}

impl Write for ProxyStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.io).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_shutdown(cx)
    }

    fn is_write_vectored(&self) -> bool {
        self.io.is_write_vectored()
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.io).poll_write_vectored(cx, bufs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_http_target_dials_the_proxy() {
        let proxy = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let via: Uri = format!("http://{}", proxy.local_addr().unwrap()).parse().unwrap();
        let mut connector = ForwardProxyConnector::new(HttpConnector::new(), Some(via));

        let accept = tokio::spawn(async move { proxy.accept().await.map(|_| ()) });
        // Nothing listens on the target; only the proxy is reachable
        let stream = connector
            .call("http://unreachable.invalid:81/x".parse().unwrap())
            .await
            .unwrap();
        assert!(stream.proxied);
        assert!(accept.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_https_target_opens_a_tunnel() {
        let proxy = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let via: Uri = format!("http://{}", proxy.local_addr().unwrap()).parse().unwrap();
        let mut connector = ForwardProxyConnector::new(HttpConnector::new(), Some(via));

        let fake_proxy = tokio::spawn(async move {
            let (mut socket, _) = proxy.accept().await.unwrap();
            let mut buf = vec![0u8; 1024];
            let n = socket.read(&mut buf).await.unwrap();
            socket
                .write_all(b"HTTP/1.1 200 Connection established\r\n\r\n")
                .await
                .unwrap();
            String::from_utf8_lossy(&buf[..n]).into_owned()
        });

        let stream = connector
            .call("https://secure.example:8443/x".parse().unwrap())
            .await
            .unwrap();
        assert!(!stream.proxied);
        let connect = fake_proxy.await.unwrap();
        assert!(connect.starts_with("CONNECT secure.example:8443 HTTP/1.1\r\n"));
    }

    #[tokio::test]
    async fn test_direct_without_via() {
        let target = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dst: Uri = format!("http://{}/", target.local_addr().unwrap()).parse().unwrap();
        let mut connector = ForwardProxyConnector::new(HttpConnector::new(), None);
        let stream = connector.call(dst).await.unwrap();
        assert!(!stream.proxied);
        assert!(!stream.connected().is_proxied());
    }
}
