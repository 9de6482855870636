// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Connection establishment for the hyper-based [`HyperClient`].
//!
//! [`HyperClient`]: super::HyperClient

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::FutureExt;
use hyper::client::connect::HttpConnector;
use hyper::service::Service;
use hyper::Uri;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder, MaybeHttpsStream};
use pin_project::pin_project;

pub type ConnStreamError = Box<dyn std::error::Error + Send + Sync>;

#[pin_project(project = ConnStreamProj)]
pub enum ConnStream {
    Tcp {
        #[pin]
        transport: tokio::net::TcpStream,
    },
    Tls {
        #[pin]
        transport: Box<tokio_rustls::client::TlsStream<tokio::net::TcpStream>>,
    },
    #[cfg(unix)]
    Uds {
        #[pin]
        transport: tokio::net::UnixStream,
    },
}

impl ConnStream {
    async fn from_uds_uri(uri: Uri) -> Result<ConnStream, ConnStreamError> {
        #[cfg(unix)]
        {
            let path = super::unix_socket_path(&uri)
                .ok_or("unix socket URI is missing its encoded path")?;
            Ok(ConnStream::Uds {
                transport: tokio::net::UnixStream::connect(path).await?,
            })
        }
        #[cfg(not(unix))]
        {
            let _ = uri;
            Err("unix domain sockets are not supported on this platform".into())
        }
    }
}

/// Dispatches on URI scheme: `unix` connects a [`tokio::net::UnixStream`],
/// anything else goes through the TLS-capable HTTP connector.
#[derive(Clone)]
pub struct Connector {
    https: HttpsConnector<HttpConnector>,
}

impl Connector {
    pub fn new() -> Connector {
        Connector {
            https: HttpsConnectorBuilder::new()
                .with_webpki_roots()
                .https_or_http()
                .enable_http1()
                .build(),
        }
    }
}

impl Default for Connector {
    fn default() -> Self {
        Connector::new()
    }
}

impl Service<Uri> for Connector {
    type Response = ConnStream;
    type Error = ConnStreamError;
    type Future = Pin<Box<dyn Future<Output = Result<ConnStream, ConnStreamError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.https.poll_ready(cx).map_err(|error| error.into())
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        if uri.scheme_str() == Some("unix") {
            return ConnStream::from_uds_uri(uri).boxed();
        }
        let pending = self.https.call(uri);
        Box::pin(async move {
            match pending.await {
                Ok(MaybeHttpsStream::Http(transport)) => Ok(ConnStream::Tcp { transport }),
                Ok(MaybeHttpsStream::Https(transport)) => Ok(ConnStream::Tls {
                    transport: Box::new(transport),
                }),
                Err(error) => Err(error),
            }
        })
    }
}

impl tokio::io::AsyncRead for ConnStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.project() {
            ConnStreamProj::Tcp { transport } => transport.poll_read(cx, buf),
            ConnStreamProj::Tls { transport } => transport.poll_read(cx, buf),
            #[cfg(unix)]
            ConnStreamProj::Uds { transport } => transport.poll_read(cx, buf),
        }
    }
}

impl tokio::io::AsyncWrite for ConnStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<Result<usize, std::io::Error>> {
        match self.project() {
            ConnStreamProj::Tcp { transport } => transport.poll_write(cx, buf),
            ConnStreamProj::Tls { transport } => transport.poll_write(cx, buf),
            #[cfg(unix)]
            ConnStreamProj::Uds { transport } => transport.poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), std::io::Error>> {
        match self.project() {
            ConnStreamProj::Tcp { transport } => transport.poll_flush(cx),
            ConnStreamProj::Tls { transport } => transport.poll_flush(cx),
            #[cfg(unix)]
            ConnStreamProj::Uds { transport } => transport.poll_flush(cx),
        }
    }

    fn poll_shutdown(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<(), std::io::Error>> {
        match self.project() {
            ConnStreamProj::Tcp { transport } => transport.poll_shutdown(cx),
            ConnStreamProj::Tls { transport } => transport.poll_shutdown(cx),
            #[cfg(unix)]
            ConnStreamProj::Uds { transport } => transport.poll_shutdown(cx),
        }
    }
}

impl hyper::client::connect::Connection for ConnStream {
    fn connected(&self) -> hyper::client::connect::Connected {
        match self {
            Self::Tcp { transport } => transport.connected(),
            Self::Tls { transport } => {
                let (tcp, _session) = transport.get_ref();
                tcp.connected()
            }
            #[cfg(unix)]
            Self::Uds { transport: _ } => hyper::client::connect::Connected::new(),
        }
    }
}
