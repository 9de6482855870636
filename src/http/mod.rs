// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP transport used by the agent collector.
//!
//! The collector talks to the agent through the narrow [`HttpClient`]
//! interface; the default implementation is a hyper client over a connector
//! that speaks TCP, TLS, and unix domain sockets. Unix socket URLs carry
//! their path hex-encoded in the URI authority, since the `http` crate has
//! no native representation for them.

pub(crate) mod connector;

use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::time::Duration;

use http::uri::{Authority, PathAndQuery, Scheme, Uri};
use http::{Request, Response};
use hyper::Body;

use crate::error::{Code, Error};

pub type ResponseFuture = Pin<
    Box<
        dyn Future<Output = Result<Response<Body>, Box<dyn std::error::Error + Send + Sync>>>
            + Send,
    >,
>;

/// Narrow seam over the HTTP implementation. The collector builds requests
/// and interprets responses; everything in between is behind this trait.
pub trait HttpClient: Send + Sync {
    fn request(&self, request: Request<Body>) -> ResponseFuture;
}

/// Default [`HttpClient`]: hyper with a pooled [`connector::Connector`].
pub struct HyperClient {
    inner: hyper::Client<connector::Connector, Body>,
}

impl HyperClient {
    pub fn new() -> HyperClient {
        HyperClient {
            inner: hyper::Client::builder()
                .pool_idle_timeout(Duration::from_secs(30))
                .build(connector::Connector::new()),
        }
    }
}

impl Default for HyperClient {
    fn default() -> Self {
        HyperClient::new()
    }
}

impl HttpClient for HyperClient {
    fn request(&self, request: Request<Body>) -> ResponseFuture {
        let pending = self.inner.request(request);
        Box::pin(async move {
            pending
                .await
                .map_err(|error| Box::new(error) as Box<dyn std::error::Error + Send + Sync>)
        })
    }
}

/// Parse an agent URL. Accepted schemes are `http`, `https`, `unix`,
/// `http+unix`, and `https+unix`; unix variants require an absolute socket
/// path, which ends up hex-encoded in the authority of the returned URI.
pub(crate) fn parse_url(raw: &str) -> Result<Uri, Error> {
    let Some((scheme, rest)) = raw.split_once("://") else {
        return Err(Error::new(
            Code::UrlMissingSeparator,
            format!(
                "datadog agent URL {:?} is missing the \"://\" separator",
                raw
            ),
        ));
    };

    match scheme {
        "http" | "https" => Uri::from_str(raw).map_err(|parse_error| {
            Error::new(
                Code::MalformedUrl,
                format!("could not parse URL {:?}: {}", raw, parse_error),
            )
        }),
        "unix" | "http+unix" | "https+unix" => {
            if !rest.starts_with('/') {
                return Err(Error::new(
                    Code::UrlUnixDomainSocketPathNotAbsolute,
                    format!(
                        "unix domain socket path must be absolute in URL {:?}",
                        raw
                    ),
                ));
            }
            unix_socket_uri(rest)
        }
        _ => Err(Error::new(
            Code::UrlUnsupportedScheme,
            format!("unsupported URL scheme {:?} in {:?}", scheme, raw),
        )),
    }
}

fn unix_socket_uri(path: &str) -> Result<Uri, Error> {
    let mut parts = http::uri::Parts::default();
    parts.scheme = Scheme::from_str("unix").ok();
    parts.authority = Authority::from_str(&hex::encode(path)).ok();
    parts.path_and_query = Some(PathAndQuery::from_static("/"));
    Uri::from_parts(parts).map_err(|parse_error| {
        Error::new(
            Code::MalformedUrl,
            format!(
                "could not build unix socket URI for {:?}: {}",
                path, parse_error
            ),
        )
    })
}

/// Recover the socket path from a unix-scheme URI built by
/// [`parse_url`].
pub(crate) fn unix_socket_path(uri: &Uri) -> Option<std::path::PathBuf> {
    if uri.scheme_str() != Some("unix") {
        return None;
    }
    let decoded = hex::decode(uri.authority()?.as_str()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    Some(std::path::PathBuf::from(text))
}

/// Append `path` to the URI, e.g. the `/v0.4/traces` endpoint under the
/// agent base URL.
pub(crate) fn with_path(base: &Uri, path: &str) -> Result<Uri, Error> {
    let mut parts = base.clone().into_parts();
    let joined = match &parts.path_and_query {
        Some(existing) => {
            let prefix = existing.path().strip_suffix('/').unwrap_or(existing.path());
            format!("{}{}", prefix, path)
        }
        None => path.to_string(),
    };
    parts.path_and_query = Some(PathAndQuery::from_str(&joined).map_err(|parse_error| {
        Error::new(
            Code::MalformedUrl,
            format!("could not build URL path {:?}: {}", joined, parse_error),
        )
    })?);
    Uri::from_parts(parts).map_err(|parse_error| {
        Error::new(
            Code::MalformedUrl,
            format!("could not append {:?} to URL: {}", path, parse_error),
        )
    })
}
