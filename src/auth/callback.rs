//! A loopback HTTP server that receives the authorization-code redirect from the identity
//! provider.

use crate::Result;
use anyhow::{bail, Context};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use url::{Host, Url};

/// What the provider appended to the redirect URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct CallbackParams {
    pub(super) code: String,
    pub(super) state: String,
}

type Outcome = std::result::Result<CallbackParams, String>;

/// A bound, not yet serving, callback server.
pub(super) struct CallbackServer {
    listener: TcpListener,
    path: String,
}

impl CallbackServer {
    /// Binds to the host and port of `redirect_uri`, which must be a loopback `http` URL.
    pub(super) async fn bind(redirect_uri: &Url) -> Result<Self> {
        if redirect_uri.scheme() != "http" {
            bail!("The redirect URI '{redirect_uri}' must use http");
        }
        let ip = match redirect_uri.host() {
            Some(Host::Domain("localhost")) => IpAddr::V4(Ipv4Addr::LOCALHOST),
            Some(Host::Ipv4(ip)) if ip.is_loopback() => IpAddr::V4(ip),
            Some(Host::Ipv6(ip)) if ip.is_loopback() => IpAddr::V6(ip),
            _ => bail!("The redirect URI '{redirect_uri}' must point at this machine"),
        };
        let port = redirect_uri.port_or_known_default().unwrap_or(80);
        let addr = SocketAddr::new(ip, port);
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Unable to listen for the sign-in redirect on {addr}"))?;
        debug!("Listening for the sign-in redirect on {addr}");
        Ok(Self {
            listener,
            path: redirect_uri.path().to_string(),
        })
    }

    #[cfg(test)]
    pub(super) fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Unable to get the callback server address")
    }

    /// Serves requests until the redirect arrives or `timeout` elapses.
    pub(super) async fn wait(self, timeout: Duration) -> Result<CallbackParams> {
        let CallbackServer { listener, path } = self;
        let (tx, mut rx) = mpsc::channel::<Outcome>(1);

        let accept_loop = async move {
            loop {
                let stream = match listener.accept().await {
                    Ok((stream, _)) => stream,
                    Err(e) => {
                        debug!("Failed to accept a callback connection: {e}");
                        continue;
                    }
                };
                let tx = tx.clone();
                let path = path.clone();
                tokio::spawn(async move {
                    let service =
                        service_fn(move |req| handle(req, path.clone(), tx.clone()));
                    if let Err(e) = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await
                    {
                        debug!("Callback connection error: {e}");
                    }
                });
            }
        };

        tokio::select! {
            outcome = rx.recv() => match outcome {
                Some(Ok(params)) => Ok(params),
                Some(Err(message)) => bail!("The identity provider returned an error: {message}"),
                None => bail!("The callback server stopped before sign-in completed"),
            },
            _ = accept_loop => bail!("The callback server stopped before sign-in completed"),
            _ = tokio::time::sleep(timeout) => bail!(
                "Timed out after {} seconds waiting for sign-in to complete",
                timeout.as_secs()
            ),
        }
    }
}

async fn handle(
    req: Request<Incoming>,
    path: String,
    tx: mpsc::Sender<Outcome>,
) -> std::result::Result<Response<String>, Infallible> {
    trace!("Callback request {} {}", req.method(), req.uri());
    if req.uri().path() != path {
        return Ok(respond(StatusCode::NOT_FOUND, "Not found"));
    }

    let params: HashMap<String, String> =
        url::form_urlencoded::parse(req.uri().query().unwrap_or_default().as_bytes())
            .into_owned()
            .collect();

    let outcome = match (params.get("code"), params.get("state"), params.get("error")) {
        (_, _, Some(error)) => {
            let description = params
                .get("error_description")
                .map(String::as_str)
                .unwrap_or_default();
            Err(format!("{error} {description}").trim().to_string())
        }
        (Some(code), Some(state), None) => Ok(CallbackParams {
            code: code.clone(),
            state: state.clone(),
        }),
        _ => Err("the redirect did not include an authorization code".to_string()),
    };

    let response = if outcome.is_ok() {
        respond(
            StatusCode::OK,
            "Signed in to fintrack. You can close this window and return to the terminal.",
        )
    } else {
        respond(
            StatusCode::BAD_REQUEST,
            "Sign-in failed. Return to the terminal for details.",
        )
    };
    let _ = tx.send(outcome).await;
    Ok(response)
}

fn respond(status: StatusCode, body: &str) -> Response<String> {
    let mut response = Response::new(body.to_string());
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn bind_ephemeral(path: &str) -> (CallbackServer, Url) {
        let server = CallbackServer::bind(&Url::parse(&format!("http://127.0.0.1:0{path}")).unwrap())
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let base = Url::parse(&format!("http://{addr}{path}")).unwrap();
        (server, base)
    }

    #[tokio::test]
    async fn test_receives_code() {
        let (server, base) = bind_ephemeral("/callback").await;
        let waiting = tokio::spawn(server.wait(Duration::from_secs(10)));

        let client = reqwest::Client::new();
        let missing = client
            .get(base.join("/favicon.ico").unwrap())
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status().as_u16(), 404);

        let response = client
            .get(format!("{base}?code=abc123&state=xyz"))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());

        let params = waiting.await.unwrap().unwrap();
        assert_eq!(
            params,
            CallbackParams {
                code: "abc123".to_string(),
                state: "xyz".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_provider_error() {
        let (server, base) = bind_ephemeral("/").await;
        let waiting = tokio::spawn(server.wait(Duration::from_secs(10)));

        let response = reqwest::Client::new()
            .get(format!("{base}?error=access_denied&error_description=nope"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400);

        let err = waiting.await.unwrap().unwrap_err();
        assert!(err.to_string().contains("access_denied nope"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let (server, _) = bind_ephemeral("/").await;
        let err = server.wait(Duration::from_millis(50)).await.unwrap_err();
        assert!(err.to_string().contains("Timed out"));
    }

    #[tokio::test]
    async fn test_rejects_remote_redirect() {
        let url = Url::parse("http://example.com/callback").unwrap();
        assert!(CallbackServer::bind(&url).await.is_err());
        let url = Url::parse("https://localhost/callback").unwrap();
        assert!(CallbackServer::bind(&url).await.is_err());
    }
}
