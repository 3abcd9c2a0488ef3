// Device42 HTTP client
//
// Wraps `reqwest::Client` with base-URL construction, basic auth, and
// `{code, msg}` envelope unwrapping. Endpoint methods (devices, passwords)
// live in sibling modules as inherent methods so this module stays focused
// on transport mechanics.

use reqwest::Method;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::models::{ApiResponse, RemoteId};
use crate::transport::{BasicAuth, TransportConfig};

const BODY_PREVIEW_CHARS: usize = 200;

fn preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}

/// HTTP client for the Device42 REST API.
///
/// Write calls return the decoded envelope only when `code == 0`; any other
/// code surfaces as [`Error::Api`] even though the HTTP exchange succeeded.
/// Read calls decode the bare record leniently.
#[derive(Debug, Clone)]
pub struct Device42Client {
    http: reqwest::Client,
    base_url: Url,
    auth: Option<BasicAuth>,
}

impl Device42Client {
    /// Create a client for `https://{host}/api/`.
    pub fn new(host: &str, transport: &TransportConfig) -> Result<Self, Error> {
        let base_url = Self::base_url_for_host(host)?;
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            auth: transport.auth.clone(),
        })
    }

    /// Create a client with a pre-built `reqwest::Client` and explicit base URL.
    ///
    /// The base URL must already include the `/api` prefix.
    pub fn with_client(http: reqwest::Client, base_url: Url, auth: Option<BasicAuth>) -> Self {
        Self {
            http,
            base_url,
            auth,
        }
    }

    /// The API root derived from a bare host name (`d42.example.com` or `10.0.0.5:8443`).
    pub fn base_url_for_host(host: &str) -> Result<Url, Error> {
        let host = host.trim().trim_end_matches('/');
        Ok(Url::parse(&format!("https://{host}/api/"))?)
    }

    /// The API base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build a full URL for an API-relative path such as `1.0/devices/id/7/`.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.auth {
            Some(auth) => builder.basic_auth(&auth.username, Some(auth.password.expose_secret())),
            None => builder,
        }
    }

    // ── Facade ───────────────────────────────────────────────────────

    /// POST a form and return the id the server assigned.
    ///
    /// The id is taken from message index 1 of the envelope; a successful
    /// envelope without it is an error.
    pub async fn create(&self, path: &str, form: &[(&str, &str)]) -> Result<RemoteId, Error> {
        let envelope = self.send_form(Method::POST, path, form).await?;
        envelope
            .assigned_id()
            .ok_or_else(|| Error::MissingAssignedId {
                message: envelope.message(),
            })
    }

    /// POST a form to an endpoint that creates or updates by natural key.
    pub async fn upsert(&self, path: &str, form: &[(&str, &str)]) -> Result<ApiResponse, Error> {
        self.send_form(Method::POST, path, form).await
    }

    /// PUT a form.
    pub async fn update(&self, path: &str, form: &[(&str, &str)]) -> Result<ApiResponse, Error> {
        self.send_form(Method::PUT, path, form).await
    }

    /// DELETE an object.
    pub async fn delete(&self, path: &str) -> Result<ApiResponse, Error> {
        let url = self.api_url(path)?;
        debug!("DELETE {}", url);

        let resp = self
            .request(Method::DELETE, url)
            .send()
            .await
            .map_err(Error::Transport)?;

        Self::parse_envelope(resp).await
    }

    /// GET a record and decode it.
    pub async fn read<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, Error> {
        let url = self.api_url(path)?;
        debug!("GET {}", url);

        let mut builder = self.request(Method::GET, url);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        let resp = builder.send().await.map_err(Error::Transport)?;

        let body = Self::checked_body(resp).await?;
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body,
        })
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn send_form(
        &self,
        method: Method,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<ApiResponse, Error> {
        let url = self.api_url(path)?;
        debug!("{} {}", method, url);
        trace!(fields = ?form.iter().map(|(k, _)| *k).collect::<Vec<_>>(), "form fields");

        let resp = self
            .request(method, url)
            .form(form)
            .send()
            .await
            .map_err(Error::Transport)?;

        Self::parse_envelope(resp).await
    }

    /// Map HTTP-level failures and return the body of a successful response.
    async fn checked_body(resp: reqwest::Response) -> Result<String, Error> {
        let status = resp.status();
        let path = resp.url().path().to_owned();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(Error::Authentication {
                message: format!("HTTP {status} from {path}"),
            });
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound { path });
        }

        let body = resp.text().await.map_err(Error::Transport)?;

        if !status.is_success() {
            // Some endpoints report application errors with a 4xx/5xx and an envelope.
            if let Ok(envelope) = serde_json::from_str::<ApiResponse>(&body) {
                if !envelope.is_success() {
                    return Err(Error::Api {
                        code: envelope.code,
                        message: envelope.message(),
                    });
                }
            }
            return Err(Error::Http {
                status: status.as_u16(),
                message: preview(&body),
            });
        }

        Ok(body)
    }

    /// Parse the `{code, msg}` envelope, returning it on success or an
    /// `Error::Api` if `code != 0`.
    async fn parse_envelope(resp: reqwest::Response) -> Result<ApiResponse, Error> {
        let body = Self::checked_body(resp).await?;

        let envelope: ApiResponse = serde_json::from_str(&body).map_err(|e| {
            Error::Deserialization {
                message: format!("{e} (body preview: {:?})", preview(&body)),
                body: body.clone(),
            }
        })?;

        if envelope.is_success() {
            debug!(code = envelope.code, msg = %envelope.message(), "envelope ok");
            Ok(envelope)
        } else {
            Err(Error::Api {
                code: envelope.code,
                message: envelope.message(),
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn base_url_from_host() {
        let url = Device42Client::base_url_for_host("d42.example.com").unwrap();
        assert_eq!(url.as_str(), "https://d42.example.com/api/");

        let url = Device42Client::base_url_for_host("10.0.0.5:8443/").unwrap();
        assert_eq!(url.as_str(), "https://10.0.0.5:8443/api/");
    }

    #[test]
    fn api_url_joins_without_double_slash() {
        let client = Device42Client::with_client(
            reqwest::Client::new(),
            Url::parse("https://d42.example.com/api/").unwrap(),
            None,
        );
        assert_eq!(
            client.api_url("/1.0/devices/id/7/").unwrap().as_str(),
            "https://d42.example.com/api/1.0/devices/id/7/"
        );
        assert_eq!(
            client.api_url("device/").unwrap().as_str(),
            "https://d42.example.com/api/device/"
        );
    }

    #[test]
    fn preview_respects_char_boundaries() {
        let body = "é".repeat(300);
        assert_eq!(preview(&body).chars().count(), BODY_PREVIEW_CHARS);
    }
}
