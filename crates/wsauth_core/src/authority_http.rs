//! reqwest implementation of `AuthorityClient` against the authority
//! gateway's JSON API.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::authority::{AuthorityClient, AuthorityError, IssuedCertificate, TicketResponse};
use crate::types::AuthorityCredentials;

const CERTIFICATES_PATH: &str = "certificates";
const WS_AUTHS_PATH: &str = "ws-auths";

/// Authority gateway client
#[derive(Clone)]
pub struct HttpAuthorityClient {
    client: reqwest::Client,
    base_url: String,
    environment: String,
    access_token: Option<String>,
}

#[derive(Serialize)]
struct CertificateRequest<'a> {
    environment: &'a str,
    tax_id: &'a str,
    username: &'a str,
    password: &'a str,
    alias: &'a str,
}

#[derive(Serialize)]
struct WsAuthRequest<'a> {
    environment: &'a str,
    tax_id: &'a str,
    username: &'a str,
    password: &'a str,
    alias: &'a str,
    wsid: &'a str,
}

impl HttpAuthorityClient {
    pub fn new(base_url: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            environment: environment.into(),
            access_token: None,
        }
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Use a preconfigured client (timeouts, proxies, TLS roots).
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, AuthorityError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.client.post(self.url(path)).json(body);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AuthorityError::Decode(e.to_string()))
    }
}

fn transport_error(e: reqwest::Error) -> AuthorityError {
    if e.is_timeout() {
        AuthorityError::Timeout
    } else {
        AuthorityError::Transient(e.to_string())
    }
}

/// Map a non-success HTTP status to an error class.
pub(crate) fn classify_status(status: u16, body: String) -> AuthorityError {
    if status == 429 || status >= 500 {
        AuthorityError::Transient(format!("HTTP {status}: {body}"))
    } else {
        AuthorityError::Rejected { status, body }
    }
}

#[async_trait]
impl AuthorityClient for HttpAuthorityClient {
    async fn create_certificate(
        &self,
        credentials: &AuthorityCredentials,
        alias: &str,
    ) -> Result<IssuedCertificate, AuthorityError> {
        let body = CertificateRequest {
            environment: &self.environment,
            tax_id: &credentials.tax_id,
            username: &credentials.username,
            password: &credentials.secret,
            alias,
        };
        self.post_json(CERTIFICATES_PATH, &body).await
    }

    async fn create_authorization_ticket(
        &self,
        credentials: &AuthorityCredentials,
        cert_alias: &str,
        service: &str,
    ) -> Result<TicketResponse, AuthorityError> {
        let body = WsAuthRequest {
            environment: &self.environment,
            tax_id: &credentials.tax_id,
            username: &credentials.username,
            password: &credentials.secret,
            alias: cert_alias,
            wsid: service,
        };
        self.post_json(WS_AUTHS_PATH, &body).await
    }
}
