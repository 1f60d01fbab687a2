//! Federated sign-in collaborator. The provider verifies an ID token and
//! hands back a stable subject id plus the account email.

use anyhow::Context;
use axum::async_trait;
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct Identity {
    pub subject: String,
    pub email: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve(&self, id_token: &str) -> anyhow::Result<Identity>;
}

#[derive(Clone)]
pub struct GoogleIdentity {
    client: reqwest::Client,
    tokeninfo_url: String,
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    sub: String,
    email: Option<String>,
}

impl GoogleIdentity {
    pub fn new(tokeninfo_url: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("build identity http client")?;
        Ok(Self {
            client,
            tokeninfo_url: tokeninfo_url.to_string(),
        })
    }
}

#[async_trait]
impl IdentityProvider for GoogleIdentity {
    async fn resolve(&self, id_token: &str) -> anyhow::Result<Identity> {
        let resp = self
            .client
            .get(&self.tokeninfo_url)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .context("tokeninfo request")?;
        if !resp.status().is_success() {
            anyhow::bail!("identity provider rejected the token ({})", resp.status());
        }
        let info: TokenInfo = resp.json().await.context("tokeninfo body")?;
        let email = info
            .email
            .ok_or_else(|| anyhow::anyhow!("identity provider returned no email"))?;
        Ok(Identity {
            subject: info.sub,
            email,
        })
    }
}
