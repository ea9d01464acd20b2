use std::time::Duration;

use jsonwebtoken::DecodingKey;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{AuthError, AuthResult};

/// Downloads an issuer's JSON Web Key Set.
#[derive(Clone)]
pub struct JwksFetcher {
    client: Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct KeySet {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: Option<String>,
    #[serde(default = "rsa_kty")]
    kty: String,
    alg: Option<String>,
    #[serde(rename = "use")]
    usage: Option<String>,
    n: Option<String>,
    e: Option<String>,
}

fn rsa_kty() -> String {
    "RSA".to_string()
}

impl Jwk {
    fn is_signing_key(&self) -> bool {
        self.usage.as_deref().map_or(true, |usage| usage == "sig")
    }

    fn into_decoding_key(self) -> AuthResult<(String, DecodingKey)> {
        let kid = self
            .kid
            .ok_or_else(|| AuthError::KeySet("key without kid".to_string()))?;
        if self.kty != "RSA" || self.alg.as_deref().is_some_and(|alg| alg != "RS256") {
            return Err(AuthError::KeySet(format!(
                "key '{kid}' is {}/{}, expected RSA/RS256",
                self.kty,
                self.alg.as_deref().unwrap_or("-")
            )));
        }
        let (Some(n), Some(e)) = (self.n, self.e) else {
            return Err(AuthError::KeySet(format!("key '{kid}' lacks n or e")));
        };
        let key = DecodingKey::from_rsa_components(&n, &e)
            .map_err(|err| AuthError::KeySet(format!("key '{kid}': {err}")))?;
        Ok((kid, key))
    }
}

impl JwksFetcher {
    /// Every request (connect and body) is bounded by `timeout`.
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> AuthResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AuthError::KeySet(err.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub async fn fetch(&self) -> AuthResult<Vec<(String, DecodingKey)>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|err| AuthError::KeySet(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::KeySet(format!("HTTP {status} from {}", self.url)));
        }

        let set: KeySet = response
            .json()
            .await
            .map_err(|err| AuthError::KeySet(format!("unreadable key set: {err}")))?;

        // Encryption keys can be published alongside signing keys.
        set.keys
            .into_iter()
            .filter(Jwk::is_signing_key)
            .map(Jwk::into_decoding_key)
            .collect()
    }
}
