use std::time::Duration;

/// Runtime configuration for verifying tokens minted by a third-party issuer.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Expected issuer claim (iss).
    pub issuer: String,
    /// Expected audience claim (aud).
    pub audience: String,
    /// Allowable clock skew in seconds when validating exp/nbf.
    pub leeway_seconds: u32,
    /// Upper bound for a single JWKS download.
    pub fetch_timeout: Duration,
}

impl JwtConfig {
    /// Construct config with sensible defaults (30 second leeway, 5 second fetch timeout).
    pub fn new(issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            leeway_seconds: 30,
            fetch_timeout: Duration::from_secs(5),
        }
    }

    /// Config for an Auth0-style tenant domain: issuer is `https://{domain}/`.
    pub fn for_domain(domain: &str, audience: impl Into<String>) -> Self {
        Self::new(issuer_for_domain(domain), audience)
    }

    /// Adjust the allowed leeway.
    pub fn with_leeway(mut self, seconds: u32) -> Self {
        self.leeway_seconds = seconds;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Well-known JWKS location derived from the issuer.
    pub fn jwks_url(&self) -> String {
        format!("{}/.well-known/jwks.json", self.issuer.trim_end_matches('/'))
    }
}

fn issuer_for_domain(domain: &str) -> String {
    let host = domain
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');
    format!("https://{host}/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_becomes_issuer_and_jwks_url() {
        let config = JwtConfig::for_domain("tenant.eu.auth0.com", "recipes-api");
        assert_eq!(config.issuer, "https://tenant.eu.auth0.com/");
        assert_eq!(
            config.jwks_url(),
            "https://tenant.eu.auth0.com/.well-known/jwks.json"
        );
    }

    #[test]
    fn domain_with_scheme_is_normalised() {
        let config = JwtConfig::for_domain("https://tenant.auth0.com/", "aud");
        assert_eq!(config.issuer, "https://tenant.auth0.com/");
    }
}
