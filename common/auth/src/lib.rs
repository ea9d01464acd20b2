pub mod bearer;
pub mod claims;
pub mod config;
pub mod error;
mod jwks;
pub mod verifier;

pub use bearer::bearer_token;
pub use claims::Claims;
pub use config::JwtConfig;
pub use error::{AuthError, AuthResult};
pub use verifier::{InMemoryKeyStore, JwtVerifier, JwtVerifierBuilder};
