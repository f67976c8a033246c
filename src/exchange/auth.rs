use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use super::ExchangeError;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("HMAC error: {0}")]
    Hmac(String),
}

impl From<AuthError> for ExchangeError {
    fn from(e: AuthError) -> Self {
        // deterministic, retrying cannot help
        ExchangeError::rejected("signing", e.to_string())
    }
}

/// Order in which request parts are concatenated before hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrehashLayout {
    /// `{timestamp}{METHOD}{path}{body}` (Bitget).
    TimestampFirst,
    /// `{path}{METHOD}{timestamp}{nonce}{body}` (BloFin).
    PathFirstWithNonce,
    /// `{api_key}{timestamp}{params}` (MEXC contract API).
    KeyPrefixed,
}

/// How the raw HMAC digest is rendered into the signature header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestEncoding {
    Hex,
    Base64,
    /// Lowercase hex string, then base64 of that string's bytes.
    HexThenBase64,
}

/// Parts of one request that go into a signature.
#[derive(Debug, Clone, Copy)]
pub struct SignRequest<'a> {
    pub timestamp: &'a str,
    pub method: &'a str,
    /// Path including `?query` for GET requests.
    pub path: &'a str,
    pub body: &'a str,
    pub nonce: Option<&'a str>,
}

/// API credentials. The secret never appears in `Debug` output.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
    pub passphrase: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"***")
            .field("passphrase", &self.passphrase.as_ref().map(|_| "***"))
            .finish()
    }
}

/// HMAC-SHA256 request signer for one exchange's documented scheme.
#[derive(Debug, Clone)]
pub struct Signer {
    credentials: Credentials,
    layout: PrehashLayout,
    encoding: DigestEncoding,
}

impl Signer {
    pub fn new(credentials: Credentials, layout: PrehashLayout, encoding: DigestEncoding) -> Self {
        Self {
            credentials,
            layout,
            encoding,
        }
    }

    pub fn api_key(&self) -> &str {
        &self.credentials.api_key
    }

    pub fn passphrase(&self) -> &str {
        self.credentials.passphrase.as_deref().unwrap_or_default()
    }

    pub fn prehash(&self, req: &SignRequest<'_>) -> String {
        let method = req.method.to_uppercase();
        match self.layout {
            PrehashLayout::TimestampFirst => {
                format!("{}{}{}{}", req.timestamp, method, req.path, req.body)
            }
            PrehashLayout::PathFirstWithNonce => format!(
                "{}{}{}{}{}",
                req.path,
                method,
                req.timestamp,
                req.nonce.unwrap_or_default(),
                req.body
            ),
            PrehashLayout::KeyPrefixed => {
                format!("{}{}{}", self.credentials.api_key, req.timestamp, req.body)
            }
        }
    }

    pub fn sign(&self, req: &SignRequest<'_>) -> Result<String, AuthError> {
        let message = self.prehash(req);

        let mut mac = HmacSha256::new_from_slice(self.credentials.api_secret.as_bytes())
            .map_err(|e| AuthError::Hmac(e.to_string()))?;
        mac.update(message.as_bytes());
        let digest = mac.finalize().into_bytes();

        Ok(match self.encoding {
            DigestEncoding::Hex => hex::encode(digest),
            DigestEncoding::Base64 => BASE64.encode(digest),
            DigestEncoding::HexThenBase64 => BASE64.encode(hex::encode(digest)),
        })
    }
}
