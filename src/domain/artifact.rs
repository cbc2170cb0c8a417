//! Wallet payment artifacts
//!
//! An artifact is what the guest scans or follows to pay with a wallet: either
//! an inline QR image or a redirect link into the wallet app.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Wallet channel
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PaymentChannel {
    #[serde(rename = "WECHAT")]
    WeChat,
    #[serde(rename = "ALIPAY")]
    Alipay,
}

impl PaymentChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentChannel::WeChat => "WECHAT",
            PaymentChannel::Alipay => "ALIPAY",
        }
    }
}

impl std::fmt::Display for PaymentChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "wechat" => Ok(PaymentChannel::WeChat),
            "alipay" => Ok(PaymentChannel::Alipay),
            _ => Err(format!("unsupported payment channel: {}", s)),
        }
    }
}

/// Classified artifact payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactPayload {
    /// QR image rendered in-page
    InlineImage { mime: String, bytes: Vec<u8> },
    /// Hand-off into the wallet app or its hosted page
    RedirectLink(String),
}

const BARE_BASE64_MIN_LEN: usize = 64;

fn data_uri_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)^data:(image/[^;,]+)((?:;[^,]*)?),(.*)$").expect("data URI pattern compiles")
    })
}

fn bare_base64_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9+/]+={0,2}$").expect("base64 pattern compiles")
    })
}

impl ArtifactPayload {
    /// Classify a raw payload string returned by the provisioning endpoint.
    ///
    /// Any `data:image/...` URI is an inline image. Its body is decoded when the
    /// URI is marked `;base64` and decodes cleanly, otherwise the raw body bytes
    /// are kept. Long bare base64 strings are inline PNGs. Everything else is a
    /// redirect.
    pub fn classify(raw: &str) -> Self {
        let raw = raw.trim();

        if let Some(caps) = data_uri_pattern().captures(raw) {
            let is_base64 = caps[2]
                .split(';')
                .any(|param| param.trim().eq_ignore_ascii_case("base64"));
            let body = &caps[3];
            let bytes = if is_base64 {
                let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
                STANDARD.decode(compact).unwrap_or_else(|_| body.as_bytes().to_vec())
            } else {
                body.as_bytes().to_vec()
            };
            return ArtifactPayload::InlineImage {
                mime: caps[1].to_string(),
                bytes,
            };
        }

        if raw.len() >= BARE_BASE64_MIN_LEN && bare_base64_pattern().is_match(raw) {
            if let Ok(bytes) = STANDARD.decode(raw) {
                return ArtifactPayload::InlineImage {
                    mime: "image/png".to_string(),
                    bytes,
                };
            }
        }

        ArtifactPayload::RedirectLink(raw.to_string())
    }

    pub fn is_inline_image(&self) -> bool {
        matches!(self, ArtifactPayload::InlineImage { .. })
    }
}

/// A provisioned wallet payment artifact. At most one is live per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentArtifact {
    pub artifact_id: String,
    pub channel: PaymentChannel,
    pub payload: ArtifactPayload,
    pub issued_at: DateTime<Utc>,
}
