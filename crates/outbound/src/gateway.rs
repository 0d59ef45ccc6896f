//! The messaging gateway seen from this crate: endpoints, the response
//! envelope and the transport trait.

use std::{fmt, time::Duration};

use {
    async_trait::async_trait,
    serde::{Deserialize, Deserializer, Serialize},
    serde_json::Value,
};

use crate::error::Result;

/// Gateway operations used for outbound messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    SendText,
    UploadImage,
    SendVideo,
    UploadFile,
    SendCdnFile,
    SendApp,
    SendVoice,
    ShareCard,
}

impl Endpoint {
    /// Path relative to the gateway base URL.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SendText => "Msg/SendTxt",
            Self::UploadImage => "Msg/UploadImg",
            Self::SendVideo => "Msg/SendVideo",
            Self::UploadFile => "Tools/UploadFile",
            Self::SendCdnFile => "Msg/SendCDNFile",
            Self::SendApp => "Msg/SendApp",
            Self::SendVoice => "Msg/SendVoice",
            Self::ShareCard => "Msg/ShareCard",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON envelope every gateway endpoint answers with.
///
/// Deserialization is lenient: missing or `null` fields take their
/// defaults and a non-string `Message` is kept as its JSON text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct GatewayResponse {
    #[serde(deserialize_with = "lenient_bool")]
    pub success: bool,
    pub code: Value,
    #[serde(deserialize_with = "lenient_string")]
    pub message: Option<String>,
    pub data: Value,
}

impl GatewayResponse {
    #[must_use]
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            ..Self::default()
        }
    }
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

/// Transport to the gateway.
///
/// `timeout` overrides the transport's default for slow calls such as
/// video uploads.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    async fn call(
        &self,
        endpoint: Endpoint,
        payload: Value,
        timeout: Option<Duration>,
    ) -> Result<GatewayResponse>;
}
