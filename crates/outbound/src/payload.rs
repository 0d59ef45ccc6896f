//! Request bodies, field-for-field as the gateway expects them.

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    gateway::GatewayResponse,
};

/// Default `Type` for app messages.
pub const APP_MESSAGE_TYPE: i32 = 5;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SendText<'a> {
    pub at: &'a str,
    pub content: &'a str,
    pub to_wxid: &'a str,
    #[serde(rename = "Type")]
    pub msg_type: i32,
    pub wxid: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadImage<'a> {
    #[serde(rename = "Wxid")]
    pub wxid: &'a str,
    #[serde(rename = "ToWxid")]
    pub to_wxid: &'a str,
    pub base64: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendVideo<'a> {
    #[serde(rename = "Wxid")]
    pub wxid: &'a str,
    #[serde(rename = "ToWxid")]
    pub to_wxid: &'a str,
    pub base64: String,
    #[serde(rename = "ImageBase64")]
    pub image_base64: String,
    #[serde(rename = "PlayLength")]
    pub play_length: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UploadFile<'a> {
    pub base64: String,
    pub wxid: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SendCdnFile<'a> {
    pub wxid: &'a str,
    pub to_wxid: &'a str,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SendApp<'a> {
    pub wxid: &'a str,
    pub to_wxid: &'a str,
    pub xml: String,
    #[serde(rename = "Type")]
    pub msg_type: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SendVoice<'a> {
    pub wxid: &'a str,
    pub to_wxid: &'a str,
    pub base64: &'a str,
    pub voice_time: u64,
    #[serde(rename = "Type")]
    pub codec: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShareCard<'a> {
    #[serde(rename = "Wxid")]
    pub wxid: &'a str,
    #[serde(rename = "ToWxid")]
    pub to_wxid: &'a str,
    #[serde(rename = "CardWxId")]
    pub card_wxid: &'a str,
    #[serde(rename = "CardNickName")]
    pub card_nickname: &'a str,
    #[serde(rename = "CardAlias")]
    pub card_alias: &'a str,
}

/// A file stored on the gateway's CDN, ready to be referenced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    #[serde(rename = "mediaId")]
    pub media_id: String,
    #[serde(rename = "totalLen", default)]
    pub total_len: u64,
}

impl UploadedFile {
    /// Extract the media id and length from an upload response.
    pub fn from_response(resp: &GatewayResponse) -> Result<Self> {
        if !resp.success {
            return Err(Error::upload(
                resp.message
                    .clone()
                    .unwrap_or_else(|| "gateway reported failure".into()),
            ));
        }
        let media_id = match &resp.data["mediaId"] {
            serde_json::Value::String(id) if !id.is_empty() => id.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            _ => return Err(Error::upload("response carries no media id")),
        };
        let total_len = match &resp.data["totalLen"] {
            serde_json::Value::Number(n) => n.as_u64().unwrap_or(0),
            serde_json::Value::String(s) => s.parse().unwrap_or(0),
            _ => 0,
        };
        Ok(Self {
            media_id,
            total_len,
        })
    }
}
