use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RichMenuSize {
    pub width: u32,
    pub height: u32,
}

/// A LINE rich menu. Tap areas are passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RichMenu {
    pub id: String,
    pub name: String,
    pub size: RichMenuSize,
    pub selected: bool,
    pub chat_bar_text: String,
    #[serde(default)]
    pub areas: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRichMenuRequest {
    pub name: String,
    pub size: RichMenuSize,
    pub selected: bool,
    pub chat_bar_text: String,
    #[serde(default)]
    pub areas: Vec<Value>,
}

/// Raw LINE webhook payload forwarded to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookRequest {
    pub events: Vec<Value>,
}

/// Rich menu image sent as the `image` part of a multipart upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RichMenuImage {
    pub rich_menu_id: String,
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl RichMenuImage {
    /// Content type follows the file extension; LINE accepts PNG and JPEG.
    pub fn new(rich_menu_id: impl Into<String>, file_name: impl Into<String>, data: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        let content_type = match extension.as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            _ => "application/octet-stream",
        };
        Self {
            rich_menu_id: rich_menu_id.into(),
            file_name,
            content_type: content_type.to_string(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_content_type_from_extension() {
        assert_eq!(RichMenuImage::new("rm-1", "menu.PNG", vec![]).content_type, "image/png");
        assert_eq!(RichMenuImage::new("rm-1", "menu.jpeg", vec![]).content_type, "image/jpeg");
        assert_eq!(
            RichMenuImage::new("rm-1", "menu", vec![]).content_type,
            "application/octet-stream"
        );
    }
}
