use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::media::MediaItem;

/// Queue message linking an ingested item to the blob the worker must fetch.
///
/// Carries enough context to process without a metadata read on the hot
/// path; the worker still re-reads the record for the idempotency check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkMessage {
    pub media_id: Uuid,
    pub blob_key: String,
    pub content_type: String,
}

impl WorkMessage {
    pub fn for_item(item: &MediaItem) -> Self {
        WorkMessage {
            media_id: item.id,
            blob_key: item.original_key.clone(),
            content_type: item.content_type.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_uses_camel_case() {
        let item = MediaItem::new("photo.jpg", "image/jpeg").unwrap();
        let msg = WorkMessage::for_item(&item);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["mediaId"], serde_json::json!(item.id));
        assert_eq!(json["blobKey"], serde_json::json!(item.original_key));
        assert_eq!(json["contentType"], "image/jpeg");

        let back: WorkMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }
}
