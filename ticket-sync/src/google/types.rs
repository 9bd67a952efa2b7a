//! Calendar and Drive wire types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Private extended property that carries the dedup key.
pub const DEDUP_PROPERTY: &str = "dedup_key";

/// A calendar event as sent to `events.insert`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub summary: String,
    pub location: String,
    pub description: String,
    pub start: EventDateTime,
    pub end: EventDateTime,
    pub reminders: Reminders,
    pub color_id: String,
    pub extended_properties: ExtendedProperties,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    /// RFC 3339 with offset.
    pub date_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminders {
    pub use_default: bool,
    pub overrides: Vec<ReminderOverride>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderOverride {
    pub method: String,
    pub minutes: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedProperties {
    #[serde(default)]
    pub private: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub file_id: String,
    pub title: String,
    pub mime_type: String,
    pub file_url: String,
}

impl From<&UploadReference> for Attachment {
    fn from(upload: &UploadReference) -> Self {
        Self {
            file_id: upload.id.clone(),
            title: upload.name.clone(),
            mime_type: upload.mime_type.clone(),
            file_url: upload.view_link.clone(),
        }
    }
}

/// An event returned by list or insert. Only the fields we read.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventItem {
    pub id: String,
    #[serde(default)]
    pub html_link: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl EventItem {
    /// Link shown to the user; the id when the API gives no link.
    pub fn link(&self) -> String {
        self.html_link.clone().unwrap_or_else(|| self.id.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventList {
    #[serde(default)]
    pub items: Vec<EventItem>,
}

/// A file stored in Drive.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReference {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    #[serde(rename = "webViewLink")]
    pub view_link: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_wire_shape() {
        let mut private = BTreeMap::new();
        private.insert(DEDUP_PROPERTY.to_string(), "2345678901".to_string());
        let event = EventResource {
            id: None,
            summary: "Train from A to B".into(),
            location: "A".into(),
            description: "Seating: B1/23".into(),
            start: EventDateTime {
                date_time: "2025-12-19T10:00:00+05:30".into(),
            },
            end: EventDateTime {
                date_time: "2025-12-20T02:00:00+05:30".into(),
            },
            reminders: Reminders {
                use_default: false,
                overrides: vec![ReminderOverride {
                    method: "popup".into(),
                    minutes: 1440,
                }],
            },
            color_id: "9".into(),
            extended_properties: ExtendedProperties { private },
            attachments: Vec::new(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["start"]["dateTime"], "2025-12-19T10:00:00+05:30");
        assert_eq!(json["reminders"]["useDefault"], false);
        assert_eq!(json["colorId"], "9");
        assert_eq!(json["extendedProperties"]["private"]["dedup_key"], "2345678901");
        assert!(json.get("id").is_none());
        assert!(json.get("attachments").is_none());
    }

    #[test]
    fn upload_reference_from_drive() {
        let upload: UploadReference = serde_json::from_str(
            r#"{"id":"f1","name":"ticket.pdf","mimeType":"application/pdf",
                "webViewLink":"https://drive.google.com/file/d/f1/view"}"#,
        )
        .unwrap();
        let attachment = Attachment::from(&upload);
        assert_eq!(attachment.file_id, "f1");
        assert_eq!(attachment.file_url, "https://drive.google.com/file/d/f1/view");
    }

    #[test]
    fn link_falls_back_to_id() {
        let item: EventItem = serde_json::from_str(r#"{"id":"abc"}"#).unwrap();
        assert_eq!(item.link(), "abc");
    }
}
