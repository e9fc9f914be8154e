use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::tree::{Listing, ListingEntry, HTTP_DATE_FORMAT};

pub const FOLDER_DESCRIPTION_CONTEXT: &str = "http://remotestorage.io/spec/folder-description";
pub const FOLDER_DESCRIPTION_MIME: &str = "application/ld+json";

/// One entry of a folder description. Folders only carry their tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDescription {
    #[serde(rename = "ETag")]
    pub etag: String,
    #[serde(
        rename = "Content-Type",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub content_type: Option<String>,
    #[serde(
        rename = "Content-Length",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub content_length: Option<u64>,
    #[serde(
        rename = "Last-Modified",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub last_modified: Option<String>,
}

/// JSON-LD body served for a folder `GET`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderDescription {
    #[serde(rename = "@context")]
    pub context: String,
    pub items: BTreeMap<String, ItemDescription>,
}

impl From<&Listing> for FolderDescription {
    fn from(listing: &Listing) -> Self {
        let items = listing
            .entries
            .iter()
            .map(|entry| {
                let item = match entry {
                    ListingEntry::Folder { version, .. } => ItemDescription {
                        etag: version.to_string(),
                        content_type: None,
                        content_length: None,
                        last_modified: None,
                    },
                    ListingEntry::Document {
                        version,
                        mime,
                        length,
                        last_modified,
                        ..
                    } => ItemDescription {
                        etag: version.to_string(),
                        content_type: Some(mime.clone()),
                        content_length: Some(*length),
                        last_modified: Some(last_modified.format(HTTP_DATE_FORMAT).to_string()),
                    },
                };
                (entry.name().to_string(), item)
            })
            .collect();

        Self {
            context: FOLDER_DESCRIPTION_CONTEXT.to_string(),
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::path::RemotePath;
    use crate::version::{Salt, VersionEngine};

    #[test]
    fn test_folder_description_json() {
        let engine = VersionEngine::new(Salt::from_instance_id("listing"));
        let folder_version = engine.folder_version("sub/", []);
        let document_version = engine.folder_version("doc", []);
        let listing = Listing {
            path: RemotePath::parse("/f/").unwrap(),
            version: engine.folder_version("f/", [&folder_version, &document_version]),
            entries: vec![
                ListingEntry::Folder {
                    name: "sub/".to_string(),
                    version: folder_version,
                },
                ListingEntry::Document {
                    name: "doc".to_string(),
                    version: document_version,
                    mime: "text/plain".to_string(),
                    length: 5,
                    last_modified: Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0).unwrap(),
                },
            ],
        };

        let json = serde_json::to_value(FolderDescription::from(&listing)).unwrap();
        assert_eq!(json["@context"], FOLDER_DESCRIPTION_CONTEXT);
        assert_eq!(
            json["items"]["sub/"],
            serde_json::json!({ "ETag": folder_version.to_string() })
        );
        assert_eq!(
            json["items"]["doc"],
            serde_json::json!({
                "ETag": document_version.to_string(),
                "Content-Type": "text/plain",
                "Content-Length": 5,
                "Last-Modified": "Wed, 21 Oct 2015 07:28:00 GMT",
            })
        );
    }
}
