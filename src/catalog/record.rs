

use std::fmt;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use url::Url;


#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}


#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Product,
    GalleryImage,
    BlogPost,
    Faq,
    Testimonial,
}

impl RecordKind {
    /// Human wording used in prompts and notifications.
    pub fn noun(&self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::GalleryImage => "gallery image",
            Self::BlogPost => "blog post",
            Self::Faq => "FAQ",
            Self::Testimonial => "testimonial",
        }
    }
}


lazy_static! {
    static ref VERSION_SEGMENT: Regex = Regex::new(r"^v\d+$").unwrap();
}

/// Reference to a remotely hosted asset, usually an uploaded image URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetRef(String);

impl AssetRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }


    pub fn host(&self) -> Option<String> {
        Url::parse(&self.0)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
    }

    /// True when the ref lives on `host` or one of its subdomains.
    pub fn is_hosted_on(&self, host: &str) -> bool {
        match self.host() {
            Some(own) => own == host || own.ends_with(&format!(".{}", host)),
            None => false,
        }
    }

    /// Public id of the asset on the image CDN: the path after `upload/` and
    /// any version segment, without the file extension.
    pub fn public_id(&self) -> Option<String> {
        let url = Url::parse(&self.0).ok()?;
        let segments: Vec<&str> = url.path_segments()?.collect();
        let upload = segments.iter().position(|s| *s == "upload")?;

        let after_upload = &segments[upload + 1..];
        // Transformations sit before the version segment, the public id after it.
        let start = after_upload
            .iter()
            .position(|s| VERSION_SEGMENT.is_match(s))
            .map(|i| i + 1)
            .unwrap_or(0);

        let rest: Vec<&str> = after_upload[start..]
            .iter()
            .copied()
            .filter(|s| !s.is_empty())
            .collect();

        let (last, dirs) = rest.split_last()?;
        let stem = match last.rfind('.') {
            Some(dot) if dot > 0 => &last[..dot],
            _ => last,
        };

        let mut parts: Vec<&str> = dirs.to_vec();
        parts.push(stem);
        Some(parts.join("/"))
    }
}

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetRef {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<String> for AssetRef {
    fn from(url: String) -> Self {
        Self(url)
    }
}


pub trait Record: Clone + fmt::Debug + Send + Sync + 'static {
    const KIND: RecordKind;


    fn label(&self) -> String;

    /// Remote assets owned by this record, in display order.
    fn asset_refs(&self) -> Vec<AssetRef>;
}

/// A record as held by the primary store: store-assigned identity and
/// timestamps around the record's own fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stored<R> {
    pub id: RecordId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub record: R,
}

impl<R: Record> Stored<R> {

    pub fn new(id: RecordId, record: R) -> Self {
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            updated_at: now,
            record,
        }
    }


    pub fn label(&self) -> String {
        self.record.label()
    }


    pub fn asset_refs(&self) -> Vec<AssetRef> {
        self.record.asset_refs()
    }

    /// Drops identity and timestamps, leaving what a fresh `create` needs.
    pub fn into_record(self) -> R {
        self.record
    }
}
