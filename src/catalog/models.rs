use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{EnumString, IntoStaticStr};

use super::record::{AssetRef, Record, RecordKind};


#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Material {
    Wood,
    Aluminum,
    StainlessSteel,
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub slug: String,
    pub category: Material,
    pub price: u64,
    pub description: String,

    #[serde(default)]
    pub images: Vec<AssetRef>,
    #[serde(default)]
    pub featured: bool,

    #[serde(default)]
    pub specifications: BTreeMap<String, String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub includes: Vec<String>,
}

impl Product {
    pub fn new(name: impl Into<String>, category: Material, price: u64) -> Self {
        let name = name.into();
        Self {
            slug: slugify(&name),
            name,
            category,
            price,
            description: String::new(),
            images: Vec::new(),
            featured: false,
            specifications: BTreeMap::new(),
            features: Vec::new(),
            includes: Vec::new(),
        }
    }

    pub fn with_images<I, A>(mut self, images: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<AssetRef>,
    {
        self.images = images.into_iter().map(Into::into).collect();
        self
    }
}

impl Record for Product {
    const KIND: RecordKind = RecordKind::Product;

    fn label(&self) -> String {
        self.name.clone()
    }

    fn asset_refs(&self) -> Vec<AssetRef> {
        self.images.clone()
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryImage {
    pub title: String,
    pub url: AssetRef,
    #[serde(default)]
    pub category: Option<String>,
}

impl Record for GalleryImage {
    const KIND: RecordKind = RecordKind::GalleryImage;

    fn label(&self) -> String {
        if self.title.trim().is_empty() {
            "Gallery Image".to_string()
        } else {
            self.title.clone()
        }
    }

    fn asset_refs(&self) -> Vec<AssetRef> {
        vec![self.url.clone()]
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlogPost {
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub image: Option<AssetRef>,
    pub content: String,
    #[serde(default)]
    pub published: bool,
}

impl Record for BlogPost {
    const KIND: RecordKind = RecordKind::BlogPost;

    fn label(&self) -> String {
        self.title.clone()
    }

    fn asset_refs(&self) -> Vec<AssetRef> {
        self.image.iter().cloned().collect()
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Faq {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub order: u32,
}

impl Record for Faq {
    const KIND: RecordKind = RecordKind::Faq;

    fn label(&self) -> String {
        self.question.clone()
    }

    fn asset_refs(&self) -> Vec<AssetRef> {
        Vec::new()
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Testimonial {
    pub name: String,
    pub quote: String,
    #[serde(default)]
    pub photo: Option<AssetRef>,
    pub rating: u8,
}

impl Record for Testimonial {
    const KIND: RecordKind = RecordKind::Testimonial;

    fn label(&self) -> String {
        self.name.clone()
    }

    fn asset_refs(&self) -> Vec<AssetRef> {
        self.photo.iter().cloned().collect()
    }
}


pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}
