use crate::config::{Config, ConfigError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crop {
    Fill,
    Fit,
}

impl Crop {
    fn as_str(self) -> &'static str {
        match self {
            Crop::Fill => "fill",
            Crop::Fit => "fit",
        }
    }
}

/// Cloudinary delivery transformation, rendered as e.g. `c_fit,w_1920,h_1080,q_auto,f_auto`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transformation {
    pub crop: Crop,
    pub width: u32,
    pub height: u32,
    pub auto_quality: bool,
    pub auto_format: bool,
}

/// Grid card.
pub const THUMBNAIL: Transformation = Transformation {
    crop: Crop::Fill,
    width: 400,
    height: 400,
    auto_quality: true,
    auto_format: true,
};

/// Viewer and preload.
pub const FULL_SIZE: Transformation = Transformation {
    crop: Crop::Fit,
    width: 1920,
    height: 1080,
    auto_quality: true,
    auto_format: true,
};

impl Transformation {
    pub fn descriptor(&self) -> String {
        let mut parts = vec![
            format!("c_{}", self.crop.as_str()),
            format!("w_{}", self.width),
            format!("h_{}", self.height),
        ];
        if self.auto_quality {
            parts.push("q_auto".to_string());
        }
        if self.auto_format {
            parts.push("f_auto".to_string());
        }
        parts.join(",")
    }
}

/// Builds delivery URLs for one cloud. Pure: equal inputs give equal URLs,
/// which the preload cache relies on for its keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryUrls {
    origin: String,
    cloud_name: String,
}

impl DeliveryUrls {
    pub fn new(origin: impl Into<String>, cloud_name: impl Into<String>) -> Self {
        Self {
            origin: origin.into().trim_end_matches('/').to_string(),
            cloud_name: cloud_name.into(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let cloud_name = config
            .cloud_name
            .clone()
            .ok_or(ConfigError::Missing("CLOUDINARY_CLOUD_NAME"))?;
        Ok(Self::new(config.delivery_origin.clone(), cloud_name))
    }

    pub fn image(&self, id: &str, transformation: &Transformation) -> String {
        format!(
            "{}/{}/image/upload/{}/{}",
            self.origin,
            self.cloud_name,
            transformation.descriptor(),
            id
        )
    }

    pub fn thumbnail(&self, id: &str) -> String {
        self.image(id, &THUMBNAIL)
    }

    pub fn full_size(&self, id: &str) -> String {
        self.image(id, &FULL_SIZE)
    }

    /// Original asset served with `Content-Disposition: attachment`.
    pub fn download(&self, id: &str) -> String {
        format!(
            "{}/{}/image/upload/fl_attachment/{}.jpg",
            self.origin, self.cloud_name, id
        )
    }
}
