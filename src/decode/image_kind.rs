//! Page image recognition by file name

/// MIME type used when an entry's extension is not one we know
pub const DEFAULT_MIME: &str = "image/jpeg";

/// Raster formats accepted as comic pages
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Bmp,
    Webp,
    Gif,
}

impl ImageKind {
    /// Classify by the text after the last `.`, ignoring case
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Some(ImageKind::Jpeg),
            "png" => Some(ImageKind::Png),
            "bmp" => Some(ImageKind::Bmp),
            "webp" => Some(ImageKind::Webp),
            "gif" => Some(ImageKind::Gif),
            _ => None,
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
            ImageKind::Bmp => "image/bmp",
            ImageKind::Webp => "image/webp",
            ImageKind::Gif => "image/gif",
        }
    }
}

pub fn is_page_image(name: &str) -> bool {
    ImageKind::from_name(name).is_some()
}

pub fn mime_for_name(name: &str) -> &'static str {
    ImageKind::from_name(name).map_or(DEFAULT_MIME, ImageKind::mime)
}

/// Pixel dimensions from the image header, or 0x0 when unreadable
pub fn sniff_dimensions(data: &[u8]) -> (u32, u32) {
    match imagesize::blob_size(data) {
        Ok(size) => (
            u32::try_from(size.width).unwrap_or(0),
            u32::try_from(size.height).unwrap_or(0),
        ),
        Err(_) => (0, 0),
    }
}
