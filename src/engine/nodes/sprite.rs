use crate::engine::loader::{ImageData, LoadState};
use crate::engine::surface::Surface;
use crate::types::Size;

use super::{Draw, Props};

#[derive(Debug, Clone, PartialEq)]
pub enum ImageState {
    /// No source assigned.
    Unset,
    /// Source assigned, not yet handed to the loader.
    Queued,
    Loading,
    Ready(ImageData),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct Sprite {
    pub src: Option<String>,
    /// Percentage of the base size to draw at; `100.0` is the original size.
    pub ratio: Option<f64>,
    image: ImageState,
    resolved: Option<Size>,
}

impl Sprite {
    pub fn new(src: Option<&str>, ratio: Option<f64>) -> Self {
        Sprite {
            src: src.map(str::to_string),
            ratio,
            image: if src.is_some() { ImageState::Queued } else { ImageState::Unset },
            resolved: None,
        }
    }

    /// Point the sprite at a new image. The ratio is only replaced when one is
    /// given.
    pub fn set_source(&mut self, src: &str, ratio: Option<f64>) {
        self.src = Some(src.to_string());
        if ratio.is_some() {
            self.ratio = ratio;
        }
        self.image = ImageState::Queued;
        self.resolved = None;
    }

    pub fn state(&self) -> &ImageState {
        &self.image
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.image, ImageState::Ready(_))
    }

    /// Natural pixel size once loaded.
    pub fn natural_size(&self) -> Option<Size> {
        match &self.image {
            ImageState::Ready(img) => Some(Size::new(img.width as f64, img.height as f64)),
            _ => None,
        }
    }

    /// Size resolved on the last draw.
    pub fn resolved_size(&self) -> Option<Size> {
        self.resolved
    }

    pub(crate) fn take_queued(&mut self) -> Option<&str> {
        if self.image != ImageState::Queued {
            return None;
        }
        self.image = ImageState::Loading;
        self.src.as_deref()
    }

    /// Fold a loader result into the sprite. Returns the failure reason when
    /// the load just failed.
    pub(crate) fn apply_load(&mut self, state: LoadState) -> Option<String> {
        match state {
            LoadState::Pending => None,
            LoadState::Ready(img) => {
                self.image = ImageState::Ready(img);
                None
            }
            LoadState::Failed(reason) => {
                self.image = ImageState::Failed(reason.clone());
                Some(reason)
            }
        }
    }

    /// Configured size when set, natural size otherwise, scaled by `ratio`.
    pub fn effective_size(&self, props: &Props) -> Option<Size> {
        let natural = self.natural_size()?;
        let base = if props.size.is_zero() { natural } else { props.size };
        Some(match self.ratio {
            Some(r) => Size::new(base.width * r / 100.0, base.height * r / 100.0),
            None => base,
        })
    }
}

impl Draw for Sprite {
    fn draw(&mut self, props: &mut Props, surface: &mut dyn Surface) {
        let (ImageState::Ready(img), Some(size)) = (&self.image, self.effective_size(props)) else {
            let rect = props.anchored_rect(props.size);
            props.paint_rect(surface, rect);
            return;
        };
        self.resolved = Some(size);
        let rect = props.anchored_rect(size);
        surface.draw_image(img, rect);
    }

    fn footprint(&self, props: &Props) -> Size {
        self.resolved.unwrap_or(props.size)
    }
}
