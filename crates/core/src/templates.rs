use std::path::{Path, PathBuf};

use image::RgbImage;
use thiserror::Error;

use crate::types::{Slot, SlotInfo};

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("{slot} image not found: {}", path.display())]
    Missing { slot: Slot, path: PathBuf },
    #[error("failed to decode {slot} image {}: {source}", path.display())]
    Decode {
        slot: Slot,
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Reference images, loaded once when a scan loop starts.
pub struct TemplateSet {
    pub target: RgbImage,
    pub button: RgbImage,
    pub approved: Option<RgbImage>,
    pub stop: Option<RgbImage>,
}

impl TemplateSet {
    /// Load all slots from `dir`. Missing optional slots disable their
    /// feature; a missing or undecodable required slot is an error.
    pub fn load(dir: &Path) -> Result<Self, TemplateError> {
        // Check both required files before decoding anything.
        for slot in [Slot::Target, Slot::Button] {
            let path = dir.join(slot.file_name());
            if !path.is_file() {
                return Err(TemplateError::Missing { slot, path });
            }
        }

        Ok(Self {
            target: load_slot(dir, Slot::Target)?,
            button: load_slot(dir, Slot::Button)?,
            approved: load_optional(dir, Slot::Approved)?,
            stop: load_optional(dir, Slot::Stop)?,
        })
    }

    pub fn get(&self, slot: Slot) -> Option<&RgbImage> {
        match slot {
            Slot::Target => Some(&self.target),
            Slot::Button => Some(&self.button),
            Slot::Approved => self.approved.as_ref(),
            Slot::Stop => self.stop.as_ref(),
        }
    }

    pub fn describe(&self, dir: &Path) -> Vec<SlotInfo> {
        Slot::ALL
            .iter()
            .map(|&slot| SlotInfo {
                slot,
                path: dir.join(slot.file_name()),
                size: self.get(slot).map(|img| img.dimensions()),
            })
            .collect()
    }

    /// Report which slot files exist in `dir` without keeping pixels.
    pub fn survey(dir: &Path) -> Vec<SlotInfo> {
        Slot::ALL
            .iter()
            .map(|&slot| {
                let path = dir.join(slot.file_name());
                let size = if path.is_file() {
                    image::image_dimensions(&path).ok()
                } else {
                    None
                };
                SlotInfo { slot, path, size }
            })
            .collect()
    }
}

fn load_slot(dir: &Path, slot: Slot) -> Result<RgbImage, TemplateError> {
    let path = dir.join(slot.file_name());
    match image::open(&path) {
        Ok(img) => Ok(img.to_rgb8()),
        Err(source) => Err(TemplateError::Decode { slot, path, source }),
    }
}

fn load_optional(dir: &Path, slot: Slot) -> Result<Option<RgbImage>, TemplateError> {
    if dir.join(slot.file_name()).is_file() {
        load_slot(dir, slot).map(Some)
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn write_png(dir: &Path, slot: Slot, w: u32, h: u32) {
        RgbImage::from_pixel(w, h, Rgb([10, 20, 30]))
            .save(dir.join(slot.file_name()))
            .unwrap();
    }

    #[test]
    fn loads_required_and_skips_absent_optional() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), Slot::Target, 8, 6);
        write_png(dir.path(), Slot::Button, 4, 3);
        write_png(dir.path(), Slot::Stop, 5, 5);

        let set = TemplateSet::load(dir.path()).unwrap();
        assert_eq!(set.target.dimensions(), (8, 6));
        assert_eq!(set.button.dimensions(), (4, 3));
        assert!(set.approved.is_none());
        assert_eq!(set.stop.as_ref().map(|i| i.dimensions()), Some((5, 5)));

        let info = set.describe(dir.path());
        assert_eq!(info.len(), 4);
        assert_eq!(info[2].slot, Slot::Approved);
        assert_eq!(info[2].size, None);
    }

    #[test]
    fn missing_button_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), Slot::Target, 8, 6);

        match TemplateSet::load(dir.path()) {
            Err(TemplateError::Missing { slot, path }) => {
                assert_eq!(slot, Slot::Button);
                assert!(path.ends_with("btn.png"));
            }
            other => panic!("expected missing button, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn garbage_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), Slot::Target, 8, 6);
        std::fs::write(dir.path().join("btn.png"), b"not an image").unwrap();

        let err = TemplateSet::load(dir.path()).err().unwrap();
        assert!(matches!(err, TemplateError::Decode { slot: Slot::Button, .. }));
    }

    #[test]
    fn survey_reads_sizes_only_for_present_files() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), Slot::Button, 12, 7);

        let info = TemplateSet::survey(dir.path());
        let sizes: Vec<_> = info.iter().map(|i| (i.slot, i.size)).collect();
        assert_eq!(
            sizes,
            vec![
                (Slot::Target, None),
                (Slot::Button, Some((12, 7))),
                (Slot::Approved, None),
                (Slot::Stop, None),
            ]
        );
    }
}
