use lopdf::ObjectId;
use serde::{Deserialize, Serialize};

use super::content::ContentInstruction;
use crate::error::{PdfSuiteError, Result};

/// Page rotation, clockwise, as written to `/Rotate`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    None,
    Clockwise90,
    Clockwise180,
    Clockwise270,
}

impl Rotation {
    pub fn degrees(self) -> i64 {
        match self {
            Rotation::None => 0,
            Rotation::Clockwise90 => 90,
            Rotation::Clockwise180 => 180,
            Rotation::Clockwise270 => 270,
        }
    }

    /// Normalize any multiple of 90 (negative included) into a rotation.
    pub fn from_degrees(degrees: i64) -> Result<Self> {
        if degrees % 90 != 0 {
            return Err(PdfSuiteError::invalid_option(
                "degrees",
                format!("rotation must be a multiple of 90, got {}", degrees),
            ));
        }
        Ok(match degrees.rem_euclid(360) {
            0 => Rotation::None,
            90 => Rotation::Clockwise90,
            180 => Rotation::Clockwise180,
            _ => Rotation::Clockwise270,
        })
    }

    /// Additive rotation, modulo 360.
    pub fn rotate_by(self, degrees: i64) -> Result<Self> {
        let delta = Self::from_degrees(degrees)?;
        Self::from_degrees(self.degrees() + delta.degrees())
    }
}

/// Page geometry as stored in `/MediaBox`: `[llx lly urx ury]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MediaBox {
    pub llx: f32,
    pub lly: f32,
    pub urx: f32,
    pub ury: f32,
}

impl MediaBox {
    pub fn from_size(width: f32, height: f32) -> Self {
        Self {
            llx: 0.0,
            lly: 0.0,
            urx: width,
            ury: height,
        }
    }

    pub fn width(&self) -> f32 {
        (self.urx - self.llx).abs()
    }

    pub fn height(&self) -> f32 {
        (self.ury - self.lly).abs()
    }
}

#[derive(Debug, Clone)]
pub struct Page {
    /// Page dictionary in the owning document's base graph; `None` for blank
    /// pages created in memory.
    pub(crate) base: Option<ObjectId>,
    media_box: MediaBox,
    rotation: Rotation,
    instructions: Vec<ContentInstruction>,
}

impl Page {
    pub fn blank(width: f32, height: f32) -> Self {
        Self {
            base: None,
            media_box: MediaBox::from_size(width, height),
            rotation: Rotation::None,
            instructions: Vec::new(),
        }
    }

    pub(crate) fn from_base(base: ObjectId, media_box: MediaBox, rotation: Rotation) -> Self {
        Self {
            base: Some(base),
            media_box,
            rotation,
            instructions: Vec::new(),
        }
    }

    pub(crate) fn with_base(&self, base: Option<ObjectId>) -> Self {
        Self {
            base,
            ..self.clone()
        }
    }

    pub fn width(&self) -> f32 {
        self.media_box.width()
    }

    pub fn height(&self) -> f32 {
        self.media_box.height()
    }

    pub fn media_box(&self) -> MediaBox {
        self.media_box
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub(crate) fn rotate_by(&mut self, degrees: i64) -> Result<()> {
        self.rotation = self.rotation.rotate_by(degrees)?;
        Ok(())
    }

    pub fn instructions(&self) -> &[ContentInstruction] {
        &self.instructions
    }

    pub(crate) fn push_instruction(&mut self, instruction: ContentInstruction) {
        self.instructions.push(instruction);
    }

    /// Remove one instruction; edits are expressed as removal followed by a
    /// fresh append.
    pub fn remove_instruction(&mut self, index: usize) -> Option<ContentInstruction> {
        if index < self.instructions.len() {
            Some(self.instructions.remove(index))
        } else {
            None
        }
    }

    pub(crate) fn pop_instruction(&mut self) -> Option<ContentInstruction> {
        self.instructions.pop()
    }

    pub(crate) fn instructions_mut(&mut self) -> &mut Vec<ContentInstruction> {
        &mut self.instructions
    }

    pub fn is_blank(&self) -> bool {
        self.base.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::content::{Color, ShapeKind};

    #[test]
    fn test_rotation_is_additive_modulo_360() {
        let r = Rotation::None.rotate_by(90).unwrap().rotate_by(90).unwrap();
        assert_eq!(r, Rotation::Clockwise180);
        assert_eq!(r.rotate_by(270).unwrap(), Rotation::Clockwise90);
        assert_eq!(Rotation::Clockwise90.rotate_by(-90).unwrap(), Rotation::None);
        assert_eq!(Rotation::from_degrees(720).unwrap(), Rotation::None);
    }

    #[test]
    fn test_rotation_rejects_non_right_angles() {
        assert!(Rotation::None.rotate_by(45).is_err());
    }

    #[test]
    fn test_remove_instruction_keeps_others_in_order() {
        let mut page = Page::blank(100.0, 100.0);
        for i in 0..3 {
            page.push_instruction(ContentInstruction::Shape {
                kind: ShapeKind::Rectangle,
                x: i as f32,
                y: 0.0,
                width: 1.0,
                height: 1.0,
                color: Color::BLACK,
                opacity: 1.0,
            });
        }
        assert!(page.remove_instruction(1).is_some());
        assert!(page.remove_instruction(5).is_none());
        let xs: Vec<f32> = page
            .instructions()
            .iter()
            .map(|i| match i {
                ContentInstruction::Shape { x, .. } => *x,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(xs, vec![0.0, 2.0]);
    }

    #[test]
    fn test_media_box_with_offset_origin() {
        let mb = MediaBox {
            llx: 10.0,
            lly: 20.0,
            urx: 622.0,
            ury: 812.0,
        };
        assert_eq!(mb.width(), 612.0);
        assert_eq!(mb.height(), 792.0);
    }
}
