use crate::shared::geometry::Rect;

/// The last face seen in this session.
///
/// Overwritten by every fresh detection, left alone when detection fails,
/// and only emptied by [`StickyMemory::clear`] at a session boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StickyMemory {
    last_face: Option<Rect>,
}

impl StickyMemory {
    pub fn remember(&mut self, face: Rect) {
        self.last_face = Some(face);
    }

    pub fn last_face(&self) -> Option<Rect> {
        self.last_face
    }

    pub fn clear(&mut self) {
        self.last_face = None;
    }

    pub fn is_empty(&self) -> bool {
        self.last_face.is_none()
    }
}
