//! Per-face energy routing for electrical segments.
//!
//! Each segment type declares an ordered list of connection faces. Every
//! declared face carries a [`FaceMode`]; an authoritative hammer interaction
//! cycles it `None -> Input -> Output -> None`. Routing is persisted as the
//! list of mode ordinals in declaration order and matched back positionally.

use serde::{Deserialize, Serialize};
use shaftwork_core::geometry::{BlockPos, Facing};

/// Direction energy may cross a connection face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FaceMode {
    #[default]
    None,
    Input,
    Output,
}

impl FaceMode {
    pub fn next(self) -> FaceMode {
        match self {
            FaceMode::None => FaceMode::Input,
            FaceMode::Input => FaceMode::Output,
            FaceMode::Output => FaceMode::None,
        }
    }

    pub fn ordinal(self) -> i32 {
        match self {
            FaceMode::None => 0,
            FaceMode::Input => 1,
            FaceMode::Output => 2,
        }
    }

    pub fn from_ordinal(ordinal: i32) -> Option<FaceMode> {
        match ordinal {
            0 => Some(FaceMode::None),
            1 => Some(FaceMode::Input),
            2 => Some(FaceMode::Output),
            _ => None,
        }
    }
}

/// A face of one block of a segment, in segment-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockFace {
    /// Block position relative to the segment origin.
    pub offset: BlockPos,
    /// Face of that block, in the local frame.
    pub face: Facing,
}

impl BlockFace {
    pub const fn new(offset: BlockPos, face: Facing) -> Self {
        Self { offset, face }
    }
}

/// Error restoring routing from saved ordinals.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown face mode ordinal {0}")]
pub struct UnknownFaceMode(pub i32);

/// Modes of a segment's declared faces, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideRouting {
    faces: Vec<BlockFace>,
    modes: Vec<FaceMode>,
}

impl SideRouting {
    /// Every declared face starts as [`FaceMode::None`].
    pub fn new(faces: &[BlockFace]) -> Self {
        Self {
            faces: faces.to_vec(),
            modes: vec![FaceMode::None; faces.len()],
        }
    }

    pub fn faces(&self) -> &[BlockFace] {
        &self.faces
    }

    pub fn connection_count(&self) -> usize {
        self.faces.len()
    }

    fn index_of(&self, face: &BlockFace) -> Option<usize> {
        self.faces.iter().position(|f| f == face)
    }

    pub fn is_declared(&self, face: &BlockFace) -> bool {
        self.index_of(face).is_some()
    }

    /// Mode of `face`; undeclared faces are always `None`.
    pub fn mode(&self, face: &BlockFace) -> FaceMode {
        self.index_of(face).map_or(FaceMode::None, |i| self.modes[i])
    }

    /// Advance the mode of a declared face. Returns the new mode, or `None`
    /// if the face is not declared.
    pub fn cycle(&mut self, face: &BlockFace) -> Option<FaceMode> {
        let i = self.index_of(face)?;
        self.modes[i] = self.modes[i].next();
        Some(self.modes[i])
    }

    /// Output faces, in declaration order.
    pub fn outputs(&self) -> impl Iterator<Item = &BlockFace> {
        self.faces
            .iter()
            .zip(&self.modes)
            .filter(|(_, m)| **m == FaceMode::Output)
            .map(|(f, _)| f)
    }

    pub fn to_ordinals(&self) -> Vec<i32> {
        self.modes.iter().map(|m| m.ordinal()).collect()
    }

    /// Rebuild routing for `faces` from saved ordinals.
    ///
    /// Matching is positional: extra saved entries are ignored and missing
    /// ones default to `None`. A length mismatch is logged, not repaired.
    pub fn from_ordinals(faces: &[BlockFace], ordinals: &[i32]) -> Result<Self, UnknownFaceMode> {
        if ordinals.len() != faces.len() {
            tracing::warn!(
                declared = faces.len(),
                saved = ordinals.len(),
                "side routing length mismatch, matching positionally"
            );
        }
        let mut routing = Self::new(faces);
        for (mode, &ordinal) in routing.modes.iter_mut().zip(ordinals) {
            *mode = FaceMode::from_ordinal(ordinal).ok_or(UnknownFaceMode(ordinal))?;
        }
        Ok(routing)
    }
}
