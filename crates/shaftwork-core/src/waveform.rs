//! Electrical waveform tags.
//!
//! A [`Waveform`] describes the nature of the energy sitting in a buffer:
//! its kind (AC/DC/none), phase count, and where it came from. Values are
//! immutable; transformations return new values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WaveKind {
    None,
    Ac,
    Dc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phases {
    Single,
    Multi,
}

impl Phases {
    /// `Multi` for multi-phase capable segments, `Single` otherwise.
    pub fn from_multi(multi: bool) -> Self {
        if multi { Phases::Multi } else { Phases::Single }
    }
}

/// Where the energy originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    Rotation,
    External,
}

impl Source {
    pub fn flipped(self) -> Source {
        match self {
            Source::Rotation => Source::External,
            Source::External => Source::Rotation,
        }
    }
}

// ---------------------------------------------------------------------------
// Waveform
// ---------------------------------------------------------------------------

/// Immutable description of an electrical signal.
///
/// Serialized as its string form (`KIND,PHASES,SOURCE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Waveform {
    pub kind: WaveKind,
    pub phases: Phases,
    pub source: Source,
}

impl Waveform {
    pub const fn new(kind: WaveKind, phases: Phases, source: Source) -> Self {
        Self {
            kind,
            phases,
            source,
        }
    }

    /// An empty waveform for a segment with the given phase capability.
    pub fn none(phases: Phases) -> Self {
        Self::new(WaveKind::None, phases, Source::Rotation)
    }

    pub fn is_ac(&self) -> bool {
        self.kind == WaveKind::Ac
    }

    pub fn is_dc(&self) -> bool {
        self.kind == WaveKind::Dc
    }

    pub fn is_none(&self) -> bool {
        self.kind == WaveKind::None
    }

    pub fn is_single_phase(&self) -> bool {
        self.phases == Phases::Single
    }

    /// The waveform on the other side of a commutator turning at `speed`.
    ///
    /// AC is rectified to DC keeping its phase count, so a phase count that
    /// does not match the commutator stays mismatched. DC is chopped into AC
    /// with the commutator's own phase count. The source flips because the
    /// energy crosses between the rotating and external sides. Nothing gets
    /// through a stationary commutator.
    pub fn commutated(&self, speed: f64, multi_phase: bool) -> Waveform {
        if self.is_none() || speed <= 0.0 {
            return Waveform::new(WaveKind::None, self.phases, self.source);
        }
        match self.kind {
            WaveKind::Ac => Waveform::new(WaveKind::Dc, self.phases, self.source.flipped()),
            WaveKind::Dc => Waveform::new(
                WaveKind::Ac,
                Phases::from_multi(multi_phase),
                self.source.flipped(),
            ),
            WaveKind::None => *self,
        }
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            WaveKind::None => "NONE",
            WaveKind::Ac => "AC",
            WaveKind::Dc => "DC",
        };
        let phases = match self.phases {
            Phases::Single => "SINGLE",
            Phases::Multi => "MULTI",
        };
        let source = match self.source {
            Source::Rotation => "ROTATION",
            Source::External => "EXTERNAL",
        };
        write!(f, "{kind},{phases},{source}")
    }
}

/// Error parsing a waveform string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid waveform '{0}'")]
pub struct WaveformParseError(pub String);

impl FromStr for Waveform {
    type Err = WaveformParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || WaveformParseError(s.to_string());
        let mut parts = s.split(',');
        let kind = match parts.next() {
            Some("NONE") => WaveKind::None,
            Some("AC") => WaveKind::Ac,
            Some("DC") => WaveKind::Dc,
            _ => return Err(err()),
        };
        let phases = match parts.next() {
            Some("SINGLE") => Phases::Single,
            Some("MULTI") => Phases::Multi,
            _ => return Err(err()),
        };
        let source = match parts.next() {
            Some("ROTATION") => Source::Rotation,
            Some("EXTERNAL") => Source::External,
            _ => return Err(err()),
        };
        if parts.next().is_some() {
            return Err(err());
        }
        Ok(Waveform::new(kind, phases, source))
    }
}

impl From<Waveform> for String {
    fn from(wf: Waveform) -> String {
        wf.to_string()
    }
}

impl TryFrom<String> for Waveform {
    type Error = WaveformParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
