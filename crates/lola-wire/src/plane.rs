//! Integrity planes.
//!
//! The control plane runs two parallel, non-interacting messaging domains:
//! `Qm` (quality management, always present) and `AsilB` (present only on
//! processes configured for it). Cross-plane traffic is forbidden by
//! construction - every operation in this crate is parameterized by exactly
//! one [`Plane`].

use std::fmt;

/// Safety-integrity plane a control-plane operation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Plane {
    /// Quality-managed plane. Always enabled.
    Qm,
    /// ASIL-B plane. Enabled only on ASIL-B capable processes.
    AsilB,
}

impl Plane {
    /// Suffix used when building the canonical endpoint name for this plane.
    #[must_use]
    pub fn endpoint_suffix(self) -> &'static str {
        match self {
            Plane::Qm => "_QM",
            Plane::AsilB => "_ASIL_B",
        }
    }
}

impl fmt::Display for Plane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Plane::Qm => write!(f, "QM"),
            Plane::AsilB => write!(f, "ASIL-B"),
        }
    }
}
