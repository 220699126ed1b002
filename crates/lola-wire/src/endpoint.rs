//! Canonical transport endpoint naming.

use crate::{PeerId, Plane};

/// Canonical endpoint name for a `(plane, peer_id)` pair.
///
/// Example: `endpoint_name(Plane::Qm, 5555)` is `"/LoLa_5555_QM"`.
#[must_use]
pub fn endpoint_name(plane: Plane, peer_id: PeerId) -> String {
    format!("/LoLa_{peer_id}{}", plane.endpoint_suffix())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qm_endpoint_name() {
        assert_eq!(endpoint_name(Plane::Qm, 5555), "/LoLa_5555_QM");
    }

    #[test]
    fn asil_b_endpoint_name() {
        assert_eq!(endpoint_name(Plane::AsilB, 5555), "/LoLa_5555_ASIL_B");
    }
}
