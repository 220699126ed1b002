//! Element id: the compound `(service, element, instance, kind)` identifier
//! of a single communication endpoint within the middleware's data plane.
//!
//! Packed MSB-to-LSB into a single 64-bit word for transport in a short
//! frame's payload:
//!
//! ```text
//! bits 63..48  47..32       31..16       15..8          7..0
//!      service_id  element_id   instance_id  element_kind  (unused, zero)
//! ```

/// Compound element identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId {
    /// Identifies the service that owns the element.
    pub service_id: u16,
    /// Identifies the element within the service.
    pub element_id: u16,
    /// Identifies the service instance.
    pub instance_id: u16,
    /// Kind discriminator (event, field, method, ...).
    pub element_kind: u8,
}

impl ElementId {
    /// Pack into the 64-bit wire representation used by short frames.
    #[must_use]
    pub fn pack(self) -> u64 {
        (u64::from(self.service_id) << 48)
            | (u64::from(self.element_id) << 32)
            | (u64::from(self.instance_id) << 16)
            | (u64::from(self.element_kind) << 8)
    }

    /// Recover an [`ElementId`] from its packed 64-bit wire representation.
    ///
    /// The low byte is reserved and always zero on the wire; it is ignored
    /// on unpack rather than validated, since it carries no semantic value.
    #[must_use]
    pub fn unpack(word: u64) -> Self {
        Self {
            service_id: ((word >> 48) & 0xFFFF) as u16,
            element_id: ((word >> 32) & 0xFFFF) as u16,
            instance_id: ((word >> 16) & 0xFFFF) as u16,
            element_kind: ((word >> 8) & 0xFF) as u8,
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn pack_unpack_known_layout() {
        let id = ElementId { service_id: 1, element_id: 2, instance_id: 3, element_kind: 4 };
        let word = id.pack();
        assert_eq!(word, 0x0001_0002_0003_0400);
        assert_eq!(ElementId::unpack(word), id);
    }

    proptest! {
        #[test]
        fn pack_unpack_round_trips(
            service_id: u16,
            element_id: u16,
            instance_id: u16,
            element_kind: u8,
        ) {
            let id = ElementId { service_id, element_id, instance_id, element_kind };
            prop_assert_eq!(ElementId::unpack(id.pack()), id);
        }
    }
}
