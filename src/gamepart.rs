//! The closed table of game parts and the resource ids each one names.
//!
//! A plain array of `{palettes, bytecode, polygons, animations}` indexed by
//! part number. A part with no shared sprite set represents that as `None`
//! rather than a magic zero id, so callers cannot mistake it for a real
//! resource id.

use crate::resource::GamePartResourceIds;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GamePart {
    CopyProtection,
    IntroCinematic,
    Gameplay1,
    Gameplay2,
    Gameplay3,
    Gameplay4,
    ArenaCinematic,
    EndingCinematic,
    PasswordEntry,
}

/// First id of the reserved `ControlResources` game-part range.
pub const GAME_PART_RANGE_START: u16 = 0x3e80;
/// Last id of the reserved range, inclusive.
pub const GAME_PART_RANGE_END: u16 = 0x3e89;

impl GamePart {
    pub const ALL: [GamePart; 9] = [
        GamePart::CopyProtection,
        GamePart::IntroCinematic,
        GamePart::Gameplay1,
        GamePart::Gameplay2,
        GamePart::Gameplay3,
        GamePart::Gameplay4,
        GamePart::ArenaCinematic,
        GamePart::EndingCinematic,
        GamePart::PasswordEntry,
    ];

    /// Resolve a `ControlResources` operand in the reserved game-part range
    /// to the part it names. `None` if outside the range.
    pub fn from_resource_id(id: u16) -> Option<GamePart> {
        if !(GAME_PART_RANGE_START..=GAME_PART_RANGE_END).contains(&id) {
            return None;
        }
        Self::ALL.get((id - GAME_PART_RANGE_START) as usize).copied()
    }

    pub fn resource_ids(self) -> GamePartResourceIds {
        match self {
            GamePart::CopyProtection => GamePartResourceIds {
                palettes: 0x14,
                bytecode: 0x15,
                polygons: 0x16,
                animations: None,
            },
            GamePart::IntroCinematic => GamePartResourceIds {
                palettes: 0x17,
                bytecode: 0x18,
                polygons: 0x19,
                animations: None,
            },
            GamePart::Gameplay1 => GamePartResourceIds {
                palettes: 0x1a,
                bytecode: 0x1b,
                polygons: 0x1c,
                animations: Some(0x11),
            },
            GamePart::Gameplay2 => GamePartResourceIds {
                palettes: 0x1d,
                bytecode: 0x1e,
                polygons: 0x1f,
                animations: Some(0x11),
            },
            GamePart::Gameplay3 => GamePartResourceIds {
                palettes: 0x20,
                bytecode: 0x21,
                polygons: 0x22,
                animations: Some(0x11),
            },
            GamePart::Gameplay4 => GamePartResourceIds {
                palettes: 0x23,
                bytecode: 0x24,
                polygons: 0x25,
                animations: None,
            },
            GamePart::ArenaCinematic => GamePartResourceIds {
                palettes: 0x26,
                bytecode: 0x27,
                polygons: 0x28,
                animations: Some(0x11),
            },
            GamePart::EndingCinematic => GamePartResourceIds {
                palettes: 0x29,
                bytecode: 0x2a,
                polygons: 0x2b,
                animations: Some(0x11),
            },
            GamePart::PasswordEntry => GamePartResourceIds {
                palettes: 0x7d,
                bytecode: 0x7e,
                polygons: 0x7f,
                animations: None,
            },
        }
    }

    /// Whether a show-password request is honoured while this part is
    /// running: any cinematic or gameplay part, never copy-protection or
    /// password-entry itself.
    pub fn allows_password_request(self) -> bool {
        !matches!(self, GamePart::CopyProtection | GamePart::PasswordEntry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_id_range_resolves_to_part() {
        assert_eq!(
            GamePart::from_resource_id(0x3e81),
            Some(GamePart::IntroCinematic)
        );
        assert_eq!(GamePart::from_resource_id(0x3e89), Some(GamePart::PasswordEntry));
        assert_eq!(GamePart::from_resource_id(0x3e8a), None);
        assert_eq!(GamePart::from_resource_id(0x3e7f), None);
    }

    #[test]
    fn password_request_gate() {
        assert!(!GamePart::CopyProtection.allows_password_request());
        assert!(!GamePart::PasswordEntry.allows_password_request());
        assert!(GamePart::Gameplay2.allows_password_request());
        assert!(GamePart::ArenaCinematic.allows_password_request());
    }
}
