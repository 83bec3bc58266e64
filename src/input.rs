//! Per-tic user input snapshot and its translation into register writes.
//!
//! Movement and action map onto registers the way a joystick read always
//! has; keychar and show-password are carried as their own fields rather
//! than folded into the movement/action bitmask.

use crate::gamepart::GamePart;
use crate::registers::{
    RegisterBank, REG_HERO_ACTION, REG_HERO_ACTION_POS_MASK, REG_HERO_POS_JUMP_DOWN,
    REG_HERO_POS_LEFT_RIGHT, REG_HERO_POS_MASK, REG_HERO_POS_UPDOWN, REG_LAST_KEYCHAR,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LeftRightDir {
    #[default]
    Neutral,
    Left,
    Right,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UpDownDir {
    #[default]
    Neutral,
    Up,
    Down,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ButtonState {
    #[default]
    Released,
    Pushed,
}

/// One tic's worth of raw input, as collected by the host's event pump.
#[derive(Clone, Copy, Debug, Default)]
pub struct InputState {
    pub horizontal: LeftRightDir,
    pub vertical: UpDownDir,
    pub button: ButtonState,
    /// Last key pressed this tic, already translated to the host's notion
    /// of a character (left to the host keyboard layer); `None` if no key
    /// was pressed.
    pub last_key: Option<char>,
    /// Whether the host's "show password entry" key/gesture fired this tic.
    pub show_password_request: bool,
}

/// Normalise a host key to the form written into the keychar register:
/// uppercase A-Z unchanged in meaning, backspace -> 8, carriage return -> 0,
/// anything else -> 0.
fn normalize_keychar(key: char) -> u8 {
    if key.is_ascii_alphabetic() {
        key.to_ascii_uppercase() as u8
    } else if key == '\u{8}' {
        8
    } else {
        0
    }
}

/// Write one tic's input snapshot into the register bank. Returns whether a
/// show-password request should be honoured (the caller decides based on
/// the current game part; honouring it is scheduling a part switch, which
/// belongs to the VM driver, not this module).
pub fn apply_input(regs: &mut RegisterBank, input: &InputState, current_part: GamePart) -> bool {
    let mut mask: i16 = 0;

    let up_down = match input.vertical {
        UpDownDir::Up => {
            mask |= 0x8;
            -1
        }
        UpDownDir::Neutral => 0,
        UpDownDir::Down => {
            mask |= 0x4;
            1
        }
    };
    regs.set_signed(REG_HERO_POS_UPDOWN, up_down);
    regs.set_signed(REG_HERO_POS_JUMP_DOWN, up_down);

    let left_right = match input.horizontal {
        LeftRightDir::Left => {
            mask |= 0x2;
            -1
        }
        LeftRightDir::Neutral => 0,
        LeftRightDir::Right => {
            mask |= 0x1;
            1
        }
    };
    regs.set_signed(REG_HERO_POS_LEFT_RIGHT, left_right);
    regs.set_signed(REG_HERO_POS_MASK, mask);

    let action = match input.button {
        ButtonState::Released => 0,
        ButtonState::Pushed => {
            mask |= 0x80;
            1
        }
    };
    regs.set_signed(REG_HERO_ACTION, action);
    regs.set_signed(REG_HERO_ACTION_POS_MASK, mask);

    if current_part == GamePart::PasswordEntry {
        if let Some(key) = input.last_key {
            regs.set_signed(REG_LAST_KEYCHAR, normalize_keychar(key) as i16);
        }
    }

    input.show_password_request && current_part.allows_password_request()
}
