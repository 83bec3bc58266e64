//! Opcode table and decoder: turns a byte stream into tagged `Instruction`
//! values, one per call.
//!
//! `decode` only reads bytes and builds an `Instruction`; `crate::vm` is
//! responsible for executing it, keeping parse and execute as separate
//! steps. Execution reports back an explicit three-way `Action` rather than
//! a bare "thread should stop" flag.

use crate::cursor::ProgramCursor;
use crate::error::{VmError, VmResult};

/// Result of executing one instruction: whether the thread keeps running
/// this tic, yields until next tic, or is deactivated immediately.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Continue,
    Yield,
    Deactivate,
}

/// Comparison used by `JumpConditional`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
}

impl Comparison {
    fn from_low_bits(bits: u8) -> VmResult<Self> {
        match bits {
            0 => Ok(Comparison::Equal),
            1 => Ok(Comparison::NotEqual),
            2 => Ok(Comparison::GreaterThan),
            3 => Ok(Comparison::GreaterOrEqual),
            4 => Ok(Comparison::LessThan),
            5 => Ok(Comparison::LessOrEqual),
            other => Err(VmError::InvalidJumpComparison(other)),
        }
    }

    pub fn apply(self, lhs: i16, rhs: i16) -> bool {
        match self {
            Comparison::Equal => lhs == rhs,
            Comparison::NotEqual => lhs != rhs,
            Comparison::GreaterThan => lhs > rhs,
            Comparison::GreaterOrEqual => lhs >= rhs,
            Comparison::LessThan => lhs < rhs,
            Comparison::LessOrEqual => lhs <= rhs,
        }
    }
}

/// Right-hand side of a `JumpConditional`, encoded per the control byte's
/// top two bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JumpRhs {
    UnsignedByte(u8),
    SignedWord(i16),
    Register(u8),
}

/// Operation selected by `ControlThreads`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadOp {
    Resume,
    Suspend,
    Deactivate,
}

impl ThreadOp {
    fn from_byte(byte: u8) -> VmResult<Self> {
        match byte {
            0 => Ok(ThreadOp::Resume),
            1 => Ok(ThreadOp::Suspend),
            2 => Ok(ThreadOp::Deactivate),
            other => Err(VmError::InvalidThreadOperation(other)),
        }
    }
}

/// Source polygon table a draw-polygon instruction reads from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolygonSource {
    Polygons,
    Animations,
}

/// Zoom factor for a sprite-polygon draw. Every draw-polygon instruction is
/// a fixed 4 bytes, so zoom is packed entirely into opcode bits 0x08/0x04
/// instead of spending a wire byte on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Zoom {
    Default,
    Half,
    Double,
}

/// Decoded instruction operands. Carries only what execution needs; the
/// opcode byte itself is not retained (Design Notes: "carry only the
/// decoded operands, not the raw opcode byte").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Instruction {
    SetConstant { dst: u8, value: i16 },
    Copy { dst: u8, src: u8 },
    Add { dst: u8, src: u8 },
    AddConstant { dst: u8, value: i16 },
    Sub { dst: u8, src: u8 },
    And { dst: u8, mask: u16 },
    Or { dst: u8, mask: u16 },
    ShiftLeft { dst: u8, shift: u16 },
    ShiftRight { dst: u8, shift: u16 },

    Jump { addr: u16 },
    Call { addr: u16 },
    Return,
    JumpIfNotZero { reg: u8, addr: u16 },
    JumpConditional {
        comparison: Comparison,
        lhs_reg: u8,
        rhs: JumpRhs,
        addr: u16,
    },

    ActivateThread { thread_id: u8, addr: u16 },
    ControlThreads { start_id: u8, end_id: u8, op: ThreadOp },
    Kill,
    Yield,

    SelectPalette { id: u8 },
    SelectVideoBuffer { id: u8 },
    FillVideoBuffer { id: u8, color: u8 },
    CopyVideoBuffer { src: u8, dst: u8 },
    RenderVideoBuffer { id: u8 },
    DrawString { string_id: u16, color: u8, x_col: u8, y: u8 },

    ControlResources { id: u16 },
    ControlSound { resource: u16, frequency: u8, volume: u8, channel: u8 },
    ControlMusic { resource: u16, delay: u16, offset: u8 },

    DrawBackgroundPolygon { addr: u16, x: u8, y: u8 },
    DrawSpritePolygon {
        addr: u16,
        x: u8,
        y: u8,
        zoom: Zoom,
        source: PolygonSource,
    },
}

/// Reserved `SelectVideoBuffer`/`CopyVideoBuffer` sentinel for the front
/// buffer.
pub const BUFFER_FRONT: u8 = 0xff;
/// Reserved sentinel for the back buffer.
pub const BUFFER_BACK: u8 = 0xfe;

fn read_jump_comparison(byte: u8, cursor: &mut ProgramCursor) -> VmResult<(Comparison, JumpRhs)> {
    let rhs = match byte >> 6 {
        0b00 => JumpRhs::UnsignedByte(cursor.read_u8()?),
        0b01 => JumpRhs::SignedWord(cursor.read_i16()?),
        _ => JumpRhs::Register(cursor.read_u8()?),
    };
    let comparison = Comparison::from_low_bits(byte & 0x7)?;
    Ok((comparison, rhs))
}

/// Decode one instruction starting at the cursor's current position,
/// consuming exactly its wire width even when decoding ultimately fails.
pub fn decode(cursor: &mut ProgramCursor) -> VmResult<Instruction> {
    let op = cursor.read_u8()?;

    if op & 0x80 != 0 {
        return decode_background_polygon(op, cursor);
    }
    if op & 0x40 != 0 {
        return decode_sprite_polygon(op, cursor);
    }

    match op {
        0x00 => {
            let dst = cursor.read_u8()?;
            let value = cursor.read_i16()?;
            Ok(Instruction::SetConstant { dst, value })
        }
        0x01 => {
            let dst = cursor.read_u8()?;
            let src = cursor.read_u8()?;
            Ok(Instruction::Copy { dst, src })
        }
        0x02 => {
            let dst = cursor.read_u8()?;
            let src = cursor.read_u8()?;
            Ok(Instruction::Add { dst, src })
        }
        0x03 => {
            let dst = cursor.read_u8()?;
            let value = cursor.read_i16()?;
            Ok(Instruction::AddConstant { dst, value })
        }
        0x04 => {
            let addr = cursor.read_u16()?;
            Ok(Instruction::Call { addr })
        }
        0x05 => Ok(Instruction::Return),
        0x06 => {
            let thread_id = cursor.read_u8()?;
            let addr = cursor.read_u16()?;
            Ok(Instruction::ActivateThread { thread_id, addr })
        }
        0x07 => {
            let addr = cursor.read_u16()?;
            Ok(Instruction::Jump { addr })
        }
        0x08 => {
            let reg = cursor.read_u8()?;
            let addr = cursor.read_u16()?;
            Ok(Instruction::JumpIfNotZero { reg, addr })
        }
        0x09 => {
            let control = cursor.read_u8()?;
            let lhs_reg = cursor.read_u8()?;
            let (comparison, rhs) = read_jump_comparison(control, cursor)?;
            let addr = cursor.read_u16()?;
            Ok(Instruction::JumpConditional {
                comparison,
                lhs_reg,
                rhs,
                addr,
            })
        }
        0x0a => {
            let id = cursor.read_u8()?;
            let _dead_byte = cursor.read_u8()?;
            Ok(Instruction::SelectPalette { id })
        }
        0x0b => {
            let start_id = cursor.read_u8()?;
            let end_id = cursor.read_u8()?;
            let op_byte = cursor.read_u8()?;
            let op = ThreadOp::from_byte(op_byte)?;
            if start_id >= 64 {
                return Err(VmError::InvalidThreadID(start_id));
            }
            if end_id >= 64 {
                return Err(VmError::InvalidThreadID(end_id));
            }
            if start_id > end_id {
                return Err(VmError::InvalidThreadRange {
                    start: start_id,
                    end: end_id,
                });
            }
            Ok(Instruction::ControlThreads { start_id, end_id, op })
        }
        0x0c => {
            let id = cursor.read_u8()?;
            Ok(Instruction::SelectVideoBuffer { id })
        }
        0x0d => {
            let id = cursor.read_u8()?;
            let color = cursor.read_u8()?;
            Ok(Instruction::FillVideoBuffer { id, color })
        }
        0x0e => {
            let src = cursor.read_u8()?;
            let dst = cursor.read_u8()?;
            Ok(Instruction::CopyVideoBuffer { src, dst })
        }
        0x0f => {
            let id = cursor.read_u8()?;
            Ok(Instruction::RenderVideoBuffer { id })
        }
        0x10 => {
            let dst = cursor.read_u8()?;
            let value = cursor.read_i16()?;
            Ok(Instruction::And {
                dst,
                mask: value as u16,
            })
        }
        0x11 => {
            let dst = cursor.read_u8()?;
            let value = cursor.read_i16()?;
            Ok(Instruction::Or {
                dst,
                mask: value as u16,
            })
        }
        0x12 => {
            let dst = cursor.read_u8()?;
            let shift = cursor.read_u16()?;
            if shift >= 16 {
                return Err(VmError::ShiftTooLarge(shift));
            }
            Ok(Instruction::ShiftLeft { dst, shift })
        }
        0x13 => {
            let dst = cursor.read_u8()?;
            let shift = cursor.read_u16()?;
            if shift >= 16 {
                return Err(VmError::ShiftTooLarge(shift));
            }
            Ok(Instruction::ShiftRight { dst, shift })
        }
        0x14 => {
            let resource = cursor.read_u16()?;
            let frequency = cursor.read_u8()?;
            let volume = cursor.read_u8()?;
            let channel = cursor.read_u8()?;
            Ok(Instruction::ControlSound {
                resource,
                frequency,
                volume,
                channel,
            })
        }
        0x15 => {
            let dst = cursor.read_u8()?;
            let src = cursor.read_u8()?;
            Ok(Instruction::Sub { dst, src })
        }
        0x16 => {
            let string_id = cursor.read_u16()?;
            let color = cursor.read_u8()?;
            let x_col = cursor.read_u8()?;
            let y = cursor.read_u8()?;
            Ok(Instruction::DrawString {
                string_id,
                color,
                x_col,
                y,
            })
        }
        0x17 => Ok(Instruction::Kill),
        0x18 => Ok(Instruction::Yield),
        0x19 => {
            let id = cursor.read_u16()?;
            Ok(Instruction::ControlResources { id })
        }
        0x1a => {
            let resource = cursor.read_u16()?;
            let delay = cursor.read_u16()?;
            let offset = cursor.read_u8()?;
            Ok(Instruction::ControlMusic {
                resource,
                delay,
                offset,
            })
        }
        other => Err(VmError::InvalidOpcode(other)),
    }
}

fn decode_background_polygon(op: u8, cursor: &mut ProgramCursor) -> VmResult<Instruction> {
    let low = cursor.read_u8()?;
    let addr = ((op as u16) << 8 | low as u16) << 1;
    let x = cursor.read_u8()?;
    let y = cursor.read_u8()?;
    Ok(Instruction::DrawBackgroundPolygon { addr, x, y })
}

/// Bits 5 and 4 of the opcode (the two highest bits below the bit-6
/// discriminator) select the zoom factor; bits 3..0 form the address's
/// high nibble together with the following byte.
fn decode_sprite_polygon(op: u8, cursor: &mut ProgramCursor) -> VmResult<Instruction> {
    let low = cursor.read_u8()?;
    let zoom = if op & 0x20 != 0 {
        Zoom::Half
    } else if op & 0x10 != 0 {
        Zoom::Double
    } else {
        Zoom::Default
    };
    let addr = ((op as u16 & 0x0f) << 8 | low as u16) << 1;
    let x = cursor.read_u8()?;
    let y = cursor.read_u8()?;
    Ok(Instruction::DrawSpritePolygon {
        addr,
        x,
        y,
        zoom,
        source: PolygonSource::Animations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_bytes(bytes: &[u8]) -> (Instruction, u16) {
        let mut cursor = ProgramCursor::new(bytes);
        let instr = decode(&mut cursor).unwrap();
        (instr, cursor.position())
    }

    #[test]
    fn set_constant_consumes_four_bytes() {
        let (instr, pos) = decode_bytes(&[0x00, 0x10, 0x00, 0x7d]);
        assert_eq!(instr, Instruction::SetConstant { dst: 0x10, value: 125 });
        assert_eq!(pos, 4);
    }

    #[test]
    fn select_palette_consumes_three_bytes_and_ignores_second() {
        let (instr, pos) = decode_bytes(&[0x0a, 0x05, 0xff]);
        assert_eq!(instr, Instruction::SelectPalette { id: 0x05 });
        assert_eq!(pos, 3);
    }

    #[test]
    fn shift_too_large_still_consumes_full_width() {
        let mut cursor = ProgramCursor::new(&[0x12, 0x00, 0x00, 0x10]);
        assert_eq!(decode(&mut cursor), Err(VmError::ShiftTooLarge(16)));
        assert_eq!(cursor.position(), 4);
    }

    #[test]
    fn control_threads_validates_range_after_consuming_bytes() {
        let mut cursor = ProgramCursor::new(&[0x0b, 5, 3, 0]);
        assert_eq!(
            decode(&mut cursor),
            Err(VmError::InvalidThreadRange { start: 5, end: 3 })
        );
        assert_eq!(cursor.position(), 4);
    }

    #[test]
    fn jump_conditional_register_rhs_is_five_bytes() {
        // control byte 0xc0 -> top bits 11 (register rhs), comparison 0 (==)
        let (instr, pos) = decode_bytes(&[0x09, 0xc0, 0x10, 0x11, 0x00, 0x20]);
        assert_eq!(
            instr,
            Instruction::JumpConditional {
                comparison: Comparison::Equal,
                lhs_reg: 0x10,
                rhs: JumpRhs::Register(0x11),
                addr: 0x0020,
            }
        );
        assert_eq!(pos, 6);
    }

    #[test]
    fn jump_conditional_unsigned_byte_rhs_is_five_bytes() {
        let (instr, pos) = decode_bytes(&[0x09, 0x02, 0x10, 0x05, 0x00, 0x20]);
        assert_eq!(
            instr,
            Instruction::JumpConditional {
                comparison: Comparison::GreaterThan,
                lhs_reg: 0x10,
                rhs: JumpRhs::UnsignedByte(0x05),
                addr: 0x0020,
            }
        );
        assert_eq!(pos, 6);
    }

    #[test]
    fn jump_conditional_signed_word_rhs_is_six_bytes() {
        let (instr, pos) = decode_bytes(&[0x09, 0x41, 0x10, 0xff, 0xff, 0x00, 0x20]);
        assert_eq!(
            instr,
            Instruction::JumpConditional {
                comparison: Comparison::NotEqual,
                lhs_reg: 0x10,
                rhs: JumpRhs::SignedWord(-1),
                addr: 0x0020,
            }
        );
        assert_eq!(pos, 7);
    }

    #[test]
    fn invalid_jump_comparison_still_consumes_full_width() {
        let mut cursor = ProgramCursor::new(&[0x09, 0x06, 0x10, 0x00, 0x20]);
        assert_eq!(decode(&mut cursor), Err(VmError::InvalidJumpComparison(6)));
        assert_eq!(cursor.position(), 5);
    }

    #[test]
    fn background_polygon_shifts_address_left_by_one() {
        let (instr, pos) = decode_bytes(&[0x80, 0x10, 50, 60]);
        assert_eq!(
            instr,
            Instruction::DrawBackgroundPolygon {
                addr: 0x0020,
                x: 50,
                y: 60,
            }
        );
        assert_eq!(pos, 4);
    }

    #[test]
    fn sprite_polygon_is_four_bytes_with_zoom_from_opcode_bits() {
        let (instr, pos) = decode_bytes(&[0x40 | 0x20, 0x08, 50, 60]);
        assert_eq!(
            instr,
            Instruction::DrawSpritePolygon {
                addr: 0x0010,
                x: 50,
                y: 60,
                zoom: Zoom::Half,
                source: PolygonSource::Animations,
            }
        );
        assert_eq!(pos, 4);
    }

    #[test]
    fn unknown_opcode_fails() {
        let mut cursor = ProgramCursor::new(&[0x1b]);
        assert_eq!(decode(&mut cursor), Err(VmError::InvalidOpcode(0x1b)));
    }
}
