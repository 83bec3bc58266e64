//! Closed error taxonomy for the virtual machine core.
//!
//! Every fallible operation in this crate returns one of these variants
//! rather than a boxed or stringly-typed error, so an embedder can match on
//! exactly the failure modes spec'd for this VM (parse errors, execution
//! errors, resource errors, host errors).

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmError {
    // Parse errors.
    EndOfProgram,
    InvalidOpcode(u8),
    InvalidThreadID(u8),
    InvalidThreadRange { start: u8, end: u8 },
    InvalidThreadOperation(u8),
    InvalidJumpComparison(u8),
    InvalidPaletteID(u8),
    InvalidColorID(u8),
    InvalidBufferID(u8),
    InvalidChannel(u8),
    ShiftTooLarge(u16),

    // Execution errors.
    InvalidAddress(u16),
    InvalidPolygonOp(u8),
    StackOverflow,
    StackUnderflow,
    YieldWithinFunction,
    InstructionLimitExceeded,
    AnimationsNotLoaded,
    InvalidStringID(u16),

    // Resource errors (bubbled from a `ResourceReader`).
    InvalidResourceID(u16),
    EmptyResourceID(u16),
    GamePartOnlyResourceType,
    InvalidResourceSize,
    InvalidCompressedData,
    TruncatedData,
    BufferTooSmall,
    OutOfMemory,
    RepositoryFailure,

    // Host errors.
    CannotCreateSurface,
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmError::EndOfProgram => write!(f, "read past the end of the program"),
            VmError::InvalidOpcode(op) => write!(f, "invalid opcode 0x{op:02x}"),
            VmError::InvalidThreadID(id) => write!(f, "invalid thread id {id}"),
            VmError::InvalidThreadRange { start, end } => {
                write!(f, "invalid thread range {start}..={end}")
            }
            VmError::InvalidThreadOperation(op) => write!(f, "invalid thread operation {op}"),
            VmError::InvalidJumpComparison(op) => write!(f, "invalid jump comparison {op}"),
            VmError::InvalidPaletteID(id) => write!(f, "invalid palette id {id}"),
            VmError::InvalidColorID(id) => write!(f, "invalid color id {id}"),
            VmError::InvalidBufferID(id) => write!(f, "invalid buffer id {id}"),
            VmError::InvalidChannel(ch) => write!(f, "invalid audio channel {ch}"),
            VmError::ShiftTooLarge(shift) => write!(f, "shift distance {shift} is >= 16"),
            VmError::InvalidAddress(addr) => write!(f, "jump to invalid address 0x{addr:04x}"),
            VmError::InvalidPolygonOp(op) => write!(f, "invalid polygon-tree op 0x{op:02x}"),
            VmError::StackOverflow => write!(f, "call stack overflow"),
            VmError::StackUnderflow => write!(f, "call stack underflow"),
            VmError::YieldWithinFunction => write!(f, "yield with a non-empty call stack"),
            VmError::InstructionLimitExceeded => {
                write!(f, "thread exceeded the per-tic instruction limit")
            }
            VmError::AnimationsNotLoaded => {
                write!(f, "drawing from the animations resource but none is loaded")
            }
            VmError::InvalidStringID(id) => write!(f, "no string registered for id 0x{id:04x}"),
            VmError::InvalidResourceID(id) => write!(f, "invalid resource id {id}"),
            VmError::EmptyResourceID(id) => write!(f, "resource id {id} is an empty descriptor"),
            VmError::GamePartOnlyResourceType => write!(
                f,
                "this resource type can only be loaded through a game part"
            ),
            VmError::InvalidResourceSize => write!(f, "compressed size exceeds uncompressed size"),
            VmError::InvalidCompressedData => write!(f, "compressed resource data is corrupt"),
            VmError::TruncatedData => write!(f, "resource data was truncated"),
            VmError::BufferTooSmall => write!(f, "destination buffer is too small"),
            VmError::OutOfMemory => write!(f, "out of memory while allocating a resource"),
            VmError::RepositoryFailure => write!(f, "underlying resource repository failed"),
            VmError::CannotCreateSurface => write!(f, "host could not create a display surface"),
        }
    }
}

impl std::error::Error for VmError {}

pub type VmResult<T> = Result<T, VmError>;
