//! Bytecode virtual machine core for Another World (Out of This World).
//!
//! This crate is the engine alone: register bank, cooperative thread
//! scheduler, program cursor, resource memory, and indexed video engine. It
//! has no opinion on where bytecode/resources come from (`ResourceReader`)
//! or how a frame reaches glass (`HostSurface`/`AudioSink`) — an embedder
//! supplies both. See `crate::vm::Vm` for the driver that ties these pieces
//! together into the per-tic scheduling loop.

pub mod cursor;
pub mod error;
pub mod gamepart;
pub mod host;
pub mod input;
pub mod instruction;
pub mod registers;
pub mod resource;
pub mod stack;
pub mod thread;
pub mod video;
pub mod vm;

pub use error::{VmError, VmResult};
pub use gamepart::GamePart;
pub use input::InputState;
pub use resource::{ResourceDescriptor, ResourceReader, ResourceType};
pub use vm::Vm;
