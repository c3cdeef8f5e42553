//! The opcode virtual machine: a register-and-flags machine over a linear
//! little-endian memory, driven one opcode at a time, plus the static opcode
//! reference table.

mod arithmetic;
mod control;
mod decode;
mod executor;
mod machine;
mod strings;
pub mod table;

pub use decode::{decode, Cond, Op, Reg};
pub use executor::Executor;
pub use machine::{Flags, Machine, Registers, DEFAULT_MEMORY_SIZE};
