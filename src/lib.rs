pub mod decoder;
pub mod disasm;
pub mod error;
pub mod instructions;
pub mod source;
pub mod tables;
pub mod translate;

pub mod isa {
    pub mod i8086; // Intel 8086, 16-bit real mode
}

pub use decoder::{Decoder, Instruction, ModRm, Op, Operand, ShapeFlags};
pub use error::DecodeError;
pub use isa::i8086::I8086Decoder;
pub use source::{ByteSource, ReaderSource, SliceSource};
pub use tables::{Reg, RegClass, SegReg};
pub use translate::{
    decode_one, disassemble, instructions, translate, translate_with, Instructions, TranslateConfig, HEADER,
};
