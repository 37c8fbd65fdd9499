use bitflags::bitflags;
use bitvec::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::source::ByteSource;
use crate::tables::{Reg, SegReg};

/// Longest 8086 encoding this decoder produces: opcode, ModRM, disp16, data16.
pub const MAX_LEN: usize = 6;

bitflags! {
/// Byte layout of an instruction. The low byte says which fields the
/// encoding carries (set by the classifier); the high bits hold values
/// decoded from those fields (set by the extractor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShapeFlags: u16 {
const D = 1 << 0; // Direction bit at opcode bit 1
const W_LOW = 1 << 1; // Width bit at opcode bit 0
const W_BIT3 = 1 << 2; // Width bit at opcode bit 3
const MODRM = 1 << 3; // ModRM byte follows the opcode
const REG_MID = 1 << 4; // Register code at opcode bits 3..5
const REG_LOW = 1 << 5; // Register code at opcode bits 0..2
const DATA = 1 << 6; // Immediate data, byte or word
const ADDR = 1 << 7; // Accumulator address, byte or word
const REVERSED = 1 << 8; // D=1: REG side is the destination
const WORD = 1 << 9;
const EFFECTIVE = 1 << 10; // MOD < 3
const DIRECT = 1 << 11; // MOD=00 rm=110
}
}

impl ShapeFlags {
    pub const LAYOUT: Self = Self::from_bits_truncate(0x00ff);

    pub fn is_word(self) -> bool {
        self.contains(Self::WORD)
    }
}

impl Default for ShapeFlags {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Op {
    Mov,
    Push,
    Pop,
    /// Placeholder of a default-constructed [`Instruction`]; decoding never
    /// yields it.
    #[default]
    Unknown,
}

impl Op {
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Op::Mov => "mov",
            Op::Push => "push",
            Op::Pop => "pop",
            Op::Unknown => "(bad)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    Register(Reg),
    Segment(SegReg),
    EffectiveAddress { base: Reg, disp: i16 },
    DirectAddress(u16),
    AccumulatorAddress(u16),
}

impl Operand {
    pub fn is_memory(&self) -> bool {
        !matches!(self, Operand::Register(_) | Operand::Segment(_))
    }
}

/// MOD/REG/RM split of a ModRM byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModRm {
    pub mode: u8,
    pub reg: u8,
    pub rm: u8,
}

impl ModRm {
    pub fn from_byte(byte: u8) -> Self {
        let bits = byte.view_bits::<Msb0>();
        Self {
            mode: bits[0..2].load_be::<u8>(),
            reg: bits[2..5].load_be::<u8>(),
            rm: bits[5..8].load_be::<u8>(),
        }
    }

    pub fn is_memory(self) -> bool {
        self.mode < 0b11
    }

    pub fn is_direct(self) -> bool {
        self.mode == 0b00 && self.rm == 0b110
    }
}

/// One decoded instruction. `dst` and `src` are structural slots: `dst` is
/// the RM side (or the accumulator), `src` the REG side (or the address).
/// Immediate moves fill only `dst`, with the value in [`Instruction::data`].
/// [`Instruction::destination`] and [`Instruction::source`] apply the
/// direction bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Instruction {
    pub(crate) op: Op,
    pub(crate) flags: ShapeFlags,
    pub(crate) dst: Option<Operand>,
    pub(crate) src: Option<Operand>,
    pub(crate) disp: i16,
    pub(crate) addr: u16,
    pub(crate) data: i16,
    pub(crate) offset: u64,
    #[serde(skip)]
    pub(crate) raw: [u8; MAX_LEN],
    #[serde(skip)]
    pub(crate) len: u8,
}

impl Instruction {
    pub fn op(&self) -> Op {
        self.op
    }
    pub fn flags(&self) -> ShapeFlags {
        self.flags
    }
    pub fn dst(&self) -> Option<Operand> {
        self.dst
    }
    pub fn src(&self) -> Option<Operand> {
        self.src
    }
    pub fn disp(&self) -> i16 {
        self.disp
    }
    pub fn addr(&self) -> u16 {
        self.addr
    }
    /// Immediate data, if the encoding carries any.
    pub fn data(&self) -> Option<i16> {
        self.flags.contains(ShapeFlags::DATA).then_some(self.data)
    }
    /// Offset of the opcode byte in the input stream.
    pub fn offset(&self) -> u64 {
        self.offset
    }
    /// Raw encoding, 1 to [`MAX_LEN`] bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.raw[..self.len as usize]
    }
    pub fn len(&self) -> usize {
        self.len as usize
    }
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_reversed(&self) -> bool {
        self.flags.contains(ShapeFlags::REVERSED)
    }

    pub fn destination(&self) -> Option<Operand> {
        if self.is_reversed() { self.src } else { self.dst }
    }

    pub fn source(&self) -> Option<Operand> {
        if self.is_reversed() { self.dst } else { self.src }
    }
}

pub trait Decoder {
    /// Decode the next instruction. `Ok(None)` only when the source is
    /// exhausted before the opcode byte.
    fn decode<S: ByteSource + ?Sized>(&self, src: &mut S) -> Result<Option<Instruction>, DecodeError>;
}
