use crate::decoder::{Op, ShapeFlags};
use crate::error::ClassifyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Decode(Op),
    /// Recognized encoding this decoder does not support yet.
    Unimplemented,
}

/// `byte & mask == value` selects the rule.
#[derive(Debug, Clone, Copy)]
pub struct OpcodeRule {
    pub mask: u8,
    pub value: u8,
    pub kind: RuleKind,
    pub flags: ShapeFlags,
}

const fn rule(mask: u8, value: u8, op: Op, flags: ShapeFlags) -> OpcodeRule {
    OpcodeRule { mask, value, kind: RuleKind::Decode(op), flags }
}

const fn unsupported(value: u8) -> OpcodeRule {
    OpcodeRule { mask: 0xff, value, kind: RuleKind::Unimplemented, flags: ShapeFlags::empty() }
}

const D: ShapeFlags = ShapeFlags::D;
const W_LOW: ShapeFlags = ShapeFlags::W_LOW;
const W_BIT3: ShapeFlags = ShapeFlags::W_BIT3;
const MODRM: ShapeFlags = ShapeFlags::MODRM;
const REG_MID: ShapeFlags = ShapeFlags::REG_MID;
const REG_LOW: ShapeFlags = ShapeFlags::REG_LOW;
const DATA: ShapeFlags = ShapeFlags::DATA;
const ADDR: ShapeFlags = ShapeFlags::ADDR;

/// Ordered, first match wins.
pub const TABLE: &[OpcodeRule] = &[
    // mov r/m <-> reg
    rule(0b1111_1100, 0b1000_1000, Op::Mov, D.union(W_LOW).union(MODRM)),
    // mov r/m, imm
    rule(0b1111_1110, 0b1100_0110, Op::Mov, D.union(W_LOW).union(MODRM).union(DATA)),
    // mov reg, imm
    rule(0b1111_0000, 0b1011_0000, Op::Mov, W_BIT3.union(REG_LOW).union(DATA)),
    // mov acc, [addr]
    rule(0b1111_1110, 0b1010_0000, Op::Mov, D.union(W_LOW).union(ADDR)),
    // mov [addr], acc
    rule(0b1111_1110, 0b1010_0010, Op::Mov, D.union(W_LOW).union(ADDR)),
    // mov sreg <-> r/m
    unsupported(0x8e),
    unsupported(0x8c),
    rule(0b1111_1111, 0b1111_1111, Op::Push, MODRM),
    rule(0b1111_1000, 0b0101_0000, Op::Push, REG_LOW),
    rule(0b1100_0111, 0b0000_0110, Op::Push, REG_MID),
    rule(0b1111_1111, 0b1000_1111, Op::Pop, MODRM),
    rule(0b1111_1000, 0b0101_1000, Op::Pop, REG_LOW),
    rule(0b1100_0111, 0b0000_0111, Op::Pop, REG_MID),
];

pub fn find_rule(byte: u8) -> Option<&'static OpcodeRule> {
    TABLE.iter().find(|r| byte & r.mask == r.value)
}

/// Classify an opcode byte into its operation and layout flags.
pub fn classify(byte: u8) -> Result<(Op, ShapeFlags), ClassifyError> {
    match find_rule(byte) {
        Some(OpcodeRule { kind: RuleKind::Decode(op), flags, .. }) => Ok((*op, *flags)),
        Some(OpcodeRule { kind: RuleKind::Unimplemented, .. }) => Err(ClassifyError::Unimplemented),
        None => Err(ClassifyError::Unknown),
    }
}
