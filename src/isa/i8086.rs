use tracing::{debug, trace};

use crate::decoder::{Decoder, Instruction, ModRm, Op, Operand, ShapeFlags, MAX_LEN};
use crate::error::DecodeError;
use crate::instructions::classify;
use crate::source::ByteSource;
use crate::tables::{lookup, segment, RegClass};

/// Intel 8086 decoder (move family, push and pop).
#[derive(Debug, Default, Clone, Copy)]
pub struct I8086Decoder;

impl I8086Decoder {
    pub fn new() -> Self {
        Self
    }
}

/// Bytes consumed for the instruction being decoded.
struct Fetch<'s, S: ?Sized> {
    src: &'s mut S,
    start: u64,
    raw: [u8; MAX_LEN],
    len: usize,
}

impl<'s, S: ByteSource + ?Sized> Fetch<'s, S> {
    fn new(src: &'s mut S) -> Self {
        let start = src.offset();
        Self { src, start, raw: [0; MAX_LEN], len: 0 }
    }

    /// The opcode byte; `None` on a clean end of input.
    fn opcode(&mut self) -> Result<Option<u8>, DecodeError> {
        let b = self.src.read_u8()?;
        if let Some(b) = b {
            self.push(b);
        }
        Ok(b)
    }

    fn byte(&mut self) -> Result<u8, DecodeError> {
        match self.src.read_u8()? {
            Some(b) => {
                self.push(b);
                Ok(b)
            }
            None => Err(DecodeError::MissingByte { offset: self.start + self.len as u64 }),
        }
    }

    fn word(&mut self) -> Result<u16, DecodeError> {
        let lo = self.byte()?;
        let hi = self.byte()?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    fn push(&mut self, b: u8) {
        self.raw[self.len] = b;
        self.len += 1;
    }
}

impl Decoder for I8086Decoder {
    fn decode<S: ByteSource + ?Sized>(&self, src: &mut S) -> Result<Option<Instruction>, DecodeError> {
        let mut fetch = Fetch::new(src);
        let start = fetch.start;
        let Some(opcode) = fetch.opcode()? else { return Ok(None) };

        let (op, mut flags) = classify(opcode).map_err(|e| e.at(start, opcode)).inspect_err(|err| {
            debug!(offset = start, %err, "classification failed");
        })?;
        trace!(offset = start, opcode = format_args!("{opcode:#04x}"), ?op, ?flags, "classified");

        let reject = |err: DecodeError| {
            debug!(offset = start, %err, "unsupported encoding");
            err
        };

        // immediate forms have no REG operand to swap with
        if flags.contains(ShapeFlags::D) && !flags.contains(ShapeFlags::DATA) && opcode & 0b10 != 0 {
            flags |= ShapeFlags::REVERSED;
        }
        let word = (flags.contains(ShapeFlags::W_LOW) && opcode & 0b1 != 0)
            || (flags.contains(ShapeFlags::W_BIT3) && opcode & 0b1000 != 0)
            || matches!(op, Op::Push | Op::Pop);
        if word {
            flags |= ShapeFlags::WORD;
        }

        let mut reg = if flags.contains(ShapeFlags::REG_MID) {
            (opcode >> 3) & 0b111
        } else if flags.contains(ShapeFlags::REG_LOW) {
            opcode & 0b111
        } else {
            0
        };
        // 001x x11x: segment override prefixes and decimal adjusts
        if flags.contains(ShapeFlags::REG_MID) && reg & 0b100 != 0 {
            return Err(reject(DecodeError::Unimplemented { offset: start, byte: opcode }));
        }

        let mut rm = 0;
        let mut disp: i16 = 0;
        if flags.contains(ShapeFlags::MODRM) {
            let modrm = ModRm::from_byte(fetch.byte()?);
            reg = modrm.reg;
            rm = modrm.rm;
            match (op, modrm.reg) {
                (Op::Push, 0b110) | (Op::Pop, 0b000) | (Op::Mov, _) => {}
                // inc/dec/call/jmp share the 0xff opcode
                (Op::Push, _) => return Err(reject(DecodeError::Unimplemented { offset: start, byte: opcode })),
                _ => return Err(reject(DecodeError::Unknown { offset: start, byte: opcode })),
            }
            if modrm.is_memory() {
                flags |= ShapeFlags::EFFECTIVE;
            }
            if modrm.is_direct() {
                flags |= ShapeFlags::DIRECT;
            }
            if modrm.mode == 0b01 {
                disp = fetch.byte()? as i8 as i16;
            } else if modrm.mode == 0b10 || flags.contains(ShapeFlags::DIRECT) {
                disp = fetch.word()? as i16;
            }
        }

        let addr = if flags.contains(ShapeFlags::ADDR) {
            if word { fetch.word()? } else { u16::from(fetch.byte()?) }
        } else {
            0
        };
        let data = if flags.contains(ShapeFlags::DATA) {
            if word { fetch.word()? as i16 } else { fetch.byte()? as i8 as i16 }
        } else {
            0
        };

        let (dst, src) = match op {
            Op::Mov if flags.contains(ShapeFlags::DATA) => (Some(immediate_target(flags, reg, rm, disp)), None),
            Op::Mov => (Some(rm_operand(flags, rm, disp)), Some(reg_operand(flags, reg, addr))),
            Op::Push | Op::Pop => (Some(stack_operand(flags, reg, rm, disp)), None),
            Op::Unknown => (None, None),
        };

        let ins = Instruction {
            op,
            flags,
            dst,
            src,
            disp,
            addr,
            data,
            offset: start,
            raw: fetch.raw,
            len: fetch.len as u8,
        };
        trace!(offset = start, len = ins.len(), ?dst, ?src, "decoded");
        Ok(Some(ins))
    }
}

/// The RM side: memory when MOD < 3, otherwise a register of the operand width.
fn rm_operand(flags: ShapeFlags, rm: u8, disp: i16) -> Operand {
    if flags.contains(ShapeFlags::DIRECT) {
        Operand::DirectAddress(disp as u16)
    } else if flags.contains(ShapeFlags::EFFECTIVE) {
        Operand::EffectiveAddress { base: lookup(RegClass::EffectiveBase, rm), disp }
    } else {
        Operand::Register(lookup(RegClass::for_width(flags.is_word()), rm))
    }
}

/// The REG side, or the address of an accumulator short form.
fn reg_operand(flags: ShapeFlags, reg: u8, addr: u16) -> Operand {
    if flags.contains(ShapeFlags::ADDR) {
        return Operand::AccumulatorAddress(addr);
    }
    // direct-address forms always name a word register
    let class = if flags.contains(ShapeFlags::DIRECT) {
        RegClass::Word
    } else {
        RegClass::for_width(flags.is_word())
    };
    Operand::Register(lookup(class, reg))
}

/// Where an immediate move stores its data: the RM side after a ModRM byte,
/// otherwise the register encoded in the opcode.
fn immediate_target(flags: ShapeFlags, reg: u8, rm: u8, disp: i16) -> Operand {
    if flags.contains(ShapeFlags::MODRM) {
        rm_operand(flags, rm, disp)
    } else {
        Operand::Register(lookup(RegClass::for_width(flags.is_word()), reg))
    }
}

fn stack_operand(flags: ShapeFlags, reg: u8, rm: u8, disp: i16) -> Operand {
    if flags.contains(ShapeFlags::MODRM) {
        rm_operand(flags, rm, disp)
    } else if flags.contains(ShapeFlags::REG_MID) {
        Operand::Segment(segment(reg))
    } else {
        Operand::Register(lookup(RegClass::Word, reg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SliceSource;
    use crate::tables::{Reg, SegReg};

    fn decode(bytes: &[u8]) -> Result<Option<Instruction>, DecodeError> {
        I8086Decoder::new().decode(&mut SliceSource::new(bytes))
    }

    #[test]
    fn empty_input_is_clean_end() {
        assert!(decode(&[]).unwrap().is_none());
    }

    #[test]
    fn register_to_register() {
        let ins = decode(&[0x88, 0xc6]).unwrap().unwrap();
        assert_eq!(ins.op(), Op::Mov);
        assert_eq!(ins.dst(), Some(Operand::Register(Reg::Dh)));
        assert_eq!(ins.src(), Some(Operand::Register(Reg::Al)));
        assert!(!ins.flags().contains(ShapeFlags::EFFECTIVE));
        assert_eq!(ins.bytes(), &[0x88, 0xc6]);
    }

    #[test]
    fn negative_disp8_is_sign_extended() {
        let ins = decode(&[0x8b, 0x41, 0xdb]).unwrap().unwrap();
        assert_eq!(ins.disp(), -37);
        assert!(ins.is_reversed());
        assert!(ins.flags().contains(ShapeFlags::WORD | ShapeFlags::EFFECTIVE));
        assert_eq!(ins.dst(), Some(Operand::EffectiveAddress { base: Reg::BxDi, disp: -37 }));
        assert_eq!(ins.destination(), Some(Operand::Register(Reg::Ax)));
    }

    #[test]
    fn direct_address_reads_word_and_names_word_register() {
        let ins = decode(&[0x8a, 0x1e, 0x82, 0x0d]).unwrap().unwrap();
        assert!(ins.flags().contains(ShapeFlags::DIRECT | ShapeFlags::EFFECTIVE));
        assert!(!ins.flags().is_word());
        assert_eq!(ins.dst(), Some(Operand::DirectAddress(3458)));
        assert_eq!(ins.src(), Some(Operand::Register(Reg::Bx)));
        assert_eq!(ins.len(), 4);
    }

    #[test]
    fn mod_one_rm_110_is_bp_not_direct() {
        let ins = decode(&[0x88, 0x6e, 0x00]).unwrap().unwrap();
        assert_eq!(ins.dst(), Some(Operand::EffectiveAddress { base: Reg::Bp, disp: 0 }));
        assert!(!ins.flags().contains(ShapeFlags::DIRECT));
    }

    #[test]
    fn longest_encoding_is_six_bytes() {
        let bytes = [0xc7, 0x85, 0x85, 0x03, 0x5b, 0x01];
        let ins = decode(&bytes).unwrap().unwrap();
        assert_eq!(ins.len(), 6);
        assert_eq!(ins.bytes(), &bytes);
        assert_eq!(ins.data(), Some(347));
        assert_eq!(ins.disp(), 901);
    }

    #[test]
    fn immediate_byte_is_signed() {
        let ins = decode(&[0xb5, 0xf4]).unwrap().unwrap();
        assert_eq!(ins.data(), Some(-12));
        assert_eq!(ins.dst(), Some(Operand::Register(Reg::Ch)));
        assert_eq!(ins.src(), None);
    }

    #[test]
    fn immediate_moves_name_only_their_target() {
        let ins = decode(&[0xb1, 0x0c]).unwrap().unwrap();
        assert_eq!(ins.destination(), Some(Operand::Register(Reg::Cl)));
        assert_eq!(ins.source(), None);

        let ins = decode(&[0xc7, 0x07, 0x05, 0x00]).unwrap().unwrap();
        assert!(!ins.is_reversed());
        assert_eq!(ins.destination(), Some(Operand::EffectiveAddress { base: Reg::Bx, disp: 0 }));
        assert_eq!(ins.source(), None);
        assert_eq!(ins.data(), Some(5));

        let ins = decode(&[0xc6, 0xc1, 0xff]).unwrap().unwrap();
        assert_eq!(ins.destination(), Some(Operand::Register(Reg::Cl)));

        let ins = decode(&[0xc6, 0x06, 0x10, 0x00, 0x07]).unwrap().unwrap();
        assert_eq!(ins.destination(), Some(Operand::DirectAddress(16)));
        assert_eq!(ins.source(), None);
    }

    #[test]
    fn byte_accumulator_address_reads_one_byte() {
        let mut src = SliceSource::new(&[0xa0, 0xf0, 0x90]);
        let ins = I8086Decoder::new().decode(&mut src).unwrap().unwrap();
        assert_eq!(ins.src(), Some(Operand::AccumulatorAddress(0xf0)));
        assert_eq!(ins.dst(), Some(Operand::Register(Reg::Al)));
        assert_eq!(src.offset(), 2);
    }

    #[test]
    fn truncated_disp16_is_missing_byte() {
        let err = decode(&[0x89, 0x8c, 0xd4]).unwrap_err();
        assert!(matches!(err, DecodeError::MissingByte { offset: 3 }), "{err:?}");
    }

    #[test]
    fn truncated_modrm_is_missing_byte() {
        let err = decode(&[0x89]).unwrap_err();
        assert!(matches!(err, DecodeError::MissingByte { offset: 1 }), "{err:?}");
    }

    #[test]
    fn classification_failures_carry_offset() {
        let mut src = SliceSource::new(&[0x89, 0xd9, 0x8e, 0xd8]);
        let dec = I8086Decoder::new();
        dec.decode(&mut src).unwrap().unwrap();
        let err = dec.decode(&mut src).unwrap_err();
        assert!(matches!(err, DecodeError::Unimplemented { offset: 2, byte: 0x8e }), "{err:?}");

        let err = decode(&[0xf4]).unwrap_err();
        assert!(matches!(err, DecodeError::Unknown { offset: 0, byte: 0xf4 }), "{err:?}");
    }

    #[test]
    fn stack_forms() {
        let ins = decode(&[0x53]).unwrap().unwrap();
        assert_eq!((ins.op(), ins.dst(), ins.src()), (Op::Push, Some(Operand::Register(Reg::Bx)), None));

        let ins = decode(&[0x1f]).unwrap().unwrap();
        assert_eq!((ins.op(), ins.dst()), (Op::Pop, Some(Operand::Segment(SegReg::Ds))));

        let ins = decode(&[0xff, 0x72, 0x01]).unwrap().unwrap();
        assert_eq!(ins.dst(), Some(Operand::EffectiveAddress { base: Reg::BpSi, disp: 1 }));

        let ins = decode(&[0x8f, 0xc1]).unwrap().unwrap();
        assert_eq!((ins.op(), ins.dst()), (Op::Pop, Some(Operand::Register(Reg::Cx))));
    }

    #[test]
    fn stack_group_members_are_rejected() {
        // ff /0 is inc
        assert!(matches!(decode(&[0xff, 0xc0]), Err(DecodeError::Unimplemented { byte: 0xff, .. })));
        assert!(matches!(decode(&[0x8f, 0xc8]), Err(DecodeError::Unknown { byte: 0x8f, .. })));
        // es: prefix
        assert!(matches!(decode(&[0x26]), Err(DecodeError::Unimplemented { byte: 0x26, .. })));
    }
}
