use serde::{Deserialize, Serialize};
use std::fmt;

/// Register identities reachable through a 3-bit REG/RM code, including the
/// base-register pairs used by effective-address calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reg {
    Al,
    Cl,
    Dl,
    Bl,
    Ah,
    Ch,
    Dh,
    Bh,
    Ax,
    Cx,
    Dx,
    Bx,
    Sp,
    Bp,
    Si,
    Di,
    #[serde(rename = "bx+si")]
    BxSi,
    #[serde(rename = "bx+di")]
    BxDi,
    #[serde(rename = "bp+si")]
    BpSi,
    #[serde(rename = "bp+di")]
    BpDi,
}

impl Reg {
    pub const fn name(self) -> &'static str {
        match self {
            Reg::Al => "al",
            Reg::Cl => "cl",
            Reg::Dl => "dl",
            Reg::Bl => "bl",
            Reg::Ah => "ah",
            Reg::Ch => "ch",
            Reg::Dh => "dh",
            Reg::Bh => "bh",
            Reg::Ax => "ax",
            Reg::Cx => "cx",
            Reg::Dx => "dx",
            Reg::Bx => "bx",
            Reg::Sp => "sp",
            Reg::Bp => "bp",
            Reg::Si => "si",
            Reg::Di => "di",
            Reg::BxSi => "bx+si",
            Reg::BxDi => "bx+di",
            Reg::BpSi => "bp+si",
            Reg::BpDi => "bp+di",
        }
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Row selector for [`REGISTERS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegClass {
    Byte = 0,
    Word = 1,
    EffectiveBase = 2,
}

impl RegClass {
    pub const fn for_width(word: bool) -> Self {
        if word { RegClass::Word } else { RegClass::Byte }
    }
}

pub const REGISTERS: [[Reg; 8]; 3] = [
    [Reg::Al, Reg::Cl, Reg::Dl, Reg::Bl, Reg::Ah, Reg::Ch, Reg::Dh, Reg::Bh],
    [Reg::Ax, Reg::Cx, Reg::Dx, Reg::Bx, Reg::Sp, Reg::Bp, Reg::Si, Reg::Di],
    // rm=110 under MOD=00 is a direct address, not `bp`
    [Reg::BxSi, Reg::BxDi, Reg::BpSi, Reg::BpDi, Reg::Si, Reg::Di, Reg::Bp, Reg::Bx],
];

/// Resolve a 3-bit register code. Bits above the low three are ignored.
pub fn lookup(class: RegClass, code: u8) -> Reg {
    REGISTERS[class as usize][(code & 0b111) as usize]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegReg {
    Es,
    Cs,
    Ss,
    Ds,
}

impl SegReg {
    pub const fn name(self) -> &'static str {
        match self {
            SegReg::Es => "es",
            SegReg::Cs => "cs",
            SegReg::Ss => "ss",
            SegReg::Ds => "ds",
        }
    }
}

impl fmt::Display for SegReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub const SEGMENT_REGISTERS: [SegReg; 4] = [SegReg::Es, SegReg::Cs, SegReg::Ss, SegReg::Ds];

/// Resolve a 2-bit segment register code.
pub fn segment(code: u8) -> SegReg {
    SEGMENT_REGISTERS[(code & 0b11) as usize]
}
