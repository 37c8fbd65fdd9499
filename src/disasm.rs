use std::fmt;

use crate::decoder::{Instruction, Op, Operand, ShapeFlags};

/// Column where listing annotations start.
const COMMENT_COLUMN: usize = 24;

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Operand::Register(r) => f.write_str(r.name()),
            Operand::Segment(s) => f.write_str(s.name()),
            Operand::EffectiveAddress { base, disp: 0 } => write!(f, "[{base}]"),
            Operand::EffectiveAddress { base, disp } => write!(f, "[{base} {disp:+}]"),
            Operand::DirectAddress(a) | Operand::AccumulatorAddress(a) => write!(f, "[{a}]"),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&fmt_instruction(self))
    }
}

/// Render one instruction as a NASM line, without the newline.
pub fn fmt_instruction(ins: &Instruction) -> String {
    let mut fields: Vec<String> = Vec::with_capacity(3);
    match ins.op() {
        Op::Mov => {
            let first = ins.destination().map(|o| o.to_string()).unwrap_or_default();
            let second = ins.source().map(|o| o.to_string()).unwrap_or_default();
            fields.push(first);
            match ins.data() {
                Some(data) => fields.push(immediate(ins.flags(), data)),
                None => fields.push(second),
            }
        }
        Op::Push | Op::Pop => {
            if let Some(o) = ins.dst() {
                fields.push(if o.is_memory() { format!("word {o}") } else { o.to_string() });
            }
        }
        Op::Unknown => {}
    }

    let mut line = String::from(ins.op().mnemonic());
    let mut sep = " ";
    for field in fields.iter().filter(|f| !f.is_empty()) {
        line.push_str(sep);
        line.push_str(field);
        sep = ", ";
    }
    line
}

fn immediate(flags: ShapeFlags, data: i16) -> String {
    let size = if flags.is_word() { "word" } else { "byte" };
    // zero prints the size keyword alone
    if data == 0 { size.to_string() } else { format!("{size} {data}") }
}

pub fn hex_bytes(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(" ")
}

/// Instruction text followed by an optional `; offset: bytes` comment.
pub fn fmt_annotated(ins: &Instruction, show_offset: bool, show_bytes: bool) -> String {
    let text = fmt_instruction(ins);
    if !show_offset && !show_bytes {
        return text;
    }
    let mut line = format!("{text:<width$} ;", width = COMMENT_COLUMN);
    if show_offset {
        line.push_str(&format!(" {:04x}", ins.offset()));
        if show_bytes {
            line.push(':');
        }
    }
    if show_bytes {
        line.push(' ');
        line.push_str(&hex_bytes(ins.bytes()));
    }
    line
}
