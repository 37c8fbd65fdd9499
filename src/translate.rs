use std::io::{Read, Write};
use std::iter::FusedIterator;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::decoder::{Decoder, Instruction};
use crate::disasm::{fmt_annotated, fmt_instruction};
use crate::error::DecodeError;
use crate::isa::i8086::I8086Decoder;
use crate::source::{ByteSource, ReaderSource, SliceSource};

/// Emitted before the first instruction.
pub const HEADER: &str = "bits 16\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateConfig {
    pub header: bool,
    pub show_offsets: bool,
    pub show_bytes: bool,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            header: true,
            show_offsets: false,
            show_bytes: false,
        }
    }
}

/// Decode a single instruction from `src` with the 8086 decoder.
pub fn decode_one<S: ByteSource + ?Sized>(src: &mut S) -> Result<Option<Instruction>, DecodeError> {
    I8086Decoder::new().decode(src)
}

/// Instructions of a byte source, in stream order. Yields at most one error
/// and ends after it.
pub struct Instructions<S, D = I8086Decoder> {
    src: S,
    dec: D,
    done: bool,
}

pub fn instructions<S: ByteSource>(src: S) -> Instructions<S> {
    Instructions::with_decoder(src, I8086Decoder::new())
}

impl<S: ByteSource, D: Decoder> Instructions<S, D> {
    pub fn with_decoder(src: S, dec: D) -> Self {
        Self { src, dec, done: false }
    }

    /// Bytes consumed so far.
    pub fn offset(&self) -> u64 {
        self.src.offset()
    }
}

impl<S: ByteSource, D: Decoder> Iterator for Instructions<S, D> {
    type Item = Result<Instruction, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.dec.decode(&mut self.src) {
            Ok(Some(ins)) => Some(Ok(ins)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<S: ByteSource, D: Decoder> FusedIterator for Instructions<S, D> {}

/// Translate a whole byte stream to NASM text with the default settings.
/// Returns the number of instructions written.
pub fn translate<R: Read, W: Write>(input: R, output: W) -> Result<usize, DecodeError> {
    translate_with(input, output, &TranslateConfig::default())
}

/// Translate a whole byte stream. Stops at the first decode error; lines
/// already written stay in `output`.
pub fn translate_with<R: Read, W: Write>(
    input: R,
    mut output: W,
    cfg: &TranslateConfig,
) -> Result<usize, DecodeError> {
    if cfg.header {
        output.write_all(HEADER.as_bytes())?;
    }
    let mut iter = instructions(ReaderSource::new(input));
    let mut count = 0usize;
    let mut result = Ok(());
    for item in &mut iter {
        result = item.and_then(|ins| {
            writeln!(output, "{}", fmt_annotated(&ins, cfg.show_offsets, cfg.show_bytes))?;
            Ok(())
        });
        if result.is_err() {
            break;
        }
        count += 1;
    }
    let flushed = output.flush();
    debug!(instructions = count, bytes = iter.offset(), ok = result.is_ok(), "translation finished");
    // a decode error outranks a failed flush
    result?;
    flushed?;
    Ok(count)
}

/// Disassemble an in-memory buffer, header included.
pub fn disassemble(bytes: &[u8]) -> Result<String, DecodeError> {
    let mut out = String::from(HEADER);
    for ins in instructions(SliceSource::new(bytes)) {
        out.push_str(&fmt_instruction(&ins?));
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Op;

    #[test]
    fn iterator_stops_after_error() {
        let mut it = instructions(SliceSource::new(&[0x89, 0xd9, 0xf4, 0x89, 0xd9]));
        assert!(matches!(it.next(), Some(Ok(ins)) if ins.op() == Op::Mov));
        assert!(matches!(it.next(), Some(Err(DecodeError::Unknown { offset: 2, .. }))));
        assert!(it.next().is_none());
        assert!(it.next().is_none());
        assert_eq!(it.offset(), 3);
    }

    #[test]
    fn decode_one_leaves_rest_of_stream() {
        let mut src = SliceSource::new(&[0xb1, 0x0c, 0x53]);
        let ins = decode_one(&mut src).unwrap().unwrap();
        assert_eq!(ins.to_string(), "mov cl, byte 12");
        assert_eq!(src.remaining(), &[0x53]);
    }

    #[test]
    fn config_defaults_from_partial_json() {
        let cfg: TranslateConfig = serde_json::from_str(r#"{ "show_bytes": true }"#).unwrap();
        assert_eq!(cfg, TranslateConfig { show_bytes: true, ..Default::default() });
        assert!(cfg.header);
    }

    struct FlushFails(Vec<u8>);

    impl Write for FlushFails {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.write(buf)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
        }
    }

    #[test]
    fn decode_error_is_not_masked_by_flush() {
        let mut out = FlushFails(Vec::new());
        let err = translate(&[0x89u8, 0xd9, 0xf4][..], &mut out).unwrap_err();
        assert!(matches!(err, DecodeError::Unknown { offset: 2, byte: 0xf4 }), "{err:?}");
        assert_eq!(String::from_utf8(out.0).unwrap(), format!("{HEADER}mov cx, bx\n"));

        let err = translate(&[0x89u8, 0xd9][..], FlushFails(Vec::new())).unwrap_err();
        assert!(matches!(err, DecodeError::Io(_)), "{err:?}");
    }

    #[test]
    fn header_can_be_disabled() {
        let mut out = Vec::new();
        let cfg = TranslateConfig { header: false, ..Default::default() };
        let n = translate_with(&[0x89u8, 0xd9][..], &mut out, &cfg).unwrap();
        assert_eq!(n, 1);
        assert_eq!(String::from_utf8(out).unwrap(), "mov cx, bx\n");
    }
}
