//! SPIR-V instruction stream parser.
use std::fmt;

use num_traits::FromPrimitive;
use spirv::Op;

use crate::consts::HEADER_LEN;
use crate::error::{Error, Result};

/// Borrowed view of a single instruction, remembering its word offset from
/// the start of the module so decorations can be rewritten in place later.
#[derive(Clone, Copy)]
pub struct Instr<'a> {
    offset: usize,
    words: &'a [u32],
}
impl<'a> Instr<'a> {
    /// Get the instruction opcode.
    pub fn opcode(&self) -> u32 {
        self.words[0] & 0xFFFF
    }
    /// Get the instruction op, if the opcode is known to the `spirv` crate.
    pub fn op(&self) -> Option<Op> {
        Op::from_u32(self.opcode())
    }
    /// Word offset of this instruction from the start of the module.
    pub fn offset(&self) -> usize {
        self.offset
    }
    /// Word count of the instruction, including the leading count/opcode word.
    pub fn word_count(&self) -> usize {
        self.words.len()
    }
    pub fn as_ref(&self) -> &'a [u32] {
        self.words
    }
    /// Get an operand reader over the words following the opcode word.
    pub fn operands(&self) -> Operands<'a> {
        Operands {
            words: &self.words[1..],
            offset: self.offset + 1,
        }
    }
}
impl<'a> fmt::Debug for Instr<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op() {
            Some(op) => write!(f, "{:?} {:?}", op, &self.words[1..]),
            None => write!(f, "Op({}) {:?}", self.opcode(), &self.words[1..]),
        }
    }
}

/// Forward iterator over the instructions of a module, past the header.
pub struct Instrs<'a> {
    words: &'a [u32],
    offset: usize,
    cache: Option<Instr<'a>>,
}
impl<'a> Instrs<'a> {
    /// `words` is the instruction stream after the five header words.
    pub fn new(words: &'a [u32]) -> Result<Instrs<'a>> {
        let mut out = Instrs {
            words,
            offset: HEADER_LEN,
            cache: None,
        };
        out.load_next()?;
        Ok(out)
    }

    fn load_next(&mut self) -> Result<()> {
        self.cache = match self.words.first() {
            None => None,
            Some(head) => {
                let len = (*head >> 16) as usize;
                if len == 0 {
                    return Err(Error::InvalidInstruction(self.offset));
                }
                if len > self.words.len() {
                    return Err(Error::UnexpectedEof(self.offset));
                }
                let instr = Instr {
                    offset: self.offset,
                    words: &self.words[..len],
                };
                self.words = &self.words[len..];
                self.offset += len;
                Some(instr)
            }
        };
        Ok(())
    }

    pub fn peek(&self) -> Option<Instr<'a>> {
        self.cache
    }
    pub fn next(&mut self) -> Result<Option<Instr<'a>>> {
        let last_cache = self.cache.take();
        self.load_next()?;
        Ok(last_cache)
    }
}

/// Bounds-checked instruction operand reader.
#[derive(Clone)]
pub struct Operands<'a> {
    words: &'a [u32],
    offset: usize,
}
impl<'a> Operands<'a> {
    pub fn len(&self) -> usize {
        self.words.len()
    }
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
    /// Word offset of the next operand from the start of the module.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        match self.words.first() {
            Some(x) => {
                self.words = &self.words[1..];
                self.offset += 1;
                Ok(*x)
            }
            None => Err(Error::UnexpectedEof(self.offset)),
        }
    }
    pub fn read_bool(&mut self) -> Result<bool> {
        self.read_u32().map(|x| x != 0)
    }
    pub fn read_id(&mut self) -> Result<u32> {
        self.read_u32()
    }
    /// Read a NUL-terminated string packed four bytes a word, little-endian.
    pub fn read_str(&mut self) -> Result<&'a str> {
        let bytes: &[u8] = bytemuck::cast_slice(self.words);
        let nul_pos = bytes
            .iter()
            .position(|x| *x == 0)
            .ok_or(Error::UnexpectedEof(self.offset + self.words.len()))?;
        let nword = nul_pos / 4 + 1;
        let out = std::str::from_utf8(&bytes[..nul_pos])
            .map_err(|_| Error::ParseFailed("string operand is not utf-8"))?;
        self.words = &self.words[nword..];
        self.offset += nword;
        Ok(out)
    }
    pub fn read_enum<E: FromPrimitive>(&mut self) -> Result<E> {
        self.read_u32()
            .and_then(|x| E::from_u32(x).ok_or(Error::ParseFailed("unencoded enum value")))
    }
    /// Read all remaining operand words.
    pub fn read_list(&mut self) -> Result<&'a [u32]> {
        let rv = self.words;
        self.offset += self.words.len();
        self.words = &[];
        Ok(rv)
    }
}

/// Assembles a single instruction; test and tooling aid.
pub struct InstructionBuilder {
    inner: Vec<u32>,
}
impl InstructionBuilder {
    pub fn new(op: Op) -> InstructionBuilder {
        Self::new_raw(op as u32)
    }
    pub fn new_raw(opcode: u32) -> InstructionBuilder {
        InstructionBuilder {
            inner: vec![opcode & 0xFFFF],
        }
    }
    pub fn push(mut self, x: u32) -> Self {
        self.inner.push(x);
        self
    }
    pub fn push_list(mut self, x: &[u32]) -> Self {
        self.inner.extend_from_slice(x);
        self
    }
    pub fn push_str(mut self, x: &str) -> Self {
        let mut bytes = x.as_bytes().to_owned();
        bytes.push(0);
        while bytes.len() % 4 != 0 {
            bytes.push(0);
        }
        self.inner.extend(
            bytes
                .chunks_exact(4)
                .map(|x| u32::from_le_bytes([x[0], x[1], x[2], x[3]])),
        );
        self
    }
    pub fn build(mut self) -> Vec<u32> {
        self.inner[0] |= (self.inner.len() as u32) << 16;
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_tracks_offsets() {
        let mut words = InstructionBuilder::new(Op::Capability).push(1).build();
        words.extend(InstructionBuilder::new(Op::TypeVoid).push(2).build());
        let mut instrs = Instrs::new(&words).unwrap();
        let cap = instrs.next().unwrap().unwrap();
        assert_eq!(cap.offset(), HEADER_LEN);
        assert_eq!(cap.op(), Some(Op::Capability));
        let ty = instrs.next().unwrap().unwrap();
        assert_eq!(ty.offset(), HEADER_LEN + 2);
        assert!(instrs.next().unwrap().is_none());
    }

    #[test]
    fn zero_length_instruction_rejected() {
        assert!(matches!(
            Instrs::new(&[0]),
            Err(Error::InvalidInstruction(_))
        ));
    }

    #[test]
    fn truncated_instruction_rejected() {
        let head = (3u32 << 16) | Op::TypeInt as u32;
        assert!(matches!(
            Instrs::new(&[head, 1]),
            Err(Error::UnexpectedEof(_))
        ));
    }

    #[test]
    fn string_round_trip() {
        let words = InstructionBuilder::new(Op::Name)
            .push(42)
            .push_str("main_point")
            .build();
        let instrs = Instrs::new(&words).unwrap();
        let instr = instrs.peek().unwrap();
        let mut operands = instr.operands();
        assert_eq!(operands.read_u32().unwrap(), 42);
        assert_eq!(operands.read_str().unwrap(), "main_point");
        assert!(operands.is_empty());
    }

    #[test]
    fn string_requires_terminator() {
        let mut operands = Operands {
            words: &[0x6161_6161],
            offset: 0,
        };
        assert!(matches!(operands.read_str(), Err(Error::UnexpectedEof(_))));
    }
}
