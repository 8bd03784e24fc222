//! SPIR-V binary blob and module header.
use std::convert::TryInto;
use std::iter::FromIterator;

use num_derive::FromPrimitive;
use num_traits::FromPrimitive as _;

use crate::consts::{HEADER_LEN, SPIRV_MAGIC};
use crate::error::{Error, Result};

/// Tool that emitted a module, decoded from the generator header word for
/// display purposes only.
#[derive(FromPrimitive, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Generator {
    KhronosLlvmSpirvTranslator = 6,
    KhronosSpirvToolsAssembler = 7,
    KhronosGlslangReferenceFrontEnd = 8,
    GoogleShadercOverGlslang = 13,
    GoogleSpiregg = 14,
    GoogleRspirv = 15,
    XLegendMesaMesairSpirvTranslator = 16,
    KhronosSpirvToolsLinker = 17,
    WineVkd3dShaderCompiler = 18,
    ClayClayShaderCompiler = 19,
}
impl Generator {
    pub fn from_word(word: u32) -> Option<Generator> {
        Generator::from_u32(word & 0xFFFF)
    }
}

/// The five-word module header.
#[derive(Debug, Clone)]
pub struct SpirvHeader {
    pub magic: u32,
    pub version: u32,
    pub generator: u32,
    pub bound: u32,
    pub schema: u32,
}
impl SpirvHeader {
    pub fn generator(&self) -> Option<Generator> {
        Generator::from_word(self.generator)
    }
    pub fn version_major(&self) -> u32 {
        (self.version >> 16) & 0xFF
    }
    pub fn version_minor(&self) -> u32 {
        (self.version >> 8) & 0xFF
    }
}

/// SPIR-V program binary.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SpirvBinary(Vec<u32>);
impl From<Vec<u32>> for SpirvBinary {
    fn from(x: Vec<u32>) -> Self {
        SpirvBinary(x)
    }
}
impl From<&[u32]> for SpirvBinary {
    fn from(x: &[u32]) -> Self {
        SpirvBinary(x.to_owned())
    }
}
impl FromIterator<u32> for SpirvBinary {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        SpirvBinary(iter.into_iter().collect::<Vec<u32>>())
    }
}

impl SpirvBinary {
    /// Decode a byte blob into words. The byte length must be a multiple of
    /// four; a big-endian magic in byte 0 flips the decode accordingly.
    pub fn from_bytes(x: &[u8]) -> Result<Self> {
        if x.len() % 4 != 0 {
            return Err(Error::InvalidCodeSize(x.len()));
        }
        let from_word_bytes = match x.first() {
            Some(0x03) => u32::from_le_bytes,
            Some(0x07) => u32::from_be_bytes,
            _ => return Err(Error::InvalidMagicNumber(0)),
        };
        let out = x
            .chunks_exact(4)
            .map(|x| from_word_bytes(x.try_into().unwrap()))
            .collect::<SpirvBinary>();
        Ok(out)
    }

    pub fn words(&self) -> &[u32] {
        &self.0
    }
    pub fn into_words(self) -> Vec<u32> {
        self.0
    }
}

/// Split a word buffer into header and instruction stream, enforcing the
/// minimum size and magic number rules.
pub(crate) fn split_header(words: &[u32]) -> Result<(SpirvHeader, &[u32])> {
    if words.len() < HEADER_LEN {
        return Err(Error::InvalidCodeSize(words.len() * 4));
    }
    if words[0] != SPIRV_MAGIC {
        return Err(Error::InvalidMagicNumber(words[0]));
    }
    let header = SpirvHeader {
        magic: words[0],
        version: words[1],
        generator: words[2],
        bound: words[3],
        schema: words[4],
    };
    Ok((header, &words[HEADER_LEN..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unaligned_bytes() {
        assert_eq!(
            SpirvBinary::from_bytes(&[0x03, 0x02, 0x23]),
            Err(Error::InvalidCodeSize(3))
        );
    }

    #[test]
    fn decodes_both_endians() {
        let le = [0x03, 0x02, 0x23, 0x07];
        let be = [0x07, 0x23, 0x02, 0x03];
        assert_eq!(SpirvBinary::from_bytes(&le).unwrap().words(), &[SPIRV_MAGIC]);
        assert_eq!(SpirvBinary::from_bytes(&be).unwrap().words(), &[SPIRV_MAGIC]);
    }

    #[test]
    fn header_checks() {
        assert_eq!(
            split_header(&[SPIRV_MAGIC, 0, 0]).unwrap_err(),
            Error::InvalidCodeSize(12)
        );
        assert_eq!(
            split_header(&[1, 2, 3, 4, 5]).unwrap_err(),
            Error::InvalidMagicNumber(1)
        );
        let (header, rest) = split_header(&[SPIRV_MAGIC, 0x0001_0500, 8 << 16 | 8, 100, 0]).unwrap();
        assert_eq!(header.version_major(), 1);
        assert_eq!(header.version_minor(), 5);
        assert!(rest.is_empty());
    }
}
