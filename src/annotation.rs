//! Registries for names and decorations gathered from the annotation
//! section.
use fnv::FnvHashMap as HashMap;
use spirv::Decoration;

use crate::error::{Error, Result};

type InstrId = u32;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct DecorationKey {
    id: InstrId,
    member_idx: Option<u32>,
    /// Raw decoration word; SPV_GOOGLE decorations may exceed the header
    /// crate's enum.
    deco: u32,
}

/// One recorded decoration: its literal operands and the word offset of the
/// first operand, kept so single-word literals can be rewritten in place.
#[derive(Clone, Copy)]
pub struct DecorationEntry<'a> {
    pub params: &'a [u32],
    pub word_offset: usize,
}
impl<'a> DecorationEntry<'a> {
    fn single_u32(&self) -> Result<u32> {
        self.params
            .first()
            .copied()
            .ok_or(Error::ParseFailed("decoration misses an operand"))
    }
}

#[derive(Default)]
pub struct DecorationRegistry<'a> {
    deco_map: HashMap<DecorationKey, DecorationEntry<'a>>,
}
impl<'a> DecorationRegistry<'a> {
    fn set_impl(&mut self, key: DecorationKey, entry: DecorationEntry<'a>) -> Result<()> {
        use std::collections::hash_map::Entry;
        match self.deco_map.entry(key) {
            Entry::Vacant(e) => {
                e.insert(entry);
                Ok(())
            }
            Entry::Occupied(_) => Err(Error::DuplicateId(key.id)),
        }
    }

    pub fn set(
        &mut self,
        id: InstrId,
        deco: u32,
        params: &'a [u32],
        word_offset: usize,
    ) -> Result<()> {
        let key = DecorationKey {
            id,
            member_idx: None,
            deco,
        };
        self.set_impl(key, DecorationEntry { params, word_offset })
    }
    pub fn set_member(
        &mut self,
        id: InstrId,
        member_idx: u32,
        deco: u32,
        params: &'a [u32],
        word_offset: usize,
    ) -> Result<()> {
        let key = DecorationKey {
            id,
            member_idx: Some(member_idx),
            deco,
        };
        self.set_impl(key, DecorationEntry { params, word_offset })
    }

    pub fn get(&self, id: InstrId, deco: Decoration) -> Option<DecorationEntry<'a>> {
        self.get_raw(id, deco as u32)
    }
    pub fn get_raw(&self, id: InstrId, deco: u32) -> Option<DecorationEntry<'a>> {
        let key = DecorationKey {
            id,
            member_idx: None,
            deco,
        };
        self.deco_map.get(&key).copied()
    }
    pub fn get_member(
        &self,
        id: InstrId,
        member_idx: u32,
        deco: Decoration,
    ) -> Option<DecorationEntry<'a>> {
        self.get_member_raw(id, member_idx, deco as u32)
    }
    pub fn get_member_raw(
        &self,
        id: InstrId,
        member_idx: u32,
        deco: u32,
    ) -> Option<DecorationEntry<'a>> {
        let key = DecorationKey {
            id,
            member_idx: Some(member_idx),
            deco,
        };
        self.deco_map.get(&key).copied()
    }

    pub fn contains(&self, id: InstrId, deco: Decoration) -> bool {
        self.get(id, deco).is_some()
    }
    pub fn contains_member(&self, id: InstrId, member_idx: u32, deco: Decoration) -> bool {
        self.get_member(id, member_idx, deco).is_some()
    }

    pub fn get_u32(&self, id: InstrId, deco: Decoration) -> Option<u32> {
        self.get(id, deco).and_then(|x| x.single_u32().ok())
    }
    pub fn get_member_u32(&self, id: InstrId, member_idx: u32, deco: Decoration) -> Option<u32> {
        self.get_member(id, member_idx, deco)
            .and_then(|x| x.single_u32().ok())
    }

    /// Decode a string decoration (SPV_GOOGLE_decorate_string operands).
    pub fn get_str_raw(&self, id: InstrId, deco: u32) -> Option<&'a str> {
        let entry = self.get_raw(id, deco)?;
        decode_deco_str(entry.params)
    }
    pub fn get_member_str_raw(&self, id: InstrId, member_idx: u32, deco: u32) -> Option<&'a str> {
        let entry = self.get_member_raw(id, member_idx, deco)?;
        decode_deco_str(entry.params)
    }

    /// All non-member targets carrying `deco`.
    pub fn get_all(&self, deco: Decoration) -> impl Iterator<Item = (InstrId, DecorationEntry<'a>)> + '_ {
        let deco = deco as u32;
        self.deco_map
            .iter()
            .filter(move |(key, _)| key.deco == deco && key.member_idx.is_none())
            .map(|(key, entry)| (key.id, *entry))
    }
}

fn decode_deco_str(params: &[u32]) -> Option<&str> {
    let bytes: &[u8] = bytemuck::cast_slice(params);
    let nul_pos = bytes.iter().position(|x| *x == 0)?;
    std::str::from_utf8(&bytes[..nul_pos]).ok()
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct NameKey {
    id: InstrId,
    member_idx: Option<u32>,
}

#[derive(Default)]
pub struct NameRegistry<'a> {
    name_map: HashMap<NameKey, &'a str>,
}
impl<'a> NameRegistry<'a> {
    // Names are debug information; id collisions are ignored, first name
    // wins.
    pub fn set(&mut self, id: InstrId, name: &'a str) {
        let key = NameKey {
            id,
            member_idx: None,
        };
        self.name_map.entry(key).or_insert(name);
    }
    pub fn set_member(&mut self, id: InstrId, member_idx: u32, name: &'a str) {
        let key = NameKey {
            id,
            member_idx: Some(member_idx),
        };
        self.name_map.entry(key).or_insert(name);
    }

    pub fn get(&self, id: InstrId) -> Option<&'a str> {
        self.name_map
            .get(&NameKey {
                id,
                member_idx: None,
            })
            .copied()
    }
    pub fn get_member(&self, id: InstrId, member_idx: u32) -> Option<&'a str> {
        self.name_map
            .get(&NameKey {
                id,
                member_idx: Some(member_idx),
            })
            .copied()
    }
}
