//! Type arena keyed by result id.
use nohash_hasher::IntMap;

use crate::error::{Error, Result};
use crate::ty::Type;

pub type TypeId = u32;

#[derive(Default)]
pub struct TypeRegistry {
    ty_map: IntMap<TypeId, Type>,
}
impl TypeRegistry {
    /// Assign a type to `id`. Each id is assigned at most once; the one legal
    /// overwrite is an `OpTypePointer` completing an earlier
    /// `OpTypeForwardPointer`.
    pub fn set(&mut self, id: TypeId, ty: Type) -> Result<()> {
        use std::collections::hash_map::Entry;
        match self.ty_map.entry(id) {
            Entry::Vacant(entry) => {
                entry.insert(ty);
                Ok(())
            }
            Entry::Occupied(mut entry) => {
                if entry.get().is_forward_pointer() && ty.is_pointer() {
                    entry.insert(ty);
                    Ok(())
                } else {
                    Err(Error::DuplicateId(id))
                }
            }
        }
    }

    pub fn get(&self, id: TypeId) -> Result<&Type> {
        self.ty_map.get(&id).ok_or(Error::InvalidIdReference(id))
    }

    pub fn contains(&self, id: TypeId) -> bool {
        self.ty_map.contains_key(&id)
    }

    /// Resolve a pointer type to its pointee. Following a forward pointer
    /// that was never completed is refused.
    pub fn get_pointee(&self, ptr_ty_id: TypeId) -> Result<(&Type, u32)> {
        match self.get(ptr_ty_id)? {
            Type::Pointer(ptr_ty) => Ok((&ptr_ty.pointee_ty, ptr_ty.storage_class)),
            Type::ForwardPointer(_) => Err(Error::InvalidIdReference(ptr_ty_id)),
            _ => Err(Error::InvalidType(ptr_ty_id, "expected a pointer type")),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TypeId, &Type)> {
        self.ty_map.iter()
    }

    pub fn len(&self) -> usize {
        self.ty_map.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::{ForwardPointerType, PointerType, SamplerType};

    #[test]
    fn forward_pointer_completes_once() {
        let mut reg = TypeRegistry::default();
        reg.set(1, Type::ForwardPointer(ForwardPointerType { storage_class: 2 }))
            .unwrap();
        assert_eq!(reg.get_pointee(1), Err(Error::InvalidIdReference(1)));
        reg.set(
            1,
            Type::Pointer(PointerType {
                pointee_ty: Box::new(Type::Sampler(SamplerType {})),
                storage_class: 2,
            }),
        )
        .unwrap();
        assert!(reg.get_pointee(1).is_ok());
        assert_eq!(
            reg.set(1, Type::Sampler(SamplerType {})),
            Err(Error::DuplicateId(1))
        );
    }
}
