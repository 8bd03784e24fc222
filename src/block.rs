//! Buffer and push-constant block layout.
use bitflags::bitflags;
use spirv::Decoration;

use crate::annotation::DecorationRegistry;
use crate::error::{Error, Result};
use crate::ty::{ArrayTraits, DecorationFlags, NumericTraits, Type};

bitflags! {
    /// Flags of a reflected block variable.
    pub struct VariableFlags: u32 {
        /// No constant-indexed access chain from an entry-point-reachable
        /// function reaches this variable.
        const UNUSED = 0x0000_0001;
    }
}

/// A buffer block, push-constant block, or a member of one, with its byte
/// layout fully resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockVariable {
    pub name: Option<String>,
    /// Byte offset within the parent, from the `Offset` member decoration.
    pub offset: u32,
    /// Byte offset from the block root; zero inside an array-of-struct
    /// parent where per-element offsets differ.
    pub absolute_offset: u32,
    /// Effective size in bytes.
    pub size: u32,
    /// Size in bytes including trailing padding up to the next member (or
    /// the 16-byte rounded block tail).
    pub padded_size: u32,
    pub decoration_flags: DecorationFlags,
    pub numeric: NumericTraits,
    pub array: ArrayTraits,
    pub flags: VariableFlags,
    pub members: Vec<BlockVariable>,
    pub ty: Type,
    /// Word offset of the literal of this member's `OpMemberDecorate Offset`.
    pub word_offset_offset: Option<usize>,
}
impl BlockVariable {
    pub fn is_used(&self) -> bool {
        !self.flags.contains(VariableFlags::UNUSED)
    }

    pub fn member(&self, name: &str) -> Option<&BlockVariable> {
        self.members.iter().find(|x| x.name.as_deref() == Some(name))
    }
}

/// Mirror the type tree of a block into `BlockVariable` nodes. Every node
/// starts flagged `UNUSED`; usage marking clears the flag afterwards.
pub(crate) fn build_block_variable(
    ty: &Type,
    name: Option<String>,
    offset: u32,
    decoration_flags: DecorationFlags,
    word_offset_offset: Option<usize>,
    deco_reg: &DecorationRegistry,
) -> BlockVariable {
    let mut members = Vec::new();
    if let Type::Struct(struct_ty) = ty.element_ty() {
        members.reserve(struct_ty.members.len());
        for (i, member) in struct_ty.members.iter().enumerate() {
            let word_offset_offset = deco_reg
                .get_member(struct_ty.id, i as u32, Decoration::Offset)
                .map(|x| x.word_offset);
            let child = build_block_variable(
                &member.ty,
                member.name.clone(),
                member.offset.unwrap_or(0),
                member.decoration_flags,
                word_offset_offset,
                deco_reg,
            );
            members.push(child);
        }
    }

    let mut decoration_flags = decoration_flags;
    if members
        .iter()
        .any(|x| x.decoration_flags.contains(DecorationFlags::NON_WRITABLE))
    {
        decoration_flags |= DecorationFlags::NON_WRITABLE;
    }

    BlockVariable {
        name,
        offset,
        absolute_offset: 0,
        size: 0,
        padded_size: 0,
        decoration_flags,
        numeric: ty.numeric_traits(),
        array: ty.array_traits().unwrap_or_default(),
        flags: VariableFlags::UNUSED,
        members,
        ty: ty.clone(),
        word_offset_offset,
    }
}

fn round_up(x: u32, to: u32) -> u32 {
    (x + to - 1) / to * to
}

fn is_runtime_array(ty: &Type) -> bool {
    match ty {
        Type::Array(arr_ty) => matches!(arr_ty.len, crate::ty::ArrayLen::Runtime),
        _ => false,
    }
}

/// Resolve sizes, padded sizes and absolute offsets over a block tree built
/// by [`build_block_variable`]. Call on the block root only.
pub(crate) fn compute_block_sizes(root: &mut BlockVariable) {
    compute_sizes(root, true, false, false, 0);
    root.padded_size = root.size;
}

fn compute_sizes(
    var: &mut BlockVariable,
    is_root: bool,
    is_parent_aos: bool,
    is_parent_rta: bool,
    parent_abs: u32,
) {
    var.absolute_offset = if is_root {
        var.offset
    } else if is_parent_aos {
        0
    } else {
        var.offset + parent_abs
    };

    let is_array = var.ty.is_array();
    let is_rta = is_runtime_array(&var.ty);
    let inside_rta = is_parent_rta || is_rta;

    let child_abs = var.absolute_offset;
    let n = var.members.len();
    for member in var.members.iter_mut() {
        compute_sizes(member, false, is_array, inside_rta, child_abs);
    }
    // Padded size by offset difference; the last member rounds the block
    // tail to 16 bytes, except inside a runtime array where elements are
    // laid out back to back by the array stride.
    for i in 0..n.saturating_sub(1) {
        let next_offset = var.members[i + 1].offset;
        let member = &mut var.members[i];
        member.padded_size = next_offset.saturating_sub(member.offset);
    }
    if let Some(member) = var.members.last_mut() {
        member.padded_size = if inside_rta {
            member.size
        } else {
            round_up(member.offset + member.size, 16) - member.offset
        };
        if is_runtime_array(&member.ty) {
            member.padded_size = 0;
        }
    }

    match &var.ty {
        Type::Scalar(x) => {
            var.size = x.nbyte();
        }
        Type::Vector(x) => {
            var.size = x.scalar_count * x.scalar_ty.nbyte();
        }
        Type::Matrix(_) => {
            let stride = var.numeric.matrix.stride;
            var.size = if var.decoration_flags.contains(DecorationFlags::ROW_MAJOR) {
                stride * var.numeric.matrix.row_count
            } else {
                stride * var.numeric.matrix.column_count
            };
        }
        Type::Array(_) => {
            var.size = if is_rta {
                0
            } else {
                let dim = var.array.dims.first().copied().unwrap_or(0);
                // Spec-sized dims report the !0 sentinel and resolve to an
                // unknown size until specialization.
                if dim == !0 {
                    0
                } else {
                    var.array.stride * dim
                }
            };
        }
        Type::Struct(_) => {
            var.size = var
                .members
                .last()
                .map(|x| x.offset + x.padded_size)
                .unwrap_or(0);
        }
        _ => {}
    }
}

/// Clear `UNUSED` along the path of a constant-indexed access chain, and on
/// the entire subtree below the point the chain stops at. `indices` carries
/// `None` for runtime-valued index operands.
pub(crate) fn mark_access_chain(
    block_id: u32,
    var: &mut BlockVariable,
    indices: &[Option<u32>],
) -> Result<()> {
    var.flags.remove(VariableFlags::UNUSED);
    let mut rest = indices;
    if var.ty.is_array() {
        // One index per array dimension; the index values are irrelevant to
        // member selection.
        let ndim = var.array.dims.len();
        if rest.len() <= ndim {
            clear_unused(var);
            return Ok(());
        }
        rest = &rest[ndim..];
    }
    if var.ty.element_ty().is_struct() {
        match rest.split_first() {
            None => {
                clear_unused(var);
                Ok(())
            }
            Some((Some(i), rest)) => {
                let i = *i;
                match var.members.get_mut(i as usize) {
                    Some(member) => mark_access_chain(block_id, member, rest),
                    None => Err(Error::InvalidBlockMemberReference(block_id, i)),
                }
            }
            // A runtime-valued index cannot select a struct member; keep the
            // whole subtree live.
            Some((None, _)) => {
                clear_unused(var);
                Ok(())
            }
        }
    } else {
        // Scalar, vector or matrix leaf; any remaining indices step into
        // components.
        clear_unused(var);
        Ok(())
    }
}

fn clear_unused(var: &mut BlockVariable) {
    var.flags.remove(VariableFlags::UNUSED);
    for member in var.members.iter_mut() {
        clear_unused(member);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::{ArrayLen, ArrayType, ScalarType, StructMember, StructType, VectorType};

    fn vec4() -> Type {
        Type::Vector(VectorType {
            scalar_ty: ScalarType::f32(),
            scalar_count: 4,
        })
    }

    fn member(name: &str, offset: u32, ty: Type) -> StructMember {
        StructMember {
            name: Some(name.to_owned()),
            offset: Some(offset),
            ty,
            decoration_flags: DecorationFlags::empty(),
            built_in: None,
        }
    }

    fn build(ty: &Type) -> BlockVariable {
        let deco_reg = DecorationRegistry::default();
        let mut block = build_block_variable(
            ty,
            None,
            0,
            DecorationFlags::BLOCK,
            None,
            &deco_reg,
        );
        compute_block_sizes(&mut block);
        block
    }

    #[test]
    fn scalar_tail_rounds_to_sixteen() {
        let ty = Type::Struct(StructType {
            id: 1,
            name: None,
            members: vec![member("a", 0, Type::Scalar(ScalarType::u32()))],
            decoration_flags: DecorationFlags::BLOCK,
        });
        let block = build(&ty);
        assert_eq!(block.members[0].size, 4);
        assert_eq!(block.members[0].padded_size, 16);
        assert_eq!(block.size, 16);
        assert_eq!(block.padded_size, 16);
    }

    #[test]
    fn offset_difference_padding() {
        let ty = Type::Struct(StructType {
            id: 1,
            name: None,
            members: vec![
                member("a", 0, Type::Scalar(ScalarType::f32())),
                member("b", 16, vec4()),
            ],
            decoration_flags: DecorationFlags::BLOCK,
        });
        let block = build(&ty);
        assert_eq!(block.members[0].padded_size, 16);
        assert_eq!(block.members[1].offset, 16);
        assert_eq!(block.members[1].padded_size, 16);
        assert_eq!(block.size, 32);
    }

    #[test]
    fn runtime_array_is_zero_sized() {
        let rta = Type::Array(ArrayType {
            element_ty: Box::new(Type::Scalar(ScalarType::u32())),
            len: ArrayLen::Runtime,
            stride: Some(4),
        });
        let ty = Type::Struct(StructType {
            id: 1,
            name: None,
            members: vec![member("data", 0, rta)],
            decoration_flags: DecorationFlags::BUFFER_BLOCK,
        });
        let block = build(&ty);
        assert_eq!(block.members[0].size, 0);
        assert_eq!(block.members[0].padded_size, 0);
        assert_eq!(block.size, 0);
    }

    #[test]
    fn access_chain_marks_member_and_subtree() {
        let inner = Type::Struct(StructType {
            id: 2,
            name: None,
            members: vec![
                member("x", 0, Type::Scalar(ScalarType::f32())),
                member("y", 4, Type::Scalar(ScalarType::f32())),
            ],
            decoration_flags: DecorationFlags::empty(),
        });
        let ty = Type::Struct(StructType {
            id: 1,
            name: None,
            members: vec![member("s", 0, inner), member("t", 16, vec4())],
            decoration_flags: DecorationFlags::BLOCK,
        });
        let mut block = build(&ty);
        assert!(!block.members[0].is_used());
        mark_access_chain(9, &mut block, &[Some(0)]).unwrap();
        assert!(block.members[0].is_used());
        assert!(block.members[0].members[0].is_used());
        assert!(block.members[0].members[1].is_used());
        assert!(!block.members[1].is_used());
        assert_eq!(
            mark_access_chain(9, &mut block, &[Some(5)]),
            Err(Error::InvalidBlockMemberReference(9, 5))
        );
    }
}
