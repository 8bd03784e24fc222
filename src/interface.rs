//! Shader input/output interface variables.
use spirv::Decoration;

use crate::annotation::{DecorationRegistry, NameRegistry};
use crate::consts::DECO_HLSL_SEMANTIC_GOOGLE;
use crate::ty::{ArrayTraits, DecorationFlags, NumericTraits, ScalarType, Type};

/// `VkFormat` equivalent derived from an interface variable's component
/// type, width and count. Aggregates that span several locations report
/// `Undefined`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Format {
    Undefined,
    R16Uint,
    R16Sint,
    R16Sfloat,
    R16G16Uint,
    R16G16Sint,
    R16G16Sfloat,
    R16G16B16Uint,
    R16G16B16Sint,
    R16G16B16Sfloat,
    R16G16B16A16Uint,
    R16G16B16A16Sint,
    R16G16B16A16Sfloat,
    R32Uint,
    R32Sint,
    R32Sfloat,
    R32G32Uint,
    R32G32Sint,
    R32G32Sfloat,
    R32G32B32Uint,
    R32G32B32Sint,
    R32G32B32Sfloat,
    R32G32B32A32Uint,
    R32G32B32A32Sint,
    R32G32B32A32Sfloat,
    R64Uint,
    R64Sint,
    R64Sfloat,
    R64G64Uint,
    R64G64Sint,
    R64G64Sfloat,
    R64G64B64Uint,
    R64G64B64Sint,
    R64G64B64Sfloat,
    R64G64B64A64Uint,
    R64G64B64A64Sint,
    R64G64B64A64Sfloat,
}

/// Derive the format of an interface variable type, looking through arrays.
pub(crate) fn format_of(ty: &Type) -> Format {
    use Format::*;
    let (scalar_ty, count) = match ty.element_ty() {
        Type::Scalar(x) => (x, 1),
        Type::Vector(x) => (&x.scalar_ty, x.scalar_count),
        _ => return Undefined,
    };
    let (width, kind) = match scalar_ty {
        ScalarType::Integer { bits, is_signed } => (*bits, *is_signed as u32),
        ScalarType::Float { bits } => (*bits, 2),
        _ => return Undefined,
    };
    // kind: 0 = uint, 1 = sint, 2 = sfloat.
    match (width, count, kind) {
        (16, 1, 0) => R16Uint,
        (16, 1, 1) => R16Sint,
        (16, 1, 2) => R16Sfloat,
        (16, 2, 0) => R16G16Uint,
        (16, 2, 1) => R16G16Sint,
        (16, 2, 2) => R16G16Sfloat,
        (16, 3, 0) => R16G16B16Uint,
        (16, 3, 1) => R16G16B16Sint,
        (16, 3, 2) => R16G16B16Sfloat,
        (16, 4, 0) => R16G16B16A16Uint,
        (16, 4, 1) => R16G16B16A16Sint,
        (16, 4, 2) => R16G16B16A16Sfloat,
        (32, 1, 0) => R32Uint,
        (32, 1, 1) => R32Sint,
        (32, 1, 2) => R32Sfloat,
        (32, 2, 0) => R32G32Uint,
        (32, 2, 1) => R32G32Sint,
        (32, 2, 2) => R32G32Sfloat,
        (32, 3, 0) => R32G32B32Uint,
        (32, 3, 1) => R32G32B32Sint,
        (32, 3, 2) => R32G32B32Sfloat,
        (32, 4, 0) => R32G32B32A32Uint,
        (32, 4, 1) => R32G32B32A32Sint,
        (32, 4, 2) => R32G32B32A32Sfloat,
        (64, 1, 0) => R64Uint,
        (64, 1, 1) => R64Sint,
        (64, 1, 2) => R64Sfloat,
        (64, 2, 0) => R64G64Uint,
        (64, 2, 1) => R64G64Sint,
        (64, 2, 2) => R64G64Sfloat,
        (64, 3, 0) => R64G64B64Uint,
        (64, 3, 1) => R64G64B64Sint,
        (64, 3, 2) => R64G64B64Sfloat,
        (64, 4, 0) => R64G64B64A64Uint,
        (64, 4, 1) => R64G64B64A64Sint,
        (64, 4, 2) => R64G64B64A64Sfloat,
        _ => Undefined,
    }
}

/// A shader input or output bound by location, or by semantic for
/// HLSL-origin modules.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceVariable {
    pub spirv_id: u32,
    pub name: Option<String>,
    /// Location decoration value; `None` for built-ins without an explicit
    /// location.
    pub location: Option<u32>,
    /// Raw storage class word; `Input` or `Output`.
    pub storage_class: u32,
    /// HLSL semantic via SPV_GOOGLE_hlsl_functionality1, if any.
    pub semantic: Option<String>,
    pub decoration_flags: DecorationFlags,
    /// Built-in kind word, valid iff `BUILT_IN` is set in the flags.
    pub built_in: Option<u32>,
    pub numeric: NumericTraits,
    pub array: ArrayTraits,
    pub format: Format,
    /// Member variables when the type is an interface block struct.
    pub members: Vec<InterfaceVariable>,
    pub ty: Type,
    /// Word offset of the `Location` decoration literal for in-place edits.
    pub location_word_offset: Option<usize>,
}
impl InterfaceVariable {
    pub fn is_input(&self) -> bool {
        self.storage_class == spirv::StorageClass::Input as u32
    }
    pub fn is_output(&self) -> bool {
        self.storage_class == spirv::StorageClass::Output as u32
    }
    pub fn is_built_in(&self) -> bool {
        self.decoration_flags.contains(DecorationFlags::BUILT_IN)
    }
}

/// Build the interface variable of `var_id`, mirroring struct members and
/// inheriting the built-in flag from any built-in member.
pub(crate) fn build_interface_variable(
    var_id: u32,
    ty: &Type,
    storage_class: u32,
    deco_reg: &DecorationRegistry,
    name_reg: &NameRegistry,
) -> InterfaceVariable {
    let mut members = Vec::new();
    if let Type::Struct(struct_ty) = ty.element_ty() {
        members.reserve(struct_ty.members.len());
        for (i, member) in struct_ty.members.iter().enumerate() {
            let i = i as u32;
            let location = deco_reg.get_member_u32(struct_ty.id, i, Decoration::Location);
            let semantic = deco_reg
                .get_member_str_raw(struct_ty.id, i, DECO_HLSL_SEMANTIC_GOOGLE)
                .map(ToOwned::to_owned);
            let member_var = InterfaceVariable {
                spirv_id: var_id,
                name: member.name.clone(),
                location,
                storage_class,
                semantic,
                decoration_flags: member.decoration_flags,
                built_in: member.built_in,
                numeric: member.ty.numeric_traits(),
                array: member.ty.array_traits().unwrap_or_default(),
                format: format_of(&member.ty),
                members: Vec::new(),
                ty: member.ty.clone(),
                location_word_offset: None,
            };
            members.push(member_var);
        }
    }

    let mut decoration_flags = var_decoration_flags(deco_reg, var_id);
    let mut built_in = deco_reg.get_u32(var_id, Decoration::BuiltIn);
    if built_in.is_some() {
        decoration_flags |= DecorationFlags::BUILT_IN;
    }
    // A block whose members are built-ins is itself a built-in interface.
    if let Some(member) = members.iter().find(|x| x.built_in.is_some()) {
        decoration_flags |= DecorationFlags::BUILT_IN;
        if built_in.is_none() {
            built_in = member.built_in;
        }
    }

    let location_entry = deco_reg.get(var_id, Decoration::Location);
    InterfaceVariable {
        spirv_id: var_id,
        name: name_reg.get(var_id).map(ToOwned::to_owned),
        location: location_entry.and_then(|x| x.params.first().copied()),
        storage_class,
        semantic: deco_reg
            .get_str_raw(var_id, DECO_HLSL_SEMANTIC_GOOGLE)
            .map(ToOwned::to_owned),
        decoration_flags,
        built_in,
        numeric: ty.numeric_traits(),
        array: ty.array_traits().unwrap_or_default(),
        format: format_of(ty),
        members,
        ty: ty.clone(),
        location_word_offset: location_entry.map(|x| x.word_offset),
    }
}

/// Gather the decoration bitset of a (non-member) id.
pub(crate) fn var_decoration_flags(deco_reg: &DecorationRegistry, id: u32) -> DecorationFlags {
    let mut flags = DecorationFlags::empty();
    let pairs = [
        (Decoration::Block, DecorationFlags::BLOCK),
        (Decoration::BufferBlock, DecorationFlags::BUFFER_BLOCK),
        (Decoration::RowMajor, DecorationFlags::ROW_MAJOR),
        (Decoration::ColMajor, DecorationFlags::COLUMN_MAJOR),
        (Decoration::BuiltIn, DecorationFlags::BUILT_IN),
        (Decoration::NoPerspective, DecorationFlags::NOPERSPECTIVE),
        (Decoration::Flat, DecorationFlags::FLAT),
        (Decoration::NonWritable, DecorationFlags::NON_WRITABLE),
        (Decoration::NonReadable, DecorationFlags::NON_READABLE),
        (
            Decoration::RelaxedPrecision,
            DecorationFlags::RELAXED_PRECISION,
        ),
    ];
    for (deco, flag) in pairs.iter() {
        if deco_reg.contains(id, *deco) {
            flags |= *flag;
        }
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::VectorType;

    #[test]
    fn vec_formats() {
        let ty = Type::Vector(VectorType {
            scalar_ty: ScalarType::f32(),
            scalar_count: 4,
        });
        assert_eq!(format_of(&ty), Format::R32G32B32A32Sfloat);
        let ty = Type::Vector(VectorType {
            scalar_ty: ScalarType::uint(32),
            scalar_count: 2,
        });
        assert_eq!(format_of(&ty), Format::R32G32Uint);
        let ty = Type::Scalar(ScalarType::int(64));
        assert_eq!(format_of(&ty), Format::R64Sint);
    }

    #[test]
    fn aggregates_have_no_format() {
        let ty = Type::Sampler(crate::ty::SamplerType {});
        assert_eq!(format_of(&ty), Format::Undefined);
    }
}
