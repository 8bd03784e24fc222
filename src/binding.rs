//! Descriptor binding records and classification.
use bitflags::bitflags;

use crate::block::BlockVariable;
use crate::error::{Error, Result};
use crate::locator::DescriptorBindingPoint;
use crate::ty::{DecorationFlags, ImageTraits, Type};

/// `VkDescriptorType` equivalent. Classification never produces the dynamic
/// buffer variants; callers promote buffers to dynamic themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum DescriptorType {
    Sampler,
    CombinedImageSampler,
    SampledImage,
    StorageImage,
    UniformTexelBuffer,
    StorageTexelBuffer,
    UniformBuffer,
    StorageBuffer,
    UniformBufferDynamic,
    StorageBufferDynamic,
    InputAttachment,
    AccelerationStructure,
}

bitflags! {
    /// HLSL-style resource register classification.
    pub struct ResourceTypeFlags: u32 {
        const SAMPLER = 0x0000_0001;
        const CBV     = 0x0000_0002;
        const SRV     = 0x0000_0004;
        const UAV     = 0x0000_0008;
    }
}

impl DescriptorType {
    /// Fixed mapping to HLSL register classes.
    pub fn resource_type(&self) -> ResourceTypeFlags {
        match self {
            DescriptorType::Sampler => ResourceTypeFlags::SAMPLER,
            DescriptorType::CombinedImageSampler => {
                ResourceTypeFlags::SAMPLER | ResourceTypeFlags::SRV
            }
            DescriptorType::SampledImage => ResourceTypeFlags::SRV,
            DescriptorType::StorageImage => ResourceTypeFlags::UAV,
            DescriptorType::UniformTexelBuffer => ResourceTypeFlags::SRV,
            DescriptorType::StorageTexelBuffer => ResourceTypeFlags::UAV,
            DescriptorType::UniformBuffer => ResourceTypeFlags::CBV,
            DescriptorType::UniformBufferDynamic => ResourceTypeFlags::CBV,
            DescriptorType::StorageBuffer => ResourceTypeFlags::UAV,
            DescriptorType::StorageBufferDynamic => ResourceTypeFlags::UAV,
            DescriptorType::InputAttachment => ResourceTypeFlags::SRV,
            DescriptorType::AccelerationStructure => ResourceTypeFlags::SRV,
        }
    }
}

/// Word offsets of the binding's editable decoration literals.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BindingWordOffsets {
    pub binding: usize,
    pub set: usize,
}

/// One descriptor resource declared by the module.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorBinding {
    pub spirv_id: u32,
    pub name: Option<String>,
    pub binding: u32,
    pub set: u32,
    pub input_attachment_index: u32,
    pub descriptor_type: DescriptorType,
    pub resource_type: ResourceTypeFlags,
    pub decoration_flags: DecorationFlags,
    pub image: ImageTraits,
    /// Resolved layout of the backing block, for buffer-backed descriptors.
    pub block: Option<BlockVariable>,
    /// Dimensions of the binding array, outermost first; empty for a single
    /// binding point.
    pub array_dims: Vec<u32>,
    /// Number of binding points; 0 when any dimension is runtime or
    /// spec sized.
    pub count: u32,
    /// Id of the paired HLSL counter buffer, from the
    /// `HlslCounterBufferGOOGLE` decoration.
    pub uav_counter_id: Option<u32>,
    /// Index of the paired counter in the module's binding list.
    pub uav_counter_index: Option<usize>,
    /// Whether any entry point's transitive access set touches this binding.
    pub accessed: bool,
    pub ty: Type,
    pub word_offset: BindingWordOffsets,
}
impl DescriptorBinding {
    /// The `(set, binding)` pair this resource is bound by.
    pub fn binding_point(&self) -> DescriptorBindingPoint {
        DescriptorBindingPoint::new(self.set, self.binding)
    }
}

/// A descriptor set: its number and the indices of member bindings in the
/// module's binding list, sorted by `(binding, spirv_id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorSet {
    pub set: u32,
    pub binding_indices: Vec<usize>,
}

/// Classify a descriptor variable. `storage_class` is the variable's raw
/// storage class word and `ty` the resolved pointee with binding arrays
/// unwrapped.
pub(crate) fn classify_descriptor_type(
    var_id: u32,
    storage_class: u32,
    ty: &Type,
) -> Result<DescriptorType> {
    use spirv::{Dim, StorageClass};
    const DIM_BUFFER: u32 = Dim::DimBuffer as u32;
    const DIM_SUBPASS_DATA: u32 = Dim::DimSubpassData as u32;

    if storage_class == StorageClass::StorageBuffer as u32 {
        return Ok(DescriptorType::StorageBuffer);
    }
    let desc_ty = match ty {
        Type::Image(image_ty) => match (image_ty.traits.dim, image_ty.traits.sampled) {
            (DIM_BUFFER, 1) => DescriptorType::UniformTexelBuffer,
            (DIM_BUFFER, _) => DescriptorType::StorageTexelBuffer,
            (DIM_SUBPASS_DATA, _) => DescriptorType::InputAttachment,
            (_, 1) => DescriptorType::SampledImage,
            (_, _) => DescriptorType::StorageImage,
        },
        Type::Sampler(_) => DescriptorType::Sampler,
        // glslang used to emit sampled images for combined image samplers
        // (issue 1096); buffer-dimension ones reduce to texel buffers.
        Type::SampledImage(sampled_ty) => match sampled_ty.image_ty.traits.dim {
            DIM_BUFFER => DescriptorType::UniformTexelBuffer,
            _ => DescriptorType::CombinedImageSampler,
        },
        Type::Struct(struct_ty) => {
            if struct_ty
                .decoration_flags
                .contains(DecorationFlags::BLOCK)
            {
                DescriptorType::UniformBuffer
            } else if struct_ty
                .decoration_flags
                .contains(DecorationFlags::BUFFER_BLOCK)
            {
                DescriptorType::StorageBuffer
            } else {
                return Err(Error::UnexpectedBlockData(var_id));
            }
        }
        Type::AccelStruct(_) => DescriptorType::AccelerationStructure,
        _ => return Err(Error::InvalidType(var_id, "not a descriptor resource")),
    };
    Ok(desc_ty)
}

/// Group bindings into sets sorted by set number, bindings within each set
/// sorted by `(binding, spirv_id)`.
pub(crate) fn aggregate_descriptor_sets(
    bindings: &[DescriptorBinding],
) -> Result<Vec<DescriptorSet>> {
    let mut sets: Vec<DescriptorSet> = Vec::new();
    for (i, binding) in bindings.iter().enumerate() {
        match sets.iter_mut().find(|x| x.set == binding.set) {
            Some(set) => set.binding_indices.push(i),
            None => sets.push(DescriptorSet {
                set: binding.set,
                binding_indices: vec![i],
            }),
        }
    }
    if sets.len() > crate::consts::MAX_DESCRIPTOR_SETS {
        return Err(Error::InternalError("too many descriptor sets"));
    }
    sets.sort_by_key(|x| x.set);
    for set in sets.iter_mut() {
        set.binding_indices
            .sort_by_key(|&i| (bindings[i].binding, bindings[i].spirv_id));
    }
    Ok(sets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::{SamplerType, ScalarType, StructType};

    #[test]
    fn storage_class_wins_over_type() {
        let ty = Type::Struct(StructType {
            id: 1,
            name: None,
            members: vec![],
            decoration_flags: DecorationFlags::BLOCK,
        });
        let desc_ty = classify_descriptor_type(
            1,
            spirv::StorageClass::StorageBuffer as u32,
            &ty,
        )
        .unwrap();
        assert_eq!(desc_ty, DescriptorType::StorageBuffer);
    }

    #[test]
    fn undecorated_struct_is_rejected() {
        let ty = Type::Struct(StructType {
            id: 1,
            name: None,
            members: vec![],
            decoration_flags: DecorationFlags::empty(),
        });
        assert_eq!(
            classify_descriptor_type(7, spirv::StorageClass::Uniform as u32, &ty),
            Err(Error::UnexpectedBlockData(7))
        );
    }

    #[test]
    fn sampler_resource_class() {
        let desc_ty = classify_descriptor_type(
            1,
            spirv::StorageClass::UniformConstant as u32,
            &Type::Sampler(SamplerType {}),
        )
        .unwrap();
        assert_eq!(desc_ty.resource_type(), ResourceTypeFlags::SAMPLER);
    }

    #[test]
    fn scalar_is_not_a_descriptor() {
        assert!(classify_descriptor_type(
            1,
            spirv::StorageClass::Uniform as u32,
            &Type::Scalar(ScalarType::u32()),
        )
        .is_err());
    }
}
