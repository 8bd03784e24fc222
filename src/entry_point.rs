//! Entry-point records.
use bitflags::bitflags;
use spirv::ExecutionModel;

use crate::binding::DescriptorSet;
use crate::consts::{EXEC_MODEL_MESH_EXT, EXEC_MODEL_TASK_EXT};

bitflags! {
    /// Shader stage of an entry point, with `VkShaderStageFlagBits` values.
    pub struct ShaderStage: u32 {
        const VERTEX                  = 0x0000_0001;
        const TESSELLATION_CONTROL    = 0x0000_0002;
        const TESSELLATION_EVALUATION = 0x0000_0004;
        const GEOMETRY                = 0x0000_0008;
        const FRAGMENT                = 0x0000_0010;
        const COMPUTE                 = 0x0000_0020;
        const TASK                    = 0x0000_0040;
        const MESH                    = 0x0000_0080;
        const RAYGEN                  = 0x0000_0100;
        const ANY_HIT                 = 0x0000_0200;
        const CLOSEST_HIT             = 0x0000_0400;
        const MISS                    = 0x0000_0800;
        const INTERSECTION            = 0x0000_1000;
        const CALLABLE                = 0x0000_2000;
    }
}
impl ShaderStage {
    /// Translate a raw execution model word; the EXT task/mesh models are
    /// matched numerically as they postdate the header crate.
    pub fn from_execution_model(model: u32) -> Option<ShaderStage> {
        let stage = match model {
            x if x == ExecutionModel::Vertex as u32 => ShaderStage::VERTEX,
            x if x == ExecutionModel::TessellationControl as u32 => {
                ShaderStage::TESSELLATION_CONTROL
            }
            x if x == ExecutionModel::TessellationEvaluation as u32 => {
                ShaderStage::TESSELLATION_EVALUATION
            }
            x if x == ExecutionModel::Geometry as u32 => ShaderStage::GEOMETRY,
            x if x == ExecutionModel::Fragment as u32 => ShaderStage::FRAGMENT,
            x if x == ExecutionModel::GLCompute as u32 => ShaderStage::COMPUTE,
            x if x == ExecutionModel::Kernel as u32 => ShaderStage::COMPUTE,
            x if x == ExecutionModel::TaskNV as u32 => ShaderStage::TASK,
            x if x == ExecutionModel::MeshNV as u32 => ShaderStage::MESH,
            EXEC_MODEL_TASK_EXT => ShaderStage::TASK,
            EXEC_MODEL_MESH_EXT => ShaderStage::MESH,
            x if x == ExecutionModel::RayGenerationNV as u32 => ShaderStage::RAYGEN,
            x if x == ExecutionModel::IntersectionNV as u32 => ShaderStage::INTERSECTION,
            x if x == ExecutionModel::AnyHitNV as u32 => ShaderStage::ANY_HIT,
            x if x == ExecutionModel::ClosestHitNV as u32 => ShaderStage::CLOSEST_HIT,
            x if x == ExecutionModel::MissNV as u32 => ShaderStage::MISS,
            x if x == ExecutionModel::CallableNV as u32 => ShaderStage::CALLABLE,
            _ => return None,
        };
        Some(stage)
    }
}

/// How the workgroup size of a compute-like entry point is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum LocalSizeKind {
    /// `LocalSize` literals.
    Literal = 0,
    /// `LocalSizeId`: x, y, z are spec-constant result ids.
    Id = 1,
    /// `LocalSizeHint` literals.
    HintLiteral = 2,
    /// `LocalSizeHintId`: ids of spec constants.
    HintId = 3,
    /// `WorkgroupSize` built-in constant composite; `x` carries the
    /// composite's result id.
    WorkgroupSize = 4,
}

/// Workgroup sizing of a compute-like entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalSize {
    pub x: u32,
    pub y: u32,
    pub z: u32,
    pub kind: LocalSizeKind,
}

/// One execution-mode declaration attached to an entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionMode {
    /// Raw `ExecutionMode` word.
    pub mode: u32,
    /// Literal operands, or spec-constant ids for the `Id` forms.
    pub operands: Vec<u32>,
    /// Whether this came from `OpExecutionModeId`.
    pub is_id: bool,
}

/// An `OpEntryPoint` of the module with its derived interface and resource
/// usage.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryPoint {
    pub name: String,
    /// Result id of the entry point's function.
    pub spirv_id: u32,
    /// Raw execution model word.
    pub execution_model: u32,
    pub stage: ShaderStage,
    pub execution_modes: Vec<ExecutionMode>,
    /// `Invocations` execution mode operand, for geometry shaders.
    pub invocations: Option<u32>,
    /// `OutputVertices` execution mode operand.
    pub output_vertices: Option<u32>,
    pub local_size: Option<LocalSize>,
    /// Ids listed in the `OpEntryPoint` interface tail.
    pub interface_ids: Vec<u32>,
    /// Indices of input variables in the module's interface variable pool.
    pub input_indices: Vec<usize>,
    /// Indices of output variables in the module's interface variable pool.
    pub output_indices: Vec<usize>,
    /// Spirv ids of descriptor resources statically used by this entry
    /// point, sorted.
    pub used_uniforms: Vec<u32>,
    /// Spirv ids of push-constant blocks statically used by this entry
    /// point, sorted.
    pub used_push_constants: Vec<u32>,
    /// Per-entry-point descriptor set views, restricted to used bindings.
    pub descriptor_sets: Vec<DescriptorSet>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_translation() {
        assert_eq!(
            ShaderStage::from_execution_model(ExecutionModel::Fragment as u32),
            Some(ShaderStage::FRAGMENT)
        );
        assert_eq!(
            ShaderStage::from_execution_model(EXEC_MODEL_MESH_EXT),
            Some(ShaderStage::MESH)
        );
        assert_eq!(ShaderStage::from_execution_model(0xDEAD), None);
    }
}
