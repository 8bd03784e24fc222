//! Contract constants of the SPIR-V binary format and crate-wide limits.

/// First word of every SPIR-V module.
pub const SPIRV_MAGIC: u32 = 0x0723_0203;
/// Words in the module header: magic, version, generator, bound, schema.
pub const HEADER_LEN: usize = 5;

/// Maximum number of flattened array dimensions tracked per type.
pub const MAX_ARRAY_DIMS: usize = 32;
/// Maximum number of distinct descriptor sets in a module.
pub const MAX_DESCRIPTOR_SETS: usize = 64;
/// Maximum vector component count.
pub const MAX_VECTOR_DIMS: usize = 4;

/// Pass to [`change_descriptor_binding_numbers`] to keep the binding number.
///
/// [`change_descriptor_binding_numbers`]: crate::ShaderModule::change_descriptor_binding_numbers
pub const BINDING_NUMBER_DONT_CHANGE: u32 = !0;
/// Pass to the binding/set edit calls to keep the set number.
pub const SET_NUMBER_DONT_CHANGE: u32 = !0;

// SPV_GOOGLE_decorate_string and SPV_GOOGLE_hlsl_functionality1 assign these
// values; they are a wire contract independent of any header crate.
pub const OP_DECORATE_STRING: u32 = 5632;
pub const OP_MEMBER_DECORATE_STRING: u32 = 5633;
pub const DECO_HLSL_COUNTER_BUFFER_GOOGLE: u32 = 5634;
pub const DECO_HLSL_SEMANTIC_GOOGLE: u32 = 5635;

// Execution model words that postdate the `spirv` crate's enum.
pub const EXEC_MODEL_TASK_EXT: u32 = 5364;
pub const EXEC_MODEL_MESH_EXT: u32 = 5365;

/// Suffix of the conventional HLSL counter buffer twin of a UAV resource.
pub const UAV_COUNTER_SUFFIX: &str = "@count";
