//! # SPIR-V Probe: shader module reflection for graphics.
//!
//! Given a compiled SPIR-V binary, this crate produces a structured,
//! queryable description of everything an application needs to bind the
//! shader: descriptor set and binding layout, push-constant block layout
//! with byte offsets and padding, per-entry-point input/output interface
//! variables with locations, semantics and formats, execution models and
//! workgroup sizing, and specialization constants. An opt-in constant
//! evaluator folds `OpSpecConstantOp` expression trees once spec-constant
//! values are bound.
//!
//! ## How-to
//!
//! ```ignore
//! let module = ReflectConfig::new()
//!     // Load SPIR-V data into a `[u32]` buffer `spv_words`.
//!     .spv(spv_words)
//!     // Build the constant evaluator too.
//!     .evaluate_constants(true)
//!     .reflect()?;
//! for binding in module.descriptor_bindings() {
//!     println!("(set={}, binding={}) {:?}",
//!         binding.set, binding.binding, binding.descriptor_type);
//! }
//! ```
//!
//! Descriptor bindings, sets and interface variables can be looked up by
//! their numbers, and remapped in place: changing a binding number, a set
//! number, or an interface location rewrites exactly the decorated words
//! inside the binary, so the edited module can be handed straight back to
//! the driver.
//!
//! ## Size calculation
//!
//! Struct member offsets and array/matrix strides are read from the
//! decorations in the module. With those the crate resolves each block
//! member's `size` and `padded_size`; runtime-sized arrays report zero size
//! and the layout of everything around them stays exact.
//!
//! Note: names are debug information and might be stripped from a module;
//! every query that matters is keyed by numbers, not names.
pub use spirv;

pub mod annotation;
pub mod binding;
pub mod block;
pub mod consts;
pub mod constant;
pub mod entry_point;
pub mod error;
pub mod evaluator;
pub mod func;
pub mod instr;
pub mod interface;
pub mod locator;
pub mod module;
pub mod parse;
pub mod reflect;
pub mod ty;

pub use binding::{DescriptorBinding, DescriptorSet, DescriptorType, ResourceTypeFlags};
pub use block::{BlockVariable, VariableFlags};
pub use constant::{Constant, ConstantValue};
pub use consts::{BINDING_NUMBER_DONT_CHANGE, SET_NUMBER_DONT_CHANGE};
pub use entry_point::{
    EntryPoint, ExecutionMode, LocalSize, LocalSizeKind, ShaderStage,
};
pub use error::{Error, Result};
pub use evaluator::{EvalState, EvalValue, Evaluator, Lane, SpecializationMapEntry};
pub use interface::{Format, InterfaceVariable};
pub use locator::{DescriptorBindingPoint, SpecId};
pub use module::{PushConstantBlock, ShaderModule, SpecConstant};
pub use parse::{Generator, InstructionBuilder, SpirvBinary, SpirvHeader};
pub use reflect::ReflectConfig;
pub use ty::{DecorationFlags, Type, TypeFlags};
