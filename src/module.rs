//! Reflected shader module: query surface and in-place edits.
use std::borrow::Cow;

use crate::binding::{aggregate_descriptor_sets, DescriptorBinding, DescriptorSet};
use crate::block::BlockVariable;
use crate::constant::ConstantValue;
use crate::consts::{BINDING_NUMBER_DONT_CHANGE, SET_NUMBER_DONT_CHANGE};
use crate::entry_point::EntryPoint;
use crate::error::{Error, Result};
use crate::evaluator::Evaluator;
use crate::interface::InterfaceVariable;
use crate::locator::SpecId;
use crate::parse::{Generator, SpirvHeader};
use crate::ty::{Type, TypeRegistry};

/// A push-constant block declared by the module.
#[derive(Debug, Clone, PartialEq)]
pub struct PushConstantBlock {
    pub spirv_id: u32,
    pub name: Option<String>,
    pub block: BlockVariable,
}

/// A scalar specialization constant declared by the module.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecConstant {
    pub spirv_id: u32,
    /// The `SpecId` decoration value the host binds by.
    pub spec_id: SpecId,
    pub name: Option<String>,
    pub default_value: ConstantValue,
    pub ty: Type,
}

/// Owned reflection products, separate from the word buffer so the driver
/// can release its borrows before the buffer moves into the module.
pub(crate) struct ModuleParts {
    pub header: SpirvHeader,
    pub capabilities: Vec<u32>,
    pub source_language: u32,
    pub source_language_version: u32,
    pub source_file: Option<String>,
    pub source_text: Option<String>,
    pub entry_points: Vec<EntryPoint>,
    pub bindings: Vec<DescriptorBinding>,
    pub descriptor_sets: Vec<DescriptorSet>,
    pub interface_vars: Vec<InterfaceVariable>,
    pub push_constants: Vec<PushConstantBlock>,
    pub spec_constants: Vec<SpecConstant>,
    pub types: TypeRegistry,
    pub evaluator: Option<Evaluator>,
}

/// A reflected SPIR-V module.
///
/// Owns its word buffer by default; modules built through
/// [`ReflectConfig::spv_borrowed`](crate::ReflectConfig::spv_borrowed) borrow
/// the caller's buffer instead and copy on the first in-place edit.
pub struct ShaderModule<'a> {
    pub(crate) words: Cow<'a, [u32]>,
    pub(crate) header: SpirvHeader,
    pub(crate) capabilities: Vec<u32>,
    pub(crate) source_language: u32,
    pub(crate) source_language_version: u32,
    pub(crate) source_file: Option<String>,
    pub(crate) source_text: Option<String>,
    pub(crate) entry_points: Vec<EntryPoint>,
    pub(crate) bindings: Vec<DescriptorBinding>,
    pub(crate) descriptor_sets: Vec<DescriptorSet>,
    pub(crate) interface_vars: Vec<InterfaceVariable>,
    pub(crate) push_constants: Vec<PushConstantBlock>,
    pub(crate) spec_constants: Vec<SpecConstant>,
    pub(crate) types: TypeRegistry,
    pub(crate) evaluator: Option<Evaluator>,
}

impl<'a> ShaderModule<'a> {
    pub(crate) fn from_parts(parts: ModuleParts, words: Cow<'a, [u32]>) -> Self {
        ShaderModule {
            words,
            header: parts.header,
            capabilities: parts.capabilities,
            source_language: parts.source_language,
            source_language_version: parts.source_language_version,
            source_file: parts.source_file,
            source_text: parts.source_text,
            entry_points: parts.entry_points,
            bindings: parts.bindings,
            descriptor_sets: parts.descriptor_sets,
            interface_vars: parts.interface_vars,
            push_constants: parts.push_constants,
            spec_constants: parts.spec_constants,
            types: parts.types,
            evaluator: parts.evaluator,
        }
    }

    // Module identity.

    /// The reflected words, including any in-place edits applied so far.
    pub fn code(&self) -> &[u32] {
        &self.words
    }
    /// The reflected bytes, little-endian words.
    pub fn code_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.words)
    }
    /// Size of the module in bytes.
    pub fn code_size(&self) -> usize {
        self.words.len() * 4
    }
    pub fn header(&self) -> &SpirvHeader {
        &self.header
    }
    /// Tool that produced the module, for display.
    pub fn generator(&self) -> Option<Generator> {
        self.header.generator()
    }
    /// Raw `OpSource` language word.
    pub fn source_language(&self) -> u32 {
        self.source_language
    }
    pub fn source_language_version(&self) -> u32 {
        self.source_language_version
    }
    /// File name referenced by `OpSource`, if any.
    pub fn source_file(&self) -> Option<&str> {
        self.source_file.as_deref()
    }
    /// Embedded source text from `OpSource`/`OpSourceContinued`, if any.
    pub fn source_text(&self) -> Option<&str> {
        self.source_text.as_deref()
    }
    /// Raw capability words declared by the module.
    pub fn capabilities(&self) -> &[u32] {
        &self.capabilities
    }
    /// Type description by result id.
    pub fn type_description(&self, ty_id: u32) -> Result<&Type> {
        self.types.get(ty_id)
    }

    // Entry points.

    pub fn entry_points(&self) -> &[EntryPoint] {
        &self.entry_points
    }
    pub fn entry_point(&self, name: &str) -> Result<&EntryPoint> {
        self.entry_points
            .iter()
            .find(|x| x.name == name)
            .ok_or(Error::ElementNotFound)
    }

    // Descriptor resources.

    /// All descriptor bindings, sorted by `(binding, spirv_id)` at
    /// reflection time.
    pub fn descriptor_bindings(&self) -> &[DescriptorBinding] {
        &self.bindings
    }
    pub fn descriptor_binding(&self, set: u32, binding: u32) -> Result<&DescriptorBinding> {
        self.bindings
            .iter()
            .find(|x| x.set == set && x.binding == binding)
            .ok_or(Error::ElementNotFound)
    }
    /// All descriptor sets, sorted by set number.
    pub fn descriptor_sets(&self) -> &[DescriptorSet] {
        &self.descriptor_sets
    }
    pub fn descriptor_set(&self, set: u32) -> Result<&DescriptorSet> {
        self.descriptor_sets
            .iter()
            .find(|x| x.set == set)
            .ok_or(Error::ElementNotFound)
    }
    /// Bindings of a descriptor set, in `(binding, spirv_id)` order.
    pub fn set_bindings<'s>(
        &'s self,
        set: &'s DescriptorSet,
    ) -> impl Iterator<Item = &'s DescriptorBinding> {
        set.binding_indices.iter().map(move |&i| &self.bindings[i])
    }
    /// The paired UAV counter of a binding, if it has one.
    pub fn uav_counter_binding(&self, binding: &DescriptorBinding) -> Option<&DescriptorBinding> {
        binding.uav_counter_index.map(|i| &self.bindings[i])
    }

    pub fn entry_point_descriptor_sets(&self, name: &str) -> Result<&[DescriptorSet]> {
        self.entry_point(name).map(|x| x.descriptor_sets.as_slice())
    }
    /// A binding as seen by one entry point; unused bindings are not found.
    pub fn entry_point_descriptor_binding(
        &self,
        name: &str,
        set: u32,
        binding: u32,
    ) -> Result<&DescriptorBinding> {
        let entry_point = self.entry_point(name)?;
        entry_point
            .descriptor_sets
            .iter()
            .filter(|x| x.set == set)
            .flat_map(|x| x.binding_indices.iter())
            .map(|&i| &self.bindings[i])
            .find(|x| x.binding == binding)
            .ok_or(Error::ElementNotFound)
    }

    // Interface variables.

    /// Every interface variable of the module.
    pub fn interface_variables(&self) -> &[InterfaceVariable] {
        &self.interface_vars
    }
    /// Input variables of the first entry point (compatibility view).
    pub fn input_variables(&self) -> impl Iterator<Item = &InterfaceVariable> {
        self.entry_point_io(0, true)
    }
    /// Output variables of the first entry point (compatibility view).
    pub fn output_variables(&self) -> impl Iterator<Item = &InterfaceVariable> {
        self.entry_point_io(0, false)
    }
    fn entry_point_io(
        &self,
        ep_index: usize,
        input: bool,
    ) -> impl Iterator<Item = &InterfaceVariable> {
        let indices = self
            .entry_points
            .get(ep_index)
            .map(|x| {
                if input {
                    x.input_indices.as_slice()
                } else {
                    x.output_indices.as_slice()
                }
            })
            .unwrap_or(&[]);
        indices.iter().map(move |&i| &self.interface_vars[i])
    }

    pub fn input_variable_by_location(&self, location: u32) -> Result<&InterfaceVariable> {
        find_by_location(self.input_variables(), location)
    }
    pub fn output_variable_by_location(&self, location: u32) -> Result<&InterfaceVariable> {
        find_by_location(self.output_variables(), location)
    }
    pub fn input_variable_by_semantic(&self, semantic: &str) -> Result<&InterfaceVariable> {
        find_by_semantic(self.input_variables(), semantic)
    }
    pub fn output_variable_by_semantic(&self, semantic: &str) -> Result<&InterfaceVariable> {
        find_by_semantic(self.output_variables(), semantic)
    }

    pub fn entry_point_input_variable_by_location(
        &self,
        name: &str,
        location: u32,
    ) -> Result<&InterfaceVariable> {
        let i = self.entry_point_index(name)?;
        find_by_location(self.entry_point_io(i, true), location)
    }
    pub fn entry_point_output_variable_by_location(
        &self,
        name: &str,
        location: u32,
    ) -> Result<&InterfaceVariable> {
        let i = self.entry_point_index(name)?;
        find_by_location(self.entry_point_io(i, false), location)
    }
    pub fn entry_point_input_variable_by_semantic(
        &self,
        name: &str,
        semantic: &str,
    ) -> Result<&InterfaceVariable> {
        let i = self.entry_point_index(name)?;
        find_by_semantic(self.entry_point_io(i, true), semantic)
    }
    pub fn entry_point_output_variable_by_semantic(
        &self,
        name: &str,
        semantic: &str,
    ) -> Result<&InterfaceVariable> {
        let i = self.entry_point_index(name)?;
        find_by_semantic(self.entry_point_io(i, false), semantic)
    }

    fn entry_point_index(&self, name: &str) -> Result<usize> {
        self.entry_points
            .iter()
            .position(|x| x.name == name)
            .ok_or(Error::ElementNotFound)
    }

    // Push constants and spec constants.

    pub fn push_constant_blocks(&self) -> &[PushConstantBlock] {
        &self.push_constants
    }
    pub fn push_constant_block(&self, index: usize) -> Result<&PushConstantBlock> {
        self.push_constants.get(index).ok_or(Error::ElementNotFound)
    }
    /// Push-constant blocks used by the given entry point.
    pub fn entry_point_push_constant_blocks(
        &self,
        name: &str,
    ) -> Result<Vec<&PushConstantBlock>> {
        let entry_point = self.entry_point(name)?;
        Ok(self
            .push_constants
            .iter()
            .filter(|x| entry_point.used_push_constants.binary_search(&x.spirv_id).is_ok())
            .collect())
    }

    pub fn spec_constants(&self) -> &[SpecConstant] {
        &self.spec_constants
    }
    pub fn spec_constant(&self, spec_id: SpecId) -> Result<&SpecConstant> {
        self.spec_constants
            .iter()
            .find(|x| x.spec_id == spec_id)
            .ok_or(Error::ElementNotFound)
    }

    // Constant evaluation.

    /// The constant evaluator, present when the module was reflected with
    /// [`evaluate_constants`](crate::ReflectConfig::evaluate_constants).
    pub fn evaluator(&self) -> Option<&Evaluator> {
        self.evaluator.as_ref()
    }
    /// Mutable access for evaluation and spec-constant rebinding.
    pub fn evaluator_mut(&mut self) -> Option<&mut Evaluator> {
        self.evaluator.as_mut()
    }

    // In-place edits. Each rewrites single words recorded at reflection
    // time; the module's byte length never changes.

    /// Move a binding to a new binding number and optionally a new set.
    /// `BINDING_NUMBER_DONT_CHANGE` / `SET_NUMBER_DONT_CHANGE` skip the
    /// respective component.
    pub fn change_descriptor_binding_numbers(
        &mut self,
        set: u32,
        binding: u32,
        new_binding: u32,
        new_set: u32,
    ) -> Result<()> {
        let i = self
            .bindings
            .iter()
            .position(|x| x.set == set && x.binding == binding)
            .ok_or(Error::ElementNotFound)?;
        if new_binding != BINDING_NUMBER_DONT_CHANGE {
            let offset = self.bindings[i].word_offset.binding;
            self.write_word(offset, new_binding)?;
            self.bindings[i].binding = new_binding;
        }
        if new_set != SET_NUMBER_DONT_CHANGE {
            let offset = self.bindings[i].word_offset.set;
            self.write_word(offset, new_set)?;
            self.bindings[i].set = new_set;
        }
        self.resynchronize_descriptor_sets()
    }

    /// Renumber a whole descriptor set, rewriting every member binding's set
    /// word.
    pub fn change_descriptor_set_number(&mut self, set: u32, new_set: u32) -> Result<()> {
        if new_set == SET_NUMBER_DONT_CHANGE {
            return Ok(());
        }
        let indices = self
            .descriptor_sets
            .iter()
            .find(|x| x.set == set)
            .map(|x| x.binding_indices.clone())
            .ok_or(Error::ElementNotFound)?;
        for i in indices {
            let offset = self.bindings[i].word_offset.set;
            self.write_word(offset, new_set)?;
            self.bindings[i].set = new_set;
        }
        self.resynchronize_descriptor_sets()
    }

    /// Relocate the input variable currently at `location`.
    pub fn change_input_variable_location(
        &mut self,
        location: u32,
        new_location: u32,
    ) -> Result<()> {
        self.change_variable_location(true, location, new_location)
    }
    /// Relocate the output variable currently at `location`.
    pub fn change_output_variable_location(
        &mut self,
        location: u32,
        new_location: u32,
    ) -> Result<()> {
        self.change_variable_location(false, location, new_location)
    }

    fn change_variable_location(
        &mut self,
        input: bool,
        location: u32,
        new_location: u32,
    ) -> Result<()> {
        if location == !0 {
            return Err(Error::ElementNotFound);
        }
        let var = self
            .interface_vars
            .iter_mut()
            .filter(|x| if input { x.is_input() } else { x.is_output() })
            .find(|x| x.location == Some(location))
            .ok_or(Error::ElementNotFound)?;
        let offset = var
            .location_word_offset
            .ok_or(Error::InternalError("variable has no location word"))?;
        var.location = Some(new_location);
        self.write_word(offset, new_location)
    }

    fn write_word(&mut self, offset: usize, value: u32) -> Result<()> {
        let words = self.words.to_mut();
        match words.get_mut(offset) {
            Some(word) => {
                *word = value;
                Ok(())
            }
            None => Err(Error::InternalError("edit offset out of bounds")),
        }
    }

    /// Rebuild the module-level sets and every entry point's set view after
    /// a set or binding renumbering.
    fn resynchronize_descriptor_sets(&mut self) -> Result<()> {
        self.descriptor_sets = aggregate_descriptor_sets(&self.bindings)?;
        let bindings = &self.bindings;
        let descriptor_sets = &self.descriptor_sets;
        for ep in self.entry_points.iter_mut() {
            let mut ep_sets = Vec::new();
            for set in descriptor_sets.iter() {
                let binding_indices: Vec<usize> = set
                    .binding_indices
                    .iter()
                    .copied()
                    .filter(|&i| {
                        ep.used_uniforms
                            .binary_search(&bindings[i].spirv_id)
                            .is_ok()
                    })
                    .collect();
                if !binding_indices.is_empty() {
                    ep_sets.push(DescriptorSet {
                        set: set.set,
                        binding_indices,
                    });
                }
            }
            ep.descriptor_sets = ep_sets;
        }
        Ok(())
    }
}

fn find_by_location<'v>(
    mut vars: impl Iterator<Item = &'v InterfaceVariable>,
    location: u32,
) -> Result<&'v InterfaceVariable> {
    // `!0` marks "no explicit location"; looking it up finds nothing.
    if location == !0 {
        return Err(Error::ElementNotFound);
    }
    vars.find(|x| x.location == Some(location))
        .ok_or(Error::ElementNotFound)
}

fn find_by_semantic<'v>(
    mut vars: impl Iterator<Item = &'v InterfaceVariable>,
    semantic: &str,
) -> Result<&'v InterfaceVariable> {
    if semantic.is_empty() {
        return Err(Error::ElementNotFound);
    }
    vars.find(|x| x.semantic.as_deref() == Some(semantic))
        .ok_or(Error::ElementNotFound)
}
