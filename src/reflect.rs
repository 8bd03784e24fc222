//! Reflection procedures: the module-order instruction walk and the
//! collectors that assemble a [`ShaderModule`].
use std::borrow::Cow;
use std::convert::TryFrom;

use nohash_hasher::{IntMap, IntSet};
use num_traits::FromPrimitive;
use spirv::{Decoration, Op};

use crate::annotation::{DecorationRegistry, NameRegistry};
use crate::binding::{
    aggregate_descriptor_sets, classify_descriptor_type, BindingWordOffsets, DescriptorBinding,
    DescriptorSet,
};
use crate::block::{build_block_variable, compute_block_sizes, mark_access_chain};
use crate::consts::{
    DECO_HLSL_COUNTER_BUFFER_GOOGLE, OP_DECORATE_STRING, OP_MEMBER_DECORATE_STRING,
    UAV_COUNTER_SUFFIX,
};
use crate::constant::{Constant, ConstantValue};
use crate::entry_point::{
    EntryPoint, ExecutionMode, LocalSize, LocalSizeKind, ShaderStage,
};
use crate::error::{Error, Result};
use crate::evaluator::Evaluator;
use crate::func::{Function, FunctionRegistry};
use crate::instr::*;
use crate::interface::{build_interface_variable, var_decoration_flags, InterfaceVariable};
use crate::module::{ModuleParts, PushConstantBlock, ShaderModule, SpecConstant};
use crate::parse::bin::split_header;
use crate::parse::{Instr, Instrs, SpirvBinary, SpirvHeader};
use crate::ty::{
    AccelStructType, ArrayLen, ArrayType, DecorationFlags, ForwardPointerType, ImageTraits,
    ImageType, MatrixAxisOrder, MatrixType, PointerType, SamplerType, SampledImageType,
    ScalarType, StructMember, StructType, Type, TypeRegistry, VectorType,
};

/// Reflection configuration builder.
///
/// ```ignore
/// let module = ReflectConfig::new()
///     .spv(spv_words)
///     // Build the constant evaluator so spec constants can be bound and
///     // `OpSpecConstantOp` trees folded.
///     .evaluate_constants(true)
///     .reflect()?;
/// ```
#[derive(Clone)]
pub struct ReflectConfig<'a> {
    pub(crate) words: Cow<'a, [u32]>,
    pub(crate) evaluate_constants: bool,
}
impl Default for ReflectConfig<'_> {
    fn default() -> Self {
        ReflectConfig {
            words: Cow::Owned(Vec::new()),
            evaluate_constants: false,
        }
    }
}
impl<'a> ReflectConfig<'a> {
    pub fn new() -> ReflectConfig<'static> {
        Default::default()
    }

    /// SPIR-V binary to be reflected; the module keeps its own copy.
    pub fn spv<Spv: Into<SpirvBinary>>(mut self, x: Spv) -> Self {
        self.words = Cow::Owned(x.into().into_words());
        self
    }
    /// Reflect the caller's word buffer without copying it. The buffer must
    /// outlive the module; in-place edits then copy on write.
    pub fn spv_borrowed(self, words: &[u32]) -> ReflectConfig<'_> {
        ReflectConfig {
            words: Cow::Borrowed(words),
            evaluate_constants: self.evaluate_constants,
        }
    }
    /// SPIR-V binary from raw bytes; must be four-byte aligned in length.
    pub fn spv_bytes(self, bytes: &[u8]) -> Result<Self> {
        let spv = SpirvBinary::from_bytes(bytes)?;
        Ok(self.spv(spv))
    }
    /// Build the specialization constant evaluator alongside reflection.
    pub fn evaluate_constants(mut self, x: bool) -> Self {
        self.evaluate_constants = x;
        self
    }

    /// Reflect the SPIR-V binary into a queryable module.
    pub fn reflect(self) -> Result<ShaderModule<'a>> {
        let words = self.words;
        // The intermediate borrows names and decoration operands straight
        // out of the word buffer; everything it hands back is owned.
        let parts = {
            let (header, body) = split_header(&words)?;
            let mut itm = ReflectIntermediate::new(self.evaluate_constants);
            let mut instrs = Instrs::new(body)?;
            itm.parse(&mut instrs)?;
            itm.collect(header)?
        };
        Ok(ShaderModule::from_parts(parts, words))
    }
}

struct EntryPointDeclaration<'a> {
    exec_model: u32,
    func_id: FunctionId,
    name: &'a str,
    interface_ids: Vec<u32>,
}
struct ExecModeDeclaration {
    func_id: FunctionId,
    mode: u32,
    operands: Vec<u32>,
    is_id: bool,
}
struct VariableDecl {
    var_id: VariableId,
    ty_id: TypeId,
    storage_class: u32,
}
struct AccessChainRecord {
    func_id: FunctionId,
    base_id: VariableId,
    indices: Vec<Option<u32>>,
}

fn is_deco_whitelisted(deco: u32) -> bool {
    if deco == DECO_HLSL_COUNTER_BUFFER_GOOGLE || deco == crate::consts::DECO_HLSL_SEMANTIC_GOOGLE
    {
        return true;
    }
    match Decoration::from_u32(deco) {
        Some(Decoration::RelaxedPrecision)
        | Some(Decoration::SpecId)
        | Some(Decoration::Block)
        | Some(Decoration::BufferBlock)
        | Some(Decoration::RowMajor)
        | Some(Decoration::ColMajor)
        | Some(Decoration::ArrayStride)
        | Some(Decoration::MatrixStride)
        | Some(Decoration::BuiltIn)
        | Some(Decoration::NoPerspective)
        | Some(Decoration::Flat)
        | Some(Decoration::NonWritable)
        | Some(Decoration::NonReadable)
        | Some(Decoration::Location)
        | Some(Decoration::Binding)
        | Some(Decoration::DescriptorSet)
        | Some(Decoration::Offset)
        | Some(Decoration::InputAttachmentIndex) => true,
        _ => false,
    }
}

/// SPIR-V reflection intermediate.
pub(crate) struct ReflectIntermediate<'a> {
    name_reg: NameRegistry<'a>,
    deco_reg: DecorationRegistry<'a>,
    ty_reg: TypeRegistry,
    /// Literal scalar constants, including spec constant defaults.
    consts: IntMap<ConstantId, Constant>,
    /// Result ids of scalar spec constants and `OpSpecConstantOp`s.
    spec_const_ids: IntSet<ConstantId>,
    /// Result ids of (spec) constant composites.
    composite_ids: IntSet<ConstantId>,
    vars: Vec<VariableDecl>,
    var_ids: IntSet<VariableId>,
    func_reg: FunctionRegistry,
    entry_point_declrs: Vec<EntryPointDeclaration<'a>>,
    exec_mode_declrs: Vec<ExecModeDeclaration>,
    access_chains: Vec<AccessChainRecord>,
    chain_map: IntMap<InstrId, usize>,
    strings: IntMap<InstrId, &'a str>,
    capabilities: Vec<u32>,
    source_language: u32,
    source_language_version: u32,
    source_file_id: Option<u32>,
    source_text: String,
    evaluator: Option<Evaluator>,
}
impl<'a> ReflectIntermediate<'a> {
    fn new(evaluate_constants: bool) -> Self {
        ReflectIntermediate {
            name_reg: Default::default(),
            deco_reg: Default::default(),
            ty_reg: Default::default(),
            consts: Default::default(),
            spec_const_ids: Default::default(),
            composite_ids: Default::default(),
            vars: Vec::new(),
            var_ids: Default::default(),
            func_reg: Default::default(),
            entry_point_declrs: Vec::new(),
            exec_mode_declrs: Vec::new(),
            access_chains: Vec::new(),
            chain_map: Default::default(),
            strings: Default::default(),
            capabilities: Vec::new(),
            source_language: 0,
            source_language_version: 0,
            source_file_id: None,
            source_text: String::new(),
            evaluator: if evaluate_constants {
                Some(Evaluator::default())
            } else {
                None
            },
        }
    }

    fn parse(&mut self, instrs: &mut Instrs<'a>) -> Result<()> {
        let mut cur_func: Option<(FunctionId, Function)> = None;
        while let Some(instr) = instrs.next()? {
            let opcode = instr.opcode();
            // SPV_GOOGLE_decorate_string opcodes are part of the wire
            // contract; match them numerically.
            if opcode == OP_DECORATE_STRING {
                let op = OpDecorate::try_from(instr)?;
                if is_deco_whitelisted(op.deco) {
                    self.deco_reg
                        .set(op.target_id, op.deco, op.params, instr.offset() + 3)?;
                }
                continue;
            }
            if opcode == OP_MEMBER_DECORATE_STRING {
                let op = OpMemberDecorate::try_from(instr)?;
                if is_deco_whitelisted(op.deco) {
                    self.deco_reg.set_member(
                        op.target_id,
                        op.member_idx,
                        op.deco,
                        op.params,
                        instr.offset() + 4,
                    )?;
                }
                continue;
            }
            let op = match Op::from_u32(opcode) {
                Some(op) => op,
                // Unrecognized instructions carry nothing we reflect.
                None => continue,
            };
            match op {
                Op::Capability => {
                    let mut operands = instr.operands();
                    self.capabilities.push(operands.read_u32()?);
                }
                Op::Source => self.parse_source(instr)?,
                Op::SourceContinued => {
                    let mut operands = instr.operands();
                    self.source_text.push_str(operands.read_str()?);
                }
                Op::String => {
                    let op = OpString::try_from(instr)?;
                    self.strings.insert(op.string_id, op.string);
                }
                Op::Name => {
                    let op = OpName::try_from(instr)?;
                    if !op.name.is_empty() {
                        self.name_reg.set(op.target_id, op.name);
                    }
                }
                Op::MemberName => {
                    let op = OpMemberName::try_from(instr)?;
                    if !op.name.is_empty() {
                        self.name_reg.set_member(op.target_id, op.member_idx, op.name);
                    }
                }
                Op::EntryPoint => {
                    let op = OpEntryPoint::try_from(instr)?;
                    self.entry_point_declrs.push(EntryPointDeclaration {
                        exec_model: op.exec_model,
                        func_id: op.func_id,
                        name: op.name,
                        interface_ids: op.interface_ids.to_vec(),
                    });
                }
                Op::ExecutionMode | Op::ExecutionModeId => {
                    let op = OpExecutionModeCommon::try_from(instr)?;
                    self.exec_mode_declrs.push(ExecModeDeclaration {
                        func_id: op.func_id,
                        mode: op.execution_mode,
                        operands: op.params.to_vec(),
                        is_id: opcode == Op::ExecutionModeId as u32,
                    });
                }
                Op::Decorate | Op::DecorateId => {
                    let op = OpDecorate::try_from(instr)?;
                    if is_deco_whitelisted(op.deco) {
                        self.deco_reg
                            .set(op.target_id, op.deco, op.params, instr.offset() + 3)?;
                    }
                }
                Op::MemberDecorate => {
                    let op = OpMemberDecorate::try_from(instr)?;
                    if is_deco_whitelisted(op.deco) {
                        self.deco_reg.set_member(
                            op.target_id,
                            op.member_idx,
                            op.deco,
                            op.params,
                            instr.offset() + 4,
                        )?;
                    }
                }
                Op::TypeVoid
                | Op::TypeBool
                | Op::TypeInt
                | Op::TypeFloat
                | Op::TypeVector
                | Op::TypeMatrix
                | Op::TypeImage
                | Op::TypeSampler
                | Op::TypeSampledImage
                | Op::TypeArray
                | Op::TypeRuntimeArray
                | Op::TypeStruct
                | Op::TypePointer
                | Op::TypeForwardPointer
                | Op::TypeAccelerationStructureKHR => self.populate_one_ty(instr, op)?,
                Op::ConstantTrue
                | Op::ConstantFalse
                | Op::Constant
                | Op::ConstantComposite
                | Op::ConstantSampler
                | Op::ConstantNull
                | Op::SpecConstantTrue
                | Op::SpecConstantFalse
                | Op::SpecConstant
                | Op::SpecConstantComposite
                | Op::SpecConstantOp => self.populate_one_const(instr, op)?,
                Op::Undef => {
                    let op = OpUndef::try_from(instr)?;
                    if let Some(evaluator) = self.evaluator.as_mut() {
                        if let Ok(ty) = self.ty_reg.get(op.ty_id) {
                            evaluator.add_undef(op.result_id, ty.clone())?;
                        }
                    }
                }
                Op::Variable => {
                    let op = OpVariable::try_from(instr)?;
                    if cur_func.is_none() {
                        self.vars.push(VariableDecl {
                            var_id: op.var_id,
                            ty_id: op.ty_id,
                            storage_class: op.store_cls,
                        });
                        self.var_ids.insert(op.var_id);
                    }
                }
                Op::Function => {
                    let op = OpFunction::try_from(instr)?;
                    cur_func = Some((op.func_id, Function::default()));
                }
                Op::FunctionEnd => match cur_func.take() {
                    Some((func_id, mut func)) => {
                        func.name = self.name_reg.get(func_id).map(ToOwned::to_owned);
                        func.seal();
                        self.func_reg.set(func_id, func)?;
                    }
                    None => return Err(Error::InvalidInstruction(instr.offset())),
                },
                Op::FunctionCall => {
                    let op = OpFunctionCall::try_from(instr)?;
                    if let Some((_, func)) = cur_func.as_mut() {
                        func.callees.push(op.func_id);
                    }
                }
                Op::Load => {
                    let op = OpLoad::try_from(instr)?;
                    self.record_access(&mut cur_func, op.ptr_id);
                }
                Op::Store => {
                    let op = OpStore::try_from(instr)?;
                    self.record_access(&mut cur_func, op.ptr_id);
                }
                Op::AccessChain | Op::InBoundsAccessChain => {
                    let op = OpAccessChain::try_from(instr)?;
                    self.record_access_chain(
                        &mut cur_func,
                        op.result_id,
                        op.base_id,
                        op.index_ids,
                    );
                }
                Op::PtrAccessChain | Op::InBoundsPtrAccessChain => {
                    let op = OpPtrAccessChain::try_from(instr)?;
                    // The leading element operand offsets the pointer itself
                    // and does not select a member.
                    self.record_access_chain(
                        &mut cur_func,
                        op.result_id,
                        op.base_id,
                        op.index_ids,
                    );
                }
                Op::ArrayLength => {
                    let op = OpArrayLength::try_from(instr)?;
                    self.record_access(&mut cur_func, op.struct_ptr_id);
                }
                Op::ImageTexelPointer => {
                    let op = OpImageTexelPointer::try_from(instr)?;
                    self.record_access(&mut cur_func, op.image_ptr_id);
                }
                Op::GenericPtrMemSemantics => {
                    let op = OpGenericPtrMemSemantics::try_from(instr)?;
                    self.record_access(&mut cur_func, op.ptr_id);
                }
                Op::CopyMemory | Op::CopyMemorySized => {
                    let op = OpCopyMemory::try_from(instr)?;
                    self.record_access(&mut cur_func, op.target_id);
                    self.record_access(&mut cur_func, op.source_id);
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn parse_source(&mut self, instr: Instr<'a>) -> Result<()> {
        let mut operands = instr.operands();
        self.source_language = operands.read_u32()?;
        self.source_language_version = operands.read_u32()?;
        if !operands.is_empty() {
            self.source_file_id = Some(operands.read_u32()?);
        }
        if !operands.is_empty() {
            self.source_text.push_str(operands.read_str()?);
        }
        Ok(())
    }

    fn resolve_chain_base(&self, ptr_id: VariableId) -> VariableId {
        match self.chain_map.get(&ptr_id) {
            Some(i) => self.access_chains[*i].base_id,
            None => ptr_id,
        }
    }

    fn record_access(&mut self, cur_func: &mut Option<(FunctionId, Function)>, ptr_id: VariableId) {
        let base_id = self.resolve_chain_base(ptr_id);
        if let Some((_, func)) = cur_func.as_mut() {
            func.accessed_ids.push(base_id);
        }
    }

    fn record_access_chain(
        &mut self,
        cur_func: &mut Option<(FunctionId, Function)>,
        result_id: InstrId,
        base_id: VariableId,
        index_ids: &[InstrId],
    ) {
        let indices_of = |ids: &[InstrId]| {
            ids.iter()
                .map(|id| {
                    self.consts.get(id).and_then(|x| match x.value {
                        ConstantValue::S32(v) if v >= 0 => Some(v as u32),
                        ConstantValue::U32(v) => Some(v),
                        _ => None,
                    })
                })
                .collect::<Vec<_>>()
        };
        // Chains over chain results flatten into one record rooted at the
        // underlying variable.
        let (root, mut indices) = match self.chain_map.get(&base_id) {
            Some(i) => {
                let parent = &self.access_chains[*i];
                (parent.base_id, parent.indices.clone())
            }
            None => (base_id, Vec::new()),
        };
        indices.extend(indices_of(index_ids));
        let func_id = match cur_func.as_mut() {
            Some((func_id, func)) => {
                func.accessed_ids.push(root);
                *func_id
            }
            None => return,
        };
        self.access_chains.push(AccessChainRecord {
            func_id,
            base_id: root,
            indices,
        });
        self.chain_map.insert(result_id, self.access_chains.len() - 1);
    }

    fn populate_one_ty(&mut self, instr: Instr<'a>, op: Op) -> Result<()> {
        match op {
            Op::TypeVoid => {
                let op = OpTypeVoid::try_from(instr)?;
                self.ty_reg.set(op.ty_id, Type::Scalar(ScalarType::Void))?;
            }
            Op::TypeBool => {
                let op = OpTypeBool::try_from(instr)?;
                self.ty_reg.set(op.ty_id, Type::Scalar(ScalarType::Boolean))?;
            }
            Op::TypeInt => {
                let op = OpTypeInt::try_from(instr)?;
                let scalar_ty = ScalarType::Integer {
                    bits: op.bits,
                    is_signed: op.is_signed,
                };
                self.ty_reg.set(op.ty_id, Type::Scalar(scalar_ty))?;
            }
            Op::TypeFloat => {
                let op = OpTypeFloat::try_from(instr)?;
                let scalar_ty = ScalarType::Float { bits: op.bits };
                self.ty_reg.set(op.ty_id, Type::Scalar(scalar_ty))?;
            }
            Op::TypeVector => {
                let op = OpTypeVector::try_from(instr)?;
                let scalar_ty = match self.ty_reg.get(op.scalar_ty_id)? {
                    Type::Scalar(x) => x.clone(),
                    _ => return Err(Error::InvalidType(op.ty_id, "non-scalar vector component")),
                };
                let vector_ty = VectorType {
                    scalar_ty,
                    scalar_count: op.nscalar,
                };
                self.ty_reg.set(op.ty_id, Type::Vector(vector_ty))?;
            }
            Op::TypeMatrix => {
                let op = OpTypeMatrix::try_from(instr)?;
                let vector_ty = match self.ty_reg.get(op.vector_ty_id)? {
                    Type::Vector(x) => x.clone(),
                    _ => return Err(Error::InvalidType(op.ty_id, "non-vector matrix column")),
                };
                let matrix_ty = MatrixType {
                    vector_ty,
                    vector_count: op.nvector,
                    axis_order: None,
                    stride: None,
                };
                self.ty_reg.set(op.ty_id, Type::Matrix(matrix_ty))?;
            }
            Op::TypeImage => {
                let op = OpTypeImage::try_from(instr)?;
                let scalar_ty = match self.ty_reg.get(op.scalar_ty_id)? {
                    Type::Scalar(x) => x.clone(),
                    _ => return Err(Error::InvalidType(op.ty_id, "non-scalar sampled type")),
                };
                let image_ty = ImageType {
                    scalar_ty,
                    traits: ImageTraits {
                        dim: op.dim,
                        depth: op.is_depth,
                        arrayed: op.is_array,
                        ms: op.is_multisampled,
                        sampled: op.is_sampled,
                        image_format: op.color_fmt,
                    },
                };
                self.ty_reg.set(op.ty_id, Type::Image(image_ty))?;
            }
            Op::TypeSampler => {
                let op = OpTypeSampler::try_from(instr)?;
                self.ty_reg.set(op.ty_id, Type::Sampler(SamplerType {}))?;
            }
            Op::TypeSampledImage => {
                let op = OpTypeSampledImage::try_from(instr)?;
                let image_ty = match self.ty_reg.get(op.image_ty_id)? {
                    Type::Image(x) => x.clone(),
                    _ => return Err(Error::InvalidType(op.ty_id, "non-image sampled image")),
                };
                self.ty_reg
                    .set(op.ty_id, Type::SampledImage(SampledImageType { image_ty }))?;
            }
            Op::TypeArray => {
                let op = OpTypeArray::try_from(instr)?;
                // Opaque element types (e.g. function pointers) leave holes
                // we deliberately do not reflect.
                let element_ty = match self.ty_reg.get(op.element_ty_id) {
                    Ok(x) => x.clone(),
                    Err(_) => return Ok(()),
                };
                let len = if let Some(constant) = self.consts.get(&op.nelement_const_id) {
                    let n = constant
                        .value
                        .to_array_len()
                        .ok_or(Error::InvalidType(op.ty_id, "invalid array size"))?;
                    ArrayLen::Literal(n)
                } else if self.spec_const_ids.contains(&op.nelement_const_id) {
                    ArrayLen::SpecConstant(op.nelement_const_id)
                } else {
                    return Err(Error::InvalidIdReference(op.nelement_const_id));
                };
                let stride = self
                    .deco_reg
                    .get_u32(op.ty_id, Decoration::ArrayStride);
                let arr_ty = ArrayType {
                    element_ty: Box::new(element_ty),
                    len,
                    stride,
                };
                self.ty_reg.set(op.ty_id, Type::Array(arr_ty))?;
            }
            Op::TypeRuntimeArray => {
                let op = OpTypeRuntimeArray::try_from(instr)?;
                let element_ty = match self.ty_reg.get(op.element_ty_id) {
                    Ok(x) => x.clone(),
                    Err(_) => return Ok(()),
                };
                let stride = self
                    .deco_reg
                    .get_u32(op.ty_id, Decoration::ArrayStride);
                let arr_ty = ArrayType {
                    element_ty: Box::new(element_ty),
                    len: ArrayLen::Runtime,
                    stride,
                };
                self.ty_reg.set(op.ty_id, Type::Array(arr_ty))?;
            }
            Op::TypeStruct => {
                let op = OpTypeStruct::try_from(instr)?;
                let mut members = Vec::with_capacity(op.member_ty_ids.len());
                for (i, &member_ty_id) in op.member_ty_ids.iter().enumerate() {
                    let i = i as u32;
                    let mut member_ty = match self.ty_reg.get(member_ty_id) {
                        Ok(x) => x.clone(),
                        Err(_) => return Ok(()),
                    };
                    // Member decorations of matrix layout sink into the type.
                    {
                        let mut element_ty = &mut member_ty;
                        while let Type::Array(arr_ty) = element_ty {
                            element_ty = &mut *arr_ty.element_ty;
                        }
                        if let Type::Matrix(mat_ty) = element_ty {
                            if let Some(stride) =
                                self.deco_reg
                                    .get_member_u32(op.ty_id, i, Decoration::MatrixStride)
                            {
                                mat_ty.stride = Some(stride);
                            }
                            if self
                                .deco_reg
                                .contains_member(op.ty_id, i, Decoration::RowMajor)
                            {
                                mat_ty.axis_order = Some(MatrixAxisOrder::RowMajor);
                            } else if self
                                .deco_reg
                                .contains_member(op.ty_id, i, Decoration::ColMajor)
                            {
                                mat_ty.axis_order = Some(MatrixAxisOrder::ColumnMajor);
                            }
                        }
                    }
                    let member = StructMember {
                        name: self
                            .name_reg
                            .get_member(op.ty_id, i)
                            .map(ToOwned::to_owned),
                        offset: self
                            .deco_reg
                            .get_member_u32(op.ty_id, i, Decoration::Offset),
                        ty: member_ty,
                        decoration_flags: self.member_decoration_flags(op.ty_id, i),
                        built_in: self
                            .deco_reg
                            .get_member_u32(op.ty_id, i, Decoration::BuiltIn),
                    };
                    members.push(member);
                }
                let struct_ty = StructType {
                    id: op.ty_id,
                    name: self.name_reg.get(op.ty_id).map(ToOwned::to_owned),
                    members,
                    decoration_flags: var_decoration_flags(&self.deco_reg, op.ty_id),
                };
                self.ty_reg.set(op.ty_id, Type::Struct(struct_ty))?;
            }
            Op::TypePointer => {
                let op = OpTypePointer::try_from(instr)?;
                let pointee_ty = match self.ty_reg.get(op.target_ty_id) {
                    Ok(x) => x.clone(),
                    // Unreflected pointees (function types and friends).
                    Err(_) => return Ok(()),
                };
                let pointer_ty = PointerType {
                    pointee_ty: Box::new(pointee_ty),
                    storage_class: op.store_cls,
                };
                self.ty_reg.set(op.ty_id, Type::Pointer(pointer_ty))?;
            }
            Op::TypeForwardPointer => {
                let op = OpTypeForwardPointer::try_from(instr)?;
                self.ty_reg.set(
                    op.ty_id,
                    Type::ForwardPointer(ForwardPointerType {
                        storage_class: op.store_cls,
                    }),
                )?;
            }
            Op::TypeAccelerationStructureKHR => {
                let op = OpTypeAccelerationStructureKHR::try_from(instr)?;
                self.ty_reg
                    .set(op.ty_id, Type::AccelStruct(AccelStructType {}))?;
            }
            _ => {}
        }
        Ok(())
    }

    fn member_decoration_flags(&self, ty_id: TypeId, member_idx: u32) -> DecorationFlags {
        let mut flags = DecorationFlags::empty();
        let pairs = [
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
            if self.deco_reg.contains_member(ty_id, member_idx, *deco) {
                flags |= *flag;
            }
        }
        flags
    }

    fn populate_one_const(&mut self, instr: Instr<'a>, op: Op) -> Result<()> {
        match op {
            Op::ConstantTrue | Op::ConstantFalse | Op::SpecConstantTrue | Op::SpecConstantFalse => {
                let rec = OpConstantCommon::try_from(instr)?;
                let ty = self.ty_reg.get(rec.ty_id)?.clone();
                let value =
                    ConstantValue::Bool(op == Op::ConstantTrue || op == Op::SpecConstantTrue);
                let is_spec = op == Op::SpecConstantTrue || op == Op::SpecConstantFalse;
                self.register_scalar_const(rec.const_id, ty, value, is_spec)?;
            }
            Op::Constant | Op::SpecConstant => {
                let rec = OpConstantCommon::try_from(instr)?;
                let ty = self.ty_reg.get(rec.ty_id)?.clone();
                match ConstantValue::try_from_words(rec.value, &ty) {
                    Ok(value) => {
                        self.register_scalar_const(
                            rec.const_id,
                            ty,
                            value,
                            op == Op::SpecConstant,
                        )?;
                    }
                    // Unsupported scalar widths stay opaque; reflection
                    // proceeds without them.
                    Err(_) => {
                        if let Some(evaluator) = self.evaluator.as_mut() {
                            evaluator.add_unsupported(rec.const_id, ty, op as u32)?;
                        }
                    }
                }
            }
            Op::ConstantComposite | Op::SpecConstantComposite => {
                let rec = OpConstantCommon::try_from(instr)?;
                self.composite_ids.insert(rec.const_id);
                if let Some(evaluator) = self.evaluator.as_mut() {
                    let ty = self.ty_reg.get(rec.ty_id)?.clone();
                    evaluator.add_composite(rec.const_id, ty, rec.value)?;
                }
            }
            Op::ConstantNull => {
                let rec = OpConstantCommon::try_from(instr)?;
                if let Some(evaluator) = self.evaluator.as_mut() {
                    let ty = self.ty_reg.get(rec.ty_id)?.clone();
                    evaluator.add_null(rec.const_id, ty)?;
                }
            }
            Op::ConstantSampler => {
                let rec = OpConstantCommon::try_from(instr)?;
                if let Some(evaluator) = self.evaluator.as_mut() {
                    let ty = self.ty_reg.get(rec.ty_id)?.clone();
                    evaluator.add_unsupported(rec.const_id, ty, op as u32)?;
                }
            }
            Op::SpecConstantOp => {
                let rec = OpSpecConstantOpHead::try_from(instr)?;
                self.spec_const_ids.insert(rec.spec_const_id);
                if let Some(evaluator) = self.evaluator.as_mut() {
                    let ty = self.ty_reg.get(rec.ty_id)?.clone();
                    evaluator.add_spec_op(rec.spec_const_id, ty, rec.opcode, rec.operands)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn register_scalar_const(
        &mut self,
        const_id: ConstantId,
        ty: Type,
        value: ConstantValue,
        is_spec: bool,
    ) -> Result<()> {
        let name = self.name_reg.get(const_id).map(ToOwned::to_owned);
        let spec_id = if is_spec {
            self.spec_const_ids.insert(const_id);
            self.deco_reg.get_u32(const_id, Decoration::SpecId)
        } else {
            None
        };
        let constant = match spec_id {
            Some(spec_id) => Constant::new_spec(name, ty.clone(), value.clone(), spec_id),
            None => Constant::new(name, ty.clone(), value.clone()),
        };
        use std::collections::hash_map::Entry;
        match self.consts.entry(const_id) {
            Entry::Vacant(entry) => {
                entry.insert(constant);
            }
            Entry::Occupied(_) => return Err(Error::DuplicateId(const_id)),
        }
        if let Some(evaluator) = self.evaluator.as_mut() {
            evaluator.add_literal(const_id, ty, value, spec_id)?;
        }
        Ok(())
    }

    fn validate_decorations(&self) -> Result<()> {
        let var_targeting = [
            Decoration::Binding,
            Decoration::DescriptorSet,
            Decoration::Location,
            Decoration::InputAttachmentIndex,
        ];
        for deco in var_targeting.iter() {
            for (id, _) in self.deco_reg.get_all(*deco) {
                if !self.var_ids.contains(&id) {
                    return Err(Error::InvalidIdReference(id));
                }
            }
        }
        for (id, _) in self.deco_reg.get_all(Decoration::SpecId) {
            if !self.consts.contains_key(&id)
                && !self.spec_const_ids.contains(&id)
                && !self.composite_ids.contains(&id)
            {
                return Err(Error::InvalidIdReference(id));
            }
        }
        Ok(())
    }

    fn collect(mut self, header: SpirvHeader) -> Result<ModuleParts> {
        self.validate_decorations()?;

        // Per-entry-point transitive access sets; a cyclic call graph fails
        // here.
        let mut ep_accessed: Vec<Vec<u32>> = Vec::with_capacity(self.entry_point_declrs.len());
        let mut reachable_funcs = IntSet::default();
        for declr in self.entry_point_declrs.iter() {
            ep_accessed.push(self.func_reg.collect_accessed(declr.func_id)?);
            for func_id in self.func_reg.collect_reachable(declr.func_id)? {
                reachable_funcs.insert(func_id);
            }
        }
        for declr in self.exec_mode_declrs.iter() {
            if !self
                .entry_point_declrs
                .iter()
                .any(|x| x.func_id == declr.func_id)
            {
                return Err(Error::InvalidExecutionMode(declr.func_id));
            }
        }

        let mut interface_vars: Vec<InterfaceVariable> = Vec::new();
        let mut interface_index: IntMap<u32, usize> = Default::default();
        let mut push_constants: Vec<PushConstantBlock> = Vec::new();
        let mut bindings: Vec<DescriptorBinding> = Vec::new();

        for decl in self.vars.iter() {
            // Resolve the variable through its pointer type; variables of
            // unreflected types are left out.
            let pointee = match self.ty_reg.get_pointee(decl.ty_id) {
                Ok((pointee, _)) => pointee,
                Err(Error::InvalidType(..)) | Err(Error::InvalidIdReference(..)) => continue,
                Err(e) => return Err(e),
            };
            let store_cls = decl.storage_class;
            use spirv::StorageClass as Sc;
            if store_cls == Sc::Input as u32 || store_cls == Sc::Output as u32 {
                let var = build_interface_variable(
                    decl.var_id,
                    pointee,
                    store_cls,
                    &self.deco_reg,
                    &self.name_reg,
                );
                interface_index.insert(decl.var_id, interface_vars.len());
                interface_vars.push(var);
            } else if store_cls == Sc::PushConstant as u32 {
                if !pointee.element_ty().is_struct() {
                    return Err(Error::UnexpectedBlockData(decl.var_id));
                }
                let mut block = build_block_variable(
                    pointee,
                    self.name_reg.get(decl.var_id).map(ToOwned::to_owned),
                    0,
                    var_decoration_flags(&self.deco_reg, decl.var_id)
                        | struct_decoration_flags(pointee),
                    None,
                    &self.deco_reg,
                );
                compute_block_sizes(&mut block);
                push_constants.push(PushConstantBlock {
                    spirv_id: decl.var_id,
                    name: self.name_reg.get(decl.var_id).map(ToOwned::to_owned),
                    block,
                });
            } else if store_cls == Sc::Uniform as u32
                || store_cls == Sc::StorageBuffer as u32
                || store_cls == Sc::UniformConstant as u32
            {
                let binding_entry = self.deco_reg.get(decl.var_id, Decoration::Binding);
                let set_entry = self.deco_reg.get(decl.var_id, Decoration::DescriptorSet);
                // Variables missing either decoration are not bindings.
                let (binding_entry, set_entry) = match (binding_entry, set_entry) {
                    (Some(b), Some(s)) => (b, s),
                    _ => continue,
                };
                let binding = self.make_binding(decl, pointee, binding_entry, set_entry)?;
                bindings.push(binding);
            }
        }
        bindings.sort_by_key(|x| (x.binding, x.spirv_id));

        // UAV counter pairing: an explicit counter id wins, then the HLSL
        // `@count` naming convention.
        for i in 0..bindings.len() {
            let counter = match bindings[i].uav_counter_id {
                Some(counter_id) => Some(
                    bindings
                        .iter()
                        .position(|x| x.spirv_id == counter_id)
                        .ok_or(Error::InvalidIdReference(counter_id))?,
                ),
                None => match bindings[i].name.clone() {
                    Some(name)
                        if bindings[i]
                            .resource_type
                            .contains(crate::binding::ResourceTypeFlags::UAV) =>
                    {
                        let counter_name = format!("{}{}", name, UAV_COUNTER_SUFFIX);
                        bindings.iter().position(|x| {
                            x.descriptor_type == crate::binding::DescriptorType::StorageBuffer
                                && x.name.as_deref() == Some(&counter_name)
                        })
                    }
                    _ => None,
                },
            };
            bindings[i].uav_counter_index = counter;
        }

        // Usage marking from constant-indexed access chains of reachable
        // functions.
        for chain in self.access_chains.iter() {
            if !reachable_funcs.contains(&chain.func_id) {
                continue;
            }
            if let Some(binding) = bindings.iter_mut().find(|x| x.spirv_id == chain.base_id) {
                let skip = binding.array_dims.len();
                if let Some(block) = binding.block.as_mut() {
                    let indices = chain.indices.get(skip..).unwrap_or(&[]);
                    mark_access_chain(chain.base_id, block, indices)?;
                }
            }
            if let Some(push_constant) = push_constants
                .iter_mut()
                .find(|x| x.spirv_id == chain.base_id)
            {
                mark_access_chain(chain.base_id, &mut push_constant.block, &chain.indices)?;
            }
        }

        for binding in bindings.iter_mut() {
            binding.accessed = ep_accessed
                .iter()
                .any(|accessed| accessed.binary_search(&binding.spirv_id).is_ok());
        }

        let descriptor_sets = aggregate_descriptor_sets(&bindings)?;

        let mut spec_constants: Vec<SpecConstant> = self
            .consts
            .iter()
            .filter_map(|(id, constant)| {
                constant.spec_id.map(|spec_id| SpecConstant {
                    spirv_id: *id,
                    spec_id,
                    name: constant.name.clone(),
                    default_value: constant.value.clone(),
                    ty: constant.ty.clone(),
                })
            })
            .collect();
        spec_constants.sort_by_key(|x| x.spirv_id);

        // The WorkgroupSize built-in on a constant composite supersedes the
        // LocalSize execution modes.
        let workgroup_size_id = self
            .deco_reg
            .get_all(Decoration::BuiltIn)
            .filter(|(_, entry)| entry.params.first() == Some(&(spirv::BuiltIn::WorkgroupSize as u32)))
            .map(|(id, _)| id)
            .find(|id| self.composite_ids.contains(id));

        let mut entry_points = Vec::with_capacity(self.entry_point_declrs.len());
        for (ep_idx, declr) in self.entry_point_declrs.iter().enumerate() {
            let stage = ShaderStage::from_execution_model(declr.exec_model)
                .ok_or(Error::InvalidEntryPoint("unknown execution model"))?;
            let mut input_indices = Vec::new();
            let mut output_indices = Vec::new();
            for id in declr.interface_ids.iter() {
                if let Some(&i) = interface_index.get(id) {
                    if interface_vars[i].is_input() {
                        input_indices.push(i);
                    } else {
                        output_indices.push(i);
                    }
                }
            }

            let accessed = &ep_accessed[ep_idx];
            let mut used_uniforms: Vec<u32> = bindings
                .iter()
                .map(|x| x.spirv_id)
                .filter(|id| accessed.binary_search(id).is_ok())
                .collect();
            used_uniforms.sort_unstable();
            let mut used_push_constants: Vec<u32> = push_constants
                .iter()
                .map(|x| x.spirv_id)
                .filter(|id| accessed.binary_search(id).is_ok())
                .collect();
            used_push_constants.sort_unstable();

            let mut execution_modes = Vec::new();
            let mut invocations = None;
            let mut output_vertices = None;
            let mut local_size = None;
            for em in self.exec_mode_declrs.iter().filter(|x| x.func_id == declr.func_id) {
                use spirv::ExecutionMode as Em;
                let ops = &em.operands;
                let get = |i: usize| ops.get(i).copied().unwrap_or(0);
                if em.mode == Em::Invocations as u32 {
                    invocations = Some(get(0));
                } else if em.mode == Em::OutputVertices as u32 {
                    output_vertices = Some(get(0));
                } else if em.mode == Em::LocalSize as u32 {
                    local_size = Some(LocalSize {
                        x: get(0),
                        y: get(1),
                        z: get(2),
                        kind: LocalSizeKind::Literal,
                    });
                } else if em.mode == Em::LocalSizeId as u32 {
                    local_size = Some(LocalSize {
                        x: get(0),
                        y: get(1),
                        z: get(2),
                        kind: LocalSizeKind::Id,
                    });
                } else if em.mode == Em::LocalSizeHint as u32 {
                    local_size = Some(LocalSize {
                        x: get(0),
                        y: get(1),
                        z: get(2),
                        kind: LocalSizeKind::HintLiteral,
                    });
                } else if em.mode == Em::LocalSizeHintId as u32 {
                    local_size = Some(LocalSize {
                        x: get(0),
                        y: get(1),
                        z: get(2),
                        kind: LocalSizeKind::HintId,
                    });
                }
                execution_modes.push(ExecutionMode {
                    mode: em.mode,
                    operands: em.operands.clone(),
                    is_id: em.is_id,
                });
            }
            if stage == ShaderStage::COMPUTE {
                if let Some(id) = workgroup_size_id {
                    local_size = Some(LocalSize {
                        x: id,
                        y: 0,
                        z: 0,
                        kind: LocalSizeKind::WorkgroupSize,
                    });
                }
            }

            // Per-entry-point set views keep only the bindings this entry
            // point statically uses.
            let mut ep_sets: Vec<DescriptorSet> = Vec::new();
            for set in descriptor_sets.iter() {
                let binding_indices: Vec<usize> = set
                    .binding_indices
                    .iter()
                    .copied()
                    .filter(|&i| used_uniforms.binary_search(&bindings[i].spirv_id).is_ok())
                    .collect();
                if !binding_indices.is_empty() {
                    ep_sets.push(DescriptorSet {
                        set: set.set,
                        binding_indices,
                    });
                }
            }

            entry_points.push(EntryPoint {
                name: declr.name.to_owned(),
                spirv_id: declr.func_id,
                execution_model: declr.exec_model,
                stage,
                execution_modes,
                invocations,
                output_vertices,
                local_size,
                interface_ids: declr.interface_ids.clone(),
                input_indices,
                output_indices,
                used_uniforms,
                used_push_constants,
                descriptor_sets: ep_sets,
            });
        }

        let source_file = self
            .source_file_id
            .and_then(|id| self.strings.get(&id))
            .map(|x| (*x).to_owned());
        let source_text = if self.source_text.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.source_text))
        };

        Ok(ModuleParts {
            header,
            capabilities: self.capabilities,
            source_language: self.source_language,
            source_language_version: self.source_language_version,
            source_file,
            source_text,
            entry_points,
            bindings,
            descriptor_sets,
            interface_vars,
            push_constants,
            spec_constants,
            types: self.ty_reg,
            evaluator: self.evaluator,
        })
    }

    fn make_binding(
        &self,
        decl: &VariableDecl,
        pointee: &Type,
        binding_entry: crate::annotation::DecorationEntry,
        set_entry: crate::annotation::DecorationEntry,
    ) -> Result<DescriptorBinding> {
        let binding = binding_entry
            .params
            .first()
            .copied()
            .ok_or(Error::ParseFailed("binding decoration misses an operand"))?;
        let set = set_entry
            .params
            .first()
            .copied()
            .ok_or(Error::ParseFailed("set decoration misses an operand"))?;

        // Unwrap binding arrays down to the bound resource type.
        let array_traits = pointee.array_traits();
        let element_ty = pointee.element_ty();
        let array_dims = array_traits.as_ref().map(|x| x.dims.clone()).unwrap_or_default();
        if array_dims.len() > crate::consts::MAX_ARRAY_DIMS {
            return Err(Error::RangeExceeded("binding array dimension count"));
        }
        let count = array_traits
            .as_ref()
            .map(|x| x.element_count())
            .unwrap_or(1);

        let descriptor_type =
            classify_descriptor_type(decl.var_id, decl.storage_class, element_ty)?;
        let block = match descriptor_type {
            crate::binding::DescriptorType::UniformBuffer
            | crate::binding::DescriptorType::StorageBuffer => {
                if let Type::Struct(_) = element_ty {
                    let mut block = build_block_variable(
                        element_ty,
                        self.name_reg.get(decl.var_id).map(ToOwned::to_owned),
                        0,
                        var_decoration_flags(&self.deco_reg, decl.var_id)
                            | struct_decoration_flags(element_ty),
                        None,
                        &self.deco_reg,
                    );
                    compute_block_sizes(&mut block);
                    Some(block)
                } else {
                    None
                }
            }
            _ => None,
        };

        let decoration_flags = var_decoration_flags(&self.deco_reg, decl.var_id)
            | struct_decoration_flags(element_ty);
        Ok(DescriptorBinding {
            spirv_id: decl.var_id,
            name: self.name_reg.get(decl.var_id).map(ToOwned::to_owned),
            binding,
            set,
            input_attachment_index: self
                .deco_reg
                .get_u32(decl.var_id, Decoration::InputAttachmentIndex)
                .unwrap_or(0),
            descriptor_type,
            resource_type: descriptor_type.resource_type(),
            decoration_flags,
            image: element_ty.image_traits().unwrap_or_default(),
            block,
            array_dims,
            count,
            uav_counter_id: self
                .deco_reg
                .get_raw(decl.var_id, DECO_HLSL_COUNTER_BUFFER_GOOGLE)
                .and_then(|x| x.params.first().copied()),
            uav_counter_index: None,
            accessed: false,
            ty: pointee.clone(),
            word_offset: BindingWordOffsets {
                binding: binding_entry.word_offset,
                set: set_entry.word_offset,
            },
        })
    }
}

fn struct_decoration_flags(ty: &Type) -> DecorationFlags {
    match ty.element_ty() {
        Type::Struct(x) => x.decoration_flags
            & (DecorationFlags::BLOCK | DecorationFlags::BUFFER_BLOCK),
        _ => DecorationFlags::empty(),
    }
}
