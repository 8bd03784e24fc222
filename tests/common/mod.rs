//! Hand-assembly of small SPIR-V modules for the reflection tests.
#![allow(dead_code)]

use spirv_probe::spirv::Op;
use spirv_probe::InstructionBuilder;

pub const MAGIC: u32 = 0x0723_0203;
pub const VERSION_1_5: u32 = 0x0001_0500;

// Storage classes.
pub const SC_UNIFORM_CONSTANT: u32 = 0;
pub const SC_INPUT: u32 = 1;
pub const SC_UNIFORM: u32 = 2;
pub const SC_OUTPUT: u32 = 3;
pub const SC_PUSH_CONSTANT: u32 = 9;
pub const SC_STORAGE_BUFFER: u32 = 12;

// Execution models.
pub const EM_VERTEX: u32 = 0;
pub const EM_FRAGMENT: u32 = 4;
pub const EM_GL_COMPUTE: u32 = 5;

// Decorations.
pub const DECO_SPEC_ID: u32 = 1;
pub const DECO_BLOCK: u32 = 2;
pub const DECO_BUFFER_BLOCK: u32 = 3;
pub const DECO_COL_MAJOR: u32 = 5;
pub const DECO_ARRAY_STRIDE: u32 = 6;
pub const DECO_MATRIX_STRIDE: u32 = 7;
pub const DECO_BUILT_IN: u32 = 11;
pub const DECO_LOCATION: u32 = 30;
pub const DECO_BINDING: u32 = 33;
pub const DECO_DESCRIPTOR_SET: u32 = 34;
pub const DECO_OFFSET: u32 = 35;

pub const BUILT_IN_WORKGROUP_SIZE: u32 = 25;

pub const EXEC_MODE_LOCAL_SIZE: u32 = 17;
pub const EXEC_MODE_LOCAL_SIZE_ID: u32 = 38;

pub const OP_DECORATE_STRING: u32 = 5632;
pub const DECO_HLSL_COUNTER_BUFFER: u32 = 5634;
pub const DECO_HLSL_SEMANTIC: u32 = 5635;

/// Assembles instructions into the logical section order of a module.
#[derive(Default)]
pub struct ModuleBuilder {
    capabilities: Vec<u32>,
    entry_points: Vec<u32>,
    exec_modes: Vec<u32>,
    debug: Vec<u32>,
    annotations: Vec<u32>,
    globals: Vec<u32>,
    functions: Vec<u32>,
    bound: u32,
}

impl ModuleBuilder {
    /// A shader module with the `Shader` capability and the usual memory
    /// model.
    pub fn new() -> Self {
        let mut out = ModuleBuilder::default();
        out.capabilities
            .extend(InstructionBuilder::new(Op::Capability).push(1).build());
        out
    }

    fn track(&mut self, id: u32) -> u32 {
        self.bound = self.bound.max(id + 1);
        id
    }

    pub fn build(&self) -> Vec<u32> {
        let mut out = vec![MAGIC, VERSION_1_5, 8, self.bound, 0];
        out.extend_from_slice(&self.capabilities);
        // The single required OpMemoryModel: Logical GLSL450.
        out.extend(
            InstructionBuilder::new(Op::MemoryModel)
                .push(0)
                .push(1)
                .build(),
        );
        out.extend_from_slice(&self.entry_points);
        out.extend_from_slice(&self.exec_modes);
        out.extend_from_slice(&self.debug);
        out.extend_from_slice(&self.annotations);
        out.extend_from_slice(&self.globals);
        out.extend_from_slice(&self.functions);
        out
    }

    pub fn entry_point(&mut self, model: u32, func: u32, name: &str, interface: &[u32]) {
        let words = InstructionBuilder::new(Op::EntryPoint)
            .push(model)
            .push(func)
            .push_str(name)
            .push_list(interface)
            .build();
        self.entry_points.extend(words);
    }
    pub fn exec_mode(&mut self, func: u32, mode: u32, operands: &[u32]) {
        let words = InstructionBuilder::new(Op::ExecutionMode)
            .push(func)
            .push(mode)
            .push_list(operands)
            .build();
        self.exec_modes.extend(words);
    }
    pub fn exec_mode_id(&mut self, func: u32, mode: u32, operands: &[u32]) {
        let words = InstructionBuilder::new(Op::ExecutionModeId)
            .push(func)
            .push(mode)
            .push_list(operands)
            .build();
        self.exec_modes.extend(words);
    }

    pub fn name(&mut self, target: u32, name: &str) {
        let words = InstructionBuilder::new(Op::Name)
            .push(target)
            .push_str(name)
            .build();
        self.debug.extend(words);
    }
    pub fn member_name(&mut self, target: u32, member: u32, name: &str) {
        let words = InstructionBuilder::new(Op::MemberName)
            .push(target)
            .push(member)
            .push_str(name)
            .build();
        self.debug.extend(words);
    }

    pub fn decorate(&mut self, target: u32, deco: u32, params: &[u32]) {
        let words = InstructionBuilder::new(Op::Decorate)
            .push(target)
            .push(deco)
            .push_list(params)
            .build();
        self.annotations.extend(words);
    }
    pub fn member_decorate(&mut self, target: u32, member: u32, deco: u32, params: &[u32]) {
        let words = InstructionBuilder::new(Op::MemberDecorate)
            .push(target)
            .push(member)
            .push(deco)
            .push_list(params)
            .build();
        self.annotations.extend(words);
    }
    pub fn decorate_id(&mut self, target: u32, deco: u32, params: &[u32]) {
        let words = InstructionBuilder::new(Op::DecorateId)
            .push(target)
            .push(deco)
            .push_list(params)
            .build();
        self.annotations.extend(words);
    }
    pub fn decorate_str(&mut self, target: u32, deco: u32, value: &str) {
        let words = InstructionBuilder::new_raw(OP_DECORATE_STRING)
            .push(target)
            .push(deco)
            .push_str(value)
            .build();
        self.annotations.extend(words);
    }

    // Types, constants and global variables.

    pub fn ty_void(&mut self, id: u32) -> u32 {
        let words = InstructionBuilder::new(Op::TypeVoid).push(id).build();
        self.globals.extend(words);
        self.track(id)
    }
    pub fn ty_fn(&mut self, id: u32, ret: u32) -> u32 {
        let words = InstructionBuilder::new(Op::TypeFunction)
            .push(id)
            .push(ret)
            .build();
        self.globals.extend(words);
        self.track(id)
    }
    pub fn ty_bool(&mut self, id: u32) -> u32 {
        let words = InstructionBuilder::new(Op::TypeBool).push(id).build();
        self.globals.extend(words);
        self.track(id)
    }
    pub fn ty_int(&mut self, id: u32, width: u32, signed: u32) -> u32 {
        let words = InstructionBuilder::new(Op::TypeInt)
            .push(id)
            .push(width)
            .push(signed)
            .build();
        self.globals.extend(words);
        self.track(id)
    }
    pub fn ty_float(&mut self, id: u32, width: u32) -> u32 {
        let words = InstructionBuilder::new(Op::TypeFloat)
            .push(id)
            .push(width)
            .build();
        self.globals.extend(words);
        self.track(id)
    }
    pub fn ty_vector(&mut self, id: u32, component: u32, count: u32) -> u32 {
        let words = InstructionBuilder::new(Op::TypeVector)
            .push(id)
            .push(component)
            .push(count)
            .build();
        self.globals.extend(words);
        self.track(id)
    }
    pub fn ty_matrix(&mut self, id: u32, column: u32, count: u32) -> u32 {
        let words = InstructionBuilder::new(Op::TypeMatrix)
            .push(id)
            .push(column)
            .push(count)
            .build();
        self.globals.extend(words);
        self.track(id)
    }
    pub fn ty_image(
        &mut self,
        id: u32,
        sampled_ty: u32,
        dim: u32,
        sampled: u32,
        format: u32,
    ) -> u32 {
        let words = InstructionBuilder::new(Op::TypeImage)
            .push(id)
            .push(sampled_ty)
            .push(dim)
            .push(0)
            .push(0)
            .push(0)
            .push(sampled)
            .push(format)
            .build();
        self.globals.extend(words);
        self.track(id)
    }
    pub fn ty_sampler(&mut self, id: u32) -> u32 {
        let words = InstructionBuilder::new(Op::TypeSampler).push(id).build();
        self.globals.extend(words);
        self.track(id)
    }
    pub fn ty_sampled_image(&mut self, id: u32, image: u32) -> u32 {
        let words = InstructionBuilder::new(Op::TypeSampledImage)
            .push(id)
            .push(image)
            .build();
        self.globals.extend(words);
        self.track(id)
    }
    pub fn ty_array(&mut self, id: u32, element: u32, len_const: u32) -> u32 {
        let words = InstructionBuilder::new(Op::TypeArray)
            .push(id)
            .push(element)
            .push(len_const)
            .build();
        self.globals.extend(words);
        self.track(id)
    }
    pub fn ty_runtime_array(&mut self, id: u32, element: u32) -> u32 {
        let words = InstructionBuilder::new(Op::TypeRuntimeArray)
            .push(id)
            .push(element)
            .build();
        self.globals.extend(words);
        self.track(id)
    }
    pub fn ty_struct(&mut self, id: u32, members: &[u32]) -> u32 {
        let words = InstructionBuilder::new(Op::TypeStruct)
            .push(id)
            .push_list(members)
            .build();
        self.globals.extend(words);
        self.track(id)
    }
    pub fn ty_pointer(&mut self, id: u32, storage: u32, pointee: u32) -> u32 {
        let words = InstructionBuilder::new(Op::TypePointer)
            .push(id)
            .push(storage)
            .push(pointee)
            .build();
        self.globals.extend(words);
        self.track(id)
    }

    pub fn constant(&mut self, ty: u32, id: u32, value: &[u32]) -> u32 {
        let words = InstructionBuilder::new(Op::Constant)
            .push(ty)
            .push(id)
            .push_list(value)
            .build();
        self.globals.extend(words);
        self.track(id)
    }
    pub fn spec_constant(&mut self, ty: u32, id: u32, value: &[u32]) -> u32 {
        let words = InstructionBuilder::new(Op::SpecConstant)
            .push(ty)
            .push(id)
            .push_list(value)
            .build();
        self.globals.extend(words);
        self.track(id)
    }
    pub fn spec_constant_bool(&mut self, ty: u32, id: u32, value: bool) -> u32 {
        let op = if value {
            Op::SpecConstantTrue
        } else {
            Op::SpecConstantFalse
        };
        let words = InstructionBuilder::new(op).push(ty).push(id).build();
        self.globals.extend(words);
        self.track(id)
    }
    pub fn constant_composite(&mut self, ty: u32, id: u32, parts: &[u32]) -> u32 {
        let words = InstructionBuilder::new(Op::ConstantComposite)
            .push(ty)
            .push(id)
            .push_list(parts)
            .build();
        self.globals.extend(words);
        self.track(id)
    }
    pub fn spec_constant_composite(&mut self, ty: u32, id: u32, parts: &[u32]) -> u32 {
        let words = InstructionBuilder::new(Op::SpecConstantComposite)
            .push(ty)
            .push(id)
            .push_list(parts)
            .build();
        self.globals.extend(words);
        self.track(id)
    }
    pub fn spec_constant_op(&mut self, ty: u32, id: u32, opcode: u32, operands: &[u32]) -> u32 {
        let words = InstructionBuilder::new(Op::SpecConstantOp)
            .push(ty)
            .push(id)
            .push(opcode)
            .push_list(operands)
            .build();
        self.globals.extend(words);
        self.track(id)
    }

    pub fn variable(&mut self, ptr_ty: u32, id: u32, storage: u32) -> u32 {
        let words = InstructionBuilder::new(Op::Variable)
            .push(ptr_ty)
            .push(id)
            .push(storage)
            .build();
        self.globals.extend(words);
        self.track(id)
    }

    // Function bodies.

    pub fn func_begin(&mut self, ret_ty: u32, id: u32, fn_ty: u32, label: u32) -> u32 {
        let words = InstructionBuilder::new(Op::Function)
            .push(ret_ty)
            .push(id)
            .push(0)
            .push(fn_ty)
            .build();
        self.functions.extend(words);
        let words = InstructionBuilder::new(Op::Label).push(label).build();
        self.functions.extend(words);
        self.track(label);
        self.track(id)
    }
    pub fn func_end(&mut self) {
        self.functions
            .extend(InstructionBuilder::new(Op::Return).build());
        self.functions
            .extend(InstructionBuilder::new(Op::FunctionEnd).build());
    }
    pub fn call(&mut self, ret_ty: u32, id: u32, callee: u32) -> u32 {
        let words = InstructionBuilder::new(Op::FunctionCall)
            .push(ret_ty)
            .push(id)
            .push(callee)
            .build();
        self.functions.extend(words);
        self.track(id)
    }
    pub fn access_chain(&mut self, ty: u32, id: u32, base: u32, indices: &[u32]) -> u32 {
        let words = InstructionBuilder::new(Op::AccessChain)
            .push(ty)
            .push(id)
            .push(base)
            .push_list(indices)
            .build();
        self.functions.extend(words);
        self.track(id)
    }
    pub fn load(&mut self, ty: u32, id: u32, ptr: u32) -> u32 {
        let words = InstructionBuilder::new(Op::Load)
            .push(ty)
            .push(id)
            .push(ptr)
            .build();
        self.functions.extend(words);
        self.track(id)
    }
    pub fn store(&mut self, ptr: u32, value: u32) {
        let words = InstructionBuilder::new(Op::Store)
            .push(ptr)
            .push(value)
            .build();
        self.functions.extend(words);
    }
}
