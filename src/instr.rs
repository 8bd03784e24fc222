//! Typed operand records of the instructions reflection consumes.
use std::convert::TryFrom;

use crate::error::Error;
use crate::parse::Instr;

pub type InstrId = u32;
pub type FunctionId = InstrId;
pub type TypeId = InstrId;
pub type VariableId = InstrId;
pub type ConstantId = InstrId;

pub type MemberIdx = u32;

// Be aware that the order of the read methods is important.
macro_rules! define_ops {
    ($($opcode:ident { $($field:ident: $type:ty = $read_fn:ident(),)+ })+) => {
        $(
            pub struct $opcode<'a> {
                $( pub $field: $type, )*
                _ph: ::std::marker::PhantomData<&'a ()>,
            }
            impl<'a> TryFrom<Instr<'a>> for $opcode<'a> {
                type Error = Error;
                fn try_from(instr: Instr<'a>) -> Result<Self, Error> {
                    let mut operands = instr.operands();
                    let op = $opcode {
                        $( $field: operands.$read_fn()?, )+
                        _ph: ::std::marker::PhantomData,
                    };
                    Ok(op)
                }
            }
        )+
    };
}

define_ops! {
    OpString {
        string_id: InstrId = read_u32(),
        string: &'a str = read_str(),
    }
    OpName {
        target_id: InstrId = read_u32(),
        name: &'a str = read_str(),
    }
    OpMemberName {
        target_id: InstrId = read_u32(),
        member_idx: MemberIdx = read_u32(),
        name: &'a str = read_str(),
    }

    OpEntryPoint {
        exec_model: u32 = read_u32(),
        func_id: FunctionId = read_u32(),
        name: &'a str = read_str(),
        interface_ids: &'a [InstrId] = read_list(),
    }
    OpExecutionModeCommon {
        func_id: FunctionId = read_u32(),
        execution_mode: u32 = read_u32(),
        params: &'a [u32] = read_list(),
    }

    OpDecorate {
        target_id: InstrId = read_u32(),
        deco: u32 = read_u32(),
        params: &'a [u32] = read_list(),
    }
    OpMemberDecorate {
        target_id: InstrId = read_u32(),
        member_idx: MemberIdx = read_u32(),
        deco: u32 = read_u32(),
        params: &'a [u32] = read_list(),
    }

    OpTypeVoid {
        ty_id: TypeId = read_u32(),
    }
    OpTypeBool {
        ty_id: TypeId = read_u32(),
    }
    OpTypeInt {
        ty_id: TypeId = read_u32(),
        bits: u32 = read_u32(),
        is_signed: bool = read_bool(),
    }
    OpTypeFloat {
        ty_id: TypeId = read_u32(),
        bits: u32 = read_u32(),
    }
    OpTypeVector {
        ty_id: TypeId = read_u32(),
        scalar_ty_id: TypeId = read_u32(),
        nscalar: u32 = read_u32(),
    }
    OpTypeMatrix {
        ty_id: TypeId = read_u32(),
        vector_ty_id: TypeId = read_u32(),
        nvector: u32 = read_u32(),
    }
    OpTypeImage {
        ty_id: TypeId = read_u32(),
        scalar_ty_id: TypeId = read_u32(),
        dim: u32 = read_u32(),
        is_depth: u32 = read_u32(),
        is_array: u32 = read_u32(),
        is_multisampled: u32 = read_u32(),
        is_sampled: u32 = read_u32(),
        color_fmt: u32 = read_u32(),
    }
    OpTypeSampler {
        ty_id: TypeId = read_u32(),
    }
    OpTypeSampledImage {
        ty_id: TypeId = read_u32(),
        image_ty_id: TypeId = read_u32(),
    }
    OpTypeArray {
        ty_id: TypeId = read_u32(),
        element_ty_id: TypeId = read_u32(),
        nelement_const_id: ConstantId = read_u32(),
    }
    OpTypeRuntimeArray {
        ty_id: TypeId = read_u32(),
        element_ty_id: TypeId = read_u32(),
    }
    OpTypeStruct {
        ty_id: TypeId = read_u32(),
        member_ty_ids: &'a [TypeId] = read_list(),
    }
    OpTypePointer {
        ty_id: TypeId = read_u32(),
        store_cls: u32 = read_u32(),
        target_ty_id: TypeId = read_u32(),
    }
    OpTypeForwardPointer {
        ty_id: TypeId = read_u32(),
        store_cls: u32 = read_u32(),
    }
    OpTypeAccelerationStructureKHR {
        ty_id: TypeId = read_u32(),
    }

    OpConstantCommon {
        ty_id: TypeId = read_u32(),
        const_id: ConstantId = read_u32(),
        value: &'a [u32] = read_list(),
    }
    OpSpecConstantOpHead {
        ty_id: TypeId = read_u32(),
        spec_const_id: ConstantId = read_u32(),
        opcode: u32 = read_u32(),
        operands: &'a [u32] = read_list(),
    }
    OpUndef {
        ty_id: TypeId = read_u32(),
        result_id: InstrId = read_u32(),
    }

    OpVariable {
        ty_id: TypeId = read_u32(),
        var_id: VariableId = read_u32(),
        store_cls: u32 = read_u32(),
    }

    OpFunction {
        return_ty_id: TypeId = read_u32(),
        func_id: FunctionId = read_u32(),
    }
    OpFunctionCall {
        return_ty_id: TypeId = read_u32(),
        return_id: InstrId = read_u32(),
        func_id: FunctionId = read_u32(),
    }
    OpLoad {
        return_ty_id: TypeId = read_u32(),
        return_id: InstrId = read_u32(),
        ptr_id: VariableId = read_u32(),
    }
    OpStore {
        ptr_id: VariableId = read_u32(),
    }
    OpAccessChain {
        ty_id: TypeId = read_u32(),
        result_id: VariableId = read_u32(),
        base_id: VariableId = read_u32(),
        index_ids: &'a [InstrId] = read_list(),
    }
    OpPtrAccessChain {
        ty_id: TypeId = read_u32(),
        result_id: VariableId = read_u32(),
        base_id: VariableId = read_u32(),
        element_id: InstrId = read_u32(),
        index_ids: &'a [InstrId] = read_list(),
    }
    OpArrayLength {
        return_ty_id: TypeId = read_u32(),
        return_id: InstrId = read_u32(),
        struct_ptr_id: VariableId = read_u32(),
    }
    OpImageTexelPointer {
        return_ty_id: TypeId = read_u32(),
        return_id: InstrId = read_u32(),
        image_ptr_id: VariableId = read_u32(),
    }
    OpGenericPtrMemSemantics {
        return_ty_id: TypeId = read_u32(),
        return_id: InstrId = read_u32(),
        ptr_id: VariableId = read_u32(),
    }
    OpCopyMemory {
        target_id: VariableId = read_u32(),
        source_id: VariableId = read_u32(),
    }
}
