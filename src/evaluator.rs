//! Specialization constant evaluator.
//!
//! One node is materialized per constant-like instruction. Evaluation folds
//! `OpSpecConstantOp` expression trees with bit-exact integer and boolean
//! arithmetic, tracking an undefined bit per component. Rebinding a spec
//! constant invalidates every dependent node; re-evaluation then recomputes
//! only the invalidated part of the graph.
use nohash_hasher::{IntMap, IntSet};
use num_traits::FromPrimitive;
use ordered_float::OrderedFloat;
use spirv::Op;

use crate::constant::ConstantValue;
use crate::error::{Error, Result};
use crate::locator::SpecId;
use crate::ty::{ArrayLen, ScalarType, Type};

/// Lifecycle of an evaluator node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalState {
    /// Initialized, never evaluated.
    Pending,
    /// Evaluation in flight; observing this state again means the expression
    /// graph is cyclic.
    Working,
    /// Evaluated; the cached value is current.
    Done,
    /// A spec constant this node depends on was rebound; the cached value is
    /// stale.
    Updated,
    /// Evaluation failed.
    Failed,
    /// The node could not be initialized (unsupported opcode or malformed
    /// operands). Queries against it fail but the module stays usable.
    InitFailed,
}

/// One component of an evaluated value.
#[derive(Debug, Clone, PartialEq)]
pub struct Lane {
    pub value: ConstantValue,
    /// The concrete bit pattern of this component is unspecified: it came
    /// from a division by zero, an overshifted shift, an out-of-range
    /// shuffle, or an input that was itself undefined.
    pub undef: bool,
}
impl Lane {
    fn new(value: ConstantValue) -> Self {
        Lane {
            value,
            undef: false,
        }
    }
    fn undef_of(scalar_ty: &ScalarType) -> Result<Self> {
        Ok(Lane {
            value: zero_of(scalar_ty)?,
            undef: true,
        })
    }
}

/// An evaluated constant: a scalar, a vector of up to four lanes, or a
/// nested composite.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalValue {
    Scalar(Lane),
    Vector(Vec<Lane>),
    Composite(Vec<EvalValue>),
}
impl EvalValue {
    pub fn as_scalar(&self) -> Option<&Lane> {
        match self {
            EvalValue::Scalar(x) => Some(x),
            _ => None,
        }
    }
    pub fn lanes(&self) -> Option<&[Lane]> {
        match self {
            EvalValue::Vector(x) => Some(x),
            _ => None,
        }
    }
    /// Whether any component is undefined.
    pub fn any_undef(&self) -> bool {
        match self {
            EvalValue::Scalar(x) => x.undef,
            EvalValue::Vector(x) => x.iter().any(|x| x.undef),
            EvalValue::Composite(x) => x.iter().any(|x| x.any_undef()),
        }
    }
}

fn zero_of(scalar_ty: &ScalarType) -> Result<ConstantValue> {
    let out = match scalar_ty {
        ScalarType::Boolean => ConstantValue::Bool(false),
        ScalarType::Integer {
            bits: 32,
            is_signed: true,
        } => ConstantValue::S32(0),
        ScalarType::Integer {
            bits: 32,
            is_signed: false,
        } => ConstantValue::U32(0),
        ScalarType::Integer {
            bits: 64,
            is_signed: true,
        } => ConstantValue::S64(0),
        ScalarType::Integer {
            bits: 64,
            is_signed: false,
        } => ConstantValue::U64(0),
        ScalarType::Float { bits: 32 } => ConstantValue::F32(OrderedFloat(0.0)),
        ScalarType::Float { bits: 64 } => ConstantValue::F64(OrderedFloat(0.0)),
        _ => return Err(Error::ParseFailed("scalar width is not supported")),
    };
    Ok(out)
}

fn typed_value_of(ty: &Type, undef: bool) -> Result<EvalValue> {
    let out = match ty {
        Type::Scalar(scalar_ty) => EvalValue::Scalar(Lane {
            value: zero_of(scalar_ty)?,
            undef,
        }),
        Type::Vector(vector_ty) => {
            let lane = Lane {
                value: zero_of(&vector_ty.scalar_ty)?,
                undef,
            };
            EvalValue::Vector(vec![lane; vector_ty.scalar_count as usize])
        }
        Type::Array(arr_ty) => {
            let n = match arr_ty.len {
                ArrayLen::Literal(n) => n,
                _ => return Err(Error::ParseFailed("array constant length is not literal")),
            };
            let element = typed_value_of(&arr_ty.element_ty, undef)?;
            EvalValue::Composite(vec![element; n as usize])
        }
        Type::Struct(struct_ty) => {
            let mut members = Vec::with_capacity(struct_ty.members.len());
            for member in struct_ty.members.iter() {
                members.push(typed_value_of(&member.ty, undef)?);
            }
            EvalValue::Composite(members)
        }
        _ => return Err(Error::ParseFailed("type has no constant representation")),
    };
    Ok(out)
}

/// Expression kind of an evaluator node.
#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeOp {
    /// Scalar literal; spec constants consult the user override first.
    Literal,
    /// `OpConstantComposite` / `OpSpecConstantComposite`.
    Composite,
    /// `OpConstantNull`.
    Null,
    /// `OpUndef`.
    Undef,
    /// `OpSpecConstantOp` with the given sub-opcode.
    SpecOp(u32),
    /// Recognized but not evaluable (e.g. `OpConstantSampler`).
    Unsupported(u32),
}

#[derive(Debug, Clone)]
struct EvalNode {
    result_id: u32,
    ty: Type,
    op: NodeOp,
    spec_id: Option<SpecId>,
    state: EvalState,
    /// Id operands, resolved through the node map at evaluation time.
    operands: Vec<u32>,
    /// Inline literal operands (shuffle indices, composite paths).
    literals: Vec<u32>,
    /// Decoded default value of a literal node.
    default_value: Option<EvalValue>,
    /// Value bound through `set_spec_constant`, overriding the default.
    user_value: Option<EvalValue>,
    value: Option<EvalValue>,
}

/// Entry of the packed specialization data region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecializationMapEntry {
    pub constant_id: SpecId,
    /// Byte offset into the packed data region.
    pub offset: u32,
    /// Byte width of the packed value; booleans take four bytes.
    pub size: u32,
}

/// Constant expression graph of a module.
#[derive(Default, Clone)]
pub struct Evaluator {
    nodes: IntMap<u32, EvalNode>,
    /// Node ids in module order.
    order: Vec<u32>,
    spec_ids: IntMap<SpecId, u32>,
}
impl Evaluator {
    fn add_node(&mut self, node: EvalNode) -> Result<()> {
        use std::collections::hash_map::Entry;
        let id = node.result_id;
        if let Some(spec_id) = node.spec_id {
            self.spec_ids.insert(spec_id, id);
        }
        match self.nodes.entry(id) {
            Entry::Vacant(entry) => {
                entry.insert(node);
                self.order.push(id);
                Ok(())
            }
            Entry::Occupied(_) => Err(Error::DuplicateId(id)),
        }
    }

    pub(crate) fn add_literal(
        &mut self,
        id: u32,
        ty: Type,
        value: ConstantValue,
        spec_id: Option<SpecId>,
    ) -> Result<()> {
        let value = EvalValue::Scalar(Lane::new(value));
        self.add_node(EvalNode {
            result_id: id,
            ty,
            op: NodeOp::Literal,
            spec_id,
            state: EvalState::Done,
            operands: Vec::new(),
            literals: Vec::new(),
            default_value: Some(value.clone()),
            user_value: None,
            value: Some(value),
        })
    }

    pub(crate) fn add_composite(&mut self, id: u32, ty: Type, constituents: &[u32]) -> Result<()> {
        self.add_node(EvalNode {
            result_id: id,
            ty,
            op: NodeOp::Composite,
            spec_id: None,
            state: EvalState::Pending,
            operands: constituents.to_vec(),
            literals: Vec::new(),
            default_value: None,
            user_value: None,
            value: None,
        })
    }

    pub(crate) fn add_null(&mut self, id: u32, ty: Type) -> Result<()> {
        self.add_node(EvalNode {
            result_id: id,
            ty,
            op: NodeOp::Null,
            spec_id: None,
            state: EvalState::Pending,
            operands: Vec::new(),
            literals: Vec::new(),
            default_value: None,
            user_value: None,
            value: None,
        })
    }

    pub(crate) fn add_undef(&mut self, id: u32, ty: Type) -> Result<()> {
        self.add_node(EvalNode {
            result_id: id,
            ty,
            op: NodeOp::Undef,
            spec_id: None,
            state: EvalState::Pending,
            operands: Vec::new(),
            literals: Vec::new(),
            default_value: None,
            user_value: None,
            value: None,
        })
    }

    pub(crate) fn add_unsupported(&mut self, id: u32, ty: Type, opcode: u32) -> Result<()> {
        self.add_node(EvalNode {
            result_id: id,
            ty,
            op: NodeOp::Unsupported(opcode),
            spec_id: None,
            state: EvalState::InitFailed,
            operands: Vec::new(),
            literals: Vec::new(),
            default_value: None,
            user_value: None,
            value: None,
        })
    }

    pub(crate) fn add_spec_op(
        &mut self,
        id: u32,
        ty: Type,
        sub_op: u32,
        operands: &[u32],
    ) -> Result<()> {
        // Split id operands from trailing literal operands per sub-opcode.
        let (nid, supported) = match Op::from_u32(sub_op) {
            Some(Op::VectorShuffle) => (2, true),
            Some(Op::CompositeExtract) => (1, true),
            Some(Op::CompositeInsert) => (2, true),
            Some(op) => (operands.len(), is_scalar_spec_op(op)),
            None => (0, false),
        };
        if !supported || operands.len() < nid {
            return self.add_node(EvalNode {
                result_id: id,
                ty,
                op: NodeOp::SpecOp(sub_op),
                spec_id: None,
                state: EvalState::InitFailed,
                operands: Vec::new(),
                literals: Vec::new(),
                default_value: None,
                user_value: None,
                value: None,
            });
        }
        self.add_node(EvalNode {
            result_id: id,
            ty,
            op: NodeOp::SpecOp(sub_op),
            spec_id: None,
            state: EvalState::Pending,
            operands: operands[..nid].to_vec(),
            literals: operands[nid..].to_vec(),
            default_value: None,
            user_value: None,
            value: None,
        })
    }

    /// Whether the evaluator holds a node for `result_id`.
    pub fn contains(&self, result_id: u32) -> bool {
        self.nodes.contains_key(&result_id)
    }

    /// Evaluate the constant expression rooted at `result_id`, memoizing
    /// intermediate results.
    pub fn evaluate(&mut self, result_id: u32) -> Result<EvalValue> {
        let (op, ty, operands, literals) = {
            let node = self
                .nodes
                .get(&result_id)
                .ok_or(Error::InvalidIdReference(result_id))?;
            match node.state {
                EvalState::Done => return Ok(node.value.clone().unwrap()),
                EvalState::Working => return Err(Error::Recursion(result_id)),
                EvalState::Failed => return Err(Error::UnresolvedEvaluation(result_id)),
                EvalState::InitFailed => return Err(Error::EvalTreeInitFailed(result_id)),
                EvalState::Pending | EvalState::Updated => {}
            }
            (
                node.op.clone(),
                node.ty.clone(),
                node.operands.clone(),
                node.literals.clone(),
            )
        };
        self.set_state(result_id, EvalState::Working);
        match self.compute(result_id, &op, &ty, &operands, &literals) {
            Ok(value) => {
                let node = self.nodes.get_mut(&result_id).unwrap();
                node.value = Some(value.clone());
                node.state = EvalState::Done;
                Ok(value)
            }
            Err(e) => {
                self.set_state(result_id, EvalState::Failed);
                Err(e)
            }
        }
    }

    fn set_state(&mut self, id: u32, state: EvalState) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.state = state;
        }
    }

    fn compute(
        &mut self,
        result_id: u32,
        op: &NodeOp,
        ty: &Type,
        operands: &[u32],
        literals: &[u32],
    ) -> Result<EvalValue> {
        match op {
            NodeOp::Literal => {
                let node = self.nodes.get(&result_id).unwrap();
                node.user_value
                    .clone()
                    .or_else(|| node.default_value.clone())
                    .ok_or(Error::UnresolvedEvaluation(result_id))
            }
            NodeOp::Null => typed_value_of(ty, false),
            NodeOp::Undef => typed_value_of(ty, true),
            NodeOp::Composite => {
                let values = self.evaluate_all(operands)?;
                match ty {
                    Type::Vector(_) => {
                        let mut lanes = Vec::with_capacity(values.len());
                        for value in values {
                            let lane = value
                                .as_scalar()
                                .ok_or(Error::InvalidType(result_id, "non-scalar lane"))?;
                            lanes.push(lane.clone());
                        }
                        Ok(EvalValue::Vector(lanes))
                    }
                    _ => Ok(EvalValue::Composite(values)),
                }
            }
            NodeOp::SpecOp(sub_op) => {
                let sub_op = Op::from_u32(*sub_op)
                    .ok_or(Error::UnresolvedEvaluation(result_id))?;
                if sub_op == Op::Undef {
                    return typed_value_of(ty, true);
                }
                let values = self.evaluate_all(operands)?;
                apply_spec_op(result_id, sub_op, ty, &values, literals)
            }
            NodeOp::Unsupported(_) => Err(Error::UnresolvedEvaluation(result_id)),
        }
    }

    fn evaluate_all(&mut self, ids: &[u32]) -> Result<Vec<EvalValue>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            out.push(self.evaluate(*id)?);
        }
        Ok(out)
    }

    /// Bind a value to the spec constant with the given `SpecId` and
    /// invalidate every dependent node.
    pub fn set_spec_constant(&mut self, spec_id: SpecId, value: ConstantValue) -> Result<()> {
        let id = *self.spec_ids.get(&spec_id).ok_or(Error::ElementNotFound)?;
        {
            let node = self.nodes.get_mut(&id).unwrap();
            let scalar_ty = match &node.ty {
                Type::Scalar(x) => x,
                _ => return Err(Error::InvalidType(id, "spec constant is not scalar")),
            };
            if !value.matches_scalar_ty(scalar_ty) {
                return Err(Error::InvalidType(id, "bound value mismatches the type"));
            }
            node.user_value = Some(EvalValue::Scalar(Lane::new(value)));
        }
        self.invalidate(id);
        Ok(())
    }

    /// Current (possibly rebound) value of a spec constant.
    pub fn get_spec_constant_value(&mut self, spec_id: SpecId) -> Result<ConstantValue> {
        let id = *self.spec_ids.get(&spec_id).ok_or(Error::ElementNotFound)?;
        match self.evaluate(id)? {
            EvalValue::Scalar(lane) => Ok(lane.value),
            _ => Err(Error::InvalidType(id, "spec constant is not scalar")),
        }
    }

    /// Whether the expression at `result_id` transitively depends on the
    /// spec constant with `spec_id`.
    pub fn is_related_to_spec_id(&self, result_id: u32, spec_id: SpecId) -> bool {
        let mut stack = vec![result_id];
        let mut visited = IntSet::default();
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            if let Some(node) = self.nodes.get(&id) {
                if node.spec_id == Some(spec_id) {
                    return true;
                }
                stack.extend_from_slice(&node.operands);
            }
        }
        false
    }

    /// Mark `id` and every node that transitively consumes it as stale.
    fn invalidate(&mut self, id: u32) {
        let mut dirty = IntSet::default();
        dirty.insert(id);
        loop {
            let mut grown = false;
            for (nid, node) in self.nodes.iter() {
                if !dirty.contains(nid) && node.operands.iter().any(|x| dirty.contains(x)) {
                    dirty.insert(*nid);
                    grown = true;
                }
            }
            if !grown {
                break;
            }
        }
        for nid in dirty {
            if let Some(node) = self.nodes.get_mut(&nid) {
                match node.state {
                    EvalState::Done | EvalState::Failed => {
                        node.state = EvalState::Updated;
                        node.value = None;
                    }
                    _ => {}
                }
            }
        }
    }

    /// Pack the current values of every specializable constant into a
    /// contiguous byte region, in module order. Booleans widen to four bytes
    /// per the Vulkan convention.
    pub fn specialization_info(&mut self) -> Result<(Vec<SpecializationMapEntry>, Vec<u8>)> {
        let ids: Vec<(SpecId, u32)> = self
            .order
            .iter()
            .filter_map(|id| {
                let node = self.nodes.get(id)?;
                node.spec_id.map(|spec_id| (spec_id, *id))
            })
            .collect();
        let mut entries = Vec::with_capacity(ids.len());
        let mut data = Vec::new();
        for (spec_id, id) in ids {
            let lane = match self.evaluate(id)? {
                EvalValue::Scalar(lane) => lane,
                _ => return Err(Error::InvalidType(id, "spec constant is not scalar")),
            };
            let bytes = lane.value.to_le_bytes();
            entries.push(SpecializationMapEntry {
                constant_id: spec_id,
                offset: data.len() as u32,
                size: bytes.len() as u32,
            });
            data.extend_from_slice(&bytes);
        }
        Ok((entries, data))
    }
}

fn is_scalar_spec_op(op: Op) -> bool {
    match op {
        Op::Undef
        | Op::SConvert
        | Op::UConvert
        | Op::FConvert
        | Op::SNegate
        | Op::Not
        | Op::IAdd
        | Op::ISub
        | Op::IMul
        | Op::UDiv
        | Op::SDiv
        | Op::UMod
        | Op::SRem
        | Op::SMod
        | Op::ShiftRightLogical
        | Op::ShiftRightArithmetic
        | Op::ShiftLeftLogical
        | Op::BitwiseOr
        | Op::BitwiseXor
        | Op::BitwiseAnd
        | Op::LogicalOr
        | Op::LogicalAnd
        | Op::LogicalNot
        | Op::LogicalEqual
        | Op::LogicalNotEqual
        | Op::Select
        | Op::IEqual
        | Op::INotEqual
        | Op::ULessThan
        | Op::SLessThan
        | Op::UGreaterThan
        | Op::SGreaterThan
        | Op::ULessThanEqual
        | Op::SLessThanEqual
        | Op::UGreaterThanEqual
        | Op::SGreaterThanEqual => true,
        _ => false,
    }
}

fn mask(width: u32) -> u64 {
    if width >= 64 {
        !0
    } else {
        (1u64 << width) - 1
    }
}

/// Raw bits and width of an integer lane.
fn int_bits(value: &ConstantValue) -> Result<(u64, u32)> {
    let out = match value {
        ConstantValue::Bool(x) => (*x as u64, 1),
        ConstantValue::S32(x) => (u32::from_ne_bytes(x.to_ne_bytes()) as u64, 32),
        ConstantValue::U32(x) => (*x as u64, 32),
        ConstantValue::S64(x) => (u64::from_ne_bytes(x.to_ne_bytes()), 64),
        ConstantValue::U64(x) => (*x, 64),
        _ => return Err(Error::ParseFailed("operand is not an integer")),
    };
    Ok(out)
}
/// Sign-extended value and width of an integer lane.
fn int_signed(value: &ConstantValue) -> Result<(i64, u32)> {
    let out = match value {
        ConstantValue::S32(x) => (*x as i64, 32),
        ConstantValue::U32(x) => (*x as i32 as i64, 32),
        ConstantValue::S64(x) => (*x, 64),
        ConstantValue::U64(x) => (i64::from_ne_bytes(x.to_ne_bytes()), 64),
        _ => return Err(Error::ParseFailed("operand is not an integer")),
    };
    Ok(out)
}
/// Reinterpret masked bits as a value of the result scalar type.
fn make_int(scalar_ty: &ScalarType, bits: u64) -> Result<ConstantValue> {
    let out = match scalar_ty {
        ScalarType::Integer {
            bits: 32,
            is_signed: true,
        } => ConstantValue::S32((bits & mask(32)) as u32 as i32),
        ScalarType::Integer {
            bits: 32,
            is_signed: false,
        } => ConstantValue::U32((bits & mask(32)) as u32),
        ScalarType::Integer {
            bits: 64,
            is_signed: true,
        } => ConstantValue::S64(i64::from_ne_bytes(bits.to_ne_bytes())),
        ScalarType::Integer {
            bits: 64,
            is_signed: false,
        } => ConstantValue::U64(bits),
        _ => return Err(Error::ParseFailed("result type is not an integer")),
    };
    Ok(out)
}

fn result_scalar_ty(result_id: u32, ty: &Type) -> Result<(ScalarType, usize)> {
    match ty {
        Type::Scalar(x) => Ok((x.clone(), 1)),
        Type::Vector(x) if x.scalar_count as usize <= crate::consts::MAX_VECTOR_DIMS => {
            Ok((x.scalar_ty.clone(), x.scalar_count as usize))
        }
        Type::Vector(_) => Err(Error::RangeExceeded("vector component count")),
        _ => Err(Error::InvalidType(result_id, "expected scalar or vector")),
    }
}

fn lanes_of(result_id: u32, value: &EvalValue, count: usize) -> Result<Vec<Lane>> {
    match value {
        EvalValue::Scalar(lane) if count == 1 => Ok(vec![lane.clone()]),
        EvalValue::Vector(lanes) if lanes.len() == count => Ok(lanes.clone()),
        _ => Err(Error::InvalidType(result_id, "operand shape mismatch")),
    }
}

fn pack_lanes(lanes: Vec<Lane>) -> EvalValue {
    if lanes.len() == 1 {
        EvalValue::Scalar(lanes.into_iter().next().unwrap())
    } else {
        EvalValue::Vector(lanes)
    }
}

fn apply_spec_op(
    result_id: u32,
    op: Op,
    result_ty: &Type,
    values: &[EvalValue],
    literals: &[u32],
) -> Result<EvalValue> {
    match op {
        Op::VectorShuffle => {
            let (scalar_ty, _) = result_scalar_ty(result_id, result_ty)?;
            let a = values
                .get(0)
                .and_then(EvalValue::lanes)
                .ok_or(Error::InvalidType(result_id, "expected vector operand"))?;
            let b = values
                .get(1)
                .and_then(EvalValue::lanes)
                .ok_or(Error::InvalidType(result_id, "expected vector operand"))?;
            let mut lanes = Vec::with_capacity(literals.len());
            for &idx in literals {
                let lane = if idx == !0 {
                    Lane::undef_of(&scalar_ty)?
                } else if (idx as usize) < a.len() {
                    a[idx as usize].clone()
                } else if (idx as usize) < a.len() + b.len() {
                    b[idx as usize - a.len()].clone()
                } else {
                    return Err(Error::RangeExceeded("vector shuffle index"));
                };
                lanes.push(lane);
            }
            Ok(pack_lanes(lanes))
        }
        Op::CompositeExtract => {
            let base = values
                .first()
                .ok_or(Error::InvalidType(result_id, "missing composite operand"))?;
            extract_path(result_id, base, literals)
        }
        Op::CompositeInsert => {
            let object = values
                .get(0)
                .ok_or(Error::InvalidType(result_id, "missing object operand"))?;
            let base = values
                .get(1)
                .ok_or(Error::InvalidType(result_id, "missing composite operand"))?;
            let mut out = base.clone();
            insert_path(result_id, &mut out, object, literals)?;
            Ok(out)
        }
        Op::Select => {
            let cond = values
                .get(0)
                .ok_or(Error::InvalidType(result_id, "missing condition"))?;
            let obj1 = values
                .get(1)
                .ok_or(Error::InvalidType(result_id, "missing operand"))?;
            let obj2 = values
                .get(2)
                .ok_or(Error::InvalidType(result_id, "missing operand"))?;
            match cond {
                EvalValue::Scalar(lane) => {
                    if lane.undef {
                        return typed_value_of(result_ty, true);
                    }
                    match lane.value.to_bool() {
                        Some(true) => Ok(obj1.clone()),
                        Some(false) => Ok(obj2.clone()),
                        None => Err(Error::InvalidType(result_id, "condition is not boolean")),
                    }
                }
                EvalValue::Vector(cond_lanes) => {
                    let (scalar_ty, count) = result_scalar_ty(result_id, result_ty)?;
                    let a = lanes_of(result_id, obj1, count)?;
                    let b = lanes_of(result_id, obj2, count)?;
                    if cond_lanes.len() != count {
                        return Err(Error::InvalidType(result_id, "condition shape mismatch"));
                    }
                    let mut lanes = Vec::with_capacity(count);
                    for i in 0..count {
                        let lane = if cond_lanes[i].undef {
                            Lane::undef_of(&scalar_ty)?
                        } else {
                            match cond_lanes[i].value.to_bool() {
                                Some(true) => a[i].clone(),
                                Some(false) => b[i].clone(),
                                None => {
                                    return Err(Error::InvalidType(
                                        result_id,
                                        "condition is not boolean",
                                    ))
                                }
                            }
                        };
                        lanes.push(lane);
                    }
                    Ok(pack_lanes(lanes))
                }
                _ => Err(Error::InvalidType(result_id, "bad select condition")),
            }
        }
        _ if values.len() == 1 => {
            componentwise(result_id, result_ty, values, |scalar_ty, lanes| {
                apply_unary(op, scalar_ty, lanes[0])
            })
        }
        _ if values.len() == 2 => {
            componentwise(result_id, result_ty, values, |scalar_ty, lanes| {
                apply_binary(op, scalar_ty, lanes[0], lanes[1])
            })
        }
        _ => Err(Error::UnresolvedEvaluation(result_id)),
    }
}

/// Apply a scalar op lane by lane over same-shaped operands, propagating the
/// undefined bit: any undefined input makes the output lane undefined.
fn componentwise<F>(
    result_id: u32,
    result_ty: &Type,
    values: &[EvalValue],
    f: F,
) -> Result<EvalValue>
where
    F: Fn(&ScalarType, &[&Lane]) -> Result<Option<ConstantValue>>,
{
    let (scalar_ty, count) = result_scalar_ty(result_id, result_ty)?;
    let operands = values
        .iter()
        .map(|x| lanes_of(result_id, x, count))
        .collect::<Result<Vec<_>>>()?;
    let mut lanes = Vec::with_capacity(count);
    for i in 0..count {
        let inputs: Vec<&Lane> = operands.iter().map(|x| &x[i]).collect();
        let lane = if inputs.iter().any(|x| x.undef) {
            Lane::undef_of(&scalar_ty)?
        } else {
            match f(&scalar_ty, &inputs)? {
                Some(value) => Lane::new(value),
                None => Lane::undef_of(&scalar_ty)?,
            }
        };
        lanes.push(lane);
    }
    Ok(pack_lanes(lanes))
}

/// Scalar unary op. `None` means the result lane is undefined.
fn apply_unary(op: Op, scalar_ty: &ScalarType, a: &Lane) -> Result<Option<ConstantValue>> {
    let out = match op {
        Op::SNegate => {
            let (x, _) = int_bits(&a.value)?;
            Some(make_int(scalar_ty, x.wrapping_neg())?)
        }
        Op::Not => {
            let (x, _) = int_bits(&a.value)?;
            Some(make_int(scalar_ty, !x)?)
        }
        Op::LogicalNot => {
            let x = a
                .value
                .to_bool()
                .ok_or(Error::ParseFailed("operand is not boolean"))?;
            Some(ConstantValue::Bool(!x))
        }
        Op::SConvert => {
            let (x, _) = int_signed(&a.value)?;
            Some(make_int(scalar_ty, u64::from_ne_bytes(x.to_ne_bytes()))?)
        }
        Op::UConvert => {
            let (x, width) = int_bits(&a.value)?;
            Some(make_int(scalar_ty, x & mask(width))?)
        }
        Op::FConvert => {
            let out = match (&a.value, scalar_ty) {
                (ConstantValue::F32(x), ScalarType::Float { bits: 64 }) => {
                    ConstantValue::F64(OrderedFloat(x.0 as f64))
                }
                (ConstantValue::F64(x), ScalarType::Float { bits: 32 }) => {
                    ConstantValue::F32(OrderedFloat(x.0 as f32))
                }
                (ConstantValue::F32(x), ScalarType::Float { bits: 32 }) => ConstantValue::F32(*x),
                (ConstantValue::F64(x), ScalarType::Float { bits: 64 }) => ConstantValue::F64(*x),
                _ => return Err(Error::ParseFailed("unsupported float conversion")),
            };
            Some(out)
        }
        _ => return Err(Error::ParseFailed("unsupported unary opcode")),
    };
    Ok(out)
}

/// Scalar binary op. `None` means the result lane is undefined.
fn apply_binary(
    op: Op,
    scalar_ty: &ScalarType,
    a: &Lane,
    b: &Lane,
) -> Result<Option<ConstantValue>> {
    let out = match op {
        Op::IAdd => {
            let (x, _) = int_bits(&a.value)?;
            let (y, _) = int_bits(&b.value)?;
            Some(make_int(scalar_ty, x.wrapping_add(y))?)
        }
        Op::ISub => {
            let (x, _) = int_bits(&a.value)?;
            let (y, _) = int_bits(&b.value)?;
            Some(make_int(scalar_ty, x.wrapping_sub(y))?)
        }
        Op::IMul => {
            let (x, _) = int_bits(&a.value)?;
            let (y, _) = int_bits(&b.value)?;
            Some(make_int(scalar_ty, x.wrapping_mul(y))?)
        }
        Op::UDiv => {
            let (x, width) = int_bits(&a.value)?;
            let (y, _) = int_bits(&b.value)?;
            let (x, y) = (x & mask(width), y & mask(width));
            match y {
                0 => None,
                _ => Some(make_int(scalar_ty, x / y)?),
            }
        }
        Op::SDiv => {
            let (x, width) = int_signed(&a.value)?;
            let (y, _) = int_signed(&b.value)?;
            let min = i64::MIN >> (64 - width);
            if y == 0 || (x == min && y == -1) {
                None
            } else {
                Some(make_int(scalar_ty, u64::from_ne_bytes((x / y).to_ne_bytes()))?)
            }
        }
        Op::UMod => {
            let (x, width) = int_bits(&a.value)?;
            let (y, _) = int_bits(&b.value)?;
            let (x, y) = (x & mask(width), y & mask(width));
            match y {
                0 => None,
                _ => Some(make_int(scalar_ty, x % y)?),
            }
        }
        Op::SRem => {
            let (x, _) = int_signed(&a.value)?;
            let (y, _) = int_signed(&b.value)?;
            match x.checked_rem(y) {
                Some(r) => Some(make_int(scalar_ty, u64::from_ne_bytes(r.to_ne_bytes()))?),
                None => None,
            }
        }
        Op::SMod => {
            let (x, _) = int_signed(&a.value)?;
            let (y, _) = int_signed(&b.value)?;
            match x.checked_rem(y) {
                Some(mut r) => {
                    // The result takes the sign of the divisor.
                    if r != 0 && (r < 0) != (y < 0) {
                        r += y;
                    }
                    Some(make_int(scalar_ty, u64::from_ne_bytes(r.to_ne_bytes()))?)
                }
                None => None,
            }
        }
        Op::ShiftRightLogical => {
            let (x, width) = int_bits(&a.value)?;
            let (shift, _) = int_bits(&b.value)?;
            if shift >= width as u64 {
                None
            } else {
                Some(make_int(scalar_ty, (x & mask(width)) >> shift)?)
            }
        }
        Op::ShiftRightArithmetic => {
            let (x, width) = int_signed(&a.value)?;
            let (shift, _) = int_bits(&b.value)?;
            if shift >= width as u64 {
                None
            } else {
                let shifted = x >> shift;
                Some(make_int(scalar_ty, u64::from_ne_bytes(shifted.to_ne_bytes()))?)
            }
        }
        Op::ShiftLeftLogical => {
            let (x, width) = int_bits(&a.value)?;
            let (shift, _) = int_bits(&b.value)?;
            if shift >= width as u64 {
                None
            } else {
                Some(make_int(scalar_ty, x << shift)?)
            }
        }
        Op::BitwiseOr => {
            let (x, _) = int_bits(&a.value)?;
            let (y, _) = int_bits(&b.value)?;
            Some(make_int(scalar_ty, x | y)?)
        }
        Op::BitwiseXor => {
            let (x, _) = int_bits(&a.value)?;
            let (y, _) = int_bits(&b.value)?;
            Some(make_int(scalar_ty, x ^ y)?)
        }
        Op::BitwiseAnd => {
            let (x, _) = int_bits(&a.value)?;
            let (y, _) = int_bits(&b.value)?;
            Some(make_int(scalar_ty, x & y)?)
        }
        Op::LogicalOr | Op::LogicalAnd | Op::LogicalEqual | Op::LogicalNotEqual => {
            let x = a
                .value
                .to_bool()
                .ok_or(Error::ParseFailed("operand is not boolean"))?;
            let y = b
                .value
                .to_bool()
                .ok_or(Error::ParseFailed("operand is not boolean"))?;
            let out = match op {
                Op::LogicalOr => x || y,
                Op::LogicalAnd => x && y,
                Op::LogicalEqual => x == y,
                _ => x != y,
            };
            Some(ConstantValue::Bool(out))
        }
        Op::IEqual | Op::INotEqual => {
            let (x, width) = int_bits(&a.value)?;
            let (y, _) = int_bits(&b.value)?;
            let eq = (x & mask(width)) == (y & mask(width));
            Some(ConstantValue::Bool(if op == Op::IEqual { eq } else { !eq }))
        }
        Op::ULessThan | Op::UGreaterThan | Op::ULessThanEqual | Op::UGreaterThanEqual => {
            let (x, width) = int_bits(&a.value)?;
            let (y, _) = int_bits(&b.value)?;
            let (x, y) = (x & mask(width), y & mask(width));
            let out = match op {
                Op::ULessThan => x < y,
                Op::UGreaterThan => x > y,
                Op::ULessThanEqual => x <= y,
                _ => x >= y,
            };
            Some(ConstantValue::Bool(out))
        }
        Op::SLessThan | Op::SGreaterThan | Op::SLessThanEqual | Op::SGreaterThanEqual => {
            let (x, _) = int_signed(&a.value)?;
            let (y, _) = int_signed(&b.value)?;
            let out = match op {
                Op::SLessThan => x < y,
                Op::SGreaterThan => x > y,
                Op::SLessThanEqual => x <= y,
                _ => x >= y,
            };
            Some(ConstantValue::Bool(out))
        }
        _ => return Err(Error::ParseFailed("unsupported binary opcode")),
    };
    Ok(out)
}

fn extract_path(result_id: u32, base: &EvalValue, path: &[u32]) -> Result<EvalValue> {
    let mut cur = base.clone();
    for &idx in path {
        cur = match cur {
            EvalValue::Vector(lanes) => {
                let lane = lanes
                    .get(idx as usize)
                    .cloned()
                    .ok_or(Error::RangeExceeded("composite extract index"))?;
                EvalValue::Scalar(lane)
            }
            EvalValue::Composite(members) => members
                .get(idx as usize)
                .cloned()
                .ok_or(Error::RangeExceeded("composite extract index"))?,
            EvalValue::Scalar(_) => {
                return Err(Error::InvalidType(result_id, "extract into a scalar"))
            }
        };
    }
    Ok(cur)
}

fn insert_path(
    result_id: u32,
    base: &mut EvalValue,
    object: &EvalValue,
    path: &[u32],
) -> Result<()> {
    match path.split_first() {
        None => {
            *base = object.clone();
            Ok(())
        }
        Some((&idx, rest)) => match base {
            EvalValue::Vector(lanes) => {
                if !rest.is_empty() {
                    return Err(Error::InvalidType(result_id, "insert through a vector lane"));
                }
                let lane = lanes
                    .get_mut(idx as usize)
                    .ok_or(Error::RangeExceeded("composite insert index"))?;
                match object {
                    EvalValue::Scalar(x) => {
                        *lane = x.clone();
                        Ok(())
                    }
                    _ => Err(Error::InvalidType(result_id, "insert non-scalar lane")),
                }
            }
            EvalValue::Composite(members) => {
                let member = members
                    .get_mut(idx as usize)
                    .ok_or(Error::RangeExceeded("composite insert index"))?;
                insert_path(result_id, member, object, rest)
            }
            EvalValue::Scalar(_) => Err(Error::InvalidType(result_id, "insert into a scalar")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_ty() -> Type {
        Type::Scalar(ScalarType::u32())
    }
    fn i32_ty() -> Type {
        Type::Scalar(ScalarType::i32())
    }

    fn eval_scalar(e: &mut Evaluator, id: u32) -> Lane {
        match e.evaluate(id).unwrap() {
            EvalValue::Scalar(lane) => lane,
            x => panic!("expected scalar, got {:?}", x),
        }
    }

    #[test]
    fn udiv_by_zero_is_undefined() {
        let mut e = Evaluator::default();
        e.add_literal(1, u32_ty(), ConstantValue::U32(9), None).unwrap();
        e.add_literal(2, u32_ty(), ConstantValue::U32(0), None).unwrap();
        e.add_spec_op(3, u32_ty(), Op::UDiv as u32, &[1, 2]).unwrap();
        assert!(eval_scalar(&mut e, 3).undef);
    }

    #[test]
    fn sdiv_min_by_minus_one_is_undefined() {
        let mut e = Evaluator::default();
        e.add_literal(1, i32_ty(), ConstantValue::S32(i32::MIN), None)
            .unwrap();
        e.add_literal(2, i32_ty(), ConstantValue::S32(-1), None).unwrap();
        e.add_spec_op(3, i32_ty(), Op::SDiv as u32, &[1, 2]).unwrap();
        assert!(eval_scalar(&mut e, 3).undef);
    }

    #[test]
    fn overshift_is_undefined_and_propagates() {
        let mut e = Evaluator::default();
        e.add_literal(1, u32_ty(), ConstantValue::U32(1), None).unwrap();
        e.add_literal(2, u32_ty(), ConstantValue::U32(32), None).unwrap();
        e.add_spec_op(3, u32_ty(), Op::ShiftLeftLogical as u32, &[1, 2])
            .unwrap();
        e.add_spec_op(4, u32_ty(), Op::IAdd as u32, &[3, 1]).unwrap();
        assert!(eval_scalar(&mut e, 3).undef);
        assert!(eval_scalar(&mut e, 4).undef);
    }

    #[test]
    fn smod_takes_divisor_sign() {
        let mut e = Evaluator::default();
        e.add_literal(1, i32_ty(), ConstantValue::S32(-7), None).unwrap();
        e.add_literal(2, i32_ty(), ConstantValue::S32(3), None).unwrap();
        e.add_spec_op(3, i32_ty(), Op::SMod as u32, &[1, 2]).unwrap();
        e.add_spec_op(4, i32_ty(), Op::SRem as u32, &[1, 2]).unwrap();
        assert_eq!(eval_scalar(&mut e, 3).value, ConstantValue::S32(2));
        assert_eq!(eval_scalar(&mut e, 4).value, ConstantValue::S32(-1));
    }

    #[test]
    fn rebind_recomputes_dependents() {
        let mut e = Evaluator::default();
        e.add_literal(1, u32_ty(), ConstantValue::U32(4), Some(7)).unwrap();
        e.add_literal(2, u32_ty(), ConstantValue::U32(10), None).unwrap();
        e.add_spec_op(3, u32_ty(), Op::IMul as u32, &[1, 2]).unwrap();
        assert_eq!(eval_scalar(&mut e, 3).value, ConstantValue::U32(40));
        e.set_spec_constant(7, ConstantValue::U32(5)).unwrap();
        assert_eq!(eval_scalar(&mut e, 3).value, ConstantValue::U32(50));
        assert_eq!(
            e.get_spec_constant_value(7).unwrap(),
            ConstantValue::U32(5)
        );
    }

    #[test]
    fn rebind_rejects_type_mismatch() {
        let mut e = Evaluator::default();
        e.add_literal(1, u32_ty(), ConstantValue::U32(4), Some(7)).unwrap();
        assert!(e.set_spec_constant(7, ConstantValue::Bool(true)).is_err());
        assert_eq!(
            e.set_spec_constant(9, ConstantValue::U32(1)),
            Err(Error::ElementNotFound)
        );
    }

    #[test]
    fn relation_tracking() {
        let mut e = Evaluator::default();
        e.add_literal(1, u32_ty(), ConstantValue::U32(4), Some(7)).unwrap();
        e.add_literal(2, u32_ty(), ConstantValue::U32(1), None).unwrap();
        e.add_spec_op(3, u32_ty(), Op::IAdd as u32, &[1, 2]).unwrap();
        assert!(e.is_related_to_spec_id(3, 7));
        assert!(!e.is_related_to_spec_id(2, 7));
    }
}
