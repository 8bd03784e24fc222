//! Constant and specialization constant values.
use ordered_float::OrderedFloat;

use crate::error::{Error, Result};
use crate::locator::SpecId;
use crate::ty::{ScalarType, Type};

/// Typed scalar constant value.
#[non_exhaustive]
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub enum ConstantValue {
    Bool(bool),
    S32(i32),
    U32(u32),
    S64(i64),
    U64(u64),
    F32(OrderedFloat<f32>),
    F64(OrderedFloat<f64>),
}
impl From<bool> for ConstantValue {
    fn from(x: bool) -> Self {
        Self::Bool(x)
    }
}
impl From<u32> for ConstantValue {
    fn from(x: u32) -> Self {
        Self::U32(x)
    }
}
impl From<i32> for ConstantValue {
    fn from(x: i32) -> Self {
        Self::S32(x)
    }
}
impl From<u64> for ConstantValue {
    fn from(x: u64) -> Self {
        Self::U64(x)
    }
}
impl From<i64> for ConstantValue {
    fn from(x: i64) -> Self {
        Self::S64(x)
    }
}
impl From<f32> for ConstantValue {
    fn from(x: f32) -> Self {
        Self::F32(OrderedFloat(x))
    }
}
impl From<f64> for ConstantValue {
    fn from(x: f64) -> Self {
        Self::F64(OrderedFloat(x))
    }
}
impl ConstantValue {
    /// Decode literal words into a typed value. 32-bit scalars take a single
    /// word; 64-bit scalars are encoded low word first.
    pub fn try_from_words(words: &[u32], ty: &Type) -> Result<Self> {
        let scalar_ty = match ty {
            Type::Scalar(x) => x,
            _ => return Err(Error::ParseFailed("constant type is not scalar")),
        };
        let value = match (scalar_ty, words) {
            (ScalarType::Integer { bits: 32, is_signed: true }, [x]) => {
                Self::S32(i32::from_ne_bytes(x.to_ne_bytes()))
            }
            (ScalarType::Integer { bits: 32, is_signed: false }, [x]) => Self::U32(*x),
            (ScalarType::Integer { bits: 64, is_signed: true }, [lo, hi]) => {
                Self::S64(((*lo as u64) | ((*hi as u64) << 32)) as i64)
            }
            (ScalarType::Integer { bits: 64, is_signed: false }, [lo, hi]) => {
                Self::U64((*lo as u64) | ((*hi as u64) << 32))
            }
            (ScalarType::Float { bits: 32 }, [x]) => {
                Self::F32(OrderedFloat(f32::from_bits(*x)))
            }
            (ScalarType::Float { bits: 64 }, [lo, hi]) => Self::F64(OrderedFloat(
                f64::from_bits((*lo as u64) | ((*hi as u64) << 32)),
            )),
            _ => return Err(Error::ParseFailed("unsupported constant encoding")),
        };
        Ok(value)
    }

    pub fn to_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(x) => Some(*x),
            _ => None,
        }
    }
    pub fn to_s32(&self) -> Option<i32> {
        match self {
            Self::S32(x) => Some(*x),
            _ => None,
        }
    }
    pub fn to_u32(&self) -> Option<u32> {
        match self {
            Self::U32(x) => Some(*x),
            _ => None,
        }
    }

    /// Positive length of a fixed-size array, if this value can express one.
    pub(crate) fn to_array_len(&self) -> Option<u32> {
        match self {
            Self::S32(x) if *x > 0 => Some(*x as u32),
            Self::U32(x) if *x > 0 => Some(*x),
            _ => None,
        }
    }

    /// Little-endian bytes of the value; booleans widen to a full word per
    /// the Vulkan specialization convention.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            Self::Bool(x) => (*x as u32).to_le_bytes().to_vec(),
            Self::S32(x) => x.to_le_bytes().to_vec(),
            Self::U32(x) => x.to_le_bytes().to_vec(),
            Self::S64(x) => x.to_le_bytes().to_vec(),
            Self::U64(x) => x.to_le_bytes().to_vec(),
            Self::F32(x) => x.to_le_bytes().to_vec(),
            Self::F64(x) => x.to_le_bytes().to_vec(),
        }
    }

    /// Whether this value inhabits `ty`.
    pub(crate) fn matches_scalar_ty(&self, ty: &ScalarType) -> bool {
        match (self, ty) {
            (Self::Bool(_), ScalarType::Boolean) => true,
            (Self::S32(_), ScalarType::Integer { bits: 32, is_signed: true }) => true,
            (Self::U32(_), ScalarType::Integer { bits: 32, is_signed: false }) => true,
            (Self::S64(_), ScalarType::Integer { bits: 64, is_signed: true }) => true,
            (Self::U64(_), ScalarType::Integer { bits: 64, is_signed: false }) => true,
            (Self::F32(_), ScalarType::Float { bits: 32 }) => true,
            (Self::F64(_), ScalarType::Float { bits: 64 }) => true,
            _ => false,
        }
    }
}

/// Constant or specialization constant record.
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct Constant {
    pub name: Option<String>,
    pub ty: Type,
    /// Defined value, or default value of a specialization constant.
    pub value: ConstantValue,
    /// Specialization constant ID; `None` for ordinary constants.
    pub spec_id: Option<SpecId>,
}
impl Constant {
    pub fn new(name: Option<String>, ty: Type, value: ConstantValue) -> Self {
        Self {
            name,
            ty,
            value,
            spec_id: None,
        }
    }
    pub fn new_spec(name: Option<String>, ty: Type, value: ConstantValue, spec_id: SpecId) -> Self {
        Self {
            name,
            ty,
            value,
            spec_id: Some(spec_id),
        }
    }
}
