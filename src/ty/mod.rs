//! Structured representations of SPIR-V types.
use std::fmt;

pub mod reg;

pub use self::reg::TypeRegistry;

use bitflags::bitflags;

bitflags! {
    /// Coarse classification of a type, mirroring the reflection data model.
    pub struct TypeFlags: u32 {
        const VOID                            = 0x0000_0001;
        const BOOL                            = 0x0000_0002;
        const INT                             = 0x0000_0004;
        const FLOAT                           = 0x0000_0008;
        const VECTOR                          = 0x0000_0100;
        const MATRIX                          = 0x0000_0200;
        const EXTERNAL_IMAGE                  = 0x0001_0000;
        const EXTERNAL_SAMPLER                = 0x0002_0000;
        const EXTERNAL_SAMPLED_IMAGE          = 0x0004_0000;
        const EXTERNAL_BLOCK                  = 0x0008_0000;
        const EXTERNAL_ACCELERATION_STRUCTURE = 0x0010_0000;
        const EXTERNAL_MASK                   = 0x00FF_0000;
        const STRUCT                          = 0x1000_0000;
        const ARRAY                           = 0x2000_0000;
    }
}

bitflags! {
    /// Decorations a reflected type or variable carries.
    pub struct DecorationFlags: u32 {
        const BLOCK             = 0x0000_0001;
        const BUFFER_BLOCK      = 0x0000_0002;
        const ROW_MAJOR         = 0x0000_0004;
        const COLUMN_MAJOR      = 0x0000_0008;
        const BUILT_IN          = 0x0000_0010;
        const NOPERSPECTIVE     = 0x0000_0020;
        const FLAT              = 0x0000_0040;
        const NON_WRITABLE      = 0x0000_0080;
        const RELAXED_PRECISION = 0x0000_0100;
        const NON_READABLE      = 0x0000_0200;
    }
}

/// Scalar numeric traits: bit width and signedness.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScalarTraits {
    pub width: u32,
    pub signedness: u32,
}
/// Vector numeric traits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VectorTraits {
    pub component_count: u32,
}
/// Matrix numeric traits. The stride is measured in bytes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatrixTraits {
    pub column_count: u32,
    pub row_count: u32,
    pub stride: u32,
}
/// Numeric traits of a scalar, vector or matrix type.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NumericTraits {
    pub scalar: ScalarTraits,
    pub vector: VectorTraits,
    pub matrix: MatrixTraits,
}

/// Image traits as encoded by `OpTypeImage`. Enumerated operands are kept as
/// raw words so unrecognized extensions pass through untouched.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageTraits {
    pub dim: u32,
    pub depth: u32,
    pub arrayed: u32,
    pub ms: u32,
    pub sampled: u32,
    pub image_format: u32,
}

/// Dimension entry of a reflected array. A runtime array reports zero; an
/// array sized by a specialization constant reports `!0` and the constant's
/// result id in the parallel `spec_constant_op_ids` vector.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct ArrayTraits {
    pub dims: Vec<u32>,
    pub spec_constant_op_ids: Vec<u32>,
    pub stride: u32,
}
impl ArrayTraits {
    /// Total number of elements; 0 if any dimension is runtime or spec sized.
    pub fn element_count(&self) -> u32 {
        if self.dims.is_empty() {
            return 1;
        }
        self.dims.iter().fold(1u32, |acc, &x| {
            if x == 0 || x == !0 {
                0
            } else {
                acc.saturating_mul(x)
            }
        })
    }
}

#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub enum ScalarType {
    /// Pseudo-type representing no data.
    Void,
    /// Boolean value. Booleans have no host-visible layout; they only appear
    /// inside constant expressions.
    Boolean,
    /// Two's complement integer.
    Integer { bits: u32, is_signed: bool },
    /// IEEE 754 floating-point number.
    Float { bits: u32 },
}
impl ScalarType {
    pub fn int(bits: u32) -> Self {
        Self::Integer {
            bits,
            is_signed: true,
        }
    }
    pub fn uint(bits: u32) -> Self {
        Self::Integer {
            bits,
            is_signed: false,
        }
    }
    pub fn float(bits: u32) -> Self {
        Self::Float { bits }
    }
    pub fn i32() -> Self {
        Self::int(32)
    }
    pub fn u32() -> Self {
        Self::uint(32)
    }
    pub fn f32() -> Self {
        Self::float(32)
    }

    /// Size of the scalar in bytes; booleans take a full word in constant
    /// storage.
    pub fn nbyte(&self) -> u32 {
        match self {
            Self::Void => 0,
            Self::Boolean => 4,
            Self::Integer { bits, .. } => bits / 8,
            Self::Float { bits } => bits / 8,
        }
    }
    pub(crate) fn traits(&self) -> ScalarTraits {
        match self {
            Self::Void => ScalarTraits::default(),
            Self::Boolean => ScalarTraits {
                width: 32,
                signedness: 0,
            },
            Self::Integer { bits, is_signed } => ScalarTraits {
                width: *bits,
                signedness: *is_signed as u32,
            },
            Self::Float { bits } => ScalarTraits {
                width: *bits,
                signedness: 0,
            },
        }
    }
}
impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Void => f.write_str("void"),
            Self::Boolean => f.write_str("bool"),
            Self::Integer { bits, is_signed } => match is_signed {
                true => write!(f, "i{}", bits),
                false => write!(f, "u{}", bits),
            },
            Self::Float { bits } => write!(f, "f{}", bits),
        }
    }
}

#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct VectorType {
    pub scalar_ty: ScalarType,
    pub scalar_count: u32,
}
impl fmt::Display for VectorType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "vec{}<{}>", self.scalar_count, self.scalar_ty)
    }
}

#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub enum MatrixAxisOrder {
    ColumnMajor,
    RowMajor,
}

#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct MatrixType {
    /// Column vector type.
    pub vector_ty: VectorType,
    /// Number of columns.
    pub vector_count: u32,
    /// Axis order; decorated on the enclosing struct member.
    pub axis_order: Option<MatrixAxisOrder>,
    /// Stride between columns (or rows for row-major), in bytes.
    pub stride: Option<u32>,
}
impl fmt::Display for MatrixType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let major = match self.axis_order {
            Some(MatrixAxisOrder::ColumnMajor) => "ColumnMajor",
            Some(MatrixAxisOrder::RowMajor) => "RowMajor",
            None => "AxisOrder?",
        };
        let nrow = self.vector_ty.scalar_count;
        let ncol = self.vector_count;
        let scalar_ty = &self.vector_ty.scalar_ty;
        write!(f, "mat{}x{}<{},{}>", nrow, ncol, scalar_ty, major)
    }
}

#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct ImageType {
    /// Scalar type of the sampled texel.
    pub scalar_ty: ScalarType,
    pub traits: ImageTraits,
}
impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Image<{},dim={},sampled={}>",
            self.scalar_ty, self.traits.dim, self.traits.sampled
        )
    }
}

#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct SamplerType {}
impl fmt::Display for SamplerType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Sampler")
    }
}

#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct SampledImageType {
    pub image_ty: ImageType,
}
impl fmt::Display for SampledImageType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SampledImage<{}>", self.image_ty)
    }
}

/// Array length as encoded in the module.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub enum ArrayLen {
    /// Length known at compile time via `OpConstant`.
    Literal(u32),
    /// Length is the value of the specialization constant with this result
    /// id; resolvable once spec constants are bound.
    SpecConstant(u32),
    /// Runtime array; length is only known at runtime.
    Runtime,
}

#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct ArrayType {
    pub element_ty: Box<Type>,
    pub len: ArrayLen,
    /// Stride between elements in bytes. Absent for arrays of descriptor
    /// binding points, which have no physical layout.
    pub stride: Option<u32>,
}
impl fmt::Display for ArrayType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.len {
            ArrayLen::Literal(n) => write!(f, "[{}; {}]", self.element_ty, n),
            ArrayLen::SpecConstant(id) => write!(f, "[{}; %{}]", self.element_ty, id),
            ArrayLen::Runtime => write!(f, "[{}]", self.element_ty),
        }
    }
}

#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct StructMember {
    pub name: Option<String>,
    /// Byte offset of this member from the beginning of the struct, from the
    /// `Offset` member decoration. Interface blocks may omit it.
    pub offset: Option<u32>,
    pub ty: Type,
    pub decoration_flags: DecorationFlags,
    /// Built-in kind word, valid when `BUILT_IN` is set in the flags.
    pub built_in: Option<u32>,
}

#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct StructType {
    /// Result id of the `OpTypeStruct`; member decorations are keyed by it.
    pub id: u32,
    pub name: Option<String>,
    pub members: Vec<StructMember>,
    /// `Block`/`BufferBlock` and friends decorated on the struct type itself.
    pub decoration_flags: DecorationFlags,
}
impl StructType {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}
impl fmt::Display for StructType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(name) = &self.name {
            write!(f, "{} {{ ", name)?;
        } else {
            f.write_str("{ ")?;
        }
        for (i, member) in self.members.iter().enumerate() {
            if i != 0 {
                f.write_str(", ")?;
            }
            if let Some(name) = &member.name {
                write!(f, "{}: {}", name, member.ty)?;
            } else {
                write!(f, "{}: {}", i, member.ty)?;
            }
        }
        f.write_str(" }")
    }
}

#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct PointerType {
    pub pointee_ty: Box<Type>,
    /// Raw storage class word.
    pub storage_class: u32,
}
impl fmt::Display for PointerType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Pointer {{ {} }}", self.pointee_ty)
    }
}

/// `OpTypeForwardPointer` without a completing `OpTypePointer`. The pointee
/// is unknown and must not be dereferenced.
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct ForwardPointerType {
    pub storage_class: u32,
}
impl fmt::Display for ForwardPointerType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("ForwardPointer")
    }
}

#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct AccelStructType {}
impl fmt::Display for AccelStructType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("AccelStruct")
    }
}

macro_rules! declr_ty_accessor {
    ([$e:ident] $($name:ident -> $ty:ident,)+) => {
        $(
            pub fn $name(&self) -> bool {
                match self {
                    $e::$ty(..) => true,
                    _ => false
                }
            }
        )+
    }
}
macro_rules! declr_ty_downcast {
    ([$e:ident] $($name:ident -> $ty:ident($inner_ty:ident),)+) => {
        $(
            pub fn $name(&self) -> Option<&$inner_ty> {
                match self {
                    $e::$ty(x) => Some(x),
                    _ => None
                }
            }
        )+
    }
}

#[derive(PartialEq, Eq, Hash, Clone, Debug)]
#[non_exhaustive]
pub enum Type {
    /// A single value: void, boolean, integer or floating-point number.
    Scalar(ScalarType),
    /// A collection of scalars.
    Vector(VectorType),
    /// A collection of column (or row) vectors.
    Matrix(MatrixType),
    /// An image resource, sampled or storage.
    Image(ImageType),
    /// Separable sampler state.
    Sampler(SamplerType),
    /// An image pre-combined with a sampler state.
    SampledImage(SampledImageType),
    /// Repetition of a single type, sized or runtime.
    Array(ArrayType),
    /// Aggregation of types.
    Struct(StructType),
    /// A pointer with a known pointee.
    Pointer(PointerType),
    /// A forward-declared pointer whose pointee never materialized.
    ForwardPointer(ForwardPointerType),
    /// Ray-tracing acceleration structure.
    AccelStruct(AccelStructType),
}
impl Type {
    declr_ty_accessor! {
        [Type]
        is_scalar -> Scalar,
        is_vector -> Vector,
        is_matrix -> Matrix,
        is_image -> Image,
        is_sampler -> Sampler,
        is_sampled_image -> SampledImage,
        is_array -> Array,
        is_struct -> Struct,
        is_pointer -> Pointer,
        is_forward_pointer -> ForwardPointer,
        is_accel_struct -> AccelStruct,
    }
    declr_ty_downcast! {
        [Type]
        as_scalar -> Scalar(ScalarType),
        as_vector -> Vector(VectorType),
        as_matrix -> Matrix(MatrixType),
        as_image -> Image(ImageType),
        as_sampled_image -> SampledImage(SampledImageType),
        as_array -> Array(ArrayType),
        as_struct -> Struct(StructType),
        as_pointer -> Pointer(PointerType),
        as_accel_struct -> AccelStruct(AccelStructType),
    }

    /// Classification bitset of this type.
    pub fn type_flags(&self) -> TypeFlags {
        match self {
            Type::Scalar(x) => match x {
                ScalarType::Void => TypeFlags::VOID,
                ScalarType::Boolean => TypeFlags::BOOL,
                ScalarType::Integer { .. } => TypeFlags::INT,
                ScalarType::Float { .. } => TypeFlags::FLOAT,
            },
            Type::Vector(x) => {
                TypeFlags::VECTOR | Type::Scalar(x.scalar_ty.clone()).type_flags()
            }
            Type::Matrix(x) => TypeFlags::MATRIX | Type::Vector(x.vector_ty.clone()).type_flags(),
            Type::Image(_) => TypeFlags::EXTERNAL_IMAGE,
            Type::Sampler(_) => TypeFlags::EXTERNAL_SAMPLER,
            Type::SampledImage(_) => TypeFlags::EXTERNAL_SAMPLED_IMAGE,
            Type::Array(x) => TypeFlags::ARRAY | x.element_ty.type_flags(),
            Type::Struct(x) => {
                let mut flags = TypeFlags::STRUCT;
                if x.decoration_flags
                    .intersects(DecorationFlags::BLOCK | DecorationFlags::BUFFER_BLOCK)
                {
                    flags |= TypeFlags::EXTERNAL_BLOCK;
                }
                flags
            }
            Type::Pointer(_) => TypeFlags::empty(),
            Type::ForwardPointer(_) => TypeFlags::empty(),
            Type::AccelStruct(_) => TypeFlags::EXTERNAL_ACCELERATION_STRUCTURE,
        }
    }

    /// The scalar type at the numeric core of this type, if any.
    pub fn scalar_ty(&self) -> Option<&ScalarType> {
        match self {
            Type::Scalar(x) => Some(x),
            Type::Vector(x) => Some(&x.scalar_ty),
            Type::Matrix(x) => Some(&x.vector_ty.scalar_ty),
            Type::Array(x) => x.element_ty.scalar_ty(),
            _ => None,
        }
    }

    /// Numeric traits of a scalar, vector or matrix type, looking through
    /// arrays.
    pub fn numeric_traits(&self) -> NumericTraits {
        let mut out = NumericTraits::default();
        match self {
            Type::Scalar(x) => out.scalar = x.traits(),
            Type::Vector(x) => {
                out.scalar = x.scalar_ty.traits();
                out.vector = VectorTraits {
                    component_count: x.scalar_count,
                };
            }
            Type::Matrix(x) => {
                out.scalar = x.vector_ty.scalar_ty.traits();
                out.vector = VectorTraits {
                    component_count: x.vector_ty.scalar_count,
                };
                out.matrix = MatrixTraits {
                    column_count: x.vector_count,
                    row_count: x.vector_ty.scalar_count,
                    stride: x.stride.unwrap_or(0),
                };
            }
            Type::Array(x) => return x.element_ty.numeric_traits(),
            _ => {}
        }
        out
    }

    pub fn image_traits(&self) -> Option<ImageTraits> {
        match self {
            Type::Image(x) => Some(x.traits),
            Type::SampledImage(x) => Some(x.image_ty.traits),
            Type::Array(x) => x.element_ty.image_traits(),
            _ => None,
        }
    }

    /// Flattened array traits of this type. Nested arrays contribute one
    /// dimension each, outermost first; the stride is the outermost stride.
    pub fn array_traits(&self) -> Option<ArrayTraits> {
        match self {
            Type::Array(arr_ty) => {
                let mut traits = ArrayTraits {
                    stride: arr_ty.stride.unwrap_or(0),
                    ..Default::default()
                };
                let mut cur = self;
                while let Type::Array(arr_ty) = cur {
                    let (dim, spec_id) = match arr_ty.len {
                        ArrayLen::Literal(n) => (n, 0),
                        ArrayLen::SpecConstant(id) => (!0, id),
                        ArrayLen::Runtime => (0, 0),
                    };
                    traits.dims.push(dim);
                    traits.spec_constant_op_ids.push(spec_id);
                    cur = &*arr_ty.element_ty;
                }
                Some(traits)
            }
            _ => None,
        }
    }

    /// The element type after unwrapping every array dimension.
    pub fn element_ty(&self) -> &Type {
        let mut cur = self;
        while let Type::Array(arr_ty) = cur {
            cur = &*arr_ty.element_ty;
        }
        cur
    }
}
impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::Scalar(x) => x.fmt(f),
            Type::Vector(x) => x.fmt(f),
            Type::Matrix(x) => x.fmt(f),
            Type::Image(x) => x.fmt(f),
            Type::Sampler(x) => x.fmt(f),
            Type::SampledImage(x) => x.fmt(f),
            Type::Array(x) => x.fmt(f),
            Type::Struct(x) => x.fmt(f),
            Type::Pointer(x) => x.fmt(f),
            Type::ForwardPointer(x) => x.fmt(f),
            Type::AccelStruct(x) => x.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_flags_include_component() {
        let ty = Type::Vector(VectorType {
            scalar_ty: ScalarType::f32(),
            scalar_count: 4,
        });
        assert_eq!(ty.type_flags(), TypeFlags::VECTOR | TypeFlags::FLOAT);
    }

    #[test]
    fn array_traits_flatten_nested_dims() {
        let inner = Type::Array(ArrayType {
            element_ty: Box::new(Type::Scalar(ScalarType::u32())),
            len: ArrayLen::Literal(3),
            stride: Some(4),
        });
        let outer = Type::Array(ArrayType {
            element_ty: Box::new(inner),
            len: ArrayLen::Literal(2),
            stride: Some(12),
        });
        let traits = outer.array_traits().unwrap();
        assert_eq!(traits.dims, vec![2, 3]);
        assert_eq!(traits.stride, 12);
        assert_eq!(traits.element_count(), 6);
    }

    #[test]
    fn spec_sized_dim_reports_sentinel() {
        let ty = Type::Array(ArrayType {
            element_ty: Box::new(Type::Scalar(ScalarType::f32())),
            len: ArrayLen::SpecConstant(42),
            stride: Some(4),
        });
        let traits = ty.array_traits().unwrap();
        assert_eq!(traits.dims, vec![!0u32]);
        assert_eq!(traits.spec_constant_op_ids, vec![42]);
        assert_eq!(traits.element_count(), 0);
    }
}
