//! Resource locator keys.
use std::fmt;

/// Descriptor set and binding point carrier.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Default, Clone, Copy)]
pub struct DescriptorBindingPoint(u32, u32);
impl DescriptorBindingPoint {
    pub fn new(set: u32, binding: u32) -> Self {
        DescriptorBindingPoint(set, binding)
    }

    pub fn set(&self) -> u32 {
        self.0
    }
    pub fn binding(&self) -> u32 {
        self.1
    }
    pub fn into_inner(self) -> (u32, u32) {
        (self.0, self.1)
    }
}
impl fmt::Display for DescriptorBindingPoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(set={}, binding={})", self.0, self.1)
    }
}
impl fmt::Debug for DescriptorBindingPoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        (self as &dyn fmt::Display).fmt(f)
    }
}

/// Specialization constant ID, i.e. the `SpecId` decoration value. This is
/// not an instruction result id.
pub type SpecId = u32;
