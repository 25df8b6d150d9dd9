//! Same-value equality for context values.
//!
//! The default change comparator needs to decide whether two successive
//! provider values are "the same". Plain `PartialEq` is almost right, but it
//! makes `NaN` unequal to itself, which would force every consumer of a
//! float-valued context to re-render on every pass even when the value never
//! changed.
//!
//! `SameValue` is the equality the engine actually wants: a value is equal to
//! itself, always. For floats this is bitwise comparison (`NaN` equals `NaN`,
//! `+0.0` and `-0.0` are distinct). For everything else it coincides with
//! `PartialEq`.

/// NaN-tolerant equality used by the default change comparator.
pub trait SameValue {
    /// Returns true if `self` and `other` are the same value.
    fn same_value(&self, other: &Self) -> bool;
}

macro_rules! same_value_via_eq {
    ($($ty:ty),* $(,)?) => {
        $(
            impl SameValue for $ty {
                fn same_value(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

same_value_via_eq!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, bool, char,
    String, &str, ()
);

impl SameValue for f32 {
    fn same_value(&self, other: &Self) -> bool {
        self.to_bits() == other.to_bits()
    }
}

impl SameValue for f64 {
    fn same_value(&self, other: &Self) -> bool {
        self.to_bits() == other.to_bits()
    }
}

impl<T: SameValue> SameValue for Option<T> {
    fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.same_value(b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<A: SameValue, B: SameValue> SameValue for (A, B) {
    fn same_value(&self, other: &Self) -> bool {
        self.0.same_value(&other.0) && self.1.same_value(&other.1)
    }
}
