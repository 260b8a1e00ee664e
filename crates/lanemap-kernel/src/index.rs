//! Index value types
//!
//! Every loop argument has a declared index type. Plain integers work, and
//! [`index_value!`](crate::index_value) declares distinct newtypes so that a
//! closure taking a `JIdx` where the segment yields an `IIdx` is rejected by
//! the compiler.

use std::fmt;

/// A value a segment can produce for a loop argument
///
/// Values pass through `i128`, which holds every supported index without loss.
pub trait IndexValue: Copy + Send + Sync + fmt::Debug + PartialEq + 'static {
    /// `value` must lie in the type's range.
    fn from_i128(value: i128) -> Self;
    fn to_i128(self) -> i128;
}

macro_rules! primitive_index {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl IndexValue for $ty {
                #[inline]
                fn from_i128(value: i128) -> Self {
                    value as $ty
                }

                #[inline]
                fn to_i128(self) -> i128 {
                    self as i128
                }
            }
        )+
    };
}

primitive_index!(usize, isize, u32, u64, i32, i64);

/// Declare a strongly typed index.
///
/// ```rust
/// use lanemap_kernel::index::IndexValue;
/// use lanemap_kernel::index_value;
///
/// index_value!(
///     /// Row index.
///     pub RowIdx
/// );
///
/// let row = RowIdx::new(3);
/// assert_eq!(row.value(), 3);
/// assert_eq!(RowIdx::from_i128(4).to_i128(), 4);
/// assert_eq!(row.to_string(), "RowIdx(3)");
/// ```
#[macro_export]
macro_rules! index_value {
    ($(#[$meta:meta])* $vis:vis $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        $vis struct $name(pub i64);

        impl $name {
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            pub const fn value(self) -> i64 {
                self.0
            }
        }

        impl $crate::index::IndexValue for $name {
            #[inline]
            fn from_i128(value: i128) -> Self {
                Self(value as i64)
            }

            #[inline]
            fn to_i128(self) -> i128 {
                i128::from(self.0)
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    index_value!(TestIdx);

    #[test]
    fn primitives_round_trip_through_i128() {
        assert_eq!(usize::from_i128(7).to_i128(), 7);
        assert_eq!(i32::from_i128(-3), -3);
        assert_eq!(u32::from_i128(12).to_i128(), 12);
        assert_eq!(u64::MAX.to_i128(), i128::from(u64::MAX));
        assert_eq!(u64::from_i128(i128::from(u64::MAX)), u64::MAX);
        assert_eq!(i64::MIN.to_i128(), i128::from(i64::MIN));
    }

    #[test]
    fn declared_indices_are_ordered_newtypes() {
        let a = TestIdx::new(1);
        let b = TestIdx::from_i128(2);
        assert!(a < b);
        assert_eq!(b.value(), 2);
        assert_eq!(format!("{a}"), "TestIdx(1)");
        assert_eq!(TestIdx::default(), TestIdx::new(0));
    }
}
