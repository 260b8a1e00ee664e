//! Segments and the per-argument offset binding
//!
//! A kernel receives a tuple of segments, one per loop argument. `For<ARG, ..>`
//! iterates positions `0..len` of segment `ARG` and stores the current
//! position in [`Offsets`]; lambdas turn positions back into typed values.

use crate::index::IndexValue;
use std::fmt;

/// Most loop arguments a kernel may declare.
pub const MAX_ARGS: usize = 4;

/// An ordered, finite sequence of index values
pub trait Segment: Clone + Send + Sync + 'static {
    type Index: IndexValue;

    /// Number of positions.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at a position. `offset` must be below [`Segment::len`].
    fn value_at(&self, offset: usize) -> Self::Index;
}

/// Half-open range `[begin, end)` of a typed index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypedRange<T> {
    begin: T,
    end: T,
}

impl<T: IndexValue> TypedRange<T> {
    pub fn new(begin: T, end: T) -> Self {
        Self { begin, end }
    }

    pub fn begin(&self) -> T {
        self.begin
    }

    pub fn end(&self) -> T {
        self.end
    }
}

impl<T: IndexValue> Segment for TypedRange<T> {
    type Index = T;

    /// Empty when `end <= begin`; saturates at `usize::MAX`.
    fn len(&self) -> usize {
        let span = self.end.to_i128() - self.begin.to_i128();
        if span <= 0 {
            return 0;
        }
        usize::try_from(span).unwrap_or(usize::MAX)
    }

    #[inline]
    fn value_at(&self, offset: usize) -> T {
        T::from_i128(self.begin.to_i128() + offset as i128)
    }
}

/// Explicit list of index values, visited in list order
#[derive(Debug, Clone, PartialEq)]
pub struct ListSegment<T> {
    values: std::sync::Arc<[T]>,
}

impl<T: IndexValue> ListSegment<T> {
    pub fn new(values: impl Into<Vec<T>>) -> Self {
        let values: Vec<T> = values.into();
        Self { values: values.into() }
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }
}

impl<T: IndexValue> FromIterator<T> for ListSegment<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect::<Vec<_>>())
    }
}

impl<T: IndexValue> Segment for ListSegment<T> {
    type Index = T;

    fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    fn value_at(&self, offset: usize) -> T {
        self.values[offset]
    }
}

/// Current position bound to each loop argument
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Offsets([usize; MAX_ARGS]);

impl Offsets {
    #[inline]
    pub fn get(&self, arg: usize) -> usize {
        self.0[arg]
    }

    #[inline]
    pub fn set(&mut self, arg: usize, offset: usize) {
        self.0[arg] = offset;
    }
}

impl fmt::Debug for Offsets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

/// A tuple of segments, one per loop argument
pub trait SegmentTuple: Clone + Send + Sync + 'static {
    /// Number of loop arguments.
    const COUNT: usize;

    /// Typed values of every argument, in argument order.
    type Values;

    fn values_at(&self, offsets: &Offsets) -> Self::Values;
}

/// Access to the segment bound to argument `ARG`
///
/// Implemented only for positions that exist, so `For<3, ..>` over a
/// two-segment kernel does not compile.
pub trait SegmentAt<const ARG: usize> {
    type Seg: Segment;

    fn segment(&self) -> &Self::Seg;
}

macro_rules! segment_tuple {
    (@position [$($all:ident),+]; $idx:tt => $seg:ident) => {
        impl<$($all: Segment),+> SegmentAt<$idx> for ($($all,)+) {
            type Seg = $seg;

            #[inline]
            fn segment(&self) -> &$seg {
                &self.$idx
            }
        }
    };
    (@positions $all:tt; $($idx:tt => $seg:ident),+) => {
        $(segment_tuple!(@position $all; $idx => $seg);)+
    };
    ($count:expr; $($idx:tt => $seg:ident),+) => {
        impl<$($seg: Segment),+> SegmentTuple for ($($seg,)+) {
            const COUNT: usize = $count;
            type Values = ($(<$seg as Segment>::Index,)+);

            #[inline]
            fn values_at(&self, offsets: &Offsets) -> Self::Values {
                ($(self.$idx.value_at(offsets.get($idx)),)+)
            }
        }

        segment_tuple!(@positions [$($seg),+]; $($idx => $seg),+);
    };
}

segment_tuple!(1; 0 => S0);
segment_tuple!(2; 0 => S0, 1 => S1);
segment_tuple!(3; 0 => S0, 1 => S1, 2 => S2);
segment_tuple!(4; 0 => S0, 1 => S1, 2 => S2, 3 => S3);
