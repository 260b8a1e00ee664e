//! Per-invocation loop state and user body binding
//!
//! [`LoopData`] is what every statement executor works on: the segment
//! tuple, the offset currently bound to each argument, and the tuple of user
//! closures. Lanes work on private clones, so nothing here is shared mutably.

use crate::segment::{Offsets, Segment, SegmentAt, SegmentTuple};
use lanemap_backends::Dim3;
use std::fmt;

/// Segments, bound offsets and user bodies of one kernel invocation
#[derive(Clone)]
pub struct LoopData<S, B> {
    segments: S,
    offsets: Offsets,
    bodies: B,
}

impl<S, B> LoopData<S, B> {
    pub fn new(segments: S, bodies: B) -> Self {
        Self {
            segments,
            offsets: Offsets::default(),
            bodies,
        }
    }

    pub fn segments(&self) -> &S {
        &self.segments
    }

    pub fn offsets(&self) -> &Offsets {
        &self.offsets
    }

    pub fn bodies(&self) -> &B {
        &self.bodies
    }

    /// Bind position `offset` to argument `ARG`.
    #[inline]
    pub fn assign_offset<const ARG: usize>(&mut self, offset: usize)
    where
        S: SegmentAt<ARG>,
    {
        self.offsets.set(ARG, offset);
    }

    /// Extent of the segment bound to argument `ARG`.
    #[inline]
    pub fn segment_length<const ARG: usize>(&self) -> usize
    where
        S: SegmentAt<ARG>,
    {
        <S as SegmentAt<ARG>>::segment(&self.segments).len()
    }

    /// Typed value of argument `ARG` at its bound offset.
    #[inline]
    pub fn value<const ARG: usize>(&self) -> <<S as SegmentAt<ARG>>::Seg as Segment>::Index
    where
        S: SegmentAt<ARG>,
    {
        <S as SegmentAt<ARG>>::segment(&self.segments).value_at(self.offsets.get(ARG))
    }

    #[inline]
    pub fn body<const L: usize>(&self) -> &<B as BodyAt<L>>::Body
    where
        B: BodyAt<L>,
    {
        <B as BodyAt<L>>::body(&self.bodies)
    }

    /// Call body `L` with the values selected by `A`.
    #[inline]
    pub fn invoke<const L: usize, A>(&self)
    where
        B: BodyAt<L>,
        A: LambdaArgs<S>,
        <B as BodyAt<L>>::Body: LoopBody<<A as LambdaArgs<S>>::Values>,
    {
        let args = A::values(&self.segments, &self.offsets);
        self.body::<L>().invoke(args);
    }
}

impl<S, B> fmt::Debug for LoopData<S, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopData")
            .field("offsets", &self.offsets)
            .finish_non_exhaustive()
    }
}

/// Access to user body `L` of a body tuple
pub trait BodyAt<const L: usize> {
    type Body;

    fn body(&self) -> &Self::Body;
}

macro_rules! body_at {
    (@one $idx:tt, $body:ident; [$($all:ident),+]) => {
        impl<$($all),+> BodyAt<$idx> for ($($all,)+) {
            type Body = $body;

            #[inline]
            fn body(&self) -> &$body {
                &self.$idx
            }
        }
    };
    ($(($idx:tt, $body:ident)),+; $all:tt) => {
        $(body_at!(@one $idx, $body; $all);)+
    };
}

body_at!((0, B0); [B0]);
body_at!((0, B0), (1, B1); [B0, B1]);
body_at!((0, B0), (1, B1), (2, B2); [B0, B1, B2]);
body_at!((0, B0), (1, B1), (2, B2), (3, B3); [B0, B1, B2, B3]);

/// A user closure callable with the argument tuple `Args`
///
/// Implemented for every `Fn` of matching arity, so the parameter types a
/// closure declares must equal the index types of the selected segments.
pub trait LoopBody<Args> {
    fn invoke(&self, args: Args);
}

macro_rules! loop_body {
    ($(($ty:ident, $arg:ident)),*) => {
        impl<F, $($ty),*> LoopBody<($($ty,)*)> for F
        where
            F: Fn($($ty),*),
        {
            #[inline]
            #[allow(unused_variables)]
            fn invoke(&self, args: ($($ty,)*)) {
                let ($($arg,)*) = args;
                self($($arg),*)
            }
        }
    };
}

loop_body!();
loop_body!((A0, a0));
loop_body!((A0, a0), (A1, a1));
loop_body!((A0, a0), (A1, a1), (A2, a2));
loop_body!((A0, a0), (A1, a1), (A2, a2), (A3, a3));

/// Which segment values a lambda receives
pub trait LambdaArgs<S> {
    type Values;

    fn values(segments: &S, offsets: &Offsets) -> Self::Values;
}

/// Every segment, in argument order
#[derive(Debug, Clone, Copy, Default)]
pub struct AllSegs;

impl<S: SegmentTuple> LambdaArgs<S> for AllSegs {
    type Values = S::Values;

    #[inline]
    fn values(segments: &S, offsets: &Offsets) -> Self::Values {
        segments.values_at(offsets)
    }
}

/// The value of argument `N` alone, or one entry of a selection tuple
#[derive(Debug, Clone, Copy, Default)]
pub struct Seg<const N: usize>;

/// One entry of a lambda argument selection
pub trait SegArg<S> {
    type Value;

    fn value(segments: &S, offsets: &Offsets) -> Self::Value;
}

impl<S: SegmentAt<N>, const N: usize> SegArg<S> for Seg<N> {
    type Value = <<S as SegmentAt<N>>::Seg as Segment>::Index;

    #[inline]
    fn value(segments: &S, offsets: &Offsets) -> Self::Value {
        <S as SegmentAt<N>>::segment(segments).value_at(offsets.get(N))
    }
}

impl<S: SegmentAt<N>, const N: usize> LambdaArgs<S> for Seg<N> {
    type Values = (<Seg<N> as SegArg<S>>::Value,);

    #[inline]
    fn values(segments: &S, offsets: &Offsets) -> Self::Values {
        (<Seg<N> as SegArg<S>>::value(segments, offsets),)
    }
}

impl<S> LambdaArgs<S> for () {
    type Values = ();

    #[inline]
    fn values(_segments: &S, _offsets: &Offsets) -> Self::Values {}
}

macro_rules! selection {
    ($($arg:ident),+) => {
        impl<S, $($arg: SegArg<S>),+> LambdaArgs<S> for ($($arg,)+) {
            type Values = ($(<$arg as SegArg<S>>::Value,)+);

            #[inline]
            fn values(segments: &S, offsets: &Offsets) -> Self::Values {
                ($(<$arg as SegArg<S>>::value(segments, offsets),)+)
            }
        }
    };
}

selection!(X0);
selection!(X0, X1);
selection!(X0, X1, X2);
selection!(X0, X1, X2, X3);

/// What a masked lambda learns about the lane calling it
///
/// Offsets of an inactive lane may lie past the end of their segment, so a
/// masked body gets raw offsets rather than typed values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaneMask {
    pub active: bool,
    pub group: Dim3,
    pub local: Dim3,
    pub offsets: Offsets,
}

impl LaneMask {
    /// Host iterations are always active and run outside any group.
    pub fn host(offsets: Offsets) -> Self {
        Self {
            active: true,
            group: Dim3::zero(),
            local: Dim3::zero(),
            offsets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{ListSegment, TypedRange};
    use std::cell::RefCell;

    #[test]
    fn offsets_bind_per_argument() {
        let mut data = LoopData::new((TypedRange::new(10i64, 14), ListSegment::new(vec![7u32, 9])), ());
        assert_eq!(data.segment_length::<0>(), 4);
        assert_eq!(data.segment_length::<1>(), 2);

        data.assign_offset::<0>(3);
        data.assign_offset::<1>(1);
        assert_eq!(data.value::<0>(), 13);
        assert_eq!(data.value::<1>(), 9);
        assert_eq!(data.offsets().get(0), 3);
    }

    #[test]
    fn lambdas_receive_selected_values() {
        let seen = RefCell::new(Vec::new());
        let mut data = LoopData::new(
            (TypedRange::new(0usize, 4), TypedRange::new(100i32, 104)),
            (
                |i: usize, j: i32| seen.borrow_mut().push((i as i64, j as i64)),
                |j: i32, i: usize| seen.borrow_mut().push((j as i64, i as i64)),
                || seen.borrow_mut().push((-1, -1)),
            ),
        );
        data.assign_offset::<0>(2);
        data.assign_offset::<1>(3);

        data.invoke::<0, AllSegs>();
        data.invoke::<1, (Seg<1>, Seg<0>)>();
        data.invoke::<2, ()>();

        assert_eq!(*seen.borrow(), vec![(2, 103), (103, 2), (-1, -1)]);
    }

    #[test]
    fn single_selection_is_a_one_tuple() {
        let seen = RefCell::new(None);
        let mut data = LoopData::new(
            (TypedRange::new(0usize, 2), TypedRange::new(5u64, 9)),
            (|k: u64| *seen.borrow_mut() = Some(k),),
        );
        data.assign_offset::<1>(2);
        data.invoke::<0, Seg<1>>();
        assert_eq!(*seen.borrow(), Some(7));
    }

    #[test]
    fn host_mask_is_active() {
        let mask = LaneMask::host(Offsets::default());
        assert!(mask.active);
        assert_eq!(mask.local, Dim3::zero());
    }
}
