//! Statement lists
//!
//! A tuple of statements runs its members in declaration order against the
//! same state. Its geometry is the pointwise max of the members', never the
//! sum: siblings reuse the same lanes one after another.

use crate::data::LoopData;
use crate::error::Result;
use crate::exec::host::{HostContext, HostStatement};
use crate::exec::lane::LaneStatement;
use lanemap_backends::{LaneContext, LaunchDims};

impl<S, B> HostStatement<S, B> for () {
    #[inline]
    fn exec(_data: &mut LoopData<S, B>, _ctx: &HostContext) -> Result<()> {
        Ok(())
    }
}

impl<S, B> LaneStatement<S, B> for () {
    #[inline]
    fn exec(_data: &mut LoopData<S, B>, _lane: &LaneContext<'_>, _active: bool) {}

    fn calculate_dimensions(_data: &LoopData<S, B>) -> LaunchDims {
        LaunchDims::zero()
    }
}

macro_rules! statement_list {
    ($($stmt:ident),+) => {
        impl<S, B, $($stmt: HostStatement<S, B>),+> HostStatement<S, B> for ($($stmt,)+) {
            #[inline]
            fn exec(data: &mut LoopData<S, B>, ctx: &HostContext) -> Result<()> {
                $(<$stmt as HostStatement<S, B>>::exec(data, ctx)?;)+
                Ok(())
            }
        }

        impl<S, B, $($stmt: LaneStatement<S, B>),+> LaneStatement<S, B> for ($($stmt,)+) {
            const USES_BARRIER: bool = $(<$stmt as LaneStatement<S, B>>::USES_BARRIER)||+;

            #[inline]
            fn exec(data: &mut LoopData<S, B>, lane: &LaneContext<'_>, active: bool) {
                $(<$stmt as LaneStatement<S, B>>::exec(data, lane, active);)+
            }

            fn calculate_dimensions(data: &LoopData<S, B>) -> LaunchDims {
                LaunchDims::zero()$(.max(<$stmt as LaneStatement<S, B>>::calculate_dimensions(data)))+
            }
        }
    };
}

statement_list!(T0);
statement_list!(T0, T1);
statement_list!(T0, T1, T2);
statement_list!(T0, T1, T2, T3);
statement_list!(T0, T1, T2, T3, T4);
statement_list!(T0, T1, T2, T3, T4, T5);
