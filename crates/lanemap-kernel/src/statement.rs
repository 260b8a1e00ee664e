//! Statement types
//!
//! A kernel is a type built from these markers. None of them is ever
//! constructed: executors are selected from the type alone, and the only
//! run-time state is the [`LoopData`](crate::LoopData) they walk.
//!
//! Tuples are statement lists, executed in declaration order; `()` is the
//! empty list.

use crate::data::AllSegs;
use crate::policy::Launch;
use std::marker::PhantomData;

/// Iterate segment `ARG` under policy `P`, running `Body` at every position.
pub struct For<const ARG: usize, P, Body>(PhantomData<fn() -> (P, Body)>);

/// Call user body `L` with the segment values selected by `A`.
///
/// Inactive lanes skip the call.
pub struct Lambda<const L: usize, A = AllSegs>(PhantomData<fn() -> A>);

/// Call user body `L` on every lane, active or not, with a
/// [`LaneMask`](crate::LaneMask).
pub struct MaskedLambda<const L: usize>;

/// Group `Body` under region policy `R`.
pub struct Region<R, Body>(PhantomData<fn() -> (R, Body)>);

/// Wait for every lane of the work-group.
pub struct SyncThreads;

/// Launch the lane statement `Body` on the context's resource.
pub struct DeviceKernelExt<L, Body>(PhantomData<fn() -> (L, Body)>);

/// Synchronous launch, at most 1024 lanes per work-group
pub type DeviceKernel<Body> = DeviceKernelExt<Launch<false, 1024>, Body>;

/// Asynchronous launch, at most 1024 lanes per work-group
pub type DeviceKernelAsync<Body> = DeviceKernelExt<Launch<true, 1024>, Body>;
