//! Execution policies
//!
//! Zero-sized markers selecting how a `For` maps its iterations. Host
//! policies (`SeqExec`, `ParExec`) run outside a launch; lane policies map
//! iterations onto work-groups and lanes along axis `DIM` (0 = x, 1 = y,
//! 2 = z). An axis outside `0..3` fails to compile.

/// One iteration after another. Valid on the host and inside lanes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeqExec;

/// Host iterations spread over the rayon pool, each on a private state copy.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParExec;

/// Iteration `i` runs on the lane whose global id along `DIM` is `i`, in
/// work-groups of `BLOCK` lanes.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalDirect<const DIM: usize, const BLOCK: usize>;

/// Iteration `i` runs in work-group `i` along `DIM`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupDirect<const DIM: usize>;

/// Iteration `i` runs on local lane `i` along `DIM`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalDirect<const DIM: usize>;

/// Work-groups along `DIM` stride over the iterations, asking for at most
/// `GROUPS` groups (`0`: one per iteration).
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupLoop<const DIM: usize, const GROUPS: usize = 0>;

/// Local lanes along `DIM` stride over the iterations, asking for at most
/// `LANES` lanes (`0`: one per iteration).
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalLoop<const DIM: usize, const LANES: usize = 0>;

pub type GlobalX<const BLOCK: usize> = GlobalDirect<0, BLOCK>;
pub type GlobalY<const BLOCK: usize> = GlobalDirect<1, BLOCK>;
pub type GlobalZ<const BLOCK: usize> = GlobalDirect<2, BLOCK>;

pub type GroupX = GroupDirect<0>;
pub type GroupY = GroupDirect<1>;
pub type GroupZ = GroupDirect<2>;

pub type LocalX = LocalDirect<0>;
pub type LocalY = LocalDirect<1>;
pub type LocalZ = LocalDirect<2>;

pub type GroupLoopX = GroupLoop<0>;
pub type GroupLoopY = GroupLoop<1>;
pub type GroupLoopZ = GroupLoop<2>;

pub type LocalLoopX = LocalLoop<0>;
pub type LocalLoopY = LocalLoop<1>;
pub type LocalLoopZ = LocalLoop<2>;

/// Region body runs as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeqRegion;

/// Region body runs inside the configured rayon pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParRegion;

/// Launch configuration of a device kernel
pub trait LaunchPolicy {
    /// Return right after submission instead of waiting.
    const ASYNC: bool;

    /// Cap on lanes per work-group, `0` for the resource limit.
    const MAX_THREADS: usize;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Launch<const ASYNC: bool, const THREADS: usize>;

impl<const ASYNC: bool, const THREADS: usize> LaunchPolicy for Launch<ASYNC, THREADS> {
    const ASYNC: bool = ASYNC;
    const MAX_THREADS: usize = THREADS;
}

/// Axis `DIM`, checked at compile time.
#[inline(always)]
pub(crate) const fn axis<const DIM: usize>() -> usize {
    const { assert!(DIM < 3, "lane axis must be 0 (x), 1 (y) or 2 (z)") };
    DIM
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_constants() {
        assert!(!<Launch<false, 256> as LaunchPolicy>::ASYNC);
        assert!(<Launch<true, 0> as LaunchPolicy>::ASYNC);
        assert_eq!(<Launch<false, 256> as LaunchPolicy>::MAX_THREADS, 256);
    }

    #[test]
    fn axes_in_range() {
        assert_eq!(axis::<0>(), 0);
        assert_eq!(axis::<2>(), 2);
    }
}
