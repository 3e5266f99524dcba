//! # BSP node builder
//!
//! Takes the geometry of one map (vertices, linedefs, sidedefs,
//! sectors) and derives the structures the engine walks at run time:
//! segs, convex subsectors, and the binary tree of partition nodes.
//!
//! The build is a pure batch computation: single-threaded, no I/O,
//! cancellable through a cooperative flag polled between recursion
//! steps and partition candidates.  All state lives in one context per
//! call; [`build_level`] may be called serially on independent maps.
//!
//! Originally based on the DEU 5 nodeline picker, with the quadtree
//! pruning and miniseg handling of the BSP utility lineage.

mod analyze;
mod build;
mod context;
mod divide;
mod pick;
mod post;
mod quadtree;
mod seg;
mod types;

#[cfg(test)]
pub(crate) mod tests;

pub use seg::{Seg, SegList, SegListIter};
pub use types::{
    compute_angle, Bounds, Child, ChildLink, Node, NodeId, Side, Subsec, SubsecId, Vertex, WallTip,
    ANG_EPSILON, DIST_EPSILON, IFFY_LEN,
};

pub type SegId = usize;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use glam::DVec2;
use log::info;
use thiserror::Error;

use crate::level::LevelData;

use context::BuildContext;

pub const DEFAULT_FACTOR: i32 = 11;

/*------------------------- configuration ----------------------------*/

/// Node building parameters, plus the counters the host reads back.
#[derive(Debug)]
pub struct BuildInfo {
    /// Cost multiplier: higher values weight splits more heavily than
    /// imbalance.  Sensible range is roughly 1 to 32.
    pub factor: i32,

    /// Keep minisegs and fractional split vertices (GL-nodes form).
    pub gl_nodes: bool,

    // when false, the host writes an empty lump
    pub do_blockmap: bool,
    pub do_reject: bool,

    /// At high seg counts, try an axis-aligned shortcut before the full
    /// partition search.
    pub fast: bool,
    pub warnings: bool,

    // output encoding requests, consumed by the host's writer
    pub force_v5: bool,
    pub force_xnod: bool,
    pub force_compress: bool,

    /// Set from another thread to stop the build.
    pub cancelled: Arc<AtomicBool>,

    pub total_failed_maps: usize,
    pub total_warnings: usize,
}

impl Default for BuildInfo {
    fn default() -> Self {
        BuildInfo {
            factor: DEFAULT_FACTOR,
            gl_nodes: true,
            do_blockmap: true,
            do_reject: true,
            fast: false,
            warnings: false,
            force_v5: false,
            force_xnod: false,
            force_compress: false,
            cancelled: Arc::new(AtomicBool::new(false)),
            total_failed_maps: 0,
            total_warnings: 0,
        }
    }
}

/*------------------------- results ----------------------------------*/

/// Per-map outcome codes, for hosts aggregating across maps and
/// serializers.  The core itself only produces the first two.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildResult {
    Ok,
    Cancelled,
    /// The container file was corrupt, empty, or unreadable (writer).
    BadFile,
    /// One or more output lumps overflowed while saving (writer).
    LumpOverflow,
}

pub enum BuildOutcome {
    Built(BspData),
    /// The host raised the cancellation flag; partial output discarded.
    Cancelled,
}

impl BuildOutcome {
    pub fn result(&self) -> BuildResult {
        match self {
            BuildOutcome::Built(_) => BuildResult::Ok,
            BuildOutcome::Cancelled => BuildResult::Cancelled,
        }
    }

    pub fn built(self) -> Option<BspData> {
        match self {
            BuildOutcome::Built(bsp) => Some(bsp),
            BuildOutcome::Cancelled => None,
        }
    }
}

/// Invariant violations.  Any of these aborts the map (the host moves
/// on to the next one); they are never expected on sane input.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("seg {start:?} -> {end:?} has zero length")]
    ZeroLengthSeg { start: DVec2, end: DVec2 },

    #[error("partner invariant broken on seg #{0}")]
    PartnerMismatch(SegId),

    #[error("bad order in intersection list: {prev:.3} > {next:.3}")]
    BadIntersectionOrder { prev: f64, next: f64 },

    #[error("separated seg list has an empty {0} side")]
    EmptySide(&'static str),

    #[error("partition seg is a miniseg")]
    BadPartition,

    #[error("subsector #{0} has no real seg")]
    NoRealSeg(SubsecId),

    #[error("subsector #{subsec} {pass} to being empty")]
    EmptySubsector {
        subsec: SubsecId,
        pass: &'static str,
    },

    #[error("subsector #{0} rounded off with no real segs")]
    RoundedNoReal(SubsecId),
}

/// Internal unwinding: cancellation is not an error, but it travels the
/// same road out of the recursion.
pub(crate) enum BuildAbort {
    Cancelled,
    Fatal(BuildError),
}

impl From<BuildError> for BuildAbort {
    fn from(err: BuildError) -> Self {
        BuildAbort::Fatal(err)
    }
}

/*------------------------- output -----------------------------------*/

/// Everything one build produces.  Seg membership in a subsector goes
/// through `Subsec::seg_list` (see [`BspData::subsec_segs`]); a seg's
/// `index` gives its final serialization order.
pub struct BspData {
    pub vertices: Vec<Vertex>,
    pub segs: Vec<Seg>,
    pub subsecs: Vec<Subsec>,
    pub nodes: Vec<Node>,
    pub root: Option<Child>,

    pub num_old_vert: usize,
    pub num_new_vert: usize,
    pub num_complete_seg: usize,
    pub bsp_height: usize,
}

impl BspData {
    pub(crate) fn empty() -> Self {
        BspData {
            vertices: Vec::new(),
            segs: Vec::new(),
            subsecs: Vec::new(),
            nodes: Vec::new(),
            root: None,
            num_old_vert: 0,
            num_new_vert: 0,
            num_complete_seg: 0,
            bsp_height: 0,
        }
    }

    /// The segs of one subsector, in final (clockwise) order.
    pub fn subsec_segs(&self, sub: SubsecId) -> SegListIter<'_> {
        self.subsecs[sub].seg_list.iter(&self.segs)
    }
}

/*------------------------- entry point ------------------------------*/

/// Build the BSP for one map.
///
/// Returns `Ok(Built(..))` with the four output arrays, or
/// `Ok(Cancelled)` when the host raised the flag in `info.cancelled`.
/// A fatal invariant violation comes back as `Err`, with
/// `info.total_failed_maps` already bumped; soft anomalies only count
/// into `info.total_warnings`.
pub fn build_level(data: &LevelData, info: &mut BuildInfo) -> Result<BuildOutcome, BuildError> {
    match build_level_inner(data, info) {
        Ok(bsp) => Ok(BuildOutcome::Built(bsp)),
        Err(BuildAbort::Cancelled) => Ok(BuildOutcome::Cancelled),
        Err(BuildAbort::Fatal(err)) => {
            info.total_failed_maps += 1;
            Err(err)
        }
    }
}

fn build_level_inner(data: &LevelData, info: &mut BuildInfo) -> Result<BspData, BuildAbort> {
    let mut ctx = BuildContext::new(data, info);

    ctx.load_geometry();

    if ctx.cancelled() {
        return Err(BuildAbort::Cancelled);
    }

    let list = ctx.create_segs()?;

    let root = if list.is_empty() {
        None
    } else {
        Some(ctx.build_nodes(list, 0)?.0)
    };
    ctx.lev.root = root;

    ctx.clockwise_bsp_tree()?;

    if !ctx.info.gl_nodes {
        ctx.lev.normalise()?;
        ctx.lev.round_off()?;
    }

    let mut bsp = ctx.finish();
    bsp.bsp_height = bsp.root.map_or(0, |child| bsp.height_of(child));

    info!(
        "Built {} NODES, {} SSECTORS, {} SEGS, {} VERTEXES",
        bsp.nodes.len(),
        bsp.subsecs.len(),
        bsp.num_complete_seg,
        bsp.vertices.len()
    );

    if let Some(Child::Node(root)) = bsp.root {
        let node = &bsp.nodes[root];
        info!(
            "Heights of subtrees: {} / {}",
            bsp.height_of(node.right.child),
            bsp.height_of(node.left.child)
        );
    }

    Ok(bsp)
}
