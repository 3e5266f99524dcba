use glam::{DVec2, IVec2};

use crate::level::VertexId;

pub type SubsecId = usize;
pub type NodeId = usize;

/// Distance below which a point counts as lying *on* a line.  Chosen so
/// two-column-pixel geometry does not generate phantom crossings.
pub const DIST_EPSILON: f64 = 0.02;

/// Angular tolerance, in degrees.
pub const ANG_EPSILON: f64 = 1.0e-4;

/// Segs closer than this to a partition end get the near-miss surcharge,
/// and quadtree boxes are inflated by it when classified against a line.
pub const IFFY_LEN: f64 = 4.0;

/// Partitions at least this long risk integer overflow in the classic
/// NODES encoding.
pub const TOO_LONG_LEN: f64 = 30000.0;

/// Angle of the line from the origin to `d`, in degrees.
/// Range [0, 360); 0 is east, 90 is north.
pub fn compute_angle(d: DVec2) -> f64 {
    let mut angle = d.y.atan2(d.x).to_degrees();
    if angle < 0.0 {
        angle += 360.0;
    }
    angle
}

/*---------------------------- sides ---------------------------------*/

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Left,
    /// On the line (or, for a box test, straddling it).
    On,
    Right,
}

impl Side {
    #[inline]
    pub fn flip(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::On => Side::On,
            Side::Right => Side::Left,
        }
    }
}

/*--------------------------- wall-tips ------------------------------*/

/// Where a wall meets a vertex: the outgoing angle plus the open/closed
/// state of each adjacent half-plane.  `open_left` is the side of
/// increasing angles, `open_right` the side of decreasing angles.
#[derive(Clone, Copy, Debug)]
pub struct WallTip {
    pub angle: f64,
    pub open_left: bool,
    pub open_right: bool,
}

/*--------------------------- vertices -------------------------------*/

#[derive(Clone, Debug)]
pub struct Vertex {
    pub pos: DVec2,
    /// Stable output index.  Input vertices keep theirs; split-born ones
    /// are renumbered during round-off.
    pub index: usize,
    /// Born from a seg split; cleared at final round-off.
    pub is_new: bool,
    /// Canonical vertex at the same location, when this one duplicates
    /// an earlier vertex.
    pub overlap: Option<VertexId>,
    /// Kept sorted by ascending angle (anti-clockwise order).
    pub tips: Vec<WallTip>,
}

/*------------------------ bounding boxes ----------------------------*/

/// Inclusive integer bounding box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Bounds {
    pub min: IVec2,
    pub max: IVec2,
}

/*--------------------------- subsectors -----------------------------*/

#[derive(Clone, Debug)]
pub struct Subsec {
    pub seg_list: super::seg::SegList,
    pub seg_count: usize,
    pub index: usize,
    /// Approximate middle point, the pivot for clockwise ordering.
    pub mid: DVec2,
}

/*----------------------------- nodes --------------------------------*/

/// Either branch of an internal node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Child {
    Node(NodeId),
    Subsec(SubsecId),
}

#[derive(Clone, Copy, Debug)]
pub struct ChildLink {
    pub child: Child,
    pub bounds: Bounds,
}

/// Internal BSP node.  Partition coordinates are doubles to support
/// UDMF input; on non-UDMF maps they are integral, since a partition
/// always comes from a normal linedef.
#[derive(Clone, Debug)]
pub struct Node {
    pub pos: DVec2,
    pub delta: DVec2,
    pub right: ChildLink,
    pub left: ChildLink,
    /// Partition overflows the 16-bit deltas of the classic encoding.
    pub too_long: bool,
}

/*====================================================================*/
/*                               Tests                                */
/*====================================================================*/
