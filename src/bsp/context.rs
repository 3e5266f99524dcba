use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, warn};

use crate::level::{LevelData, LinedefFlags, SectorId, VertexId};

use super::divide::Cut;
use super::quadtree::QuadCell;
use super::types::Vertex;
use super::{BspData, BuildInfo};

/// Tag which implies a precious linedef even without the flag bit.
const PRECIOUS_TAG: i32 = 900;

/*------------------------- per-line table ---------------------------*/

/// What a sidedef reference resolves to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SideRef {
    /// No sidedef on this side.
    Absent,
    /// Sidedef exists but its sector index is out of range.
    Bad,
    Sector(SectorId),
}

impl SideRef {
    #[inline]
    pub fn exists(self) -> bool {
        !matches!(self, SideRef::Absent)
    }

    /// The side borders real, passable space.
    #[inline]
    pub fn is_open(self) -> bool {
        matches!(self, SideRef::Sector(_))
    }

    #[inline]
    pub fn sector(self) -> Option<SectorId> {
        match self {
            SideRef::Sector(s) => Some(s),
            _ => None,
        }
    }
}

/// Everything the builder needs to know about one linedef, resolved once
/// up front.  Endpoints are canonical (overlapping vertices merged).
#[derive(Clone, Debug)]
pub(crate) struct BuildLine {
    pub start: VertexId,
    pub end: VertexId,
    pub special: u16,
    pub two_sided: bool,
    pub right: SideRef,
    pub left: SideRef,
    pub precious: bool,
    pub overlap: bool,
    pub zero_length: bool,
    pub self_ref: bool,
    pub length: f64,
}

/*------------------------- build context ----------------------------*/

/// All mutable state of one build.  Nothing survives outside of it; the
/// output arrays are moved out by [`BuildContext::finish`].
pub(crate) struct BuildContext<'a> {
    pub data: &'a LevelData,
    pub info: &'a mut BuildInfo,
    pub lev: BspData,
    pub lines: Vec<BuildLine>,

    /// Quick-alloc pool for intersection records.
    spare_cuts: Option<Vec<Cut>>,
    /// Quick-alloc pool backing the (single live) quadtree.
    quad_store: Option<Vec<QuadCell>>,

    cancelled: Arc<AtomicBool>,
}

impl<'a> BuildContext<'a> {
    pub fn new(data: &'a LevelData, info: &'a mut BuildInfo) -> Self {
        let cancelled = Arc::clone(&info.cancelled);
        BuildContext {
            data,
            info,
            lev: BspData::empty(),
            lines: Vec::new(),
            spare_cuts: None,
            quad_store: None,
            cancelled,
        }
    }

    #[inline]
    pub fn cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Soft anomaly: counted and logged, never fatal.  The `warnings`
    /// switch only controls how loudly they surface.
    pub fn warning(&mut self, args: fmt::Arguments<'_>) {
        self.info.total_warnings += 1;

        if self.info.warnings {
            warn!("{args}");
        } else {
            debug!("{args}");
        }
    }

    /*---------------- geometry load -------------------*/

    /// Copy the input vertices, resolve overlaps, build the per-line
    /// table and the wall-tips, and mark polyobject sectors.
    pub fn load_geometry(&mut self) {
        for (i, v) in self.data.vertices.iter().enumerate() {
            self.lev.vertices.push(Vertex {
                pos: v.pos(),
                index: i,
                is_new: false,
                overlap: None,
                tips: Vec::new(),
            });
        }
        self.lev.num_old_vert = self.lev.vertices.len();

        self.detect_overlapping_vertices();
        self.build_line_table();
        self.detect_overlapping_lines();
        self.calculate_wall_tips();

        if self.data.format == crate::level::MapFormat::Hexen {
            self.detect_polyobj_sectors();
        }
    }

    fn build_line_table(&mut self) {
        let data = self.data;

        let side_ref = |sd: Option<usize>| match sd {
            None => SideRef::Absent,
            Some(idx) => match data.sidedefs.get(idx) {
                Some(side) if data.is_sector(side.sector) => {
                    SideRef::Sector(side.sector as SectorId)
                }
                _ => SideRef::Bad,
            },
        };

        for ld in &data.linedefs {
            let start = self.canonical_vertex(ld.start);
            let end = self.canonical_vertex(ld.end);

            self.lines.push(BuildLine {
                start,
                end,
                special: ld.special,
                two_sided: ld.flags.contains(LinedefFlags::TWO_SIDED),
                right: side_ref(ld.right),
                left: side_ref(ld.left),
                precious: ld.flags.contains(LinedefFlags::IS_PRECIOUS) || ld.tag >= PRECIOUS_TAG,
                overlap: ld.flags.contains(LinedefFlags::IS_OVERLAP),
                zero_length: ld.is_zero_length(&data.vertices),
                self_ref: ld.is_self_ref(&data.sidedefs),
                length: ld.length(&data.vertices),
            });
        }
    }

    /// Follow the overlap link to the canonical vertex at this location.
    pub fn canonical_vertex(&self, v: VertexId) -> VertexId {
        self.lev.vertices[v].overlap.unwrap_or(v)
    }

    /*---------------- quick-alloc pools ---------------*/

    pub fn take_cuts(&mut self) -> Vec<Cut> {
        self.spare_cuts.take().unwrap_or_default()
    }

    pub fn free_cuts(&mut self, mut cuts: Vec<Cut>) {
        cuts.clear();
        self.spare_cuts = Some(cuts);
    }

    pub fn take_quad_store(&mut self) -> Vec<QuadCell> {
        self.quad_store.take().unwrap_or_default()
    }

    pub fn free_quad_store(&mut self, mut cells: Vec<QuadCell>) {
        cells.clear();
        self.quad_store = Some(cells);
    }

    /*---------------- finish --------------------------*/

    pub fn finish(self) -> BspData {
        self.lev
    }
}
