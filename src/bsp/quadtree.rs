use glam::IVec2;

use super::seg::{Seg, SegList};
use super::types::{Bounds, Side, IFFY_LEN};
use super::SegId;

pub(crate) type CellId = usize;

/// Cells at most this big (in map units) stay leaves.
const LEAF_SIZE: i32 = 320;

/// One cell of the seg quadtree.  The box is fully inclusive, from the
/// lower-left to the upper-right corner.  Division always happens along
/// the longer axis, at its midpoint.
#[derive(Clone, Debug)]
pub(crate) struct QuadCell {
    pub min: IVec2,
    pub max: IVec2,

    /// Sub-cells; `None` for leaves.  `[0]` has the lower coordinates.
    pub subs: Option<[CellId; 2]>,

    /// Counts of real/mini segs in this cell AND all descendants.
    pub real_num: usize,
    pub mini_num: usize,

    /// Segs that do not fit in a single child.
    pub list: SegList,
}

/// Spatial index over the current seg set.  Owns its cells in an arena
/// (recycled between recursion steps through the build context); segs
/// stay in the level arena and are only threaded through cell lists.
pub(crate) struct QuadTree {
    pub cells: Vec<QuadCell>,
}

impl QuadTree {
    pub const ROOT: CellId = 0;

    pub fn new(store: Vec<QuadCell>, bounds: Bounds) -> QuadTree {
        let mut tree = QuadTree { cells: store };
        tree.subdivide(bounds.min, bounds.max);
        tree
    }

    pub fn into_store(self) -> Vec<QuadCell> {
        self.cells
    }

    fn subdivide(&mut self, min: IVec2, max: IVec2) -> CellId {
        let id = self.cells.len();
        self.cells.push(QuadCell {
            min,
            max,
            subs: None,
            real_num: 0,
            mini_num: 0,
            list: SegList::default(),
        });

        let d = max - min;

        if d.x <= LEAF_SIZE && d.y <= LEAF_SIZE {
            return id;
        }

        let subs = if d.x >= d.y {
            let mid = min.x + d.x / 2;
            [
                self.subdivide(min, IVec2::new(mid, max.y)),
                self.subdivide(IVec2::new(mid, min.y), max),
            ]
        } else {
            let mid = min.y + d.y / 2;
            [
                self.subdivide(min, IVec2::new(max.x, mid)),
                self.subdivide(IVec2::new(min.x, mid), max),
            ]
        };

        self.cells[id].subs = Some(subs);
        id
    }

    #[inline]
    pub fn is_empty(&self, cell: CellId) -> bool {
        let c = &self.cells[cell];
        c.real_num + c.mini_num == 0
    }

    /// Sink a seg to the deepest cell that fully contains it, bumping
    /// the counts of every cell passed on the way down.
    pub fn add_seg(&mut self, segs: &mut [Seg], seg_id: SegId) {
        let is_real = segs[seg_id].linedef.is_some();
        let (ps, pe) = (segs[seg_id].ps, segs[seg_id].pe);

        let mut cur = Self::ROOT;
        loop {
            if is_real {
                self.cells[cur].real_num += 1;
            } else {
                self.cells[cur].mini_num += 1;
            }

            if let Some([lo, hi]) = self.cells[cur].subs {
                let d = self.cells[cur].max - self.cells[cur].min;
                let split_on_x = d.x >= d.y;

                if split_on_x {
                    let x_min = ps.x.min(pe.x);
                    let x_max = ps.x.max(pe.x);
                    if x_min > self.cells[hi].min.x as f64 {
                        cur = hi;
                        continue;
                    } else if x_max < self.cells[lo].max.x as f64 {
                        cur = lo;
                        continue;
                    }
                } else {
                    let y_min = ps.y.min(pe.y);
                    let y_max = ps.y.max(pe.y);
                    if y_min > self.cells[hi].min.y as f64 {
                        cur = hi;
                        continue;
                    } else if y_max < self.cells[lo].max.y as f64 {
                        cur = lo;
                        continue;
                    }
                }
            }

            // straddles both children (or leaf): keep it here
            self.cells[cur].list.push(segs, seg_id);
            segs[seg_id].quad = Some(cur);
            return;
        }
    }

    pub fn add_list(&mut self, segs: &mut [Seg], mut list: SegList) {
        while let Some(id) = list.pop(segs) {
            self.add_seg(segs, id);
        }
    }

    /// Pour every seg out of the tree into `out` (prepending), leaving
    /// the tree empty.
    pub fn convert_to_list(&mut self, segs: &mut [Seg], out: &mut SegList) {
        self.convert_cell(Self::ROOT, segs, out);
    }

    fn convert_cell(&mut self, cell: CellId, segs: &mut [Seg], out: &mut SegList) {
        while let Some(id) = self.cells[cell].list.pop(segs) {
            segs[id].quad = None;
            out.push(segs, id);
        }

        if let Some([lo, hi]) = self.cells[cell].subs {
            self.convert_cell(lo, segs, out);
            self.convert_cell(hi, segs, out);
        }
    }

    /// Relationship between a cell's box and the infinite line through
    /// `part`: a definite side, or `On` when the line meets the box.
    /// The box is inflated by IFFY_LEN so boxes merely touching the line
    /// never count as cleanly on one side.
    pub fn on_line_side(&self, cell: CellId, part: &Seg) -> Side {
        let c = &self.cells[cell];

        let tx1 = c.min.x as f64 - IFFY_LEN;
        let ty1 = c.min.y as f64 - IFFY_LEN;
        let tx2 = c.max.x as f64 + IFFY_LEN;
        let ty2 = c.max.y as f64 + IFFY_LEN;

        let (mut p1, mut p2);

        if part.pd.x == 0.0 {
            // vertical partition
            p1 = if tx1 > part.ps.x { Side::Right } else { Side::Left };
            p2 = if tx2 > part.ps.x { Side::Right } else { Side::Left };

            if part.pd.y < 0.0 {
                p1 = p1.flip();
                p2 = p2.flip();
            }
        } else if part.pd.y == 0.0 {
            // horizontal partition
            p1 = if ty1 < part.ps.y { Side::Right } else { Side::Left };
            p2 = if ty2 < part.ps.y { Side::Right } else { Side::Left };

            if part.pd.x < 0.0 {
                p1 = p1.flip();
                p2 = p2.flip();
            }
        } else if part.pd.x * part.pd.y > 0.0 {
            // positive slope: test the NW and SE corners
            p1 = part.point_side(glam::DVec2::new(tx1, ty2));
            p2 = part.point_side(glam::DVec2::new(tx2, ty1));
        } else {
            // negative slope: test the SW and NE corners
            p1 = part.point_side(glam::DVec2::new(tx1, ty1));
            p2 = part.point_side(glam::DVec2::new(tx2, ty2));
        }

        if p1 != p2 {
            return Side::On;
        }
        p1
    }
}

/*====================================================================*/
/*                               Tests                                */
/*====================================================================*/
