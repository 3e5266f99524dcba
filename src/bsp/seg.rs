use glam::DVec2;

use crate::level::{LinedefId, VertexId};

use super::context::{BuildContext, SideRef};
use super::quadtree::CellId;
use super::types::{Side, Vertex, DIST_EPSILON, TOO_LONG_LEN};
use super::{BuildError, SegId};

/// A sub-segment of a linedef, or a bridging miniseg.  Lives in a stable
/// arena; list membership goes through the intrusive `next` index, since
/// a seg migrates from quadtree cell to cell to subsector.
#[derive(Clone, Debug)]
pub struct Seg {
    pub start: VertexId,
    pub end: VertexId,

    /// Linedef this seg goes along; `None` for a miniseg.
    pub linedef: Option<LinedefId>,
    /// 0 for right, 1 for left.  Meaningless for minisegs.
    pub side: u16,

    /// Seg on the other side of the linedef, or `None` if one-sided.
    /// Strictly one-to-one: splitting one seg always splits its partner.
    pub partner: Option<SegId>,

    /// Link for whichever list currently holds this seg.
    pub next: Option<SegId>,

    /// Final output index; assigned once the seg lands in a subsector,
    /// cleared again when a post-pass removes it.
    pub index: Option<usize>,

    /// Integer rounding of start and end produced the same point.
    pub is_degenerate: bool,

    /// Quadtree cell currently holding this seg, `None` once it has
    /// reached a subsector.
    pub(crate) quad: Option<CellId>,

    /// Linedef this seg initially comes from: same as `linedef` for real
    /// segs, the partition's linedef for minisegs.  Keeps the picker from
    /// scoring a partition against its own minisegs.
    pub source_line: Option<LinedefId>,

    // precomputed geometry, kept in step by `recompute`
    pub ps: DVec2,
    pub pe: DVec2,
    pub pd: DVec2,
    pub p_length: f64,
    pub p_para: f64,
    pub p_perp: f64,
}

impl Seg {
    pub(crate) fn new(start: VertexId, end: VertexId) -> Seg {
        Seg {
            start,
            end,
            linedef: None,
            side: 0,
            partner: None,
            next: None,
            index: None,
            is_degenerate: false,
            quad: None,
            source_line: None,
            ps: DVec2::ZERO,
            pe: DVec2::ZERO,
            pd: DVec2::ZERO,
            p_length: 0.0,
            p_para: 0.0,
            p_perp: 0.0,
        }
    }

    #[inline]
    pub fn is_mini(&self) -> bool {
        self.linedef.is_none()
    }

    /// Refresh the precomputed fields after an endpoint change.
    pub fn recompute(&mut self, vertices: &[Vertex]) -> Result<(), BuildError> {
        self.ps = vertices[self.start].pos;
        self.pe = vertices[self.end].pos;
        self.pd = self.pe - self.ps;

        self.p_length = self.pd.length();
        if self.p_length <= 0.0 {
            return Err(BuildError::ZeroLengthSeg {
                start: self.ps,
                end: self.pe,
            });
        }

        self.p_perp = self.pd.perp_dot(self.ps);
        self.p_para = -self.ps.dot(self.pd);
        Ok(())
    }

    /// Signed distance along this seg's line from its start point.
    #[inline]
    pub fn parallel_dist(&self, p: DVec2) -> f64 {
        (p.dot(self.pd) + self.p_para) / self.p_length
    }

    /// Signed perpendicular distance from this seg's infinite line;
    /// positive on the right side, negative on the left.
    #[inline]
    pub fn perp_dist(&self, p: DVec2) -> f64 {
        (p.perp_dot(self.pd) + self.p_perp) / self.p_length
    }

    pub fn point_side(&self, p: DVec2) -> Side {
        let perp = self.perp_dist(p);

        if perp.abs() <= DIST_EPSILON {
            Side::On
        } else if perp < 0.0 {
            Side::Left
        } else {
            Side::Right
        }
    }
}

/*------------------------- intrusive lists --------------------------*/

/// Head of a singly-linked list threaded through `Seg::next`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SegList {
    pub head: Option<SegId>,
}

impl SegList {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Prepend a seg.
    #[inline]
    pub fn push(&mut self, segs: &mut [Seg], id: SegId) {
        segs[id].next = self.head;
        self.head = Some(id);
    }

    /// Detach and return the head seg (its `next` link is left stale).
    #[inline]
    pub fn pop(&mut self, segs: &[Seg]) -> Option<SegId> {
        let id = self.head?;
        self.head = segs[id].next;
        Some(id)
    }

    pub fn iter<'a>(&self, segs: &'a [Seg]) -> SegListIter<'a> {
        SegListIter {
            segs,
            cur: self.head,
        }
    }
}

pub struct SegListIter<'a> {
    segs: &'a [Seg],
    cur: Option<SegId>,
}

impl Iterator for SegListIter<'_> {
    type Item = SegId;

    fn next(&mut self) -> Option<SegId> {
        let id = self.cur?;
        self.cur = self.segs[id].next;
        Some(id)
    }
}

/*------------------------- seg creation -----------------------------*/

impl BuildContext<'_> {
    pub(crate) fn push_seg(&mut self, seg: Seg) -> SegId {
        self.lev.segs.push(seg);
        self.lev.segs.len() - 1
    }

    fn create_one_seg(
        &mut self,
        line: LinedefId,
        start: VertexId,
        end: VertexId,
        what_side: u16,
    ) -> Result<SegId, BuildError> {
        let mut seg = Seg::new(start, end);
        seg.linedef = Some(line);
        seg.side = what_side;
        seg.source_line = Some(line);
        seg.recompute(&self.lev.vertices)?;
        Ok(self.push_seg(seg))
    }

    /// Initially create all segs, one per sided linedef instance, and
    /// link partners.
    pub(crate) fn create_segs(&mut self) -> Result<SegList, BuildError> {
        let mut list = SegList::default();

        for i in 0..self.lines.len() {
            let line = self.lines[i].clone();

            if line.zero_length {
                self.warning(format_args!("Linedef #{i} has zero length, skipping"));
                continue;
            }

            if line.overlap {
                self.warning(format_args!(
                    "Linedef #{i} overlaps an earlier one, skipping"
                ));
                continue;
            }

            if line.length >= TOO_LONG_LEN {
                self.warning(format_args!(
                    "Linedef #{i} is VERY long, it may cause problems"
                ));
            }

            let mut right = None;

            if line.right.exists() {
                if line.right == SideRef::Bad {
                    self.warning(format_args!("Bad right sidedef on linedef #{i}"));
                }
                let seg = self.create_one_seg(i, line.start, line.end, 0)?;
                list.push(&mut self.lev.segs, seg);
                right = Some(seg);
            } else {
                self.warning(format_args!("Linedef #{i} has no right sidedef!"));
            }

            if line.left.exists() {
                if line.left == SideRef::Bad {
                    self.warning(format_args!("Bad left sidedef on linedef #{i}"));
                }
                let seg = self.create_one_seg(i, line.end, line.start, 1)?;
                list.push(&mut self.lev.segs, seg);

                if let Some(right) = right {
                    // Partner segs: one-to-one correspondence, so when
                    // one gets split the other must be split too.
                    self.lev.segs[seg].partner = Some(right);
                    self.lev.segs[right].partner = Some(seg);
                }
            } else if line.two_sided {
                self.warning(format_args!("Linedef #{i} is 2s but has no left sidedef"));
            }
        }

        Ok(list)
    }
}

/*====================================================================*/
/*                               Tests                                */
/*====================================================================*/

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(x: f64, y: f64) -> Vertex {
        Vertex {
            pos: DVec2::new(x, y),
            index: 0,
            is_new: false,
            overlap: None,
            tips: Vec::new(),
        }
    }

    fn seg_between(vertices: &[Vertex], start: VertexId, end: VertexId) -> Seg {
        let mut seg = Seg::new(start, end);
        seg.recompute(vertices).unwrap();
        seg
    }

    #[test]
    fn distances_along_an_axis_seg() {
        let vertices = [vertex(10.0, 0.0), vertex(10.0, 50.0)];
        let seg = seg_between(&vertices, 0, 1);

        // northbound seg: east is its right side
        assert_eq!(seg.perp_dist(DVec2::new(14.0, 25.0)), 4.0);
        assert_eq!(seg.perp_dist(DVec2::new(6.0, 99.0)), -4.0);
        assert_eq!(seg.parallel_dist(DVec2::new(10.0, 30.0)), 30.0);

        assert_eq!(seg.point_side(DVec2::new(11.0, 0.0)), Side::Right);
        assert_eq!(seg.point_side(DVec2::new(9.0, 0.0)), Side::Left);
        assert_eq!(seg.point_side(DVec2::new(10.01, 7.0)), Side::On);
    }

    #[test]
    fn zero_length_seg_is_fatal() {
        let vertices = [vertex(5.0, 5.0), vertex(5.0, 5.0)];
        let mut seg = Seg::new(0, 1);
        assert!(matches!(
            seg.recompute(&vertices),
            Err(BuildError::ZeroLengthSeg { .. })
        ));
    }

    #[test]
    fn list_push_pop_order() {
        let vertices = [vertex(0.0, 0.0), vertex(1.0, 0.0)];
        let mut segs = vec![
            seg_between(&vertices, 0, 1),
            seg_between(&vertices, 0, 1),
            seg_between(&vertices, 0, 1),
        ];

        let mut list = SegList::default();
        for id in 0..3 {
            list.push(&mut segs, id);
        }
        assert_eq!(list.iter(&segs).collect::<Vec<_>>(), vec![2, 1, 0]);

        assert_eq!(list.pop(&segs), Some(2));
        assert_eq!(list.iter(&segs).collect::<Vec<_>>(), vec![1, 0]);
    }
}
