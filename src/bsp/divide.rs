use glam::DVec2;
use log::debug;

use crate::level::VertexId;

use super::context::BuildContext;
use super::quadtree::{CellId, QuadTree};
use super::seg::{Seg, SegList};
use super::types::DIST_EPSILON;
use super::{BuildError, SegId};

/// A vertex touching the current partition line (often one created at a
/// seg split).  The list is kept sorted by `along_dist`, ascending.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Cut {
    pub vertex: VertexId,
    /// How far along the partition the vertex sits: zero at the
    /// partition seg's start, positive in its direction.
    pub along_dist: f64,
    /// The crossing seg came from a self-referencing linedef.
    pub self_ref: bool,
    /// Open-ness of the space just behind / ahead of the vertex, along
    /// the partition.
    pub open_before: bool,
    pub open_after: bool,
}

/// Forced-closed override recorded by segs lying on the partition, so a
/// seg *on* the line never opens an otherwise-closed gap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Force {
    None,
    Before,
    After,
}

impl BuildContext<'_> {
    /*---------------- intersection list ---------------*/

    pub(crate) fn add_intersection(
        &mut self,
        cuts: &mut Vec<Cut>,
        vertex: VertexId,
        part: &Seg,
        self_ref: bool,
        force: Force,
    ) {
        let mut open_before = self.vertex_check_open(vertex, -part.pd);
        let mut open_after = self.vertex_check_open(vertex, part.pd);

        if force == Force::Before {
            open_before = false;
        }
        if force == Force::After {
            open_after = false;
        }

        let along_dist = part.parallel_dist(self.lev.vertices[vertex].pos);

        /* merge with an existing record? */
        for cut in cuts.iter_mut() {
            if cut.vertex == vertex {
                match force {
                    Force::Before => cut.open_before = false,
                    Force::After => cut.open_after = false,
                    Force::None => {}
                }
                return;
            }

            if (along_dist - cut.along_dist).abs() < DIST_EPSILON {
                // an OPEN aspect always overrides a CLOSED one (a
                // mismatch only occurs on broken geometry), except
                // against a forced override
                if open_before {
                    cut.open_before = true;
                }
                if open_after {
                    cut.open_after = true;
                }
                match force {
                    Force::Before => cut.open_before = false,
                    Force::After => cut.open_after = false,
                    Force::None => {}
                }
                return;
            }
        }

        let at = cuts
            .iter()
            .position(|c| along_dist < c.along_dist)
            .unwrap_or(cuts.len());
        cuts.insert(
            at,
            Cut {
                vertex,
                along_dist,
                self_ref,
                open_before,
                open_after,
            },
        );
    }

    /*---------------- splitting -----------------------*/

    /// Split `old` at `p`.  The old seg is shortened (its start vertex
    /// is unchanged) and the new seg becomes the cut-off tail.  The
    /// partner, if any, is split at the same point, and the new partner
    /// piece is spliced into the same list right after it -- so all
    /// segs except the one being split must currently sit on a list.
    pub(crate) fn split_seg(&mut self, old: SegId, p: DVec2) -> Result<SegId, BuildError> {
        debug!(
            "Splitting seg (linedef {:?}) at ({:.1}, {:.1})",
            self.lev.segs[old].linedef, p.x, p.y
        );

        let new_vert = self.new_vertex_from_split_seg(old, p);

        let mut copy = self.lev.segs[old].clone();
        copy.next = None;
        let new = self.push_seg(copy);

        self.lev.segs[old].end = new_vert;
        self.recompute_seg(old)?;

        self.lev.segs[new].start = new_vert;
        self.recompute_seg(new)?;

        if let Some(partner) = self.lev.segs[old].partner {
            // copy keeps the partner's `next`, splicing the new piece
            // into whatever list the partner is on
            let partner_copy = self.lev.segs[partner].clone();
            let new_partner = self.push_seg(partner_copy);

            // keep the partner relationship valid
            self.lev.segs[new_partner].partner = Some(new);
            self.lev.segs[new].partner = Some(new_partner);

            self.lev.segs[partner].start = new_vert;
            self.recompute_seg(partner)?;

            self.lev.segs[new_partner].end = new_vert;
            self.recompute_seg(new_partner)?;

            self.lev.segs[partner].next = Some(new_partner);
        }

        Ok(new)
    }

    fn recompute_seg(&mut self, id: SegId) -> Result<(), BuildError> {
        let vertices = &self.lev.vertices;
        self.lev.segs[id].recompute(vertices)
    }

    /*---------------- separation ----------------------*/

    /// Route one seg to the left or right list (splitting when it
    /// crosses the partition), recording intersections on the way.
    /// Follows the exact same case logic as the partition evaluator.
    pub(crate) fn divide_one_seg(
        &mut self,
        seg_id: SegId,
        part: &Seg,
        lefts: &mut SegList,
        rights: &mut SegList,
        cuts: &mut Vec<Cut>,
    ) -> Result<(), BuildError> {
        let seg = self.lev.segs[seg_id].clone();

        let self_ref = seg.linedef.is_some_and(|ld| self.lines[ld].self_ref);

        let (a, b) = if seg.source_line == part.source_line {
            (0.0, 0.0)
        } else {
            (part.perp_dist(seg.ps), part.perp_dist(seg.pe))
        };

        /* on the same line as the partition */
        if a.abs() <= DIST_EPSILON && b.abs() <= DIST_EPSILON {
            self.add_intersection(cuts, seg.start, part, self_ref, Force::After);
            self.add_intersection(cuts, seg.end, part, self_ref, Force::Before);

            // direction decides the side
            if seg.pd.dot(part.pd) < 0.0 {
                lefts.push(&mut self.lev.segs, seg_id);
            } else {
                rights.push(&mut self.lev.segs, seg_id);
            }
            return Ok(());
        }

        /* wholly on the right side */
        if a > -DIST_EPSILON && b > -DIST_EPSILON {
            if a < DIST_EPSILON {
                self.add_intersection(cuts, seg.start, part, self_ref, Force::None);
            } else if b < DIST_EPSILON {
                self.add_intersection(cuts, seg.end, part, self_ref, Force::None);
            }
            rights.push(&mut self.lev.segs, seg_id);
            return Ok(());
        }

        /* wholly on the left side */
        if a < DIST_EPSILON && b < DIST_EPSILON {
            if a > -DIST_EPSILON {
                self.add_intersection(cuts, seg.start, part, self_ref, Force::None);
            } else if b > -DIST_EPSILON {
                self.add_intersection(cuts, seg.end, part, self_ref, Force::None);
            }
            lefts.push(&mut self.lev.segs, seg_id);
            return Ok(());
        }

        // a and b are non-zero and of opposite sign: split at the
        // intersection point
        let p = compute_intersection(&seg, part, a, b);
        let new = self.split_seg(seg_id, p)?;

        let mid_vert = self.lev.segs[seg_id].end;
        self.add_intersection(cuts, mid_vert, part, self_ref, Force::None);

        if a < 0.0 {
            lefts.push(&mut self.lev.segs, seg_id);
            rights.push(&mut self.lev.segs, new);
        } else {
            rights.push(&mut self.lev.segs, seg_id);
            lefts.push(&mut self.lev.segs, new);
        }

        Ok(())
    }

    /// Drain the whole tree, partitioning every seg into the left or
    /// right list and collecting intersections with the partition.
    pub(crate) fn separate_segs(
        &mut self,
        tree: &mut QuadTree,
        part: &Seg,
        lefts: &mut SegList,
        rights: &mut SegList,
        cuts: &mut Vec<Cut>,
    ) -> Result<(), BuildError> {
        self.separate_cell(tree, QuadTree::ROOT, part, lefts, rights, cuts)
    }

    fn separate_cell(
        &mut self,
        tree: &mut QuadTree,
        cell: CellId,
        part: &Seg,
        lefts: &mut SegList,
        rights: &mut SegList,
        cuts: &mut Vec<Cut>,
    ) -> Result<(), BuildError> {
        while let Some(seg_id) = tree.cells[cell].list.pop(&self.lev.segs) {
            self.lev.segs[seg_id].quad = None;
            self.divide_one_seg(seg_id, part, lefts, rights, cuts)?;
        }

        if let Some([lo, hi]) = tree.cells[cell].subs {
            self.separate_cell(tree, lo, part, lefts, rights, cuts)?;
            self.separate_cell(tree, hi, part, lefts, rights, cuts)?;
        }

        Ok(())
    }

    /*---------------- minisegs ------------------------*/

    /// Scan the sorted intersections and bridge every open gap along
    /// the partition with a miniseg pair.  The records go back onto the
    /// quick-alloc list afterwards.
    pub(crate) fn add_minisegs(
        &mut self,
        part: &Seg,
        lefts: &mut SegList,
        rights: &mut SegList,
        cuts: Vec<Cut>,
    ) -> Result<(), BuildError> {
        for w in cuts.windows(2) {
            let (cur, next) = (w[0], w[1]);

            let len = next.along_dist - cur.along_dist;
            if len < -0.01 {
                return Err(BuildError::BadIntersectionOrder {
                    prev: cur.along_dist,
                    next: next.along_dist,
                });
            }

            let a = cur.open_after;
            let b = next.open_before;

            // nothing possible if both ends are closed
            if !(a || b) {
                continue;
            }

            if a != b {
                // a mismatch indicates something wrong with the level
                // geometry; not worth a warning (self-referencing
                // tricks hit this all the time)
                continue;
            }

            // definite open space: create a miniseg pair
            let mut seg = Seg::new(cur.vertex, next.vertex);
            let mut buddy = Seg::new(next.vertex, cur.vertex);

            seg.source_line = part.linedef;
            buddy.source_line = part.linedef;
            seg.recompute(&self.lev.vertices)?;
            buddy.recompute(&self.lev.vertices)?;

            let seg = self.push_seg(seg);
            let buddy = self.push_seg(buddy);

            self.lev.segs[seg].partner = Some(buddy);
            self.lev.segs[buddy].partner = Some(seg);

            rights.push(&mut self.lev.segs, seg);
            lefts.push(&mut self.lev.segs, buddy);

            debug!(
                "AddMiniseg: ({:.1}, {:.1}) -> ({:.1}, {:.1})",
                self.lev.segs[seg].ps.x,
                self.lev.segs[seg].ps.y,
                self.lev.segs[seg].pe.x,
                self.lev.segs[seg].pe.y
            );
        }

        self.free_cuts(cuts);
        Ok(())
    }
}

/// Intersection of `seg` with the partition line, taking advantage of
/// the exact horizontal/vertical cases to kill slime trails.
fn compute_intersection(seg: &Seg, part: &Seg, perp_c: f64, perp_d: f64) -> DVec2 {
    // horizontal partition against vertical seg
    if part.pd.y == 0.0 && seg.pd.x == 0.0 {
        return DVec2::new(seg.ps.x, part.ps.y);
    }

    // vertical partition against horizontal seg
    if part.pd.x == 0.0 && seg.pd.y == 0.0 {
        return DVec2::new(part.ps.x, seg.ps.y);
    }

    // 0 = start, 1 = end
    let ds = perp_c / (perp_c - perp_d);

    let x = if seg.pd.x == 0.0 {
        seg.ps.x
    } else {
        seg.ps.x + seg.pd.x * ds
    };
    let y = if seg.pd.y == 0.0 {
        seg.ps.y
    } else {
        seg.ps.y + seg.pd.y * ds
    };

    DVec2::new(x, y)
}

/*====================================================================*/
/*                               Tests                                */
/*====================================================================*/

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsp::tests::fixtures::{diagonal_cross, self_ref_room};
    use crate::bsp::BuildInfo;

    /// Route every initial seg of `data` against the seg of `part_line`
    /// and return the context plus the routing results.
    fn separate_with_partition(
        data: &crate::level::LevelData,
        info: &mut BuildInfo,
        part_line: usize,
    ) -> (
        BuildContext<'static>,
        SegList,
        SegList,
        Vec<Cut>,
    ) {
        // leak the data so the context can borrow it for 'static; test
        // convenience only
        let data: &'static _ = Box::leak(Box::new(data.clone()));
        let info: &'static mut _ = Box::leak(Box::new(std::mem::take(info)));

        let mut ctx = BuildContext::new(data, info);
        ctx.load_geometry();
        let list = ctx.create_segs().unwrap();

        let part_id = list
            .iter(&ctx.lev.segs)
            .find(|&id| ctx.lev.segs[id].linedef == Some(part_line) && ctx.lev.segs[id].side == 0)
            .expect("partition seg exists");
        let part = ctx.lev.segs[part_id].clone();

        let bounds = ctx.find_limits(list);
        let mut tree = crate::bsp::quadtree::QuadTree::new(Vec::new(), bounds);
        tree.add_list(&mut ctx.lev.segs, list);

        let mut lefts = SegList::default();
        let mut rights = SegList::default();
        let mut cuts = Vec::new();
        ctx.separate_segs(&mut tree, &part, &mut lefts, &mut rights, &mut cuts)
            .unwrap();

        (ctx, lefts, rights, cuts)
    }

    #[test]
    fn diagonal_split_keeps_partners_in_step() {
        let data = diagonal_cross();
        let mut info = BuildInfo::default();
        let (ctx, lefts, rights, cuts) = separate_with_partition(&data, &mut info, 1);

        // the two-sided diagonal pair became four segs (plus the
        // partition seg itself)
        let diag: Vec<_> = (0..ctx.lev.segs.len())
            .filter(|&id| ctx.lev.segs[id].linedef == Some(0))
            .collect();
        assert_eq!(diag.len(), 4);

        // exactly one new vertex, at the crossing point
        assert_eq!(ctx.lev.num_new_vert, 1);
        let split_vert = ctx.lev.vertices.len() - 1;
        assert_eq!(ctx.lev.vertices[split_vert].pos, DVec2::new(50.0, 50.0));

        // partner symmetry on all four pieces
        for &id in &diag {
            let seg = &ctx.lev.segs[id];
            let partner = seg.partner.expect("two-sided seg keeps a partner");
            let ps = &ctx.lev.segs[partner];
            assert_eq!(ps.partner, Some(id));
            assert_eq!(ps.linedef, seg.linedef);
            assert_eq!(ps.start, seg.end);
            assert_eq!(ps.end, seg.start);
        }

        // each side of the partition received two diagonal pieces
        let on_side = |list: &SegList| {
            list.iter(&ctx.lev.segs)
                .filter(|id| diag.contains(id))
                .count()
        };
        assert_eq!(on_side(&lefts), 2);
        assert_eq!(on_side(&rights), 2);

        // the crossing is recorded on the partition
        assert!(cuts.iter().any(|c| c.vertex == split_vert));
    }

    #[test]
    fn self_ref_crossings_are_flagged() {
        let data = self_ref_room();
        let mut info = BuildInfo::default();
        // partition along the self-referencing inner linedef (index 4)
        let (_ctx, _lefts, _rights, cuts) = separate_with_partition(&data, &mut info, 4);

        let flagged: Vec<_> = cuts.iter().filter(|c| c.self_ref).collect();
        assert!(!flagged.is_empty());
    }

    #[test]
    fn self_ref_partition_grows_no_minisegs() {
        let data = self_ref_room();
        let mut info = BuildInfo::default();
        let (mut ctx, mut lefts, mut rights, cuts) = separate_with_partition(&data, &mut info, 4);

        // the span covered by the partition's own seg pair is forced
        // closed on both records (a seg *on* the line never opens a gap)
        let at_vertex = |v| cuts.iter().find(|c| c.vertex == v).expect("cut recorded");
        assert!(!at_vertex(4).open_after);
        assert!(!at_vertex(5).open_before);

        // and the open space beside the divider's tips mismatches the
        // forced-closed records, so the whole partition stays bare
        let part = ctx
            .lev
            .segs
            .iter()
            .position(|s| s.linedef == Some(4) && s.side == 0)
            .unwrap();
        let part = ctx.lev.segs[part].clone();
        ctx.add_minisegs(&part, &mut lefts, &mut rights, cuts).unwrap();

        assert!(ctx.lev.segs.iter().all(|s| !s.is_mini()));
    }
}
