use glam::IVec2;
use log::debug;

use super::context::BuildContext;
use super::quadtree::{CellId, QuadTree};
use super::seg::Seg;
use super::types::{DIST_EPSILON, IFFY_LEN, Side};
use super::SegId;

/// Extra weight for splitting (or nearly splitting) a precious linedef.
const PRECIOUS_MULTIPLY: i32 = 100;

/// At this many real segs, fast mode tries an axis-aligned shortcut
/// before falling back to the full search.
const SEG_FAST_THRESHOLD: usize = 200;

/*------------------------- cost tracking ----------------------------*/

#[derive(Default)]
struct EvalInfo {
    cost: i32,
    splits: i32,
    iffy: i32,
    near_miss: i32,
    real_left: i32,
    real_right: i32,
    mini_left: i32,
    mini_right: i32,
}

impl EvalInfo {
    #[inline]
    fn bump_left(&mut self, real: bool) {
        if real {
            self.real_left += 1;
        } else {
            self.mini_left += 1;
        }
    }

    #[inline]
    fn bump_right(&mut self, real: bool) {
        if real {
            self.real_right += 1;
        } else {
            self.mini_right += 1;
        }
    }
}

impl BuildContext<'_> {
    #[inline]
    fn is_precious(&self, seg: &Seg) -> bool {
        seg.linedef.is_some_and(|ld| self.lines[ld].precious)
    }

    /// Accumulate the cost of `part` over one cell and its descendants.
    /// Returns true when the running cost already beats `best_cost`, so
    /// the whole candidate can be abandoned early.
    fn eval_partition_worker(
        &self,
        tree: &QuadTree,
        cell: CellId,
        part: &Seg,
        best_cost: i32,
        info: &mut EvalInfo,
    ) -> bool {
        let factor = self.info.factor;

        // Test the whole box against the partition line, handling all
        // the segs within it at once.  Only when the line intercepts the
        // box do we go deeper; this pruning keeps the picker near-linear
        // on large maps.
        match tree.on_line_side(cell, part) {
            Side::Left => {
                info.real_left += tree.cells[cell].real_num as i32;
                info.mini_left += tree.cells[cell].mini_num as i32;
                return false;
            }
            Side::Right => {
                info.real_right += tree.cells[cell].real_num as i32;
                info.mini_right += tree.cells[cell].mini_num as i32;
                return false;
            }
            Side::On => {}
        }

        /* check the partition against all straddling segs */

        for check_id in tree.cells[cell].list.iter(&self.lev.segs) {
            // catches bad segs early
            if info.cost > best_cost {
                return true;
            }

            let check = &self.lev.segs[check_id];
            let real = !check.is_mini();

            // a partition is never scored against its own minisegs
            let (a, b) = if check.source_line == part.source_line {
                (0.0, 0.0)
            } else {
                (part.perp_dist(check.ps), part.perp_dist(check.pe))
            };
            let (fa, fb) = (a.abs(), b.abs());

            /* on the same line: direction decides the side */
            if fa <= DIST_EPSILON && fb <= DIST_EPSILON {
                if check.pd.dot(part.pd) < 0.0 {
                    info.bump_left(real);
                } else {
                    info.bump_right(real);
                }
                continue;
            }

            // Passing through a vertex is normally fine (even ideal),
            // but on a precious linedef the sector could still be cut in
            // half without the linedef-based checks noticing.
            if (fa <= DIST_EPSILON || fb <= DIST_EPSILON) && self.is_precious(check) {
                info.cost += 40 * factor * PRECIOUS_MULTIPLY;
            }

            /* wholly on the right side */
            if a > -DIST_EPSILON && b > -DIST_EPSILON {
                info.bump_right(real);

                if (a >= IFFY_LEN && b >= IFFY_LEN)
                    || (a <= DIST_EPSILON && b >= IFFY_LEN)
                    || (b <= DIST_EPSILON && a >= IFFY_LEN)
                {
                    continue;
                }

                info.near_miss += 1;

                // Near misses can leave really short minisegs in later
                // processing, so the closer the miss, the higher the
                // cost.
                let qnty = if a <= DIST_EPSILON || b <= DIST_EPSILON {
                    IFFY_LEN / a.max(b)
                } else {
                    IFFY_LEN / a.min(b)
                };
                info.cost += (100.0 * factor as f64 * (qnty * qnty - 1.0)) as i32;
                continue;
            }

            /* wholly on the left side */
            if a < DIST_EPSILON && b < DIST_EPSILON {
                info.bump_left(real);

                if (a <= -IFFY_LEN && b <= -IFFY_LEN)
                    || (a >= -DIST_EPSILON && b <= -IFFY_LEN)
                    || (b >= -DIST_EPSILON && a <= -IFFY_LEN)
                {
                    continue;
                }

                info.near_miss += 1;

                let qnty = if a >= -DIST_EPSILON || b >= -DIST_EPSILON {
                    IFFY_LEN / -a.min(b)
                } else {
                    IFFY_LEN / -a.max(b)
                };
                info.cost += (70.0 * factor as f64 * (qnty * qnty - 1.0)) as i32;
                continue;
            }

            // a and b are non-zero and of opposite sign: the partition
            // will split this seg

            info.splits += 1;

            // tags >= 900 protect deep water and invisible lifts from
            // being messed up by splits; only give in when every other
            // option is exhausted
            if self.is_precious(check) {
                info.cost += 100 * factor * PRECIOUS_MULTIPLY;
            } else {
                info.cost += 100 * factor;
            }

            // a split point very close to one end produces really short
            // segs, one source of slime trails; hefty surcharge
            if fa < IFFY_LEN || fb < IFFY_LEN {
                info.iffy += 1;

                let qnty = IFFY_LEN / fa.min(fb);
                info.cost += (140.0 * factor as f64 * (qnty * qnty - 1.0)) as i32;
            }
        }

        /* handle sub-blocks recursively */

        if let Some(subs) = tree.cells[cell].subs {
            for c in subs {
                if !tree.is_empty(c)
                    && self.eval_partition_worker(tree, c, part, best_cost, info)
                {
                    return true;
                }
            }
        }

        false
    }

    /// Cost of using `part` as the partition, or `None` when it must be
    /// skipped (early-out, or no real segs on one side).
    fn eval_partition(&self, tree: &QuadTree, part: &Seg, best_cost: i32) -> Option<i32> {
        let mut info = EvalInfo::default();

        if self.eval_partition_worker(tree, QuadTree::ROOT, part, best_cost, &mut info) {
            return None;
        }

        // there must be at least one real seg on each side
        if info.real_left == 0 || info.real_right == 0 {
            return None;
        }

        // imbalance between the sides; minisegs count at half weight
        info.cost += 100 * (info.real_left - info.real_right).abs();
        info.cost += 50 * (info.mini_left - info.mini_right).abs();

        // slight preference for purely horizontal or vertical lines
        if part.pd.x != 0.0 && part.pd.y != 0.0 {
            info.cost += 25;
        }

        debug!(
            "eval {:?}: splits={} iffy={} near={} left={}+{} right={}+{} cost={}.{:02}",
            part.linedef,
            info.splits,
            info.iffy,
            info.near_miss,
            info.real_left,
            info.mini_left,
            info.real_right,
            info.mini_right,
            info.cost / 100,
            info.cost % 100
        );

        Some(info.cost)
    }

    /*---------------- fast mode -----------------------*/

    fn evaluate_fast_worker(
        &self,
        tree: &QuadTree,
        cell: CellId,
        best_h: &mut Option<SegId>,
        best_v: &mut Option<SegId>,
        mid: IVec2,
    ) {
        for part_id in tree.cells[cell].list.iter(&self.lev.segs) {
            let part = &self.lev.segs[part_id];

            /* ignore minisegs as partition candidates */
            if part.is_mini() {
                continue;
            }

            if part.pd.y == 0.0 {
                // horizontal seg: keep the one nearest the middle
                let better = best_h.is_none_or(|old| {
                    let old_dist = (self.lev.segs[old].ps.y as i32 - mid.y).abs();
                    (part.ps.y as i32 - mid.y).abs() < old_dist
                });
                if better {
                    *best_h = Some(part_id);
                }
            } else if part.pd.x == 0.0 {
                // vertical seg
                let better = best_v.is_none_or(|old| {
                    let old_dist = (self.lev.segs[old].ps.x as i32 - mid.x).abs();
                    (part.ps.x as i32 - mid.x).abs() < old_dist
                });
                if better {
                    *best_v = Some(part_id);
                }
            }
        }

        if let Some(subs) = tree.cells[cell].subs {
            for c in subs {
                if !tree.is_empty(c) {
                    self.evaluate_fast_worker(tree, c, best_h, best_v, mid);
                }
            }
        }
    }

    /// Fast mode: grab the axis-aligned segs nearest the middle of the
    /// group on each axis, score just those two finalists, and take the
    /// cheaper.  Saves heaps of time on large levels.
    fn find_fast_seg(&self, tree: &QuadTree) -> Option<SegId> {
        let mut best_h = None;
        let mut best_v = None;

        let root = &tree.cells[QuadTree::ROOT];
        let mid = (root.min + root.max) / 2;

        self.evaluate_fast_worker(tree, QuadTree::ROOT, &mut best_h, &mut best_v, mid);

        let h_cost = best_h.and_then(|h| self.eval_partition(tree, &self.lev.segs[h], i32::MAX));
        let v_cost = best_v.and_then(|v| self.eval_partition(tree, &self.lev.segs[v], i32::MAX));

        match (h_cost, v_cost) {
            (None, None) => None,
            (Some(_), None) => best_h,
            (None, Some(_)) => best_v,
            (Some(h), Some(v)) => {
                if v < h {
                    best_v
                } else {
                    best_h
                }
            }
        }
    }

    /*---------------- full search ---------------------*/

    /// Returns false if cancelled.
    fn pick_node_worker(
        &self,
        tree: &QuadTree,
        cell: CellId,
        best: &mut Option<SegId>,
        best_cost: &mut i32,
    ) -> bool {
        /* try each partition candidate in this cell */
        for part_id in tree.cells[cell].list.iter(&self.lev.segs) {
            if self.cancelled() {
                return false;
            }

            let part = &self.lev.segs[part_id];

            /* ignore minisegs as partition candidates */
            if part.is_mini() {
                continue;
            }

            if let Some(cost) = self.eval_partition(tree, part, *best_cost) {
                if cost < *best_cost {
                    *best_cost = cost;
                    *best = Some(part_id);
                }
            }
        }

        /* recursively handle sub-blocks */
        if let Some(subs) = tree.cells[cell].subs {
            for c in subs {
                if !tree.is_empty(c) && !self.pick_node_worker(tree, c, best, best_cost) {
                    return false;
                }
            }
        }

        true
    }

    /// Choose the best seg to use as the partition line.  `None` means
    /// no usable candidate exists: the region is convex (or the build
    /// was cancelled, which the caller re-checks).
    pub(crate) fn pick_node(&self, tree: &QuadTree, depth: usize) -> Option<SegId> {
        debug!("PickNode: begun at depth {depth}");

        if self.info.fast && tree.cells[QuadTree::ROOT].real_num >= SEG_FAST_THRESHOLD {
            if let Some(best) = self.find_fast_seg(tree) {
                return Some(best);
            }
        }

        let mut best = None;
        let mut best_cost = i32::MAX;

        if !self.pick_node_worker(tree, QuadTree::ROOT, &mut best, &mut best_cost) {
            return None;
        }

        best
    }
}

/*====================================================================*/
/*                               Tests                                */
/*====================================================================*/

#[cfg(test)]
mod tests {
    use crate::bsp::context::BuildContext;
    use crate::bsp::quadtree::QuadTree;
    use crate::bsp::tests::fixtures::{square_room, two_rooms};
    use crate::bsp::BuildInfo;

    #[test]
    fn convex_room_has_no_partition() {
        let data = square_room();
        let mut info = BuildInfo::default();
        let mut ctx = BuildContext::new(&data, &mut info);
        ctx.load_geometry();

        let list = ctx.create_segs().unwrap();
        let bounds = ctx.find_limits(list);
        let mut tree = QuadTree::new(Vec::new(), bounds);
        tree.add_list(&mut ctx.lev.segs, list);

        assert_eq!(ctx.pick_node(&tree, 0), None);
    }

    #[test]
    fn doorway_wall_wins_in_two_room_map() {
        let data = two_rooms();
        let mut info = BuildInfo::default();
        let mut ctx = BuildContext::new(&data, &mut info);
        ctx.load_geometry();

        let list = ctx.create_segs().unwrap();
        let bounds = ctx.find_limits(list);
        let mut tree = QuadTree::new(Vec::new(), bounds);
        tree.add_list(&mut ctx.lev.segs, list);

        let part = ctx.pick_node(&tree, 0).expect("map is not convex");
        let part = &ctx.lev.segs[part];

        // the winning partition runs along the shared x = 256 wall
        assert_eq!(part.pd.x, 0.0);
        assert_eq!(part.ps.x, 256.0);
    }
}
