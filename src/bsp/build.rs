use glam::{DVec2, IVec2};
use log::debug;

use super::context::BuildContext;
use super::quadtree::QuadTree;
use super::seg::{Seg, SegList};
use super::types::{Bounds, Child, ChildLink, Node, NodeId, Subsec, SubsecId, TOO_LONG_LEN};
use super::{BspData, BuildAbort, BuildError};

impl BuildContext<'_> {
    /// Integer bounds of a seg list, rounded out by a small margin so no
    /// endpoint lands exactly on the boundary.
    pub(crate) fn find_limits(&self, list: SegList) -> Bounds {
        if list.is_empty() {
            return Bounds {
                min: IVec2::ZERO,
                max: IVec2::splat(2),
            };
        }

        let mut min = IVec2::MAX;
        let mut max = IVec2::MIN;

        for id in list.iter(&self.lev.segs) {
            let seg = &self.lev.segs[id];

            let lx = (seg.ps.x.min(seg.pe.x) - 0.2).floor() as i32;
            let ly = (seg.ps.y.min(seg.pe.y) - 0.2).floor() as i32;
            let hx = (seg.ps.x.max(seg.pe.x) + 0.2).ceil() as i32;
            let hy = (seg.ps.y.max(seg.pe.y) + 0.2).ceil() as i32;

            min = min.min(IVec2::new(lx, ly));
            max = max.max(IVec2::new(hx, hy));
        }

        Bounds { min, max }
    }

    fn tree_from_seg_list(&mut self, list: SegList, bounds: Bounds) -> QuadTree {
        let store = self.take_quad_store();
        let mut tree = QuadTree::new(store, bounds);
        tree.add_list(&mut self.lev.segs, list);
        tree
    }

    /// Convert the remaining (convex) seg set into a subsector.
    fn create_subsector(&mut self, tree: &mut QuadTree) -> SubsecId {
        let index = self.lev.subsecs.len();

        let mut seg_list = SegList::default();
        tree.convert_to_list(&mut self.lev.segs, &mut seg_list);

        // approximate middle point, the pivot for clockwise ordering
        let mut mid = DVec2::ZERO;
        let mut total = 0;
        for id in seg_list.iter(&self.lev.segs) {
            let seg = &self.lev.segs[id];
            mid += seg.ps + seg.pe;
            total += 2;
        }
        mid /= total as f64;

        debug!("Subsec: creating #{index} around ({:.1}, {:.1})", mid.x, mid.y);

        self.lev.subsecs.push(Subsec {
            seg_list,
            seg_count: 0,
            index,
            mid,
        });

        index
    }

    /// Materialise the partition from the linedef (not the seg), so the
    /// coordinates are integral in classic output.
    fn node_from_partition(
        &mut self,
        part: &Seg,
        right: ChildLink,
        left: ChildLink,
    ) -> Result<NodeId, BuildError> {
        let Some(ld) = part.linedef else {
            return Err(BuildError::BadPartition);
        };
        let line = &self.lines[ld];

        let (from, to) = if part.side == 0 {
            (line.start, line.end)
        } else {
            (line.end, line.start)
        };

        let pos = self.lev.vertices[from].pos;
        let delta = self.lev.vertices[to].pos - pos;

        // the classic NODES encoding stores dx/dy in 16 bits
        let too_long = part.p_length >= TOO_LONG_LEN;
        if too_long {
            debug!("Loss of accuracy on very long node: ({:.0},{:.0}) -> ({:.0},{:.0})",
                pos.x, pos.y, pos.x + delta.x, pos.y + delta.y);
        }

        self.lev.nodes.push(Node {
            pos,
            delta,
            right,
            left,
            too_long,
        });

        Ok(self.lev.nodes.len() - 1)
    }

    /// The heart of the builder: pick a partition, separate the segs,
    /// bridge the gaps, recurse.  A region with no usable partition is
    /// convex and becomes a subsector.
    pub(crate) fn build_nodes(
        &mut self,
        list: SegList,
        depth: usize,
    ) -> Result<(Child, Bounds), BuildAbort> {
        if self.cancelled() {
            return Err(BuildAbort::Cancelled);
        }

        debug!("Build: begun at depth {depth}");

        let bounds = self.find_limits(list);
        let mut tree = self.tree_from_seg_list(list, bounds);

        let part = self.pick_node(&tree, depth);

        // the picker bails out without a result when cancelled
        if self.cancelled() {
            self.free_quad_store(tree.into_store());
            return Err(BuildAbort::Cancelled);
        }

        let Some(part) = part else {
            debug!("Build: convex at depth {depth}");

            let subsec = self.create_subsector(&mut tree);
            self.free_quad_store(tree.into_store());
            return Ok((Child::Subsec(subsec), bounds));
        };
        let part = self.lev.segs[part].clone();

        debug!(
            "Build: partition ({:.1}, {:.1}) -> ({:.1}, {:.1})",
            part.ps.x, part.ps.y, part.pe.x, part.pe.y
        );

        let mut lefts = SegList::default();
        let mut rights = SegList::default();
        let mut cuts = self.take_cuts();

        let separated = self.separate_segs(&mut tree, &part, &mut lefts, &mut rights, &mut cuts);
        self.free_quad_store(tree.into_store());
        separated?;

        // the picker guarantees real segs on both sides
        if rights.is_empty() {
            return Err(BuildError::EmptySide("right").into());
        }
        if lefts.is_empty() {
            return Err(BuildError::EmptySide("left").into());
        }

        self.add_minisegs(&part, &mut lefts, &mut rights, cuts)?;

        let (left_child, left_bounds) = self.build_nodes(lefts, depth + 1)?;
        let (right_child, right_bounds) = self.build_nodes(rights, depth + 1)?;

        let node = self.node_from_partition(
            &part,
            ChildLink {
                child: right_child,
                bounds: right_bounds,
            },
            ChildLink {
                child: left_child,
                bounds: left_bounds,
            },
        )?;

        Ok((Child::Node(node), bounds))
    }
}

impl BspData {
    /// Height of the subtree hanging off `child`; a lone subsector
    /// counts as 1.
    pub fn height_of(&self, child: Child) -> usize {
        match child {
            Child::Subsec(_) => 1,
            Child::Node(n) => {
                let node = &self.nodes[n];
                1 + self
                    .height_of(node.left.child)
                    .max(self.height_of(node.right.child))
            }
        }
    }
}
