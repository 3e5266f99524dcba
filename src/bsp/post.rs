use smallvec::SmallVec;

use log::debug;

use crate::level::VertexId;

use super::context::BuildContext;
use super::types::{compute_angle, SubsecId, Vertex, ANG_EPSILON};
use super::{BspData, BuildError, SegId};

impl BuildContext<'_> {
    /// Put every subsector's segs into clockwise order and hand out the
    /// final seg indices.
    ///
    /// This cannot happen during `build_nodes`: splitting a seg with a
    /// partner inserts another seg into the partner's list, usually in
    /// the wrong place order-wise.
    pub(crate) fn clockwise_bsp_tree(&mut self) -> Result<(), BuildError> {
        self.verify_partners()?;

        self.lev.num_complete_seg = 0;

        for i in 0..self.lev.subsecs.len() {
            self.clockwise_order(i);
            self.lev.renumber_subsec_segs(i);

            self.sanity_check_closed(i);
            self.sanity_check_has_real_seg(i)?;
        }

        Ok(())
    }

    fn verify_partners(&self) -> Result<(), BuildError> {
        for (id, seg) in self.lev.segs.iter().enumerate() {
            let Some(partner) = seg.partner else {
                continue;
            };
            let p = &self.lev.segs[partner];

            if p.partner != Some(id)
                || p.linedef != seg.linedef
                || p.start != seg.end
                || p.end != seg.start
            {
                return Err(BuildError::PartnerMismatch(id));
            }
        }
        Ok(())
    }

    /// Sort one subsector clockwise with the now famous "double bubble"
    /// sorter, then rotate a preferred seg to the front.
    fn clockwise_order(&mut self, sub_id: SubsecId) {
        let mid = self.lev.subsecs[sub_id].mid;

        let mut array: SmallVec<[(SegId, f64); 32]> = self.lev.subsecs[sub_id]
            .seg_list
            .iter(&self.lev.segs)
            .map(|id| (id, compute_angle(self.lev.segs[id].ps - mid)))
            .collect();
        let total = array.len();

        // clockwise means descending angles (from the middle point to
        // each start vertex)
        let mut i = 0;
        while i + 1 < total {
            let (_, angle1) = array[i];
            let (_, angle2) = array[i + 1];

            if angle1 + ANG_EPSILON < angle2 {
                array.swap(i, i + 1);
                // bubble down
                i = i.saturating_sub(1);
            } else {
                // bubble up
                i += 1;
            }
        }

        // Choose the first seg: the engine typically reads the sector
        // from it, and self referencing linedefs would mislead it (they
        // are often used for deep-water effects).
        let mut first = 0;
        let mut score = -1;

        for (i, &(id, _)) in array.iter().enumerate() {
            let cur_score = match self.lev.segs[id].linedef {
                None => 0,
                Some(ld) if self.lines[ld].self_ref => 2,
                Some(_) => 3,
            };

            if cur_score > score {
                first = i;
                score = cur_score;
            }
        }

        // transfer the sorted array back, rotated so `first` leads
        let mut list = super::seg::SegList::default();
        for i in (0..total).rev() {
            let (id, _) = array[(i + first) % total];
            list.push(&mut self.lev.segs, id);
        }
        self.lev.subsecs[sub_id].seg_list = list;
    }

    fn sanity_check_closed(&mut self, sub_id: SubsecId) {
        let sub = &self.lev.subsecs[sub_id];

        let ids: SmallVec<[SegId; 32]> = sub.seg_list.iter(&self.lev.segs).collect();
        let total = ids.len();

        let mut gaps = 0;
        for (i, &id) in ids.iter().enumerate() {
            let seg = &self.lev.segs[id];
            let next = &self.lev.segs[ids[(i + 1) % total]];

            if seg.pe != next.ps {
                gaps += 1;
            }
        }

        if gaps > 0 {
            let mid = sub.mid;
            self.warning(format_args!(
                "Subsector #{sub_id} near ({:.1}, {:.1}) is not closed ({gaps} gaps, {total} segs)",
                mid.x, mid.y
            ));
        }
    }

    fn sanity_check_has_real_seg(&self, sub_id: SubsecId) -> Result<(), BuildError> {
        let sub = &self.lev.subsecs[sub_id];
        if sub
            .seg_list
            .iter(&self.lev.segs)
            .any(|id| !self.lev.segs[id].is_mini())
        {
            Ok(())
        } else {
            Err(BuildError::NoRealSeg(sub_id))
        }
    }
}

impl BspData {
    pub(crate) fn renumber_subsec_segs(&mut self, sub_id: SubsecId) {
        let mut count = 0;
        let mut cur = self.subsecs[sub_id].seg_list.head;

        while let Some(id) = cur {
            self.segs[id].index = Some(self.num_complete_seg);
            self.num_complete_seg += 1;
            count += 1;
            cur = self.segs[id].next;
        }

        self.subsecs[sub_id].seg_count = count;
    }

    /*---------------- GL -> classic -------------------*/

    /// Strip all minisegs from every subsector, turning a GL tree into
    /// classic form.  Removed segs lose their index so serialization
    /// sorts them out of the way.
    pub fn normalise(&mut self) -> Result<(), BuildError> {
        self.num_complete_seg = 0;

        for i in 0..self.subsecs.len() {
            self.normalise_subsector(i)?;
            self.renumber_subsec_segs(i);
        }

        Ok(())
    }

    fn normalise_subsector(&mut self, sub_id: SubsecId) -> Result<(), BuildError> {
        let ids: SmallVec<[SegId; 32]> = self.subsecs[sub_id].seg_list.iter(&self.segs).collect();

        let mut kept: SmallVec<[SegId; 32]> = SmallVec::new();
        for &id in &ids {
            if self.segs[id].is_mini() {
                debug!("Subsec: removing miniseg #{id}");
                self.segs[id].index = None;
            } else {
                kept.push(id);
            }
        }

        if kept.is_empty() {
            return Err(BuildError::EmptySubsector {
                subsec: sub_id,
                pass: "normalised",
            });
        }

        // rebuild in the same order
        let mut list = super::seg::SegList::default();
        for &id in kept.iter().rev() {
            list.push(&mut self.segs, id);
        }
        self.subsecs[sub_id].seg_list = list;

        Ok(())
    }

    /*---------------- round-off -----------------------*/

    /// Snap split-born vertices to integer coordinates, give them their
    /// final indices, and drop segs that degenerate to a point.
    pub fn round_off(&mut self) -> Result<(), BuildError> {
        self.num_complete_seg = 0;

        self.round_off_vertices();

        for i in 0..self.subsecs.len() {
            self.round_off_subsector(i)?;
            self.renumber_subsec_segs(i);
        }

        Ok(())
    }

    fn round_off_vertices(&mut self) {
        for i in 0..self.vertices.len() {
            let v = &mut self.vertices[i];
            if v.is_new {
                v.is_new = false;
                v.pos = v.pos.round();
                v.index = self.num_old_vert;
                self.num_old_vert += 1;
            }
        }
    }

    fn round_off_subsector(&mut self, sub_id: SubsecId) -> Result<(), BuildError> {
        let ids: SmallVec<[SegId; 32]> = self.subsecs[sub_id].seg_list.iter(&self.segs).collect();

        let round = |p: glam::DVec2| (p.x.round() as i32, p.y.round() as i32);

        // first pass: count the degenerates
        let mut last_real_degen = None;
        let mut real_total = 0;
        let mut degen_total = 0;

        for &id in &ids {
            let (start, end, real) = {
                let seg = &self.segs[id];
                (seg.start, seg.end, seg.linedef.is_some())
            };

            if round(self.vertices[start].pos) == round(self.vertices[end].pos) {
                self.segs[id].is_degenerate = true;

                if real {
                    last_real_degen = Some(id);
                }
                degen_total += 1;
            } else if real {
                real_total += 1;
            }
        }

        if degen_total > 0 {
            debug!("Subsec #{sub_id}: degen={degen_total} real={real_total}");
        }

        // hopefully rare: every real seg became degenerate.  Give the
        // last one a substitute end vertex so it survives.
        if real_total == 0 {
            let Some(rescue) = last_real_degen else {
                return Err(BuildError::RoundedNoReal(sub_id));
            };

            let end = self.new_vertex_degenerate(rescue);
            self.segs[rescue].end = end;
            self.segs[rescue].is_degenerate = false;
        }

        // second pass: remove the blighters
        let mut kept: SmallVec<[SegId; 32]> = SmallVec::new();
        for &id in &ids {
            if self.segs[id].is_degenerate {
                debug!("Subsec: removing degenerate seg #{id}");
                self.segs[id].index = None;
            } else {
                kept.push(id);
            }
        }

        if kept.is_empty() {
            return Err(BuildError::EmptySubsector {
                subsec: sub_id,
                pass: "rounded off",
            });
        }

        let mut list = super::seg::SegList::default();
        for &id in kept.iter().rev() {
            list.push(&mut self.segs, id);
        }
        self.subsecs[sub_id].seg_list = list;

        Ok(())
    }

    /// Substitute end vertex for a seg whose rounded endpoints coincide:
    /// walk unit steps along the seg's (pre-snap) direction until the
    /// rounding separates from the start.  Only valid after round-off,
    /// so no wall-tips are computed.
    fn new_vertex_degenerate(&mut self, seg_id: SegId) -> VertexId {
        let seg = &self.segs[seg_id];
        let start = self.vertices[seg.start].pos;
        let dir = seg.pd / seg.p_length;

        let start_round = start.round();
        let mut pos = start;
        while pos.round() == start_round {
            pos += dir;
        }

        let v = self.vertices.len();
        self.vertices.push(Vertex {
            pos,
            index: self.num_old_vert,
            is_new: false,
            overlap: None,
            tips: Vec::new(),
        });
        self.num_old_vert += 1;

        v
    }
}

/*====================================================================*/
/*                               Tests                                */
/*====================================================================*/
