use glam::DVec2;
use log::debug;

use crate::level::{SectorId, VertexId};

use super::context::BuildContext;
use super::types::{compute_angle, Vertex, WallTip, ANG_EPSILON};
use super::SegId;

/// Half-size of the box used to catch polyobj spawn spots sitting
/// directly on a linedef or vertex.
const POLY_BOX_SZ: f64 = 10.0;

// Polyobj_StartLine / Polyobj_ExplicitLine specials.
const HEXEN_POLY_START: u16 = 1;
const HEXEN_POLY_EXPLICIT: u16 = 5;

// Hexen polyobj spawn spots clash with Doom monster doomednums, hence
// the separate ZDoom set.
const PO_SPAWN_TYPE: u16 = 3001;
const PO_SPAWNCRUSH_TYPE: u16 = 3002;
const ZDOOM_PO_SPAWN_TYPE: u16 = 9301;
const ZDOOM_PO_SPAWNCRUSH_TYPE: u16 = 9302;

impl BuildContext<'_> {
    /*---------------- overlap detection ---------------*/

    /// Link every vertex that occupies the same location as an earlier
    /// one to its canonical twin.
    pub(crate) fn detect_overlapping_vertices(&mut self) {
        let verts = &mut self.lev.vertices;

        let mut order: Vec<VertexId> = (0..verts.len()).collect();
        order.sort_by(|&a, &b| {
            verts[a]
                .pos
                .x
                .total_cmp(&verts[b].pos.x)
                .then(verts[a].pos.y.total_cmp(&verts[b].pos.y))
        });

        let mut count = 0;
        for w in order.windows(2) {
            let (a, b) = (w[0], w[1]);
            if verts[a].pos == verts[b].pos {
                let canon = verts[a].overlap.unwrap_or(a);
                verts[b].overlap = Some(canon);
                count += 1;
            }
        }

        if count > 0 {
            debug!("Detected {count} overlapping vertices");
        }
    }

    /// Mark linedefs lying exactly on top of an earlier one.  Sorting by
    /// endpoint pair puts duplicates next to each other; partially
    /// overlapping lines are not detected.
    pub(crate) fn detect_overlapping_lines(&mut self) {
        let key = |l: &super::context::BuildLine| (l.start.min(l.end), l.start.max(l.end));

        let mut order: Vec<usize> = (0..self.lines.len()).collect();
        order.sort_by_key(|&i| key(&self.lines[i]));

        let mut count = 0;
        for w in order.windows(2) {
            let a = &self.lines[w[0]];
            let b = &self.lines[w[1]];
            if !a.zero_length && !b.zero_length && key(a) == key(b) {
                self.lines[w[1]].overlap = true;
                count += 1;
            }
        }

        if count > 0 {
            debug!("Detected {count} overlapping linedefs");
        }
    }

    /*---------------- wall-tips -----------------------*/

    /// Compute the wall-tips around every vertex touched by a usable
    /// linedef.
    pub(crate) fn calculate_wall_tips(&mut self) {
        for i in 0..self.lines.len() {
            let line = self.lines[i].clone();
            if line.zero_length || line.overlap {
                continue;
            }

            let d = self.lev.vertices[line.end].pos - self.lev.vertices[line.start].pos;
            let left = line.left.is_open();
            let right = line.right.is_open();

            self.vertex_add_wall_tip(line.start, d, left, right);
            self.vertex_add_wall_tip(line.end, -d, right, left);
        }
    }

    pub(crate) fn vertex_add_wall_tip(
        &mut self,
        v: VertexId,
        d: DVec2,
        open_left: bool,
        open_right: bool,
    ) {
        let angle = compute_angle(d);
        let tips = &mut self.lev.vertices[v].tips;

        // keep the ring in anti-clockwise (ascending angle) order
        let at = tips
            .iter()
            .position(|t| angle + ANG_EPSILON < t.angle)
            .unwrap_or(tips.len());

        tips.insert(
            at,
            WallTip {
                angle,
                open_left,
                open_right,
            },
        );
    }

    /// Whether space is open when leaving `v` along `d`.  A tip at the
    /// same angle means we run along that wall and inherit its right
    /// side; otherwise the wedge between the bracketing tips decides.
    pub(crate) fn vertex_check_open(&self, v: VertexId, d: DVec2) -> bool {
        let angle = compute_angle(d);
        let tips = &self.lev.vertices[v].tips;

        for tip in tips {
            if (tip.angle - angle).abs() < ANG_EPSILON {
                return tip.open_right;
            }
        }

        if tips.is_empty() {
            return true;
        }

        let (prev, next) = match tips.iter().position(|t| angle + ANG_EPSILON < t.angle) {
            Some(p) => (&tips[(p + tips.len() - 1) % tips.len()], &tips[p]),
            None => (&tips[tips.len() - 1], &tips[0]),
        };

        prev.open_left && next.open_right
    }

    /*---------------- new vertices --------------------*/

    /// Vertex born from splitting `seg` at `p`, with wall-tips for both
    /// directions of the split seg so later open-ness queries at this
    /// vertex stay correct.
    pub(crate) fn new_vertex_from_split_seg(&mut self, seg: SegId, p: DVec2) -> VertexId {
        let v = self.lev.vertices.len();
        self.lev.vertices.push(Vertex {
            pos: p,
            index: v,
            is_new: true,
            overlap: None,
            tips: Vec::new(),
        });
        self.lev.num_new_vert += 1;

        let pd = self.lev.segs[seg].pd;
        let two_sided = self.lev.segs[seg].partner.is_some();

        // the seg's own (right) side is open; the far side only when a
        // partner exists
        self.vertex_add_wall_tip(v, pd, two_sided, true);
        self.vertex_add_wall_tip(v, -pd, true, two_sided);

        v
    }

    /*---------------- polyobj sectors -----------------*/

    /// Find polyobject spawn spots and mark every linedef of the sector
    /// containing each spot as precious, so partitions avoid carving the
    /// polyobj's home sector.
    pub(crate) fn detect_polyobj_sectors(&mut self) {
        let uses_poly = self
            .lines
            .iter()
            .any(|l| l.special == HEXEN_POLY_START || l.special == HEXEN_POLY_EXPLICIT);
        if !uses_poly {
            return;
        }

        let zdoom_style = self
            .data
            .things
            .iter()
            .any(|t| t.type_id == ZDOOM_PO_SPAWN_TYPE || t.type_id == ZDOOM_PO_SPAWNCRUSH_TYPE);

        let (spawn, crush) = if zdoom_style {
            (ZDOOM_PO_SPAWN_TYPE, ZDOOM_PO_SPAWNCRUSH_TYPE)
        } else {
            (PO_SPAWN_TYPE, PO_SPAWNCRUSH_TYPE)
        };

        for i in 0..self.data.things.len() {
            let t = self.data.things[i];
            if t.type_id == spawn || t.type_id == crush {
                let p = t.pos();
                debug!("Marking polyobj at ({}, {})", p.x, p.y);
                self.mark_polyobj_point(p);
            }
        }
    }

    fn mark_polyobj_point(&mut self, p: DVec2) {
        // awkward case first: the spawn spot sits directly on a linedef
        // or a vertex
        let bmin = p - DVec2::splat(POLY_BOX_SZ);
        let bmax = p + DVec2::splat(POLY_BOX_SZ);

        for i in 0..self.lines.len() {
            let line = &self.lines[i];
            let v1 = self.lev.vertices[line.start].pos;
            let v2 = self.lev.vertices[line.end].pos;

            if line_touches_box(v1, v2, bmin, bmax) {
                if let Some(sector) = line.right.sector() {
                    self.mark_polyobj_sector(sector);
                }
                return;
            }
        }

        // DEU-style: cast a ray east and keep the nearest crossing line
        let mut best: Option<(f64, usize)> = None;

        for i in 0..self.lines.len() {
            let line = &self.lines[i];
            let v1 = self.lev.vertices[line.start].pos;
            let v2 = self.lev.vertices[line.end].pos;

            if (v1.y > p.y) == (v2.y > p.y) {
                continue;
            }
            let x_cut = v1.x + (v2.x - v1.x) * (p.y - v1.y) / (v2.y - v1.y) - p.x;

            if best.is_none_or(|(d, _)| x_cut.abs() < d.abs()) {
                best = Some((x_cut, i));
            }
        }

        let Some((_, li)) = best else {
            debug!("Polyobj spawn at ({}, {}) is not inside any sector", p.x, p.y);
            return;
        };

        let line = self.lines[li].clone();
        let v1 = self.lev.vertices[line.start].pos;
        let d = self.lev.vertices[line.end].pos - v1;

        // which side of the chosen line faces the spawn spot?
        let side = if (p - v1).perp_dot(d) > 0.0 {
            line.right
        } else {
            line.left
        };

        if let Some(sector) = side.sector() {
            self.mark_polyobj_sector(sector);
        }
    }

    fn mark_polyobj_sector(&mut self, sector: SectorId) {
        debug!("Marking SECTOR {sector} as polyobj");

        for line in &mut self.lines {
            if line.right.sector() == Some(sector) || line.left.sector() == Some(sector) {
                line.precious = true;
            }
        }
    }
}

/// Cohen-Sutherland style test: does the segment p1-p2 meet the box?
fn line_touches_box(mut p1: DVec2, mut p2: DVec2, bmin: DVec2, bmax: DVec2) -> bool {
    let outcode = |p: DVec2| {
        let mut code = 0u8;
        if p.x < bmin.x {
            code |= 1;
        } else if p.x > bmax.x {
            code |= 2;
        }
        if p.y < bmin.y {
            code |= 4;
        } else if p.y > bmax.y {
            code |= 8;
        }
        code
    };

    loop {
        let out1 = outcode(p1);
        let out2 = outcode(p2);

        if out1 & out2 != 0 {
            return false;
        }
        if out1 | out2 == 0 {
            return true;
        }

        // clip the endpoint that is outside against one box edge
        let clip_first = out1 != 0;
        let (mut p, q, out) = if clip_first {
            (p1, p2, out1)
        } else {
            (p2, p1, out2)
        };

        let delta = q - p;
        if out & 1 != 0 {
            p.y += delta.y * (bmin.x - p.x) / delta.x;
            p.x = bmin.x;
        } else if out & 2 != 0 {
            p.y += delta.y * (bmax.x - p.x) / delta.x;
            p.x = bmax.x;
        } else if out & 4 != 0 {
            p.x += delta.x * (bmin.y - p.y) / delta.y;
            p.y = bmin.y;
        } else {
            p.x += delta.x * (bmax.y - p.y) / delta.y;
            p.y = bmax.y;
        }

        if clip_first {
            p1 = p;
        } else {
            p2 = p;
        }
    }
}

/*====================================================================*/
/*                               Tests                                */
/*====================================================================*/
