//! End-to-end scenarios over hand-built fixture maps, plus the map
//! builders shared by the per-module tests.

use std::sync::atomic::Ordering;

use super::{build_level, BspData, BuildInfo, BuildResult, Child, Side};
use crate::level::LevelData;

/*====================================================================*/
/*                             Fixtures                               */
/*====================================================================*/

pub(crate) mod fixtures {
    use crate::level::{
        LevelData, LevelVertex, Linedef, LinedefFlags, MapFormat, Sector, Sidedef,
    };

    pub fn v(x: i32, y: i32) -> LevelVertex {
        LevelVertex::from_map_units(x, y)
    }

    pub fn sector() -> Sector {
        Sector {
            floor_h: 0,
            ceil_h: 128,
            light: 160,
            special: 0,
            tag: 0,
        }
    }

    /// One-sided linedef using sidedef `sd` on the right.
    pub fn side(start: usize, end: usize, sd: usize) -> Linedef {
        Linedef {
            start,
            end,
            flags: LinedefFlags::empty(),
            special: 0,
            tag: 0,
            right: Some(sd),
            left: None,
        }
    }

    pub fn one_sided(start: usize, end: usize) -> Linedef {
        side(start, end, 0)
    }

    pub fn two_sided(start: usize, end: usize, right_sd: usize, left_sd: usize) -> Linedef {
        Linedef {
            start,
            end,
            flags: LinedefFlags::TWO_SIDED,
            special: 0,
            tag: 0,
            right: Some(right_sd),
            left: Some(left_sd),
        }
    }

    fn map(
        vertices: Vec<LevelVertex>,
        linedefs: Vec<Linedef>,
        sidedefs: Vec<Sidedef>,
        num_sectors: usize,
    ) -> LevelData {
        LevelData {
            format: MapFormat::Doom,
            vertices,
            linedefs,
            sidedefs,
            sectors: vec![sector(); num_sectors],
            things: Vec::new(),
        }
    }

    /// One square 256x256 sector, wound so the interior is on every
    /// line's right side.
    pub fn square_room() -> LevelData {
        map(
            vec![v(0, 0), v(0, 256), v(256, 256), v(256, 0)],
            vec![
                one_sided(0, 1),
                one_sided(1, 2),
                one_sided(2, 3),
                one_sided(3, 0),
            ],
            vec![Sidedef { sector: 0 }],
            1,
        )
    }

    /// Two rooms sharing the x = 256 wall, joined by a two-sided
    /// doorway linedef between the wall pieces.
    pub fn two_rooms() -> LevelData {
        map(
            vec![
                v(0, 0),
                v(0, 256),
                v(256, 256),
                v(512, 256),
                v(512, 0),
                v(256, 0),
                v(256, 96),
                v(256, 160),
            ],
            vec![
                side(0, 1, 0),       // west
                side(1, 2, 0),       // north, left room
                side(2, 3, 1),       // north, right room
                side(3, 4, 1),       // east
                side(4, 5, 1),       // south, right room
                side(5, 0, 0),       // south, left room
                two_sided(5, 6, 1, 0), // wall below the doorway
                two_sided(6, 7, 1, 0), // the doorway
                two_sided(7, 2, 1, 0), // wall above the doorway
            ],
            vec![Sidedef { sector: 0 }, Sidedef { sector: 1 }],
            2,
        )
    }

    /// Plus-sign corridor: one non-convex sector with four arms.  Each
    /// arm is offset from the central square, so no two parallel cuts
    /// can leave a convex middle behind.
    pub fn plus_sign() -> LevelData {
        let vertices = vec![
            v(192, 0),
            v(192, 224),
            v(0, 224),
            v(0, 352),
            v(224, 352),
            v(224, 512),
            v(352, 512),
            v(352, 320),
            v(512, 320),
            v(512, 192),
            v(320, 192),
            v(320, 0),
        ];
        let n = vertices.len();
        let linedefs = (0..n).map(|i| one_sided(i, (i + 1) % n)).collect();
        map(vertices, linedefs, vec![Sidedef { sector: 0 }], 1)
    }

    /// Square room with a floating two-sided divider whose both sides
    /// reference the same sector.
    pub fn self_ref_room() -> LevelData {
        let mut data = square_room();
        data.vertices.push(v(64, 128));
        data.vertices.push(v(192, 128));
        data.linedefs.push(two_sided(4, 5, 0, 0));
        data
    }

    /// A two-sided diagonal plus a horizontal partition carrier whose
    /// infinite line crosses it at (50, 50).  Not a playable map; feeds
    /// the separator unit tests.
    pub fn diagonal_cross() -> LevelData {
        map(
            vec![v(0, 0), v(100, 100), v(-50, 50), v(150, 50)],
            vec![two_sided(0, 1, 0, 0), one_sided(2, 3)],
            vec![Sidedef { sector: 0 }],
            1,
        )
    }

    /// Two sectors separated by a zigzag divider whose diagonal piece
    /// crosses the other candidates' lines, forcing splits.
    pub fn zigzag_rooms() -> LevelData {
        map(
            vec![
                v(0, 0),
                v(0, 512),
                v(320, 512),
                v(512, 512),
                v(512, 0),
                v(256, 0),
                v(256, 128),
                v(192, 256),
                v(320, 448),
            ],
            vec![
                side(0, 1, 0),       // west
                side(1, 2, 0),       // top, left part
                side(2, 3, 1),       // top, right part
                side(3, 4, 1),       // east
                side(4, 5, 1),       // bottom, right part
                side(5, 0, 0),       // bottom, left part
                two_sided(5, 6, 1, 0), // divider, vertical
                two_sided(6, 7, 1, 0), // divider, leaning west
                two_sided(7, 8, 1, 0), // divider, leaning east
                two_sided(8, 2, 1, 0), // divider, vertical
            ],
            vec![Sidedef { sector: 0 }, Sidedef { sector: 1 }],
            2,
        )
    }
}

use fixtures::*;

/*====================================================================*/
/*                        Invariant checks                            */
/*====================================================================*/

fn build(data: &LevelData, gl_nodes: bool) -> (BspData, BuildInfo) {
    let mut info = BuildInfo {
        gl_nodes,
        ..BuildInfo::default()
    };
    let bsp = build_level(data, &mut info)
        .expect("build failed")
        .built()
        .expect("build cancelled");
    (bsp, info)
}

fn check_partner_symmetry(bsp: &BspData) {
    for (id, seg) in bsp.segs.iter().enumerate() {
        let Some(partner) = seg.partner else { continue };
        let p = &bsp.segs[partner];
        assert_eq!(p.partner, Some(id), "partner backlink of seg {id}");
        assert_eq!(p.linedef, seg.linedef);
        assert_eq!(p.start, seg.end);
        assert_eq!(p.end, seg.start);
    }
}

fn check_closure(bsp: &BspData) {
    for sub in 0..bsp.subsecs.len() {
        let ids: Vec<_> = bsp.subsec_segs(sub).collect();
        for (i, &id) in ids.iter().enumerate() {
            let next = ids[(i + 1) % ids.len()];
            assert_eq!(
                bsp.segs[id].end, bsp.segs[next].start,
                "gap in subsector {sub}"
            );
        }
    }
}

fn check_convexity(bsp: &BspData) {
    for sub in 0..bsp.subsecs.len() {
        let ids: Vec<_> = bsp.subsec_segs(sub).collect();
        for &a in &ids {
            for &b in &ids {
                if a == b {
                    continue;
                }
                let line = &bsp.segs[a];
                assert_ne!(
                    line.point_side(bsp.segs[b].ps),
                    Side::Left,
                    "subsector {sub} is not convex"
                );
                assert_ne!(line.point_side(bsp.segs[b].pe), Side::Left);
            }
        }
    }
}

fn check_index_density(bsp: &BspData) {
    let mut expected = 0;
    for (i, sub) in bsp.subsecs.iter().enumerate() {
        assert_eq!(sub.index, i);
        for id in bsp.subsec_segs(i) {
            assert_eq!(bsp.segs[id].index, Some(expected));
            expected += 1;
        }
    }
    assert_eq!(expected, bsp.num_complete_seg);
}

fn count_minisegs(bsp: &BspData) -> usize {
    (0..bsp.subsecs.len())
        .flat_map(|sub| bsp.subsec_segs(sub))
        .filter(|&id| bsp.segs[id].is_mini())
        .count()
}

/// Real segs of each subsector as a sorted (linedef, side) multiset.
fn real_seg_multisets(bsp: &BspData) -> Vec<Vec<(usize, u16)>> {
    (0..bsp.subsecs.len())
        .map(|sub| {
            let mut v: Vec<_> = bsp
                .subsec_segs(sub)
                .filter_map(|id| {
                    let seg = &bsp.segs[id];
                    seg.linedef.map(|ld| (ld, seg.side))
                })
                .collect();
            v.sort_unstable();
            v
        })
        .collect()
}

/*====================================================================*/
/*                            Scenarios                               */
/*====================================================================*/

#[test]
fn square_room_is_one_subsector() {
    let (bsp, info) = build(&square_room(), false);

    assert_eq!(bsp.subsecs.len(), 1);
    assert_eq!(bsp.nodes.len(), 0);
    assert_eq!(bsp.num_complete_seg, 4);
    assert_eq!(bsp.num_new_vert, 0);
    assert_eq!(bsp.bsp_height, 1);
    assert_eq!(bsp.root, Some(Child::Subsec(0)));
    assert_eq!(info.total_warnings, 0);

    check_partner_symmetry(&bsp);
    check_convexity(&bsp);
    check_index_density(&bsp);
}

#[test]
fn two_rooms_split_exactly_once() {
    let (bsp, _) = build(&two_rooms(), true);

    assert_eq!(bsp.nodes.len(), 1);
    assert_eq!(bsp.subsecs.len(), 2);
    assert_eq!(bsp.num_new_vert, 0);
    assert_eq!(bsp.bsp_height, 2);

    // the shared wall covers the whole partition: no minisegs even in
    // GL mode
    assert_eq!(count_minisegs(&bsp), 0);

    // the partition runs along x = 256
    let Some(Child::Node(root)) = bsp.root else {
        panic!("expected an internal node");
    };
    let node = &bsp.nodes[root];
    assert_eq!(node.delta.x, 0.0);
    assert_eq!(node.pos.x, 256.0);

    check_partner_symmetry(&bsp);
    check_closure(&bsp);
    check_convexity(&bsp);
    check_index_density(&bsp);
}

#[test]
fn plus_sign_decomposes_into_convex_pieces() {
    let (bsp, _) = build(&plus_sign(), true);

    assert!(bsp.subsecs.len() >= 4, "got {} subsectors", bsp.subsecs.len());
    assert!(bsp.nodes.len() >= 3, "got {} nodes", bsp.nodes.len());

    // partitions cross the open interior, so GL mode bridges them
    assert!(count_minisegs(&bsp) > 0);

    check_partner_symmetry(&bsp);
    check_closure(&bsp);
    check_convexity(&bsp);
    check_index_density(&bsp);
}

#[test]
fn zigzag_forces_splits_with_partners_in_step() {
    let data = zigzag_rooms();
    let (bsp, _) = build(&data, true);

    assert!(bsp.num_new_vert >= 1);

    // every piece of a two-sided linedef keeps a partner, no matter how
    // often it was split
    for seg in &bsp.segs {
        if let Some(ld) = seg.linedef {
            if data.linedefs[ld]
                .flags
                .contains(crate::level::LinedefFlags::TWO_SIDED)
            {
                assert!(seg.partner.is_some());
            }
        }
    }

    check_partner_symmetry(&bsp);
    check_closure(&bsp);
    check_convexity(&bsp);
    check_index_density(&bsp);
}

#[test]
fn self_ref_room_still_builds() {
    let (bsp, _) = build(&self_ref_room(), true);

    assert!(!bsp.subsecs.is_empty());
    check_partner_symmetry(&bsp);
    check_convexity(&bsp);
    check_index_density(&bsp);
}

#[test]
fn cancellation_discards_all_output() {
    let data = plus_sign();
    let mut info = BuildInfo::default();
    info.cancelled.store(true, Ordering::Relaxed);

    let outcome = build_level(&data, &mut info).unwrap();
    assert_eq!(outcome.result(), BuildResult::Cancelled);
    assert!(outcome.built().is_none());
    assert_eq!(info.total_failed_maps, 0);
}

#[test]
fn gl_build_normalised_matches_classic_build() {
    for data in [two_rooms(), plus_sign(), zigzag_rooms()] {
        let (mut gl, _) = build(&data, true);
        gl.normalise().unwrap();
        gl.round_off().unwrap();

        let (classic, _) = build(&data, false);

        assert_eq!(gl.subsecs.len(), classic.subsecs.len());
        assert_eq!(gl.num_complete_seg, classic.num_complete_seg);
        assert_eq!(real_seg_multisets(&gl), real_seg_multisets(&classic));
    }
}

#[test]
fn classic_output_has_no_minisegs_or_fractions() {
    let (bsp, _) = build(&plus_sign(), false);

    assert_eq!(count_minisegs(&bsp), 0);
    for v in &bsp.vertices {
        assert_eq!(v.pos, v.pos.round());
        assert!(!v.is_new);
    }

    check_index_density(&bsp);
}

#[test]
fn split_vertices_renumber_after_the_originals() {
    let data = zigzag_rooms();
    let (bsp, _) = build(&data, false);

    let num_input = data.vertices.len();
    assert_eq!(bsp.num_old_vert, bsp.vertices.len());

    let mut new_indices: Vec<_> = bsp.vertices[num_input..].iter().map(|v| v.index).collect();
    new_indices.sort_unstable();
    let expected: Vec<_> = (num_input..bsp.vertices.len()).collect();
    assert_eq!(new_indices, expected);
}

#[test]
fn sloppy_geometry_counts_warnings() {
    let mut data = square_room();
    // zero-length linedef
    data.linedefs.push(one_sided(1, 1));
    // two-sided flag without a left sidedef
    let mut bad = one_sided(0, 2);
    bad.flags |= crate::level::LinedefFlags::TWO_SIDED;
    data.linedefs.push(bad);

    let mut info = BuildInfo::default();
    let outcome = build_level(&data, &mut info);
    assert!(outcome.is_ok());
    assert!(info.total_warnings >= 2, "warnings: {}", info.total_warnings);
}

#[test]
fn empty_map_builds_to_nothing() {
    let data = LevelData {
        linedefs: Vec::new(),
        sidedefs: Vec::new(),
        ..square_room()
    };

    let (bsp, _) = build(&data, true);
    assert!(bsp.root.is_none());
    assert_eq!(bsp.subsecs.len(), 0);
    assert_eq!(bsp.bsp_height, 0);
}
