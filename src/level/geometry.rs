use bitflags::bitflags;
use glam::DVec2;

pub type VertexId = usize;
pub type LinedefId = usize;
pub type SidedefId = usize;
pub type SectorId = usize;
pub type ThingId = usize;

/// Map coordinates carry 12 bits of fraction (1/4096 of a map unit).
/// Classic binary maps only ever use whole units; UDMF-style sources may
/// put real fractions in here.
pub type FixCoord = i32;

pub const COORD_UNITS: f64 = 4096.0;

#[inline]
pub fn from_coord(fx: FixCoord) -> f64 {
    fx as f64 / COORD_UNITS
}

#[inline]
pub fn to_coord(db: f64) -> FixCoord {
    (db * COORD_UNITS).round() as FixCoord
}

#[inline]
pub fn int_to_coord(i: i32) -> FixCoord {
    i * COORD_UNITS as FixCoord
}

/// On-disk flavour of the map. Decides the LINEDEFS / THINGS layout and
/// whether polyobject detection applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MapFormat {
    Doom,
    Hexen,
}

/*--------------------------- vertices -------------------------------*/

#[derive(Clone, Copy, Debug)]
pub struct LevelVertex {
    pub raw_x: FixCoord,
    pub raw_y: FixCoord,
}

impl LevelVertex {
    pub fn from_map_units(x: i32, y: i32) -> Self {
        LevelVertex {
            raw_x: int_to_coord(x),
            raw_y: int_to_coord(y),
        }
    }

    #[inline]
    pub fn pos(&self) -> DVec2 {
        DVec2::new(from_coord(self.raw_x), from_coord(self.raw_y))
    }
}

/*--------------------------- linedefs -------------------------------*/

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LinedefFlags: u32 {
        const IMPASSABLE      = 0x0001;
        const BLOCK_MONSTERS  = 0x0002;
        const TWO_SIDED       = 0x0004;
        const UPPER_UNPEGGED  = 0x0010;
        const LOWER_UNPEGGED  = 0x0020;
        const SECRET          = 0x0040;
        const BLOCK_SOUND     = 0x0080;
        const NOT_ON_MAP      = 0x0200;
        const ALREADY_ON_MAP  = 0x1000;

        // Builder-only bits, never present on disk.  IS_OVERLAP marks a
        // linedef that sits exactly on top of an earlier one (a trick for
        // higher mid-masked textures); no segs are made for it.
        const IS_OVERLAP      = 0x2000_0000;
        // Prefer not to split (deep water and invisible lift tricks).
        const IS_PRECIOUS     = 0x4000_0000;
    }
}

#[derive(Clone, Debug)]
pub struct Linedef {
    pub start: VertexId,
    pub end: VertexId,
    pub flags: LinedefFlags,
    pub special: u16,
    pub tag: i32,
    pub right: Option<SidedefId>,
    pub left: Option<SidedefId>,
}

impl Linedef {
    pub fn is_zero_length(&self, vertices: &[LevelVertex]) -> bool {
        let a = &vertices[self.start];
        let b = &vertices[self.end];
        a.raw_x == b.raw_x && a.raw_y == b.raw_y
    }

    /// Both sides reference the same sector (deep-water style trick).
    pub fn is_self_ref(&self, sidedefs: &[Sidedef]) -> bool {
        let sector_of = |sd: Option<usize>| sd.and_then(|idx| sidedefs.get(idx)).map(|s| s.sector);

        match (sector_of(self.right), sector_of(self.left)) {
            (Some(r), Some(l)) => r == l,
            _ => false,
        }
    }

    pub fn length(&self, vertices: &[LevelVertex]) -> f64 {
        (vertices[self.end].pos() - vertices[self.start].pos()).length()
    }
}

/*--------------------------- sidedefs -------------------------------*/

/// The builder only ever reads the sector reference; the raw (possibly
/// out-of-range) index is kept so bad references can be diagnosed.
#[derive(Clone, Copy, Debug)]
pub struct Sidedef {
    pub sector: i32,
}

/*---------------------------- sectors -------------------------------*/

#[derive(Clone, Copy, Debug)]
pub struct Sector {
    pub floor_h: i16,
    pub ceil_h: i16,
    pub light: i16,
    pub special: i16,
    pub tag: i16,
}

/*---------------------------- things --------------------------------*/

/// Only the position and the doomednum matter here (polyobject spawn
/// spot detection); everything else about a thing is game-side.
#[derive(Clone, Copy, Debug)]
pub struct Thing {
    pub raw_x: FixCoord,
    pub raw_y: FixCoord,
    pub type_id: u16,
}

impl Thing {
    #[inline]
    pub fn pos(&self) -> DVec2 {
        DVec2::new(from_coord(self.raw_x), from_coord(self.raw_y))
    }
}

/*------------------------- the whole map ----------------------------*/

/// Input geometry for one map, as handed over by the host editor or
/// loader.  Immutable during a build.
#[derive(Clone, Debug)]
pub struct LevelData {
    pub format: MapFormat,
    pub vertices: Vec<LevelVertex>,
    pub linedefs: Vec<Linedef>,
    pub sidedefs: Vec<Sidedef>,
    pub sectors: Vec<Sector>,
    pub things: Vec<Thing>,
}

impl LevelData {
    #[inline]
    pub fn is_sector(&self, idx: i32) -> bool {
        idx >= 0 && (idx as usize) < self.sectors.len()
    }
}

/*====================================================================*/
/*                               Tests                                */
/*====================================================================*/
