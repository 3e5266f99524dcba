mod geometry;
pub mod raw;

pub use geometry::{
    from_coord, int_to_coord, to_coord, FixCoord, LevelData, LevelVertex, Linedef, LinedefFlags,
    LinedefId, MapFormat, Sector, SectorId, Sidedef, SidedefId, Thing, ThingId, VertexId,
    COORD_UNITS,
};
