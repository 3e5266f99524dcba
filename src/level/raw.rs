//! Classic binary lump decode.
//!
//! Turns the raw bytes of the input lumps (VERTEXES, LINEDEFS, SIDEDEFS,
//! SECTORS, THINGS) into a [`LevelData`].  Decoding uses **bincode 2**
//! with fixed little-endian integers, so every struct here maps onto the
//! on-disk layout byte for byte.
//!
//! Output lumps (SEGS, SSECTORS, NODES and the GL_* family) are the
//! business of the host's writer, not this crate.

use bincode::{config, decode_from_slice, Decode};
use thiserror::Error;

use super::geometry::{
    int_to_coord, LevelData, LevelVertex, Linedef, LinedefFlags, MapFormat, Sector, Sidedef, Thing,
};

/*=======================================================================*/
/*                         Raw binary structs                            */
/*=======================================================================*/

#[repr(C)]
#[derive(Clone, Copy, Decode, Debug)]
pub struct RawVertex {
    pub x: i16,
    pub y: i16,
}

#[repr(C)]
#[derive(Clone, Copy, Decode, Debug)]
pub struct RawLinedef {
    pub v1: i16,
    pub v2: i16,
    pub flags: i16,
    pub special: i16,
    pub tag: i16,
    pub sidenum: [i16; 2],
}

/// Hexen LINEDEFS entry: the tag is replaced by a special + arg bytes.
#[repr(C)]
#[derive(Clone, Copy, Decode, Debug)]
pub struct RawLinedefHexen {
    pub v1: i16,
    pub v2: i16,
    pub flags: i16,
    pub special: u8,
    pub args: [u8; 5],
    pub sidenum: [i16; 2],
}

#[repr(C)]
#[derive(Clone, Copy, Decode, Debug)]
pub struct RawSidedef {
    pub x_off: i16,
    pub y_off: i16,
    pub top_tex: [u8; 8],
    pub bottom_tex: [u8; 8],
    pub mid_tex: [u8; 8],
    pub sector: i16,
}

#[repr(C)]
#[derive(Clone, Copy, Decode, Debug)]
pub struct RawSector {
    pub floor_h: i16,
    pub ceil_h: i16,
    pub floor_tex: [u8; 8],
    pub ceil_tex: [u8; 8],
    pub light: i16,
    pub special: i16,
    pub tag: i16,
}

#[repr(C)]
#[derive(Clone, Copy, Decode, Debug)]
pub struct RawThing {
    pub x: i16,
    pub y: i16,
    pub angle: i16,
    pub type_: i16,
    pub options: i16,
}

#[repr(C)]
#[derive(Clone, Copy, Decode, Debug)]
pub struct RawThingHexen {
    pub tid: i16,
    pub x: i16,
    pub y: i16,
    pub height: i16,
    pub angle: i16,
    pub type_: i16,
    pub options: i16,
    pub special: u8,
    pub args: [u8; 5],
}

/*=======================================================================*/
/*                                Errors                                 */
/*=======================================================================*/

#[derive(Debug, Error)]
pub enum LumpError {
    #[error("lump {name} size {size} not a multiple of element size {elem_size}")]
    BadLumpSize {
        name: &'static str,
        size: usize,
        elem_size: usize,
    },

    #[error("lump {name} element {elem}: {source}")]
    BadElement {
        name: &'static str,
        elem: usize,
        source: bincode::error::DecodeError,
    },
}

/*=======================================================================*/
/*                              Decoding                                 */
/*=======================================================================*/

/// Decode one lump into a vector of fixed-size records.
pub fn lump_to_vec<T>(name: &'static str, bytes: &[u8]) -> Result<Vec<T>, LumpError>
where
    T: Decode<()>,
{
    let elem = std::mem::size_of::<T>();

    if bytes.len() % elem != 0 {
        return Err(LumpError::BadLumpSize {
            name,
            size: bytes.len(),
            elem_size: elem,
        });
    }

    let cfg = config::standard()
        .with_fixed_int_encoding()
        .with_little_endian();

    let mut out = Vec::with_capacity(bytes.len() / elem);
    let mut slice = bytes;

    while !slice.is_empty() {
        let (val, read) = decode_from_slice::<T, _>(slice, cfg).map_err(|e| LumpError::BadElement {
            name,
            elem: out.len(),
            source: e,
        })?;
        out.push(val);
        slice = &slice[read..];
    }
    Ok(out)
}

/// Bytes of the five input lumps of one map.
pub struct RawLumps<'a> {
    pub vertexes: &'a [u8],
    pub linedefs: &'a [u8],
    pub sidedefs: &'a [u8],
    pub sectors: &'a [u8],
    pub things: &'a [u8],
}

/// Decode a full set of input lumps into builder-ready [`LevelData`].
/// 16-bit map units become fixed-point coordinates.
pub fn decode_level(format: MapFormat, lumps: &RawLumps) -> Result<LevelData, LumpError> {
    let vertices: Vec<LevelVertex> = lump_to_vec::<RawVertex>("VERTEXES", lumps.vertexes)?
        .into_iter()
        .map(|r| LevelVertex {
            raw_x: int_to_coord(r.x as i32),
            raw_y: int_to_coord(r.y as i32),
        })
        .collect();

    let linedefs: Vec<Linedef> = match format {
        MapFormat::Doom => lump_to_vec::<RawLinedef>("LINEDEFS", lumps.linedefs)?
            .into_iter()
            .map(|r| Linedef {
                start: r.v1 as u16 as usize,
                end: r.v2 as u16 as usize,
                flags: LinedefFlags::from_bits_truncate(r.flags as u16 as u32),
                special: r.special as u16,
                tag: r.tag as i32,
                right: sidenum(r.sidenum[0]),
                left: sidenum(r.sidenum[1]),
            })
            .collect(),
        MapFormat::Hexen => lump_to_vec::<RawLinedefHexen>("LINEDEFS", lumps.linedefs)?
            .into_iter()
            .map(|r| Linedef {
                start: r.v1 as u16 as usize,
                end: r.v2 as u16 as usize,
                flags: LinedefFlags::from_bits_truncate(r.flags as u16 as u32),
                special: r.special as u16,
                tag: 0,
                right: sidenum(r.sidenum[0]),
                left: sidenum(r.sidenum[1]),
            })
            .collect(),
    };

    let sidedefs: Vec<Sidedef> = lump_to_vec::<RawSidedef>("SIDEDEFS", lumps.sidedefs)?
        .into_iter()
        .map(|r| Sidedef {
            sector: r.sector as i32,
        })
        .collect();

    let sectors: Vec<Sector> = lump_to_vec::<RawSector>("SECTORS", lumps.sectors)?
        .into_iter()
        .map(|r| Sector {
            floor_h: r.floor_h,
            ceil_h: r.ceil_h,
            light: r.light,
            special: r.special,
            tag: r.tag,
        })
        .collect();

    let things: Vec<Thing> = match format {
        MapFormat::Doom => lump_to_vec::<RawThing>("THINGS", lumps.things)?
            .into_iter()
            .map(|r| Thing {
                raw_x: int_to_coord(r.x as i32),
                raw_y: int_to_coord(r.y as i32),
                type_id: r.type_ as u16,
            })
            .collect(),
        MapFormat::Hexen => lump_to_vec::<RawThingHexen>("THINGS", lumps.things)?
            .into_iter()
            .map(|r| Thing {
                raw_x: int_to_coord(r.x as i32),
                raw_y: int_to_coord(r.y as i32),
                type_id: r.type_ as u16,
            })
            .collect(),
    };

    Ok(LevelData {
        format,
        vertices,
        linedefs,
        sidedefs,
        sectors,
        things,
    })
}

#[inline]
fn sidenum(raw: i16) -> Option<usize> {
    (raw >= 0).then_some(raw as usize)
}

/*=======================================================================*/
/*                                Tests                                  */
/*=======================================================================*/
