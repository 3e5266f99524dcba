//! # wadnodes
//!
//! BSP node builder for DOOM-family levels.  Feed it the map geometry
//! (vertices, linedefs, sidedefs, sectors) and it derives the segs,
//! convex subsectors, and partition-node tree the engine consumes,
//! in either classic or GL-nodes form.
//!
//! ```no_run
//! use wadnodes::{build_level, BuildInfo, BuildOutcome};
//! # fn load() -> wadnodes::LevelData { unimplemented!() }
//!
//! let data = load();
//! let mut info = BuildInfo::default();
//!
//! match build_level(&data, &mut info)? {
//!     BuildOutcome::Built(bsp) => {
//!         println!("{} subsectors, BSP height {}", bsp.subsecs.len(), bsp.bsp_height);
//!     }
//!     BuildOutcome::Cancelled => println!("stopped by user"),
//! }
//! # Ok::<(), wadnodes::BuildError>(())
//! ```

pub mod bsp;
pub mod level;

pub use bsp::{
    build_level, BspData, BuildError, BuildInfo, BuildOutcome, BuildResult, Child, Node, Seg,
    Subsec, Vertex,
};
pub use level::{LevelData, LevelVertex, Linedef, LinedefFlags, MapFormat, Sector, Sidedef, Thing};
