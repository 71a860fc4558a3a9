//! HEALPix sky masks: pixel indexing, FITS map I/O and jackknife regions.
//!
//! ```text
//!   base mask (.fits or full sky)
//!        │ read_map
//!        ▼
//!   HealpixMap ──ud_grade──► superpixels (nside_low)
//!        │                        │ one per non-empty superpixel
//!        ▼                        ▼
//!   JackknifeMasks ──write_map──► mask_jack{i}_{nside}.fits
//! ```

pub mod fits;
pub mod healpix;
pub mod jackmask;

pub use fits::{read_map, write_map, FitsMapError};
pub use healpix::{HealpixError, HealpixMap, Ordering};
pub use jackmask::{write_jackknife_masks, JackknifeMask, JackknifeMasks};
