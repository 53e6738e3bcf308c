//! Survey FITS spectra, read into one normalised model.
//!
//! ```no_run
//! use fits_spectra::registry::FormatRegistry;
//!
//! let registry = FormatRegistry::with_builtin_formats();
//! let spectra = registry.read("spectrum.fits".as_ref(), None)?;
//! for spectrum in &spectra {
//!     println!("{:?} {} points", spectrum.label(), spectrum.len());
//! }
//! # Ok::<(), fits_spectra::error::SpectraError>(())
//! ```

pub mod data;
pub mod error;
pub mod fits;
pub mod format;
pub mod marz;
pub mod registry;
pub mod transform;

pub use data::model::{Spectrum, SpectrumCollection};
pub use error::{Result, SpectraError};
pub use registry::FormatRegistry;
