//! Open a netCDF file or Zarr hierarchy and browse its metadata as plain containers.
//!
//! ```no_run
//! let mut ds = nc_dataset::Dataset::open("sample.nc")?;
//! ds.attributes.dir();
//! println!("{:?}", ds.dimensions.list());
//! let _temp = ds.variables["temp"].read()?;
//! ds.close()?;
//! # Ok::<(), nc_dataset::Error>(())
//! ```
pub mod backend;
mod container;
mod dataset;
mod error;
mod options;
mod value;

pub use zarrs;

#[cfg(feature = "netcdf")]
pub use netcdf;

pub use backend::{Data, Values, VariableInfo};
pub use container::Container;
pub use dataset::{Dataset, Group, GroupHandle, VariableHandle};
pub use error::{Error, Result};
pub use options::{Format, Mode, OpenOptions};
pub use value::AttrValue;
