//! Data-access libraries behind a [Dataset](crate::Dataset).
//!
//! Every operation is scoped by a group path, `/` being the root group.

#[cfg(feature = "netcdf")]
mod nc;
mod zarr;

use std::path::Path;

use crate::{AttrValue, Container, Error, Format, Mode, OpenOptions};

pub use zarr::ZarrBackend;

#[cfg(feature = "netcdf")]
pub use nc::NetcdfBackend;

pub(crate) const ROOT: &str = "/";

/// Path of a child node within a scope.
pub(crate) fn join_scope(scope: &str, name: &str) -> String {
    let scope = scope.trim_end_matches('/');
    format!("{scope}/{name}")
}

/// Metadata describing a variable, without its data.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableInfo {
    pub name: String,
    /// Axis names; `None` for anonymous axes.
    pub dimensions: Vec<Option<String>>,
    pub shape: Vec<u64>,
    /// Element type as named by the library.
    pub dtype: String,
    pub attributes: Container<AttrValue>,
}

/// Flat, C-ordered variable values.
#[derive(Debug, Clone, PartialEq)]
pub enum Values {
    Bool(Vec<bool>),
    Int(Vec<i64>),
    UInt(Vec<u64>),
    Float(Vec<f64>),
}

impl Values {
    pub fn len(&self) -> usize {
        match self {
            Values::Bool(v) => v.len(),
            Values::Int(v) => v.len(),
            Values::UInt(v) => v.len(),
            Values::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The full contents of a variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Data {
    pub shape: Vec<u64>,
    pub values: Values,
}

impl Data {
    /// Values widened to `f64`; booleans become 0 or 1.
    pub fn to_f64(&self) -> Vec<f64> {
        match &self.values {
            Values::Bool(v) => v.iter().map(|b| f64::from(u8::from(*b))).collect(),
            Values::Int(v) => v.iter().map(|n| *n as f64).collect(),
            Values::UInt(v) => v.iter().map(|n| *n as f64).collect(),
            Values::Float(v) => v.clone(),
        }
    }
}

/// An open file (or hierarchy) in some data-access library.
pub trait Backend: Send {
    fn attribute_names(&self, scope: &str) -> crate::Result<Vec<String>>;

    fn attribute(&self, scope: &str, name: &str) -> crate::Result<AttrValue>;

    fn dimension_names(&self, scope: &str) -> crate::Result<Vec<String>>;

    fn dimension_len(&self, scope: &str, name: &str) -> crate::Result<usize>;

    /// Every attribute of a scope.
    ///
    /// Backends that parse a whole scope at once should override this.
    fn attributes(&self, scope: &str) -> crate::Result<Vec<(String, AttrValue)>> {
        self.attribute_names(scope)?
            .into_iter()
            .map(|name| {
                let value = self.attribute(scope, &name)?;
                Ok((name, value))
            })
            .collect()
    }

    /// Every dimension of a scope with its length.
    fn dimensions(&self, scope: &str) -> crate::Result<Vec<(String, usize)>> {
        self.dimension_names(scope)?
            .into_iter()
            .map(|name| {
                let len = self.dimension_len(scope, &name)?;
                Ok((name, len))
            })
            .collect()
    }

    /// Names of the immediate child groups.
    fn group_names(&self, scope: &str) -> crate::Result<Vec<String>>;

    fn variable_names(&self, scope: &str) -> crate::Result<Vec<String>>;

    fn variable(&self, scope: &str, name: &str) -> crate::Result<VariableInfo>;

    fn read_variable(&self, scope: &str, name: &str) -> crate::Result<Data>;

    /// Release the underlying handle.
    fn close(self: Box<Self>) -> crate::Result<()> {
        drop(self);
        Ok(())
    }
}

fn is_remote(path: &Path) -> bool {
    path.to_str()
        .is_some_and(|s| s.starts_with("http://") || s.starts_with("https://"))
}

/// Which library handles the path.
///
/// Existing paths are sniffed: directories are Zarr hierarchies, anything else is netCDF.
/// The requested format only matters when creating.
pub(crate) fn resolve_format(path: &Path, options: &OpenOptions) -> crate::Result<Format> {
    if options.mode == Mode::Write || is_remote(path) {
        return Ok(options.format);
    }
    let meta = std::fs::metadata(path).map_err(|e| Error::open(path, e))?;
    let format = if meta.is_dir() {
        Format::Zarr
    } else if options.format.is_netcdf() {
        options.format
    } else {
        Format::Netcdf4
    };
    Ok(format)
}

pub(crate) fn open(path: &Path, options: &OpenOptions) -> crate::Result<Box<dyn Backend>> {
    let format = resolve_format(path, options)?;
    log::debug!("using {format} backend for {}", path.display());
    match format {
        Format::Zarr => Ok(Box::new(ZarrBackend::open(path, options)?)),
        _ => open_netcdf(path, options),
    }
}

#[cfg(feature = "netcdf")]
fn open_netcdf(path: &Path, options: &OpenOptions) -> crate::Result<Box<dyn Backend>> {
    Ok(Box::new(NetcdfBackend::open(path, options)?))
}

#[cfg(not(feature = "netcdf"))]
fn open_netcdf(path: &Path, _options: &OpenOptions) -> crate::Result<Box<dyn Backend>> {
    Err(Error::open_msg(
        path,
        "netCDF files require the `netcdf` feature",
    ))
}
