use std::path::Path;

use netcdf::{AttrValue as NcAttrValue, Options};

use super::{Backend, Data, Values, VariableInfo};
use crate::{AttrValue, Container, Error, Format, Mode, OpenOptions};

enum Handle {
    Read(netcdf::File),
    Write(netcdf::MutableFile),
}

impl Handle {
    fn file(&self) -> &netcdf::File {
        match self {
            Handle::Read(f) => f,
            Handle::Write(f) => &**f,
        }
    }
}

/// Either the file itself (classic formats have no root group) or a group within it.
enum Scope<'f> {
    File(&'f netcdf::File),
    Group(netcdf::Group<'f>),
}

impl<'f> Scope<'f> {
    fn attribute_names(&self) -> Vec<String> {
        match self {
            Scope::File(f) => f.attributes().map(|a| a.name().to_string()).collect(),
            Scope::Group(g) => g.attributes().map(|a| a.name().to_string()).collect(),
        }
    }

    fn attribute(&self, name: &str) -> crate::Result<Option<NcAttrValue>> {
        let attr = match self {
            Scope::File(f) => f.attribute(name),
            Scope::Group(g) => g.attribute(name),
        };
        attr.map(|a| a.value()).transpose().map_err(Error::wrap)
    }

    fn dimensions(&self) -> Vec<(String, usize)> {
        match self {
            Scope::File(f) => f.dimensions().map(|d| (d.name(), d.len())).collect(),
            Scope::Group(g) => g.dimensions().map(|d| (d.name(), d.len())).collect(),
        }
    }

    fn group_names(&self) -> Vec<String> {
        match self {
            Scope::File(_) => Vec::new(),
            Scope::Group(g) => g.groups().map(|g| g.name()).collect(),
        }
    }

    fn variable_names(&self) -> Vec<String> {
        match self {
            Scope::File(f) => f.variables().map(|v| v.name()).collect(),
            Scope::Group(g) => g.variables().map(|v| v.name()).collect(),
        }
    }

    fn variable(&self, name: &str) -> Option<netcdf::Variable<'_>> {
        match self {
            Scope::File(f) => f.variable(name),
            Scope::Group(g) => g.variable(name),
        }
    }
}

/// A netCDF-3 or netCDF-4 file opened through libnetcdf.
pub struct NetcdfBackend {
    handle: Handle,
}

impl NetcdfBackend {
    pub fn open(path: &Path, options: &OpenOptions) -> crate::Result<Self> {
        let mut flags = Options::empty();
        if options.diskless {
            flags |= Options::DISKLESS;
        }
        if options.persist {
            log::warn!(
                "persist is not exposed by the netCDF bindings; ignoring it for {}",
                path.display()
            );
        }

        let handle = match options.mode {
            Mode::Read => {
                Handle::Read(netcdf::open_with(path, flags).map_err(|e| Error::open(path, e))?)
            }
            Mode::Append => Handle::Write(
                netcdf::append_with(path, flags).map_err(|e| Error::open(path, e))?,
            ),
            Mode::Write => {
                flags |= match options.format {
                    Format::Netcdf4 => Options::NETCDF4,
                    Format::Netcdf4Classic => Options::NETCDF4 | Options::CLASSIC,
                    Format::Netcdf3Classic => Options::empty(),
                    Format::Netcdf3Offset64 => Options::_64BIT_OFFSET,
                    Format::Netcdf3Data64 => Options::_64BIT_DATA,
                    Format::Zarr => {
                        return Err(Error::open_msg(path, "ZARR is not a netCDF format"));
                    }
                };
                if !options.clobber {
                    flags |= Options::NOCLOBBER;
                }
                Handle::Write(
                    netcdf::create_with(path, flags).map_err(|e| Error::open(path, e))?,
                )
            }
        };
        Ok(Self { handle })
    }

    fn scope(&self, path: &str) -> crate::Result<Scope<'_>> {
        let file = self.handle.file();
        let path = path.trim_matches('/');
        if path.is_empty() {
            return Ok(match file.root() {
                Some(g) => Scope::Group(g),
                None => Scope::File(file),
            });
        }
        file.group(path)
            .map_err(Error::wrap)?
            .map(Scope::Group)
            .ok_or_else(|| Error::general(format!("no group /{path}")))
    }
}

fn ints<T: Into<i64>>(values: Vec<T>) -> AttrValue {
    AttrValue::List(values.into_iter().map(|v| AttrValue::Int(v.into())).collect())
}

fn uints<T: Into<u64>>(values: Vec<T>) -> AttrValue {
    AttrValue::List(values.into_iter().map(|v| AttrValue::UInt(v.into())).collect())
}

fn floats<T: Into<f64>>(values: Vec<T>) -> AttrValue {
    AttrValue::List(values.into_iter().map(|v| AttrValue::Float(v.into())).collect())
}

fn convert_attribute(value: NcAttrValue) -> AttrValue {
    match value {
        NcAttrValue::Uchar(v) => AttrValue::UInt(v.into()),
        NcAttrValue::Uchars(v) => uints(v),
        NcAttrValue::Schar(v) => AttrValue::Int(v.into()),
        NcAttrValue::Schars(v) => ints(v),
        NcAttrValue::Ushort(v) => AttrValue::UInt(v.into()),
        NcAttrValue::Ushorts(v) => uints(v),
        NcAttrValue::Short(v) => AttrValue::Int(v.into()),
        NcAttrValue::Shorts(v) => ints(v),
        NcAttrValue::Uint(v) => AttrValue::UInt(v.into()),
        NcAttrValue::Uints(v) => uints(v),
        NcAttrValue::Int(v) => AttrValue::Int(v.into()),
        NcAttrValue::Ints(v) => ints(v),
        NcAttrValue::Ulonglong(v) => AttrValue::UInt(v),
        NcAttrValue::Ulonglongs(v) => uints(v),
        NcAttrValue::Longlong(v) => AttrValue::Int(v),
        NcAttrValue::Longlongs(v) => ints(v),
        NcAttrValue::Float(v) => AttrValue::Float(v.into()),
        NcAttrValue::Floats(v) => floats(v),
        NcAttrValue::Double(v) => AttrValue::Float(v),
        NcAttrValue::Doubles(v) => floats(v),
        NcAttrValue::Str(v) => AttrValue::Str(v),
        NcAttrValue::Strs(v) => v.into(),
    }
}

impl Backend for NetcdfBackend {
    fn attribute_names(&self, scope: &str) -> crate::Result<Vec<String>> {
        Ok(self.scope(scope)?.attribute_names())
    }

    fn attribute(&self, scope: &str, name: &str) -> crate::Result<AttrValue> {
        let value = self
            .scope(scope)?
            .attribute(name)?
            .ok_or_else(|| Error::general(format!("no attribute {name} in {scope}")))?;
        Ok(convert_attribute(value))
    }

    fn attributes(&self, scope: &str) -> crate::Result<Vec<(String, AttrValue)>> {
        let group = self.scope(scope)?;
        let mut out = Vec::new();
        for name in group.attribute_names() {
            let value = group
                .attribute(&name)?
                .ok_or_else(|| Error::general(format!("no attribute {name} in {scope}")))?;
            out.push((name, convert_attribute(value)));
        }
        Ok(out)
    }

    fn dimension_names(&self, scope: &str) -> crate::Result<Vec<String>> {
        Ok(self
            .scope(scope)?
            .dimensions()
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }

    fn dimension_len(&self, scope: &str, name: &str) -> crate::Result<usize> {
        self.scope(scope)?
            .dimensions()
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, len)| len)
            .ok_or_else(|| Error::general(format!("no dimension {name} in {scope}")))
    }

    fn dimensions(&self, scope: &str) -> crate::Result<Vec<(String, usize)>> {
        Ok(self.scope(scope)?.dimensions())
    }

    fn group_names(&self, scope: &str) -> crate::Result<Vec<String>> {
        Ok(self.scope(scope)?.group_names())
    }

    fn variable_names(&self, scope: &str) -> crate::Result<Vec<String>> {
        Ok(self.scope(scope)?.variable_names())
    }

    fn variable(&self, scope: &str, name: &str) -> crate::Result<VariableInfo> {
        let group = self.scope(scope)?;
        let var = group
            .variable(name)
            .ok_or_else(|| Error::general(format!("no variable {name} in {scope}")))?;
        let mut attributes = Container::new();
        for attr in var.attributes() {
            let value = attr.value().map_err(Error::wrap)?;
            attributes.insert(attr.name(), convert_attribute(value));
        }
        Ok(VariableInfo {
            name: var.name(),
            dimensions: var.dimensions().iter().map(|d| Some(d.name())).collect(),
            shape: var.dimensions().iter().map(|d| d.len() as u64).collect(),
            dtype: format!("{:?}", var.vartype()),
            attributes,
        })
    }

    fn read_variable(&self, scope: &str, name: &str) -> crate::Result<Data> {
        let group = self.scope(scope)?;
        let var = group
            .variable(name)
            .ok_or_else(|| Error::general(format!("no variable {name} in {scope}")))?;
        // libnetcdf converts every numeric type on read
        let values = var.values::<f64, _>(..).map_err(Error::wrap)?;
        Ok(Data {
            shape: var.dimensions().iter().map(|d| d.len() as u64).collect(),
            values: Values::Float(values),
        })
    }
}
