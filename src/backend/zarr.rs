use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::{Buf, Bytes};
use serde::{Deserialize, Serialize};
use zarrs::array::Array;
use zarrs::filesystem::FilesystemStore;
use zarrs::storage::{
    ListableStorageTraits, ReadableStorageTraits, StoreKey, StorePrefix, WritableStorageTraits,
};

use super::{Backend, Data, ROOT, Values, VariableInfo, join_scope};
use crate::{AttrValue, Error, Mode, OpenOptions};

/// Contents of a `zarr.json` node document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "node_type", rename_all = "lowercase")]
pub(crate) enum ZarrNode {
    Array(ZarrArrayMetadata),
    Group(ZarrGroupMetadata),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ZarrGroupMetadata {
    #[serde(default = "default_zarr_format")]
    pub zarr_format: u8,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl Default for ZarrGroupMetadata {
    fn default() -> Self {
        Self {
            zarr_format: default_zarr_format(),
            attributes: Default::default(),
        }
    }
}

/// The parts of array metadata needed for inspection.
///
/// Codecs, chunking and fill value are left to zarrs when the data is read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ZarrArrayMetadata {
    pub shape: Vec<u64>,
    /// Either a bare name or a `{"name": .., "configuration": ..}` object.
    pub data_type: serde_json::Value,
    #[serde(default)]
    pub dimension_names: Option<Vec<Option<String>>>,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

fn default_zarr_format() -> u8 {
    3
}

impl ZarrArrayMetadata {
    fn data_type_name(&self) -> String {
        match &self.data_type {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Object(m) => match m.get("name") {
                Some(serde_json::Value::String(s)) => s.clone(),
                _ => self.data_type.to_string(),
            },
            v => v.to_string(),
        }
    }

    /// Axis names padded to the array's rank.
    fn axis_names(&self) -> Vec<Option<String>> {
        let mut names = self.dimension_names.clone().unwrap_or_default();
        names.resize(self.shape.len(), None);
        names
    }
}

/// Zarr v3 hierarchy on the local filesystem.
pub struct ZarrBackend {
    root: PathBuf,
    store: Arc<FilesystemStore>,
}

impl std::fmt::Debug for ZarrBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZarrBackend")
            .field("root", &self.root)
            .finish()
    }
}

impl ZarrBackend {
    pub fn open(path: &Path, options: &OpenOptions) -> crate::Result<Self> {
        if options.diskless {
            return Err(Error::open_msg(
                path,
                "diskless access is not supported for Zarr hierarchies",
            ));
        }
        match options.mode {
            Mode::Write => Self::create(path, options.clobber),
            Mode::Read | Mode::Append => {
                let backend = Self::new(path)?;
                match backend.node(ROOT).map_err(|e| Error::open(path, e))? {
                    Some(ZarrNode::Group(_)) => Ok(backend),
                    Some(ZarrNode::Array(_)) => Err(Error::open_msg(
                        path,
                        "hierarchy root is an array, not a group",
                    )),
                    None => Err(Error::open_msg(path, "no zarr.json found")),
                }
            }
        }
    }

    fn new(path: &Path) -> crate::Result<Self> {
        let store = FilesystemStore::new(path).map_err(|e| Error::open(path, e))?;
        Ok(Self {
            root: path.to_path_buf(),
            store: Arc::new(store),
        })
    }

    /// Create an empty hierarchy with a root group.
    fn create(path: &Path, clobber: bool) -> crate::Result<Self> {
        if path.exists() {
            if !clobber {
                return Err(Error::open_msg(path, "path exists and clobber is disabled"));
            }
            log::debug!("clobbering {}", path.display());
            let removed = if path.is_dir() {
                std::fs::remove_dir_all(path)
            } else {
                std::fs::remove_file(path)
            };
            removed.map_err(|e| Error::open(path, e))?;
        }
        std::fs::create_dir_all(path).map_err(|e| Error::open(path, e))?;

        let backend = Self::new(path)?;
        let root = ZarrNode::Group(ZarrGroupMetadata::default());
        let bytes = Bytes::from(serde_json::to_vec_pretty(&root)?);
        backend
            .store
            .set(&metadata_key(ROOT)?, bytes)
            .map_err(|e| Error::open(path, e))?;
        Ok(backend)
    }

    /// Parse the node document at a scope, if there is one.
    fn node(&self, scope: &str) -> crate::Result<Option<ZarrNode>> {
        let Some(bytes) = self.store.get(&metadata_key(scope)?).map_err(Error::wrap)? else {
            return Ok(None);
        };
        let node = serde_json::from_reader(bytes.reader()).map_err(|e| {
            Error::general(format!("could not parse Zarr metadata at {scope}: {e}"))
        })?;
        Ok(Some(node))
    }

    fn group(&self, scope: &str) -> crate::Result<ZarrGroupMetadata> {
        match self.node(scope)? {
            Some(ZarrNode::Group(g)) => Ok(g),
            Some(ZarrNode::Array(_)) => Err(Error::general(format!("{scope} is an array"))),
            None => Err(Error::general(format!("no group at {scope}"))),
        }
    }

    fn array(&self, scope: &str, name: &str) -> crate::Result<ZarrArrayMetadata> {
        let path = join_scope(scope, name);
        match self.node(&path)? {
            Some(ZarrNode::Array(a)) => Ok(a),
            Some(ZarrNode::Group(_)) => Err(Error::general(format!("{path} is a group"))),
            None => Err(Error::general(format!("no variable at {path}"))),
        }
    }

    /// Immediate child nodes, skipping directories without node metadata.
    fn children(&self, scope: &str) -> crate::Result<Vec<(String, ZarrNode)>> {
        let listing = self
            .store
            .list_dir(&scope_prefix(scope)?)
            .map_err(Error::wrap)?;
        let mut out = Vec::new();
        for prefix in listing.prefixes() {
            let Some(name) = prefix.as_str().trim_end_matches('/').rsplit('/').next() else {
                continue;
            };
            if let Some(node) = self.node(&join_scope(scope, name))? {
                out.push((name.to_string(), node));
            }
        }
        Ok(out)
    }

    /// Named axes of the scope's arrays and their lengths.
    fn axis_lengths(&self, scope: &str) -> crate::Result<BTreeMap<String, u64>> {
        let mut dims = BTreeMap::new();
        for (array_name, node) in self.children(scope)? {
            let ZarrNode::Array(meta) = node else {
                continue;
            };
            for (dim, len) in meta.axis_names().into_iter().zip(meta.shape.iter().copied()) {
                let Some(dim) = dim else {
                    continue;
                };
                let existing = *dims.entry(dim.clone()).or_insert(len);
                if existing != len {
                    return Err(Error::general(format!(
                        "dimension {dim} has length {existing} but {array_name} uses {len}"
                    )));
                }
            }
        }
        Ok(dims)
    }
}

fn metadata_key(scope: &str) -> crate::Result<StoreKey> {
    let path = scope.trim_matches('/');
    let key = if path.is_empty() {
        "zarr.json".to_string()
    } else {
        format!("{path}/zarr.json")
    };
    StoreKey::new(key).map_err(Error::wrap)
}

fn scope_prefix(scope: &str) -> crate::Result<StorePrefix> {
    let path = scope.trim_matches('/');
    let prefix = if path.is_empty() {
        String::new()
    } else {
        format!("{path}/")
    };
    StorePrefix::new(prefix).map_err(Error::wrap)
}

macro_rules! retrieve {
    ($array:expr, $ty:ty) => {{
        let values: Vec<$ty> = $array
            .retrieve_array_subset(&$array.subset_all())
            .map_err(Error::wrap)?;
        values
    }};
}

impl Backend for ZarrBackend {
    fn attribute_names(&self, scope: &str) -> crate::Result<Vec<String>> {
        Ok(self.group(scope)?.attributes.keys().cloned().collect())
    }

    fn attribute(&self, scope: &str, name: &str) -> crate::Result<AttrValue> {
        let mut group = self.group(scope)?;
        group
            .attributes
            .remove(name)
            .map(AttrValue::from_json)
            .ok_or_else(|| Error::general(format!("no attribute {name} in {scope}")))
    }

    fn dimension_names(&self, scope: &str) -> crate::Result<Vec<String>> {
        Ok(self.axis_lengths(scope)?.into_keys().collect())
    }

    fn dimension_len(&self, scope: &str, name: &str) -> crate::Result<usize> {
        let len = self
            .axis_lengths(scope)?
            .remove(name)
            .ok_or_else(|| Error::general(format!("no dimension {name} in {scope}")))?;
        usize::try_from(len).map_err(Error::wrap)
    }

    fn attributes(&self, scope: &str) -> crate::Result<Vec<(String, AttrValue)>> {
        Ok(self
            .group(scope)?
            .attributes
            .into_iter()
            .map(|(k, v)| (k, AttrValue::from_json(v)))
            .collect())
    }

    fn dimensions(&self, scope: &str) -> crate::Result<Vec<(String, usize)>> {
        self.axis_lengths(scope)?
            .into_iter()
            .map(|(name, len)| Ok((name, usize::try_from(len).map_err(Error::wrap)?)))
            .collect()
    }

    fn group_names(&self, scope: &str) -> crate::Result<Vec<String>> {
        Ok(self
            .children(scope)?
            .into_iter()
            .filter(|(_, node)| matches!(node, ZarrNode::Group(_)))
            .map(|(name, _)| name)
            .collect())
    }

    fn variable_names(&self, scope: &str) -> crate::Result<Vec<String>> {
        Ok(self
            .children(scope)?
            .into_iter()
            .filter(|(_, node)| matches!(node, ZarrNode::Array(_)))
            .map(|(name, _)| name)
            .collect())
    }

    fn variable(&self, scope: &str, name: &str) -> crate::Result<VariableInfo> {
        let meta = self.array(scope, name)?;
        Ok(VariableInfo {
            name: name.to_string(),
            dimensions: meta.axis_names(),
            shape: meta.shape.clone(),
            dtype: meta.data_type_name(),
            attributes: meta
                .attributes
                .into_iter()
                .map(|(k, v)| (k, AttrValue::from_json(v)))
                .collect(),
        })
    }

    fn read_variable(&self, scope: &str, name: &str) -> crate::Result<Data> {
        let meta = self.array(scope, name)?;
        let path = join_scope(scope, name);
        log::debug!("reading {path} from {}", self.root.display());
        let array = Array::open(self.store.clone(), &path).map_err(Error::wrap)?;

        let values = match meta.data_type_name().as_str() {
            "bool" => Values::Bool(retrieve!(array, bool)),
            "int8" => Values::Int(widen(retrieve!(array, i8))),
            "int16" => Values::Int(widen(retrieve!(array, i16))),
            "int32" => Values::Int(widen(retrieve!(array, i32))),
            "int64" => Values::Int(retrieve!(array, i64)),
            "uint8" => Values::UInt(widen(retrieve!(array, u8))),
            "uint16" => Values::UInt(widen(retrieve!(array, u16))),
            "uint32" => Values::UInt(widen(retrieve!(array, u32))),
            "uint64" => Values::UInt(retrieve!(array, u64)),
            "float32" => Values::Float(widen(retrieve!(array, f32))),
            "float64" => Values::Float(retrieve!(array, f64)),
            s => {
                return Err(Error::general(format!(
                    "unsupported data type for {path}: {s}"
                )));
            }
        };
        Ok(Data {
            shape: meta.shape,
            values,
        })
    }
}

fn widen<T: Into<U>, U>(values: Vec<T>) -> Vec<U> {
    values.into_iter().map(Into::into).collect()
}
