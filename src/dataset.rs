use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::SystemTime;

use parking_lot::Mutex;

use crate::backend::{self, Backend, Data, ROOT, VariableInfo, join_scope};
use crate::{AttrValue, Container, Error, Format, Mode, OpenOptions};

type SharedBackend = Arc<Mutex<Option<Box<dyn Backend>>>>;
type WeakBackend = Weak<Mutex<Option<Box<dyn Backend>>>>;

/// Run `f` against the backend, failing if the dataset has been closed or dropped.
fn with_backend<T>(
    backend: &WeakBackend,
    f: impl FnOnce(&dyn Backend) -> crate::Result<T>,
) -> crate::Result<T> {
    let shared = backend.upgrade().ok_or(Error::Closed)?;
    let guard = shared.lock();
    let open = guard.as_deref().ok_or(Error::Closed)?;
    f(open)
}

/// A nested scope, loaded from a [GroupHandle].
#[derive(Debug, Clone)]
pub struct Group {
    path: String,
    pub attributes: Container<AttrValue>,
    pub dimensions: Container<usize>,
    pub groups: Container<GroupHandle>,
    pub variables: Container<VariableHandle>,
}

impl Group {
    pub fn path(&self) -> &str {
        &self.path
    }
}

fn load_scope(
    backend: &dyn Backend,
    scope: &str,
    weak: &WeakBackend,
    convert_booleans: bool,
) -> crate::Result<Group> {
    let mut attributes = Container::new();
    for (name, mut value) in backend.attributes(scope)? {
        if convert_booleans {
            value = value.convert_boolean();
        }
        attributes.insert(name, value);
    }

    let mut dimensions = Container::new();
    for (name, len) in backend.dimensions(scope)? {
        dimensions.insert(name, len);
    }

    let mut groups = Container::new();
    for name in backend.group_names(scope)? {
        let handle = GroupHandle {
            path: join_scope(scope, &name),
            name: name.clone(),
            convert_booleans,
            backend: weak.clone(),
        };
        groups.insert(name, handle);
    }

    // handles only; data is read on demand
    let mut variables = Container::new();
    for name in backend.variable_names(scope)? {
        let info = backend.variable(scope, &name)?;
        let handle = VariableHandle {
            scope: scope.to_string(),
            info,
            backend: weak.clone(),
        };
        variables.insert(name, handle);
    }

    log::debug!(
        "loaded {scope}: {} attributes, {} dimensions, {} groups, {} variables",
        attributes.len(),
        dimensions.len(),
        groups.len(),
        variables.len()
    );
    Ok(Group {
        path: scope.to_string(),
        attributes,
        dimensions,
        groups,
        variables,
    })
}

/// Unexpanded reference to a child group.
#[derive(Debug, Clone)]
pub struct GroupHandle {
    name: String,
    path: String,
    convert_booleans: bool,
    backend: WeakBackend,
}

impl GroupHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full path of the group, e.g. `/forecast/surface`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Read this group's metadata into its own containers.
    pub fn load(&self) -> crate::Result<Group> {
        with_backend(&self.backend, |b| {
            load_scope(b, &self.path, &self.backend, self.convert_booleans)
        })
    }
}

impl fmt::Display for GroupHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<group {}>", self.path)
    }
}

/// Descriptor for a variable whose data has not been read.
#[derive(Debug, Clone)]
pub struct VariableHandle {
    scope: String,
    info: VariableInfo,
    backend: WeakBackend,
}

impl VariableHandle {
    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn path(&self) -> String {
        join_scope(&self.scope, &self.info.name)
    }

    pub fn shape(&self) -> &[u64] {
        &self.info.shape
    }

    /// Number of elements.
    pub fn size(&self) -> u64 {
        self.info.shape.iter().product()
    }

    pub fn dtype(&self) -> &str {
        &self.info.dtype
    }

    pub fn dimensions(&self) -> &[Option<String>] {
        &self.info.dimensions
    }

    pub fn attributes(&self) -> &Container<AttrValue> {
        &self.info.attributes
    }

    /// Read the whole variable.
    pub fn read(&self) -> crate::Result<Data> {
        with_backend(&self.backend, |b| b.read_variable(&self.scope, &self.info.name))
    }
}

impl fmt::Display for VariableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<variable {} {} (", self.info.name, self.info.dtype)?;
        for (idx, (dim, len)) in self
            .info
            .dimensions
            .iter()
            .zip(self.info.shape.iter())
            .enumerate()
        {
            if idx > 0 {
                f.write_str(", ")?;
            }
            match dim {
                Some(dim) => write!(f, "{dim}: {len}")?,
                None => write!(f, "{len}")?,
            }
        }
        f.write_str(")>")
    }
}

/// An open data file with its metadata copied into plain containers.
///
/// The containers are filled once, when the dataset is opened.
/// Group and variable handles refer back to the open file and stop working once it is closed.
pub struct Dataset {
    path: PathBuf,
    mode: Mode,
    clobber: bool,
    diskless: bool,
    persist: bool,
    format: Format,
    convert_booleans: bool,
    opened: bool,
    time_opened: SystemTime,
    time_closed: Option<SystemTime>,
    handle: SharedBackend,
    /// Global attributes.
    pub attributes: Container<AttrValue>,
    /// Root dimensions and their lengths.
    pub dimensions: Container<usize>,
    /// Root child groups.
    pub groups: Container<GroupHandle>,
    /// Root variables.
    pub variables: Container<VariableHandle>,
}

impl Dataset {
    /// Open with [OpenOptions::default].
    pub fn open(path: impl AsRef<Path>) -> crate::Result<Self> {
        Self::open_with(path, &OpenOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: &OpenOptions) -> crate::Result<Self> {
        let path = path.as_ref();
        log::debug!(
            "opening {} with mode {} and format {}",
            path.display(),
            options.mode,
            options.format
        );
        let handle: SharedBackend = Arc::new(Mutex::new(Some(backend::open(path, options)?)));
        let weak = Arc::downgrade(&handle);
        let root = with_backend(&weak, |b| {
            load_scope(b, ROOT, &weak, options.convert_booleans)
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            mode: options.mode,
            clobber: options.clobber,
            diskless: options.diskless,
            persist: options.persist,
            format: options.format,
            convert_booleans: options.convert_booleans,
            opened: true,
            time_opened: SystemTime::now(),
            time_closed: None,
            handle,
            attributes: root.attributes,
            dimensions: root.dimensions,
            groups: root.groups,
            variables: root.variables,
        })
    }

    /// Release the underlying file.
    ///
    /// Fails with [Error::Closed] if the dataset was already closed.
    pub fn close(&mut self) -> crate::Result<()> {
        let backend = self.handle.lock().take().ok_or(Error::Closed)?;
        let result = backend.close();
        self.opened = false;
        self.time_closed = Some(SystemTime::now());
        log::debug!("closed {}", self.path.display());
        result
    }

    /// Load a group by its full path, e.g. `/forecast/surface`.
    pub fn group(&self, path: &str) -> crate::Result<Group> {
        let weak = Arc::downgrade(&self.handle);
        with_backend(&weak, |b| load_scope(b, path, &weak, self.convert_booleans))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn clobber(&self) -> bool {
        self.clobber
    }

    pub fn diskless(&self) -> bool {
        self.diskless
    }

    pub fn persist(&self) -> bool {
        self.persist
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn convert_booleans(&self) -> bool {
        self.convert_booleans
    }

    pub fn is_open(&self) -> bool {
        self.opened
    }

    pub fn time_opened(&self) -> SystemTime {
        self.time_opened
    }

    /// Set once [Dataset::close] has been called.
    pub fn time_closed(&self) -> Option<SystemTime> {
        self.time_closed
    }
}

impl fmt::Debug for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dataset")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("format", &self.format)
            .field("opened", &self.opened)
            .field("attributes", &self.attributes)
            .field("dimensions", &self.dimensions)
            .field("groups", &self.groups)
            .field("variables", &self.variables)
            .finish_non_exhaustive()
    }
}
