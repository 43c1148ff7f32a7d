//! Schema authorities.
//!
//! An authority maps a schema id to the top-level values of a schema
//! document. Unknown ids produce an empty stream rather than an error, so a
//! system can try several authorities in order.

use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::element::{parse, Element};
use crate::error::IonSchemaError;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

type Source = Box<dyn FnOnce() -> Result<Vec<Element>, IonSchemaError> + Send>;

enum StreamState {
    Pending(Source),
    Open(std::vec::IntoIter<Element>),
    Closed,
}

/// Top-level values of one schema document.
///
/// The underlying resource is acquired on the first call to `next` and
/// released when the stream is exhausted, closed, or dropped. A failure to
/// acquire it is yielded once, after which the stream is closed.
pub struct ElementStream {
    state: StreamState,
}

impl ElementStream {
    pub fn empty() -> Self {
        Self {
            state: StreamState::Closed,
        }
    }

    pub fn from_elements(elements: Vec<Element>) -> Self {
        Self {
            state: StreamState::Open(elements.into_iter()),
        }
    }

    /// A stream that calls `source` the first time it is polled.
    pub fn lazy<F>(source: F) -> Self
    where
        F: FnOnce() -> Result<Vec<Element>, IonSchemaError> + Send + 'static,
    {
        Self {
            state: StreamState::Pending(Box::new(source)),
        }
    }

    /// Releases the underlying resource. Further calls to `next` return `None`.
    pub fn close(&mut self) {
        self.state = StreamState::Closed;
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, StreamState::Closed)
    }
}

impl Iterator for ElementStream {
    type Item = Result<Element, IonSchemaError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let StreamState::Pending(_) = self.state {
            let StreamState::Pending(source) =
                std::mem::replace(&mut self.state, StreamState::Closed)
            else {
                return None;
            };
            match source() {
                Ok(elements) => self.state = StreamState::Open(elements.into_iter()),
                Err(e) => return Some(Err(e)),
            }
        }
        let StreamState::Open(elements) = &mut self.state else {
            return None;
        };
        match elements.next() {
            Some(element) => Some(Ok(element)),
            None => {
                self.state = StreamState::Closed;
                None
            }
        }
    }
}

impl fmt::Debug for ElementStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            StreamState::Pending(_) => "pending",
            StreamState::Open(_) => "open",
            StreamState::Closed => "closed",
        };
        f.debug_struct("ElementStream").field("state", &state).finish()
    }
}

/// Resolves schema ids to schema content.
pub trait Authority: Send + Sync {
    /// Returns the values of the schema with the given id, or an empty stream
    /// when this authority does not know the id.
    ///
    /// # Errors
    ///
    /// Returns an error when the id is known but cannot be accessed.
    fn elements(&self, id: &str) -> Result<ElementStream, IonSchemaError>;
}

/// Serves schemas from files below a base directory.
///
/// A schema id is a path relative to the base. Ids that would resolve to a
/// file outside of the base are denied.
#[derive(Debug, Clone)]
pub struct FilesystemAuthority {
    base: PathBuf,
}

impl FilesystemAuthority {
    /// # Errors
    ///
    /// Returns `IonSchemaError::FileNotFound` if `base` is not a directory.
    pub fn new(base: impl AsRef<Path>) -> Result<Self, IonSchemaError> {
        let base = base.as_ref();
        if !base.is_dir() {
            return Err(IonSchemaError::FileNotFound {
                path: base.to_path_buf(),
            });
        }
        let base = base.canonicalize().map_err(|source| IonSchemaError::Io {
            path: base.to_path_buf(),
            source,
        })?;
        Ok(Self { base })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Joins `id` to the base without touching the filesystem.
    fn resolve(&self, id: &str) -> Result<PathBuf, IonSchemaError> {
        let denied = |reason: &str| IonSchemaError::AccessDenied {
            id: id.to_string(),
            reason: reason.to_string(),
        };
        let mut relative = PathBuf::new();
        for component in Path::new(id).components() {
            match component {
                Component::Normal(part) => relative.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !relative.pop() {
                        return Err(denied("path escapes the authority base"));
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(denied("absolute paths are not allowed"));
                }
            }
        }
        if relative.as_os_str().is_empty() {
            return Err(denied("empty path"));
        }
        Ok(self.base.join(relative))
    }
}

impl Authority for FilesystemAuthority {
    fn elements(&self, id: &str) -> Result<ElementStream, IonSchemaError> {
        let path = self.resolve(id)?;
        if !path.is_file() {
            tracing::debug!(id, base = %self.base.display(), "schema not found in directory");
            return Ok(ElementStream::empty());
        }
        // Symlinks may still point outside of the base.
        let canonical = path.canonicalize().map_err(|source| IonSchemaError::Io {
            path: path.clone(),
            source,
        })?;
        if !canonical.starts_with(&self.base) {
            return Err(IonSchemaError::AccessDenied {
                id: id.to_string(),
                reason: "path escapes the authority base".to_string(),
            });
        }
        tracing::debug!(id, path = %canonical.display(), "loading schema from file");
        Ok(ElementStream::lazy(move || {
            let content =
                std::fs::read_to_string(&canonical).map_err(|source| IonSchemaError::Io {
                    path: canonical.clone(),
                    source,
                })?;
            parse(&content)
        }))
    }
}

#[derive(Debug, Clone)]
enum Entry {
    Text(String),
    Parsed(Vec<Element>),
}

/// Serves schemas from memory.
///
/// Text entries are parsed the first time they are requested and the parsed
/// values are kept for later requests.
#[derive(Debug, Default)]
pub struct InMemoryAuthority {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(self, id: impl Into<String>, text: impl Into<String>) -> Self {
        self.entries.lock().insert(id.into(), Entry::Text(text.into()));
        self
    }

    pub fn with_elements(self, id: impl Into<String>, elements: Vec<Element>) -> Self {
        self.entries.lock().insert(id.into(), Entry::Parsed(elements));
        self
    }

    pub fn insert_text(&self, id: impl Into<String>, text: impl Into<String>) {
        self.entries.lock().insert(id.into(), Entry::Text(text.into()));
    }

    pub fn remove(&self, id: &str) {
        self.entries.lock().remove(id);
    }

    /// Returns true if the entry for `id` has been parsed.
    pub fn is_parsed(&self, id: &str) -> bool {
        matches!(self.entries.lock().get(id), Some(Entry::Parsed(_)))
    }
}

impl Authority for InMemoryAuthority {
    fn elements(&self, id: &str) -> Result<ElementStream, IonSchemaError> {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(id) else {
            return Ok(ElementStream::empty());
        };
        if let Entry::Text(text) = entry {
            *entry = Entry::Parsed(parse(text)?);
        }
        match entry {
            Entry::Parsed(elements) => Ok(ElementStream::from_elements(elements.clone())),
            Entry::Text(_) => Ok(ElementStream::empty()),
        }
    }
}

/// Serves schemas over HTTP from `<base_url>/<id>`.
///
/// Requires the `remote` feature (enabled by default). A 404 response means
/// the id is unknown; any other failure is an error.
#[cfg(feature = "remote")]
#[derive(Debug, Clone)]
pub struct HttpAuthority {
    base_url: String,
    client: reqwest::blocking::Client,
}

#[cfg(feature = "remote")]
impl HttpAuthority {
    /// # Errors
    ///
    /// Returns `IonSchemaError::Network` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, IonSchemaError> {
        let base_url = base_url.into();
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|source| IonSchemaError::Network {
                url: base_url.clone(),
                source,
            })?;
        Ok(Self { base_url, client })
    }

    fn url_for(&self, id: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            id.trim_start_matches('/')
        )
    }
}

#[cfg(feature = "remote")]
impl Authority for HttpAuthority {
    fn elements(&self, id: &str) -> Result<ElementStream, IonSchemaError> {
        let url = self.url_for(id);
        let client = self.client.clone();
        Ok(ElementStream::lazy(move || {
            tracing::debug!(url = %url, "fetching schema");
            let network = |source| IonSchemaError::Network {
                url: url.clone(),
                source,
            };
            let response = client.get(&url).send().map_err(network)?;
            if response.status() == reqwest::StatusCode::NOT_FOUND {
                tracing::debug!(url = %url, "schema not found");
                return Ok(Vec::new());
            }
            // Check for HTTP errors before parsing
            let body = response
                .error_for_status()
                .and_then(|response| response.text())
                .map_err(network)?;
            parse(&body)
        }))
    }
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Picks the authority for a schema source: an HTTP base URL or a directory.
///
/// URL sources require the `remote` feature.
///
/// # Errors
///
/// Returns `IonSchemaError::FileNotFound` if a directory source does not
/// exist, or if `source` is a URL and the `remote` feature is disabled.
pub fn authority_for(source: &str) -> Result<Arc<dyn Authority>, IonSchemaError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            Ok(Arc::new(HttpAuthority::new(source)?))
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(IonSchemaError::FileNotFound {
                path: PathBuf::from(source),
            })
        }
    } else {
        Ok(Arc::new(FilesystemAuthority::new(source)?))
    }
}
