//! Format identification and disambiguation.
//!
//! Every format has a reader and, optionally, an identifier predicate.
//! Asking which formats recognise a file runs the active identifiers in
//! registration order. Formats that have ever been demoted are moved to the
//! front of that list, so the last entry is always the preferred one.
//!
//! Demotion is how a human settles an ambiguity once: unregistering the
//! wrong generic match hides it entirely, and once restored it still ranks
//! behind every format that was never demoted.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::Value as JsonValue;

use crate::data::model::SpectrumCollection;
use crate::error::{Result, SpectraError};
use crate::fits::header::Header;
use crate::fits::{is_fits_file, FitsFile, FITS_FILE_EXTS};
use crate::format::{self, surveys, FormatConfig, Layout};
use crate::marz::{self, MARZ_JSON_LABEL};

// ---------------------------------------------------------------------------
// Probe – what identifiers get to look at
// ---------------------------------------------------------------------------

/// A file opened for identification: its path, and the parsed content when
/// it is FITS or JSON.
#[derive(Debug, Clone)]
pub struct Probe {
    path: PathBuf,
    extension: Option<String>,
    fits: Option<FitsFile>,
    json: Option<JsonValue>,
}

impl Probe {
    fn empty(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            extension: path
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase),
            fits: None,
            json: None,
        }
    }

    /// Read `path`. I/O errors propagate; content that fails to parse just
    /// leaves the probe without it.
    pub fn open(path: &Path) -> Result<Self> {
        let mut probe = Self::empty(path);
        if is_fits_file(path)? {
            match FitsFile::open(path) {
                Ok(file) => probe.fits = Some(file),
                Err(SpectraError::Io(e)) => return Err(SpectraError::Io(e)),
                Err(e) => debug!("{} looks like FITS but does not parse: {e}", path.display()),
            }
        } else if probe.extension.as_deref() == Some("json") {
            let bytes = std::fs::read(path)?;
            probe.json = serde_json::from_slice(&bytes).ok();
        }
        Ok(probe)
    }

    pub fn from_fits(path: &Path, file: FitsFile) -> Self {
        let mut probe = Self::empty(path);
        probe.fits = Some(file);
        probe
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lower-cased file extension.
    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    pub fn fits(&self) -> Option<&FitsFile> {
        self.fits.as_ref()
    }

    pub fn primary_header(&self) -> Option<&Header> {
        self.fits.as_ref().and_then(|f| f.primary()).map(|h| &h.header)
    }

    pub fn json(&self) -> Option<&JsonValue> {
        self.json.as_ref()
    }
}

// ---------------------------------------------------------------------------
// Formats
// ---------------------------------------------------------------------------

pub type Identifier = Arc<dyn Fn(&Probe) -> bool + Send + Sync>;

#[derive(Debug, Clone)]
pub enum Reader {
    /// A traversal layout that needs a config supplied at read time.
    Generic(Layout),
    /// A survey dialect: layout plus its static config.
    Configured { layout: Layout, config: FormatConfig },
    /// MARZ JSON, readable and writable.
    MarzJson,
}

#[derive(Clone)]
pub struct FormatSpec {
    pub name: String,
    /// Lower-case file extensions the format uses.
    pub extensions: Vec<String>,
    pub reader: Reader,
    pub identifier: Option<Identifier>,
}

impl FormatSpec {
    pub fn fits(name: &str, layout: Layout, config: FormatConfig) -> Self {
        Self {
            name: name.to_string(),
            extensions: FITS_FILE_EXTS.iter().map(|e| e.to_string()).collect(),
            reader: Reader::Configured { layout, config },
            identifier: None,
        }
    }

    pub fn generic(name: &str, layout: Layout) -> Self {
        Self {
            name: name.to_string(),
            extensions: FITS_FILE_EXTS.iter().map(|e| e.to_string()).collect(),
            reader: Reader::Generic(layout),
            identifier: None,
        }
    }

    pub fn marz_json() -> Self {
        Self {
            name: MARZ_JSON_LABEL.to_string(),
            extensions: vec!["json".into()],
            reader: Reader::MarzJson,
            identifier: None,
        }
        .identified_by(marz::identify_marz_json)
    }

    pub fn identified_by<F>(mut self, identifier: F) -> Self
    where
        F: Fn(&Probe) -> bool + Send + Sync + 'static,
    {
        self.identifier = Some(Arc::new(identifier));
        self
    }

    pub fn config(&self) -> Option<&FormatConfig> {
        match &self.reader {
            Reader::Configured { config, .. } => Some(config),
            _ => None,
        }
    }

    pub fn can_write(&self) -> bool {
        matches!(self.reader, Reader::MarzJson)
    }
}

impl fmt::Debug for FormatSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatSpec")
            .field("name", &self.name)
            .field("extensions", &self.extensions)
            .field("reader", &self.reader)
            .field("identifier", &self.identifier.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoMode {
    Read,
    Write,
}

/// How long an [`FormatRegistry::unregister_with`] demotion lasts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Demotion {
    /// Ranked last among candidates until [`FormatRegistry::reset`].
    #[default]
    Sticky,
    /// Only hidden until the next restore.
    SessionOnly,
}

/// An owned set of formats. Share one behind a `Mutex` if several threads
/// demote and restore formats.
#[derive(Default)]
pub struct FormatRegistry {
    formats: Vec<FormatSpec>,
    /// Identifiers currently consulted, in priority order.
    identifiers: Vec<(String, Identifier)>,
    /// Identifiers taken out by `unregister`, waiting to be restored.
    unregistered: Vec<(String, Identifier)>,
    /// Formats ranked behind all others, surviving restores.
    demoted: BTreeSet<String>,
}

impl FormatRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtin_formats() -> Self {
        let mut registry = Self::new();
        for format in surveys::builtin_formats() {
            registry.insert(format);
        }
        registry
    }

    /// Add a format after checking its config. Names must be unique.
    pub fn register(&mut self, format: FormatSpec) -> Result<()> {
        if self.get(&format.name).is_some() {
            return Err(SpectraError::config(format!(
                "format '{}' is already registered",
                format.name
            )));
        }
        if let Some(config) = format.config() {
            config.validate()?;
        }
        self.insert(format);
        Ok(())
    }

    fn insert(&mut self, format: FormatSpec) {
        if let Some(identifier) = &format.identifier {
            self.identifiers.push((format.name.clone(), Arc::clone(identifier)));
        }
        self.formats.push(format);
    }

    pub fn get(&self, name: &str) -> Option<&FormatSpec> {
        self.formats.iter().find(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.formats.iter().map(|f| f.name.as_str())
    }

    pub fn is_demoted(&self, name: &str) -> bool {
        self.demoted.contains(name)
    }

    pub fn is_unregistered(&self, name: &str) -> bool {
        self.unregistered.iter().any(|(n, _)| n == name)
    }

    /// Hide `name` from identification and rank it last from now on.
    pub fn unregister(&mut self, name: &str) -> Result<()> {
        self.unregister_with(name, Demotion::Sticky)
    }

    pub fn unregister_with(&mut self, name: &str, demotion: Demotion) -> Result<()> {
        if self.get(name).is_none() {
            return Err(SpectraError::UnknownFormat(name.to_string()));
        }
        if demotion == Demotion::Sticky {
            self.demoted.insert(name.to_string());
        }
        if let Some(pos) = self.identifiers.iter().position(|(n, _)| n == name) {
            let entry = self.identifiers.remove(pos);
            self.unregistered.push(entry);
            debug!("unregistered identifier for {name}");
        }
        Ok(())
    }

    /// Put every unregistered identifier back, after the active ones.
    /// Demotions stay.
    pub fn restore_registered_loaders(&mut self) {
        for (name, identifier) in self.unregistered.drain(..) {
            debug!("restored identifier for {name}");
            self.identifiers.push((name, identifier));
        }
    }

    /// Restore everything and forget all demotions.
    pub fn reset(&mut self) {
        self.restore_registered_loaders();
        self.demoted.clear();
    }

    /// Formats whose identifiers accept `probe` (reading), or that can
    /// write its extension, in registration order.
    pub fn identify(&self, mode: IoMode, probe: &Probe) -> Vec<String> {
        match mode {
            IoMode::Read => self
                .identifiers
                .iter()
                .filter(|(_, identify)| identify(probe))
                .map(|(name, _)| name.clone())
                .collect(),
            IoMode::Write => self
                .formats
                .iter()
                .filter(|f| f.can_write())
                .filter(|f| {
                    probe
                        .extension()
                        .is_some_and(|ext| f.extensions.iter().any(|e| e == ext))
                })
                .map(|f| f.name.clone())
                .collect(),
        }
    }

    /// [`identify`](Self::identify) with demoted formats moved to the front.
    /// Relative order inside both parts is kept; the last entry is the best.
    pub fn valid_formats(&self, mode: IoMode, probe: &Probe) -> Vec<String> {
        let (mut low, rest): (Vec<String>, Vec<String>) = self
            .identify(mode, probe)
            .into_iter()
            .partition(|name| self.demoted.contains(name));
        low.extend(rest);
        low
    }

    /// `[format]` when one is given, otherwise the candidates for `path`.
    /// Directories have no candidates.
    pub fn whatformat(&self, path: &Path, format: Option<&str>) -> Result<Vec<String>> {
        if let Some(format) = format {
            return Ok(vec![format.to_string()]);
        }
        if path.is_dir() {
            return Ok(Vec::new());
        }
        let probe = Probe::open(path)?;
        Ok(self.valid_formats(IoMode::Read, &probe))
    }

    pub fn best_format(&self, path: &Path) -> Result<String> {
        let mut candidates = self.whatformat(path, None)?;
        let best = candidates
            .pop()
            .ok_or_else(|| SpectraError::NoMatchingFormat(path.display().to_string()))?;
        if !candidates.is_empty() {
            warn!(
                "{} matches several formats ({}), using {best}",
                path.display(),
                candidates.join(", ")
            );
        }
        Ok(best)
    }

    /// Read `path` with `format`, or with the best guess when none is given.
    pub fn read(&self, path: &Path, format: Option<&str>) -> Result<SpectrumCollection> {
        let name = match format {
            Some(name) => name.to_string(),
            None => self.best_format(path)?,
        };
        let spec = self
            .get(&name)
            .ok_or_else(|| SpectraError::UnknownFormat(name.clone()))?;
        info!("reading {} as {name}", path.display());

        match &spec.reader {
            Reader::Generic(_) => Err(SpectraError::config(format!(
                "{name} needs a format config, use read_with_config"
            ))),
            Reader::Configured { layout, config } => {
                let file = FitsFile::open(path)?;
                format::read_fits(&file, *layout, config)
            }
            Reader::MarzJson => marz::read_marz_json(path),
        }
    }

    /// Read `path` through one of the generic layouts with a caller-supplied
    /// config.
    pub fn read_with_config(
        &self,
        path: &Path,
        name: &str,
        config: &FormatConfig,
    ) -> Result<SpectrumCollection> {
        let spec = self
            .get(name)
            .ok_or_else(|| SpectraError::UnknownFormat(name.to_string()))?;
        let layout = match &spec.reader {
            Reader::Generic(layout) | Reader::Configured { layout, .. } => *layout,
            Reader::MarzJson => {
                return Err(SpectraError::config(format!("{name} does not take a config")))
            }
        };
        config.validate()?;
        info!("reading {} as {name} with a custom config", path.display());
        let file = FitsFile::open(path)?;
        format::read_fits(&file, layout, config)
    }

    /// Write `collection` to `path` with `format`, or the format matching
    /// the path's extension.
    pub fn write(&self, collection: &SpectrumCollection, path: &Path, format: Option<&str>) -> Result<()> {
        let name = match format {
            Some(name) => name.to_string(),
            None => self
                .valid_formats(IoMode::Write, &Probe::empty(path))
                .pop()
                .ok_or_else(|| SpectraError::NoMatchingFormat(path.display().to_string()))?,
        };
        match self.get(&name).map(|f| &f.reader) {
            Some(Reader::MarzJson) => marz::write_marz_json(collection, path),
            Some(_) => Err(SpectraError::config(format!("{name} cannot be written"))),
            None => Err(SpectraError::UnknownFormat(name)),
        }
    }
}

impl fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatRegistry")
            .field("formats", &self.names().collect::<Vec<_>>())
            .field(
                "identifiers",
                &self.identifiers.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            )
            .field(
                "unregistered",
                &self.unregistered.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            )
            .field("demoted", &self.demoted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe() -> Probe {
        Probe::from_fits(Path::new("spectrum.fits"), FitsFile::default())
    }

    /// Three formats that all claim every file.
    fn registry() -> FormatRegistry {
        let mut registry = FormatRegistry::new();
        for name in ["A", "B", "C"] {
            registry.insert(
                FormatSpec::generic(name, Layout::SingleSplit).identified_by(|_: &Probe| true),
            );
        }
        registry
    }

    #[test]
    fn demoted_format_moves_to_the_front() {
        let mut registry = registry();
        assert_eq!(registry.valid_formats(IoMode::Read, &probe()), ["A", "B", "C"]);

        registry.unregister("B").unwrap();
        assert_eq!(registry.valid_formats(IoMode::Read, &probe()), ["A", "C"]);
        assert!(registry.is_unregistered("B"));

        registry.restore_registered_loaders();
        assert_eq!(registry.valid_formats(IoMode::Read, &probe()), ["B", "A", "C"]);
        assert!(registry.is_demoted("B"));
    }

    #[test]
    fn session_only_demotion_is_forgotten_on_restore() {
        let mut registry = registry();
        registry.unregister_with("A", Demotion::SessionOnly).unwrap();
        assert_eq!(registry.valid_formats(IoMode::Read, &probe()), ["B", "C"]);
        registry.restore_registered_loaders();
        assert_eq!(registry.valid_formats(IoMode::Read, &probe()), ["B", "C", "A"]);
        assert!(!registry.is_demoted("A"));
    }

    #[test]
    fn unregistering_twice_keeps_one_copy() {
        let mut registry = registry();
        registry.unregister("C").unwrap();
        registry.unregister("C").unwrap();
        registry.restore_registered_loaders();
        assert_eq!(registry.valid_formats(IoMode::Read, &probe()), ["C", "A", "B"]);
    }

    #[test]
    fn restore_without_unregistered_is_a_no_op() {
        let mut registry = registry();
        let before = format!("{registry:?}");
        registry.restore_registered_loaders();
        assert_eq!(format!("{registry:?}"), before);
    }

    #[test]
    fn reset_clears_demotions() {
        let mut registry = registry();
        registry.unregister("A").unwrap();
        registry.reset();
        assert!(!registry.is_demoted("A"));
        assert!(!registry.is_unregistered("A"));
    }

    #[test]
    fn unknown_and_duplicate_names() {
        let mut registry = registry();
        assert!(matches!(registry.unregister("Z"), Err(SpectraError::UnknownFormat(_))));
        let err = registry
            .register(FormatSpec::generic("A", Layout::SingleSplit))
            .unwrap_err();
        assert!(matches!(err, SpectraError::Configuration(_)));
    }

    #[test]
    fn only_marz_json_writes() {
        let registry = FormatRegistry::with_builtin_formats();
        let json = Probe::empty(Path::new("out.json"));
        assert_eq!(registry.valid_formats(IoMode::Write, &json), [MARZ_JSON_LABEL]);
        let fits = Probe::empty(Path::new("out.fits"));
        assert!(registry.valid_formats(IoMode::Write, &fits).is_empty());
    }

    #[test]
    fn registry_can_cross_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FormatRegistry>();
    }
}
