//! Purpose: Resolve the path of the installed C API library.
//! Exports: `Locator`, `ResolvedLibrary`, `LibrarySource`, `Environment`, `ProcessEnv`,
//!          `library_file_name`, and the install-layout constants.
//! Role: First step of every invocation; nothing is loaded until a path exists on disk.
//! Invariants: Order is flag, environment override, registry, default install.
//! Invariants: Flag and environment overrides are authoritative; a missing file fails
//!             instead of falling through.
//! Invariants: Registry candidates that do not exist fall through with a warning.
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, warn};

use crate::core::error::{Error, ErrorKind};
use crate::core::registry::ConfigLookup;

pub const ENV_OVERRIDE: &str = "OPENKNEEBOARD_CAPI_DLL";
pub const REGISTRY_KEY: &str = "Software\\Fred Emmott\\OpenKneeboard";
pub const REGISTRY_VALUE: &str = "InstallationBinPath";
pub const PROGRAM_FILES_VARS: [&str; 2] = ["ProgramW6432", "ProgramFiles"];

const NOT_FOUND_HINT: &str =
    "Install OpenKneeboard, or set the OPENKNEEBOARD_CAPI_DLL environment variable.";

/// File name of the C API library for this platform and pointer width.
pub fn library_file_name() -> String {
    let bits = if cfg!(target_pointer_width = "64") {
        "64"
    } else {
        "32"
    };
    format!(
        "{}OpenKneeboard_CAPI{bits}{}",
        std::env::consts::DLL_PREFIX,
        std::env::consts::DLL_SUFFIX
    )
}

pub trait Environment {
    fn var_os(&self, key: &str) -> Option<OsString>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var_os(&self, key: &str) -> Option<OsString> {
        std::env::var_os(key)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LibrarySource {
    Flag,
    Environment,
    Registry,
    DefaultInstall,
}

impl fmt::Display for LibrarySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LibrarySource::Flag => "--dll",
            LibrarySource::Environment => ENV_OVERRIDE,
            LibrarySource::Registry => "registry",
            LibrarySource::DefaultInstall => "default install",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ResolvedLibrary {
    pub path: PathBuf,
    pub source: LibrarySource,
}

pub struct Locator<'a> {
    explicit: Option<PathBuf>,
    env: &'a dyn Environment,
    registry: &'a dyn ConfigLookup,
    default_install: bool,
}

impl<'a> Locator<'a> {
    pub fn new(env: &'a dyn Environment, registry: &'a dyn ConfigLookup) -> Self {
        Self {
            explicit: None,
            env,
            registry,
            default_install: cfg!(windows),
        }
    }

    pub fn with_explicit(mut self, path: Option<PathBuf>) -> Self {
        self.explicit = path;
        self
    }

    /// Whether to fall back to `<Program Files>\OpenKneeboard\bin`.
    pub fn with_default_install(mut self, enabled: bool) -> Self {
        self.default_install = enabled;
        self
    }

    pub fn resolve(&self) -> Result<ResolvedLibrary, Error> {
        if let Some(path) = &self.explicit {
            return authoritative(path.clone(), LibrarySource::Flag);
        }

        if let Some(value) = self.env.var_os(ENV_OVERRIDE).filter(|v| !v.is_empty()) {
            return authoritative(PathBuf::from(value), LibrarySource::Environment);
        }
        debug!("{ENV_OVERRIDE} is not set");

        let mut tried = Vec::new();

        if let Some(bin_dir) = self
            .registry
            .string_value(REGISTRY_KEY, REGISTRY_VALUE)
            .filter(|v| !v.is_empty())
        {
            let path = PathBuf::from(bin_dir).join(library_file_name());
            if path.is_file() {
                debug!(path = %path.display(), "using registry install path");
                return Ok(ResolvedLibrary {
                    path,
                    source: LibrarySource::Registry,
                });
            }
            warn!(path = %path.display(), "registry install path has no C API library");
            tried.push(path);
        } else {
            debug!("no {REGISTRY_VALUE} in registry");
        }

        if self.default_install {
            let path = self.default_install_path()?;
            if path.is_file() {
                debug!(path = %path.display(), "using default install path");
                return Ok(ResolvedLibrary {
                    path,
                    source: LibrarySource::DefaultInstall,
                });
            }
            tried.push(path);
        }

        Err(not_found(&tried))
    }

    fn default_install_path(&self) -> Result<PathBuf, Error> {
        let program_files = PROGRAM_FILES_VARS
            .iter()
            .find_map(|key| self.env.var_os(key).filter(|v| !v.is_empty()))
            .ok_or_else(|| {
                Error::new(ErrorKind::Environment)
                    .with_message(format!(
                        "cannot locate Program Files: neither {} nor {} is set",
                        PROGRAM_FILES_VARS[0], PROGRAM_FILES_VARS[1]
                    ))
                    .with_hint(format!("Set {ENV_OVERRIDE} to the library path."))
            })?;
        Ok(PathBuf::from(program_files)
            .join("OpenKneeboard")
            .join("bin")
            .join(library_file_name()))
    }
}

fn authoritative(path: PathBuf, source: LibrarySource) -> Result<ResolvedLibrary, Error> {
    if !path.is_file() {
        return Err(Error::new(ErrorKind::NotFound)
            .with_message(format!(
                "library '{}' from {source} does not exist",
                path.display()
            ))
            .with_hint(NOT_FOUND_HINT)
            .with_path(path));
    }
    debug!(path = %path.display(), %source, "using override");
    Ok(ResolvedLibrary { path, source })
}

fn not_found(tried: &[PathBuf]) -> Error {
    let err = Error::new(ErrorKind::NotFound).with_hint(NOT_FOUND_HINT);
    match tried {
        [] => err.with_message("no C API library location is configured"),
        [only] => err
            .with_message(format!("library '{}' does not exist", only.display()))
            .with_path(only),
        [.., last] => {
            let listed: Vec<String> = tried
                .iter()
                .map(|path| format!("'{}'", path.display()))
                .collect();
            err.with_message(format!(
                "no C API library found (tried {})",
                listed.join(", ")
            ))
            .with_path(last)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ENV_OVERRIDE, Environment, LibrarySource, Locator, REGISTRY_KEY, REGISTRY_VALUE,
        library_file_name,
    };
    use crate::core::error::ErrorKind;
    use crate::core::registry::NoRegistry;
    use crate::core::registry::tests::MapLookup;
    use std::collections::HashMap;
    use std::ffi::OsString;
    use std::fs;
    use std::path::{Path, PathBuf};

    #[derive(Default)]
    struct MapEnv(HashMap<String, OsString>);

    impl MapEnv {
        fn with(mut self, key: &str, value: impl Into<OsString>) -> Self {
            self.0.insert(key.to_string(), value.into());
            self
        }
    }

    impl Environment for MapEnv {
        fn var_os(&self, key: &str) -> Option<OsString> {
            self.0.get(key).cloned()
        }
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, b"not really a library").expect("write");
    }

    fn install_layout(root: &Path) -> PathBuf {
        root.join("OpenKneeboard").join("bin").join(library_file_name())
    }

    #[test]
    fn explicit_path_wins() {
        let temp = tempfile::tempdir().expect("tempdir");
        let flag = temp.path().join("flag.dll");
        let from_env = temp.path().join("env.dll");
        touch(&flag);
        touch(&from_env);
        let env = MapEnv::default().with(ENV_OVERRIDE, &from_env);

        let resolved = Locator::new(&env, &NoRegistry)
            .with_explicit(Some(flag.clone()))
            .resolve()
            .expect("resolve");
        assert_eq!(resolved.path, flag);
        assert_eq!(resolved.source, LibrarySource::Flag);
    }

    #[test]
    fn environment_override_is_used() {
        let temp = tempfile::tempdir().expect("tempdir");
        let from_env = temp.path().join("env.dll");
        touch(&from_env);
        let env = MapEnv::default().with(ENV_OVERRIDE, &from_env);

        let resolved = Locator::new(&env, &NoRegistry).resolve().expect("resolve");
        assert_eq!(resolved.path, from_env);
        assert_eq!(resolved.source, LibrarySource::Environment);
    }

    #[test]
    fn missing_environment_override_does_not_fall_through() {
        let temp = tempfile::tempdir().expect("tempdir");
        let bin = temp.path().join("registry-bin");
        touch(&bin.join(library_file_name()));
        let env = MapEnv::default().with(ENV_OVERRIDE, temp.path().join("missing.dll"));
        let registry = MapLookup::default().with(REGISTRY_KEY, REGISTRY_VALUE, &bin);

        let err = Locator::new(&env, &registry).resolve().expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.message().expect("message").contains(ENV_OVERRIDE));
        assert!(err.hint().is_some());
    }

    #[test]
    fn empty_environment_override_is_ignored() {
        let temp = tempfile::tempdir().expect("tempdir");
        let bin = temp.path().join("bin");
        touch(&bin.join(library_file_name()));
        let env = MapEnv::default().with(ENV_OVERRIDE, "");
        let registry = MapLookup::default().with(REGISTRY_KEY, REGISTRY_VALUE, &bin);

        let resolved = Locator::new(&env, &registry).resolve().expect("resolve");
        assert_eq!(resolved.source, LibrarySource::Registry);
    }

    #[test]
    fn registry_install_path_is_joined_with_library_name() {
        let temp = tempfile::tempdir().expect("tempdir");
        let bin = temp.path().join("bin");
        touch(&bin.join(library_file_name()));
        let registry = MapLookup::default().with(REGISTRY_KEY, REGISTRY_VALUE, &bin);

        let resolved = Locator::new(&MapEnv::default(), &registry)
            .with_default_install(false)
            .resolve()
            .expect("resolve");
        assert_eq!(resolved.path, bin.join(library_file_name()));
        assert_eq!(resolved.source, LibrarySource::Registry);
    }

    #[test]
    fn stale_registry_falls_through_to_default_install() {
        let temp = tempfile::tempdir().expect("tempdir");
        let program_files = temp.path().join("Program Files");
        touch(&install_layout(&program_files));
        let env = MapEnv::default().with("ProgramW6432", &program_files);
        let registry =
            MapLookup::default().with(REGISTRY_KEY, REGISTRY_VALUE, temp.path().join("gone"));

        let resolved = Locator::new(&env, &registry)
            .with_default_install(true)
            .resolve()
            .expect("resolve");
        assert_eq!(resolved.path, install_layout(&program_files));
        assert_eq!(resolved.source, LibrarySource::DefaultInstall);
    }

    #[test]
    fn default_install_falls_back_to_program_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        touch(&install_layout(temp.path()));
        let env = MapEnv::default().with("ProgramFiles", temp.path());

        let resolved = Locator::new(&env, &NoRegistry)
            .with_default_install(true)
            .resolve()
            .expect("resolve");
        assert_eq!(resolved.source, LibrarySource::DefaultInstall);
    }

    #[test]
    fn default_install_without_program_files_is_environment_error() {
        let err = Locator::new(&MapEnv::default(), &NoRegistry)
            .with_default_install(true)
            .resolve()
            .expect_err("no program files");
        assert_eq!(err.kind(), ErrorKind::Environment);
    }

    #[test]
    fn missing_everything_lists_tried_paths() {
        let temp = tempfile::tempdir().expect("tempdir");
        let env = MapEnv::default().with("ProgramFiles", temp.path());
        let registry =
            MapLookup::default().with(REGISTRY_KEY, REGISTRY_VALUE, temp.path().join("gone"));

        let err = Locator::new(&env, &registry)
            .with_default_install(true)
            .resolve()
            .expect_err("nothing installed");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let message = err.message().expect("message");
        assert!(message.contains("gone"));
        assert!(message.contains("OpenKneeboard"));
        assert_eq!(err.path(), Some(install_layout(temp.path()).as_path()));
    }

    #[test]
    fn nothing_configured_is_not_found() {
        let err = Locator::new(&MapEnv::default(), &NoRegistry)
            .with_default_install(false)
            .resolve()
            .expect_err("nothing configured");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.path().is_none());
    }

    #[test]
    fn library_file_name_carries_pointer_width() {
        let name = library_file_name();
        assert!(name.contains("OpenKneeboard_CAPI"));
        assert!(name.ends_with(std::env::consts::DLL_SUFFIX));
    }
}
