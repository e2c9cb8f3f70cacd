//! Handler sets loaded from a YAML manifest.
//!
//! A source is either a single `*.yaml`/`*.yml` file or a package directory
//! containing [`MANIFEST_FILE_NAME`]. The manifest maps callback names to a
//! list of actions:
//!
//! ```yaml
//! on_user_left:
//!   - action: log
//!     message: "{user} left channel {source}"
//!   - action: exec
//!     program: ./notify.sh
//!     args: ["{user}", "{source}"]
//! ```
//!
//! `exec` programs are spawned detached. Relative program paths resolve
//! against the manifest's directory. Arguments default to the positional
//! handler tuple; every placeholder is also exported as `TALKBOT_<NAME>`.
//!
//! The set remembers the manifest's modification time and reports itself
//! stale once the file changes, which makes the registry reload it. The file
//! is checked at most once per [`DEFAULT_CHECK_INTERVAL`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use parking_lot::Mutex;
use serde::Deserialize;

use super::{Handler, HandlerArgs, HandlerError, HandlerLookup, HandlerResult, HandlerSet};

/// Manifest file name inside a handler package directory.
pub const MANIFEST_FILE_NAME: &str = "handlers.yaml";

/// Minimum time between two modification checks of a manifest.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum Action {
    Log {
        message: String,
    },
    Exec {
        program: PathBuf,
        #[serde(default)]
        args: Vec<String>,
    },
}

struct ManifestHandler {
    name: String,
    actions: Vec<Action>,
    base_dir: PathBuf,
}

impl ManifestHandler {
    fn exec(&self, program: &Path, templates: &[String], args: &HandlerArgs) -> HandlerResult {
        let program = if program.is_relative() {
            self.base_dir.join(program)
        } else {
            program.to_path_buf()
        };
        let argv = if templates.is_empty() {
            args.to_argv()
        } else {
            templates.iter().map(|t| render(t, args)).collect()
        };

        let mut command = Command::new(&program);
        command
            .args(&argv)
            .env("TALKBOT_EVENT", &self.name)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        for (key, value) in args.placeholders() {
            command.env(format!("TALKBOT_{}", key.to_uppercase()), value);
        }

        let mut child = command.spawn().map_err(|source| HandlerError::Spawn {
            program: program.clone(),
            source,
        })?;
        log::debug!(
            "[Handlers] {} spawned {} (pid {})",
            self.name,
            program.display(),
            child.id()
        );
        // Reap without holding up the dispatcher.
        std::thread::spawn(move || {
            let _ = child.wait();
        });
        Ok(())
    }
}

impl Handler for ManifestHandler {
    fn call(&self, args: &HandlerArgs) -> HandlerResult {
        for action in &self.actions {
            match action {
                Action::Log { message } => {
                    log::info!("[Handlers] {}: {}", self.name, render(message, args));
                }
                Action::Exec {
                    program,
                    args: templates,
                } => self.exec(program, templates, args)?,
            }
        }
        Ok(())
    }
}

/// Substitutes `{name}` placeholders. Unknown placeholders are left as-is.
fn render(template: &str, args: &HandlerArgs) -> String {
    args.placeholders()
        .into_iter()
        .fold(template.to_string(), |acc, (key, value)| {
            acc.replace(&format!("{{{key}}}"), &value)
        })
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Handler set backed by a manifest on disk.
pub struct ManifestHandlerSet {
    manifest: PathBuf,
    loaded_at: Option<SystemTime>,
    handlers: HashMap<String, Arc<dyn Handler>>,
    check_interval: Duration,
    last_checked: Mutex<Instant>,
}

impl ManifestHandlerSet {
    /// Loads a handler set from a manifest file or package directory.
    pub fn load(source: &Path) -> HandlerResult<Self> {
        let manifest = Self::manifest_path(source)?;
        let loaded_at = modified(&manifest);

        let content = std::fs::read_to_string(&manifest).map_err(|e| HandlerError::Io {
            path: manifest.clone(),
            source: e,
        })?;
        let entries: HashMap<String, Vec<Action>> = if content.trim().is_empty() {
            HashMap::new()
        } else {
            serde_yaml::from_str(&content).map_err(|e| HandlerError::Parse {
                path: manifest.clone(),
                source: e,
            })?
        };

        let base_dir = manifest
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let handlers = entries
            .into_iter()
            .map(|(name, actions)| {
                let handler: Arc<dyn Handler> = Arc::new(ManifestHandler {
                    name: name.clone(),
                    actions,
                    base_dir: base_dir.clone(),
                });
                (name, handler)
            })
            .collect::<HashMap<_, _>>();

        log::info!(
            "[Handlers] Loaded {} handler(s) from {}",
            handlers.len(),
            manifest.display()
        );
        Ok(Self {
            manifest,
            loaded_at,
            handlers,
            check_interval: DEFAULT_CHECK_INTERVAL,
            last_checked: Mutex::new(Instant::now()),
        })
    }

    /// Loads a handler set, falling back to an empty one on any error.
    ///
    /// The empty set still watches the manifest, so fixing the file on disk
    /// makes the next dispatch pick it up.
    pub fn load_or_empty(source: &Path) -> Self {
        match Self::load(source) {
            Ok(set) => set,
            Err(e) => {
                log::warn!("[Handlers] {}. An empty handler set will be used", e);
                let manifest = if source.is_dir() {
                    source.join(MANIFEST_FILE_NAME)
                } else {
                    source.to_path_buf()
                };
                Self {
                    loaded_at: modified(&manifest),
                    manifest,
                    handlers: HashMap::new(),
                    check_interval: DEFAULT_CHECK_INTERVAL,
                    last_checked: Mutex::new(Instant::now()),
                }
            }
        }
    }

    /// Sets how often lookups may touch the filesystem to detect changes.
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    fn manifest_path(source: &Path) -> HandlerResult<PathBuf> {
        if source.is_dir() {
            let manifest = source.join(MANIFEST_FILE_NAME);
            if manifest.is_file() {
                return Ok(manifest);
            }
            return Err(HandlerError::Source {
                path: source.to_path_buf(),
                message: format!("package directory has no {MANIFEST_FILE_NAME}"),
            });
        }
        if source.is_file() {
            let is_yaml = matches!(
                source.extension().and_then(|e| e.to_str()),
                Some("yaml" | "yml")
            );
            if is_yaml {
                return Ok(source.to_path_buf());
            }
            return Err(HandlerError::Source {
                path: source.to_path_buf(),
                message: "expected a .yaml or .yml file".to_string(),
            });
        }
        Err(HandlerError::Source {
            path: source.to_path_buf(),
            message: "path does not exist".to_string(),
        })
    }

    pub fn manifest(&self) -> &Path {
        &self.manifest
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    fn is_stale(&self) -> bool {
        {
            let mut last_checked = self.last_checked.lock();
            if last_checked.elapsed() < self.check_interval {
                return false;
            }
            *last_checked = Instant::now();
        }
        modified(&self.manifest) != self.loaded_at
    }
}

impl HandlerSet for ManifestHandlerSet {
    fn lookup(&self, name: &str) -> HandlerLookup {
        if self.is_stale() {
            return HandlerLookup::Stale;
        }
        match self.handlers.get(name) {
            Some(handler) => HandlerLookup::Found(Arc::clone(handler)),
            None => HandlerLookup::Missing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Event, User};
    use crate::handlers::{DispatchOutcome, HandlerRegistry};

    const MANIFEST: &str = r#"
on_user_joined:
  - action: log
    message: "{user} joined"
on_user_left:
  - action: log
    message: "{user} left {source}"
"#;

    fn alice() -> User {
        User {
            id: 2,
            username: "alice".into(),
            channel_id: 5,
            ..Default::default()
        }
    }

    #[test]
    fn loads_single_file_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.yaml");
        std::fs::write(&path, MANIFEST).unwrap();

        let set = ManifestHandlerSet::load(&path).unwrap();
        assert_eq!(set.len(), 2);
        assert!(matches!(set.lookup("on_user_left"), HandlerLookup::Found(_)));
        assert!(matches!(set.lookup("on_kicked"), HandlerLookup::Missing));
    }

    #[test]
    fn loads_package_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE_NAME), MANIFEST).unwrap();

        let set = ManifestHandlerSet::load(dir.path()).unwrap();
        assert_eq!(set.manifest(), dir.path().join(MANIFEST_FILE_NAME));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn directory_without_manifest_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = ManifestHandlerSet::load(dir.path()).err().unwrap();
        assert!(matches!(err, HandlerError::Source { .. }));
    }

    #[test]
    fn wrong_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handlers.py");
        std::fs::write(&path, "def on_user_left(): pass").unwrap();
        assert!(matches!(
            ManifestHandlerSet::load(&path),
            Err(HandlerError::Source { .. })
        ));
    }

    #[test]
    fn invalid_or_missing_source_yields_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "on_user_left: [ { action: teleport } ]").unwrap();

        assert!(ManifestHandlerSet::load_or_empty(&path).is_empty());
        assert!(ManifestHandlerSet::load_or_empty(&dir.path().join("missing.yaml")).is_empty());
    }

    #[test]
    fn empty_file_is_an_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handlers.yml");
        std::fs::write(&path, "").unwrap();
        assert!(ManifestHandlerSet::load(&path).unwrap().is_empty());
    }

    #[test]
    fn render_substitutes_known_placeholders() {
        let args = HandlerArgs::UserLeft {
            source_channel_id: 5,
            user: alice(),
        };
        assert_eq!(
            render("{user} left {source} ({unknown})", &args),
            "alice left 5 ({unknown})"
        );
    }

    /// Rewrites a file and pushes its modification time forward, so the
    /// change is visible even on coarse filesystems.
    fn rewrite_later(path: &Path, content: &str) {
        std::fs::write(path, content).unwrap();
        std::fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::now() + Duration::from_secs(5))
            .unwrap();
    }

    #[test]
    fn changes_are_noticed_only_once_the_interval_elapses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handlers.yaml");
        std::fs::write(&path, MANIFEST).unwrap();

        let set = ManifestHandlerSet::load(&path)
            .unwrap()
            .with_check_interval(Duration::from_secs(3600));
        rewrite_later(&path, "");
        assert!(matches!(set.lookup("on_user_left"), HandlerLookup::Found(_)));
        assert!(!set.is_stale());

        let set = set.with_check_interval(Duration::ZERO);
        assert!(matches!(set.lookup("on_user_left"), HandlerLookup::Stale));
    }

    #[test]
    fn registry_reloads_after_manifest_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handlers.yaml");
        std::fs::write(&path, "on_user_joined:\n  - action: log\n    message: hi\n").unwrap();

        let registry =
            HandlerRegistry::new(Some(path.clone())).with_check_interval(Duration::ZERO);
        assert_eq!(
            registry.dispatch(&Event::UserJoined(alice())),
            DispatchOutcome::Invoked
        );
        assert_eq!(registry.reload_count(), 1);

        // Make sure the modification time moves even on coarse filesystems.
        let set = ManifestHandlerSet::load(&path)
            .unwrap()
            .with_check_interval(Duration::ZERO);
        rewrite_later(&path, MANIFEST);
        assert!(set.is_stale());

        assert_eq!(
            registry.dispatch(&Event::UserLeft {
                source: 5,
                user: alice(),
            }),
            DispatchOutcome::Invoked
        );
        assert_eq!(registry.reload_count(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn exec_action_reports_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handlers.yaml");
        std::fs::write(
            &path,
            "on_user_joined:\n  - action: exec\n    program: ./does-not-exist.sh\n",
        )
        .unwrap();

        let registry = HandlerRegistry::new(Some(path));
        assert_eq!(
            registry.dispatch(&Event::UserJoined(alice())),
            DispatchOutcome::Failed
        );
    }
}
