//! Fixture Management
//!
//! Setup and teardown of external prerequisites, such as the project a
//! scenario opens in the application under test.
//!
//! - Fixtures are set up by priority (highest first) and torn down in reverse
//! - A failed setup tears down what was already set up and returns the
//!   original error, so `FixtureMissing` reaches the runner unchanged

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::result::{HarnessError, HarnessResult};

/// Trait for fixtures that can be set up and torn down.
///
/// # Example
///
/// ```ignore
/// struct ServerFixture {
///     process: Option<Child>,
/// }
///
/// impl Fixture for ServerFixture {
///     fn setup(&mut self) -> HarnessResult<()> {
///         self.process = Some(Command::new("server").spawn()?);
///         Ok(())
///     }
///
///     fn teardown(&mut self) -> HarnessResult<()> {
///         if let Some(mut child) = self.process.take() {
///             child.kill()?;
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Fixture {
    /// Set up the fixture before the scenario runs.
    ///
    /// # Errors
    ///
    /// Returns an error if the prerequisite is unavailable.
    fn setup(&mut self) -> HarnessResult<()>;

    /// Tear down the fixture after the scenario ran.
    ///
    /// # Errors
    ///
    /// Returns an error if cleanup fails.
    fn teardown(&mut self) -> HarnessResult<()>;

    /// Fixture name for logging
    fn name(&self) -> &str;

    /// Higher priorities are set up first and torn down last
    fn priority(&self) -> i32 {
        0
    }
}

/// State of a fixture in the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureState {
    /// Registered but not set up
    Registered,
    /// Set up successfully
    SetUp,
    /// Torn down
    TornDown,
    /// Setup or teardown failed
    Failed,
}

struct FixtureEntry {
    fixture: Box<dyn Fixture>,
    state: FixtureState,
}

/// Manager running fixtures in priority order
#[derive(Default)]
pub struct FixtureManager {
    fixtures: Vec<FixtureEntry>,
    setup_order: Vec<usize>,
}

impl std::fmt::Debug for FixtureManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixtureManager")
            .field("fixtures", &self.list())
            .field("set_up", &self.setup_order.len())
            .finish()
    }
}

impl FixtureManager {
    /// Create a new fixture manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fixture
    pub fn register<F: Fixture + 'static>(&mut self, fixture: F) {
        self.fixtures.push(FixtureEntry {
            fixture: Box::new(fixture),
            state: FixtureState::Registered,
        });
    }

    /// Number of registered fixtures
    #[must_use]
    pub fn count(&self) -> usize {
        self.fixtures.len()
    }

    /// State of the fixture with this name
    #[must_use]
    pub fn state(&self, name: &str) -> Option<FixtureState> {
        self.fixtures
            .iter()
            .find(|e| e.fixture.name() == name)
            .map(|e| e.state)
    }

    /// Registered fixture names in registration order
    #[must_use]
    pub fn list(&self) -> Vec<&str> {
        self.fixtures.iter().map(|e| e.fixture.name()).collect()
    }

    /// Set up all fixtures, highest priority first.
    ///
    /// # Errors
    ///
    /// The first setup error, after tearing down everything already set up
    pub fn setup_all(&mut self) -> HarnessResult<()> {
        let mut ordered: Vec<usize> = (0..self.fixtures.len()).collect();
        // stable sort keeps registration order among equal priorities
        ordered.sort_by_key(|i| std::cmp::Reverse(self.fixtures[*i].fixture.priority()));

        for index in ordered {
            let entry = &mut self.fixtures[index];
            if !matches!(entry.state, FixtureState::Registered | FixtureState::TornDown) {
                continue;
            }
            tracing::debug!(fixture = entry.fixture.name(), "setting up fixture");
            if let Err(err) = entry.fixture.setup() {
                tracing::error!(fixture = entry.fixture.name(), error = %err, "fixture setup failed");
                entry.state = FixtureState::Failed;
                if let Err(teardown_err) = self.teardown_all() {
                    tracing::warn!(error = %teardown_err, "teardown after failed setup");
                }
                return Err(err);
            }
            entry.state = FixtureState::SetUp;
            self.setup_order.push(index);
        }
        Ok(())
    }

    /// Tear down in reverse setup order.
    ///
    /// # Errors
    ///
    /// The first teardown error; remaining fixtures are still torn down
    pub fn teardown_all(&mut self) -> HarnessResult<()> {
        let mut first_error = None;
        for index in self.setup_order.drain(..).rev() {
            let entry = &mut self.fixtures[index];
            if entry.state != FixtureState::SetUp {
                continue;
            }
            match entry.fixture.teardown() {
                Ok(()) => entry.state = FixtureState::TornDown,
                Err(err) => {
                    entry.state = FixtureState::Failed;
                    first_error.get_or_insert(err);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

// =============================================================================
// TEMPLATE FIXTURE
// =============================================================================

/// Where a scenario's project template lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSpec {
    /// Template directory, relative to the scenario file
    pub template: PathBuf,
    /// File that must exist inside the template
    pub file: String,
}

/// Copies a project template into a fresh working directory
#[derive(Debug)]
pub struct TemplateFixture {
    name: String,
    template_dir: PathBuf,
    required_file: String,
    work_base: PathBuf,
    root: Option<PathBuf>,
}

impl TemplateFixture {
    /// Create a fixture for `template_dir`, which must contain `required_file`
    #[must_use]
    pub fn new(template_dir: impl Into<PathBuf>, required_file: impl Into<String>) -> Self {
        let template_dir = template_dir.into();
        Self {
            name: format!("template:{}", template_dir.display()),
            template_dir,
            required_file: required_file.into(),
            work_base: std::env::temp_dir(),
            root: None,
        }
    }

    /// Create working copies under `base` instead of the system temp directory
    #[must_use]
    pub fn with_work_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.work_base = base.into();
        self
    }

    /// Fixture from a scenario entry, resolving relative paths against `base_dir`
    #[must_use]
    pub fn from_spec(spec: &TemplateSpec, base_dir: &Path) -> Self {
        Self::new(base_dir.join(&spec.template), spec.file.clone())
    }

    /// Copy of the template, once set up
    #[must_use]
    pub fn working_dir(&self) -> Option<PathBuf> {
        let dir_name = self.template_dir.file_name()?;
        self.root.as_ref().map(|root| root.join(dir_name))
    }

    /// The required file inside the working copy, once set up
    #[must_use]
    pub fn project_file(&self) -> Option<PathBuf> {
        self.working_dir().map(|dir| dir.join(&self.required_file))
    }
}

fn copy_tree(from: &Path, to: &Path) -> HarnessResult<()> {
    for entry in WalkDir::new(from) {
        let entry = entry.map_err(std::io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| HarnessError::scenario(e.to_string()))?;
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            let _ = std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

impl Fixture for TemplateFixture {
    fn setup(&mut self) -> HarnessResult<()> {
        let required = self.template_dir.join(&self.required_file);
        if !required.is_file() {
            return Err(HarnessError::FixtureMissing {
                path: required.display().to_string(),
            });
        }
        let dir_name = self
            .template_dir
            .file_name()
            .ok_or_else(|| HarnessError::FixtureMissing {
                path: self.template_dir.display().to_string(),
            })?;
        let root = self.work_base.join(format!("consola-{}", Uuid::new_v4()));
        if let Err(err) = copy_tree(&self.template_dir, &root.join(dir_name)) {
            if let Err(cleanup) = std::fs::remove_dir_all(&root) {
                tracing::warn!(copy = %root.display(), error = %cleanup, "partial copy not removed");
            }
            return Err(err);
        }
        tracing::info!(template = %self.template_dir.display(), copy = %root.display(), "template copied");
        self.root = Some(root);
        Ok(())
    }

    fn teardown(&mut self) -> HarnessResult<()> {
        if let Some(root) = self.root.take() {
            std::fs::remove_dir_all(&root)?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        10
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Recording {
        name: String,
        priority: i32,
        fail: bool,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Recording {
        fn new(name: &str, priority: i32, log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name: name.to_string(),
                priority,
                fail: false,
                log: Arc::clone(log),
            }
        }

        fn failing(mut self) -> Self {
            self.fail = true;
            self
        }
    }

    impl Fixture for Recording {
        fn setup(&mut self) -> HarnessResult<()> {
            if self.fail {
                return Err(HarnessError::FixtureMissing {
                    path: self.name.clone(),
                });
            }
            self.log.lock().unwrap().push(format!("setup:{}", self.name));
            Ok(())
        }

        fn teardown(&mut self) -> HarnessResult<()> {
            self.log.lock().unwrap().push(format!("teardown:{}", self.name));
            Ok(())
        }

        fn name(&self) -> &str {
            &self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }
    }

    mod manager_tests {
        use super::*;

        #[test]
        fn test_priority_order_and_reverse_teardown() {
            let log = Arc::new(Mutex::new(Vec::new()));
            let mut manager = FixtureManager::new();
            manager.register(Recording::new("low", 0, &log));
            manager.register(Recording::new("high", 5, &log));
            manager.register(Recording::new("also-low", 0, &log));
            manager.setup_all().unwrap();
            manager.teardown_all().unwrap();
            assert_eq!(
                *log.lock().unwrap(),
                vec![
                    "setup:high",
                    "setup:low",
                    "setup:also-low",
                    "teardown:also-low",
                    "teardown:low",
                    "teardown:high",
                ]
            );
            assert_eq!(manager.state("high"), Some(FixtureState::TornDown));
        }

        #[test]
        fn test_failed_setup_keeps_original_error() {
            let log = Arc::new(Mutex::new(Vec::new()));
            let mut manager = FixtureManager::new();
            manager.register(Recording::new("first", 1, &log));
            manager.register(Recording::new("broken", 0, &log).failing());
            let err = manager.setup_all().unwrap_err();
            assert!(matches!(err, HarnessError::FixtureMissing { ref path } if path == "broken"));
            assert_eq!(*log.lock().unwrap(), vec!["setup:first", "teardown:first"]);
            assert_eq!(manager.state("broken"), Some(FixtureState::Failed));
        }
    }

    mod template_tests {
        use super::*;

        #[test]
        fn test_missing_file_is_fixture_missing() {
            let dir = tempfile::tempdir().unwrap();
            let mut fixture = TemplateFixture::new(dir.path().join("simpleQuickUI2"), "app.qmlproject");
            let err = fixture.setup().unwrap_err();
            assert!(matches!(err, HarnessError::FixtureMissing { .. }));
            assert!(fixture.working_dir().is_none());
        }

        #[test]
        fn test_template_is_copied_and_removed() {
            let dir = tempfile::tempdir().unwrap();
            let template = dir.path().join("simpleQuickUI2");
            std::fs::create_dir_all(template.join("content")).unwrap();
            std::fs::write(template.join("app.qmlproject"), "Project {}").unwrap();
            std::fs::write(template.join("content/main.qml"), "Rectangle {}").unwrap();

            let spec = TemplateSpec {
                template: PathBuf::from("simpleQuickUI2"),
                file: "app.qmlproject".to_string(),
            };
            let mut fixture = TemplateFixture::from_spec(&spec, dir.path());
            fixture.setup().unwrap();
            let project = fixture.project_file().unwrap();
            assert_eq!(std::fs::read_to_string(&project).unwrap(), "Project {}");
            let working = fixture.working_dir().unwrap();
            assert!(working.join("content/main.qml").is_file());
            assert_ne!(working, template);

            fixture.teardown().unwrap();
            assert!(!working.exists());
            assert!(template.join("app.qmlproject").is_file());
        }

        #[cfg(unix)]
        #[test]
        fn test_failed_copy_leaves_nothing_behind() {
            let dir = tempfile::tempdir().unwrap();
            let template = dir.path().join("simpleQuickUI2");
            std::fs::create_dir_all(&template).unwrap();
            std::fs::write(template.join("app.qmlproject"), "Project {}").unwrap();
            std::os::unix::fs::symlink(dir.path().join("gone.qml"), template.join("dangling.qml"))
                .unwrap();
            let work = dir.path().join("work");
            std::fs::create_dir_all(&work).unwrap();

            let mut fixture =
                TemplateFixture::new(&template, "app.qmlproject").with_work_base(&work);
            let err = fixture.setup().unwrap_err();
            assert!(matches!(err, HarnessError::Io(_)));
            assert!(fixture.working_dir().is_none());
            assert_eq!(std::fs::read_dir(&work).unwrap().count(), 0);
            fixture.teardown().unwrap();
        }
    }
}
