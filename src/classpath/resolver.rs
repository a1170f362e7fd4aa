//! Build-path container resolution
//!
//! Implements the build tool's container protocol on top of an
//! [`SdkManager`]: a container path is mapped to an SDK and the SDK to an
//! ordered list of build-path resources. Failures never cross the protocol
//! boundary as errors; they produce a broken container instead.

use crate::classpath::{ClasspathContainer, ContainerPath, MirrorScheduler};
use crate::sdk::{is_project_affected, Sdk, SdkManager, UpdateEvent, UpdateListener, Validation};
use crate::types::SdkError;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, info, warn};

/// A project as seen by the build tool.
pub trait BuildProject: Send + Sync {
    fn name(&self) -> &str;

    /// The container path currently on the project's build path.
    fn container_path(&self) -> Option<ContainerPath>;

    fn set_container(&self, container: ClasspathContainer);

    /// Folder the project wants resolved libraries copied into.
    fn mirror_dir(&self) -> Option<PathBuf> {
        None
    }
}

struct TrackedProject {
    project: Arc<dyn BuildProject>,
    bound_sdk: Option<String>,
}

pub struct PathResolver {
    manager: Arc<SdkManager>,
    container_id: String,
    mirror: Option<Arc<dyn MirrorScheduler>>,
    tracked: Mutex<HashMap<String, TrackedProject>>,
}

impl PathResolver {
    pub fn new(manager: Arc<SdkManager>, container_id: impl Into<String>) -> Self {
        Self {
            manager,
            container_id: container_id.into(),
            mirror: None,
            tracked: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_mirror(mut self, mirror: Arc<dyn MirrorScheduler>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub fn accepts(&self, path: &ContainerPath) -> bool {
        path.container_id() == self.container_id
    }

    /// Resolve `path` against the current registry.
    pub fn resolve(&self, path: &ContainerPath) -> ClasspathContainer {
        self.resolve_sdk(path).1
    }

    /// Resolve `path` and install the result on `project`.
    pub fn initialize(&self, path: &ContainerPath, project: &dyn BuildProject) {
        let (sdk, container) = self.resolve_sdk(path);
        self.install(project, sdk, container);
    }

    /// Re-resolve `path` for `project`.
    ///
    /// `suggestion` is the container the build tool currently holds; only
    /// attachments the fresh resolution lacks are taken from it. Returns
    /// `None` for paths this resolver does not own.
    pub fn request_update(
        &self,
        path: &ContainerPath,
        project: &dyn BuildProject,
        suggestion: Option<&ClasspathContainer>,
    ) -> Option<ClasspathContainer> {
        if !self.accepts(path) {
            return None;
        }

        let (sdk, mut container) = self.resolve_sdk(path);

        if let Some(hint) = suggestion.filter(|hint| !container.is_broken() && hint.path == *path) {
            for entry in &mut container.entries {
                if let Some(previous) = hint.entries.iter().find(|e| e.path == entry.path) {
                    entry.merge_attachments(previous);
                }
            }
        }

        self.install(project, sdk, container.clone());
        Some(container)
    }

    /// Keep `project` up to date when the registry changes.
    pub fn track(&self, project: Arc<dyn BuildProject>) {
        let name = project.name().to_string();
        let bound_sdk = project
            .container_path()
            .filter(|path| self.accepts(path))
            .and_then(|path| self.manager.find_sdk(&path))
            .map(|sdk| sdk.name().to_string());

        self.tracked_mut().insert(name, TrackedProject { project, bound_sdk });
    }

    pub fn untrack(&self, project_name: &str) -> bool {
        self.tracked_mut().remove(project_name).is_some()
    }

    /// Listener that re-initializes tracked projects affected by an update.
    /// It holds only a weak reference, so registering it with the manager
    /// does not keep the resolver alive.
    pub fn listener(self: &Arc<Self>) -> Arc<dyn UpdateListener> {
        Arc::new(ProjectRefresher {
            resolver: Arc::downgrade(self),
        })
    }

    fn resolve_sdk(&self, path: &ContainerPath) -> (Option<Sdk>, ClasspathContainer) {
        if !self.accepts(path) {
            let e = SdkError::Resolution(format!("{} is not a {} container", path, self.container_id));
            return (None, ClasspathContainer::broken(path.clone(), e.to_string()));
        }

        let Some(sdk) = self.manager.find_sdk(path) else {
            let e = SdkError::Resolution(match path.sdk_name() {
                Some(name) => format!("no SDK named '{}' is registered", name),
                None => "no SDKs are registered".to_string(),
            });
            warn!("{}: {}", path, e);
            return (None, ClasspathContainer::broken(path.clone(), e.to_string()));
        };

        if let Validation::Error(message) = sdk.validate() {
            let e = SdkError::Validation {
                sdk: sdk.name().to_string(),
                message,
            };
            warn!("{}: {}", path, e);
            return (Some(sdk), ClasspathContainer::broken(path.clone(), e.to_string()));
        }

        let description = format!("{} [{}]", sdk.layout().description, sdk.name());
        let container = ClasspathContainer::resolved(path.clone(), description, sdk.classpath_entries());
        (Some(sdk), container)
    }

    fn install(&self, project: &dyn BuildProject, sdk: Option<Sdk>, container: ClasspathContainer) {
        debug!(
            "Installing {} on {} ({} entries)",
            container.path,
            project.name(),
            container.entries.len()
        );

        let name = project.name();
        if let Some(tracked) = self.tracked_mut().get_mut(name) {
            tracked.bound_sdk = sdk.map(|s| s.name().to_string());
        }

        if let (Some(mirror), Some(dest), false) = (&self.mirror, project.mirror_dir(), container.is_broken()) {
            let files = container.entries.iter().map(|e| e.path.clone()).collect();
            mirror.schedule(name, &dest, files);
        }

        project.set_container(container);
    }

    fn tracked_mut(&self) -> MutexGuard<'_, HashMap<String, TrackedProject>> {
        self.tracked.lock().unwrap_or_else(|e| e.into_inner())
    }
}

struct ProjectRefresher {
    resolver: Weak<PathResolver>,
}

impl UpdateListener for ProjectRefresher {
    fn on_update(&self, event: &UpdateEvent) -> anyhow::Result<()> {
        let Some(resolver) = self.resolver.upgrade() else {
            return Ok(());
        };

        // Projects are queried without holding the lock; they may call back into track/untrack
        let tracked: Vec<(Arc<dyn BuildProject>, Option<String>)> = resolver
            .tracked_mut()
            .values()
            .map(|tracked| (Arc::clone(&tracked.project), tracked.bound_sdk.clone()))
            .collect();

        let affected: Vec<(Arc<dyn BuildProject>, ContainerPath)> = tracked
            .into_iter()
            .filter_map(|(project, bound_sdk)| {
                let path = project.container_path()?;
                let affected =
                    resolver.accepts(&path) && is_project_affected(&path, bound_sdk.as_deref(), event);
                affected.then_some((project, path))
            })
            .collect();

        for (project, path) in affected {
            info!("Refreshing {} on {} after SDK update", path, project.name());
            resolver.initialize(&path, project.as_ref());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::entry::tests::test_layout;
    use crate::sdk::{LayoutSdkFactory, MemoryStore, SdkFactory, SdkSet};
    use std::fs;
    use std::path::Path;
    use std::sync::OnceLock;
    use tempfile::TempDir;

    #[derive(Default)]
    struct TestProject {
        name: String,
        path: Mutex<Option<ContainerPath>>,
        installed: Mutex<Vec<ClasspathContainer>>,
        mirror_dir: Option<PathBuf>,
    }

    impl TestProject {
        fn new(name: &str, path: &str) -> Self {
            Self {
                name: name.to_string(),
                path: Mutex::new(Some(ContainerPath::parse(path).unwrap())),
                ..Default::default()
            }
        }

        fn last(&self) -> ClasspathContainer {
            self.installed.lock().unwrap().last().cloned().unwrap()
        }

        fn installs(&self) -> usize {
            self.installed.lock().unwrap().len()
        }
    }

    impl BuildProject for TestProject {
        fn name(&self) -> &str {
            &self.name
        }

        fn container_path(&self) -> Option<ContainerPath> {
            self.path.lock().unwrap().clone()
        }

        fn set_container(&self, container: ClasspathContainer) {
            self.installed.lock().unwrap().push(container);
        }

        fn mirror_dir(&self) -> Option<PathBuf> {
            self.mirror_dir.clone()
        }
    }

    #[derive(Default)]
    struct RecordingMirror {
        calls: Mutex<Vec<(String, PathBuf, Vec<PathBuf>)>>,
    }

    impl MirrorScheduler for RecordingMirror {
        fn schedule(&self, project: &str, dest: &Path, files: Vec<PathBuf>) {
            self.calls
                .lock()
                .unwrap()
                .push((project.to_string(), dest.to_path_buf(), files));
        }
    }

    struct Fixture {
        _dir: TempDir,
        root: PathBuf,
        manager: Arc<SdkManager>,
        factory: LayoutSdkFactory,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let root = dir.path().to_path_buf();
            let factory = LayoutSdkFactory::new(test_layout());
            let manager = Arc::new(SdkManager::new(
                "test",
                Arc::new(MemoryStore::new()),
                Arc::new(factory.clone()),
            ));
            Self {
                _dir: dir,
                root,
                manager,
                factory,
            }
        }

        /// An install directory that passes validation.
        fn kit(&self, dir: &str) -> Sdk {
            let path = self.root.join(dir);
            fs::create_dir_all(path.join("lib")).unwrap();
            fs::write(path.join("lib/core.jar"), b"").unwrap();
            self.factory.new_instance(dir, &path)
        }

        fn broken_kit(&self, name: &str) -> Sdk {
            let path = self.root.join(name);
            fs::create_dir_all(&path).unwrap();
            self.factory.new_instance(name, &path)
        }

        fn register(&self, sdks: Vec<Sdk>, default: Option<&str>) {
            let mut set: SdkSet = sdks.into_iter().collect();
            if let Some(name) = default {
                let default = set.find_by_name(name).unwrap().clone();
                set.set_default(&default);
            }
            self.manager.set_sdks(set).unwrap();
        }

        fn resolver(&self) -> Arc<PathResolver> {
            Arc::new(PathResolver::new(Arc::clone(&self.manager), "TEST_CONTAINER"))
        }
    }

    fn path(raw: &str) -> ContainerPath {
        ContainerPath::parse(raw).unwrap()
    }

    #[test]
    fn test_resolves_default_and_legacy_paths() {
        let fx = Fixture::new();
        fx.register(vec![fx.kit("a"), fx.kit("b")], Some("b"));
        let resolver = fx.resolver();

        for raw in ["TEST_CONTAINER", "TEST_CONTAINER/v2"] {
            let container = resolver.resolve(&path(raw));
            assert!(!container.is_broken(), "{} should resolve", raw);
            assert_eq!(container.entries[0].path, fx.root.join("b/lib/core.jar"));
            assert!(container.description.contains("[b]"));
        }
    }

    #[test]
    fn test_resolves_named_path() {
        let fx = Fixture::new();
        fx.register(vec![fx.kit("a"), fx.kit("b")], Some("b"));
        let container = fx.resolver().resolve(&path("TEST_CONTAINER/a"));
        assert_eq!(container.entries.len(), 2);
        assert_eq!(container.entries[0].path, fx.root.join("a/lib/core.jar"));
        assert!(container.entries[0].exported);
    }

    #[test]
    fn test_missing_sdk_installs_broken_container() {
        let fx = Fixture::new();
        let resolver = fx.resolver();
        let project = TestProject::new("app", "TEST_CONTAINER/nope");

        resolver.initialize(&path("TEST_CONTAINER/nope"), &project);
        let installed = project.last();
        assert!(installed.is_broken());
        assert!(installed.problem().unwrap().contains("nope"));

        resolver.initialize(&path("TEST_CONTAINER"), &project);
        assert!(project.last().problem().unwrap().contains("no SDKs"));
    }

    #[test]
    fn test_invalid_sdk_installs_broken_container() {
        let fx = Fixture::new();
        fx.register(vec![fx.broken_kit("bad")], None);
        let project = TestProject::new("app", "TEST_CONTAINER");

        fx.resolver().initialize(&path("TEST_CONTAINER"), &project);
        let installed = project.last();
        assert!(installed.is_broken());
        assert!(installed.entries.is_empty());
        assert!(installed.problem().unwrap().contains("lib/core.jar"));
    }

    #[test]
    fn test_foreign_container_id() {
        let fx = Fixture::new();
        fx.register(vec![fx.kit("a")], None);
        let resolver = fx.resolver();
        let project = TestProject::new("app", "OTHER/a");

        assert!(resolver.resolve(&path("OTHER/a")).is_broken());
        assert!(resolver
            .request_update(&path("OTHER/a"), &project, None)
            .is_none());
        assert_eq!(project.installs(), 0);
    }

    #[test]
    fn test_request_update_merges_hint_but_rederives_sdk() {
        let fx = Fixture::new();
        fx.register(vec![fx.kit("a")], None);
        let resolver = fx.resolver();
        let project = TestProject::new("app", "TEST_CONTAINER/a");
        let p = path("TEST_CONTAINER/a");

        let mut hint = resolver.resolve(&p);
        hint.entries[1].source_attachment = Some(PathBuf::from("/home/me/extra-src.jar"));
        hint.entries.push(crate::classpath::ClasspathEntry::library("/stale/lib.jar"));

        let updated = resolver.request_update(&p, &project, Some(&hint)).unwrap();
        assert_eq!(updated.entries.len(), 2);
        assert_eq!(
            updated.entries[1].source_attachment,
            Some(PathBuf::from("/home/me/extra-src.jar"))
        );
        assert_eq!(project.last(), updated);

        // the hint cannot keep a removed SDK alive
        fx.register(vec![], None);
        let updated = resolver.request_update(&p, &project, Some(&hint)).unwrap();
        assert!(updated.is_broken());
    }

    #[test]
    fn test_mirror_is_scheduled_not_performed() {
        let fx = Fixture::new();
        fx.register(vec![fx.kit("a")], None);
        let mirror = Arc::new(RecordingMirror::default());
        let resolver = PathResolver::new(Arc::clone(&fx.manager), "TEST_CONTAINER")
            .with_mirror(mirror.clone());

        let dest = fx.root.join("war/WEB-INF/lib");
        let project = TestProject {
            mirror_dir: Some(dest.clone()),
            ..TestProject::new("app", "TEST_CONTAINER")
        };

        resolver.initialize(&path("TEST_CONTAINER"), &project);
        let calls = mirror.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "app");
        assert_eq!(calls[0].1, dest);
        assert_eq!(calls[0].2[0], fx.root.join("a/lib/core.jar"));
        assert!(!dest.exists());
    }

    #[test]
    fn test_tracked_projects_refresh_on_update() {
        let fx = Fixture::new();
        fx.register(vec![fx.kit("a"), fx.kit("b")], Some("a"));
        let resolver = fx.resolver();
        fx.manager.add_listener(resolver.listener());

        let follows_default = Arc::new(TestProject::new("default-app", "TEST_CONTAINER"));
        let pinned = Arc::new(TestProject::new("pinned-app", "TEST_CONTAINER/b"));
        resolver.track(follows_default.clone());
        resolver.track(pinned.clone());

        // default switches to b: only the default-bound project changes
        fx.register(vec![fx.kit("a"), fx.kit("b")], Some("b"));
        assert_eq!(follows_default.installs(), 1);
        assert!(follows_default.last().description.contains("[b]"));
        assert_eq!(pinned.installs(), 0);

        // b removed: both projects were bound to it
        fx.register(vec![fx.kit("a")], Some("a"));
        assert_eq!(pinned.installs(), 1);
        assert!(pinned.last().is_broken());
        assert_eq!(follows_default.installs(), 2);
        assert!(follows_default.last().description.contains("[a]"));

        resolver.untrack("pinned-app");
        fx.register(vec![fx.kit("a"), fx.broken_kit("b")], Some("a"));
        assert_eq!(pinned.installs(), 1);
    }

    /// Stops being tracked the first time the refresher asks for its path.
    struct LeavingProject {
        inner: TestProject,
        resolver: OnceLock<Weak<PathResolver>>,
    }

    impl BuildProject for LeavingProject {
        fn name(&self) -> &str {
            self.inner.name()
        }

        fn container_path(&self) -> Option<ContainerPath> {
            if let Some(resolver) = self.resolver.get().and_then(Weak::upgrade) {
                resolver.untrack(self.inner.name());
            }
            self.inner.container_path()
        }

        fn set_container(&self, container: ClasspathContainer) {
            self.inner.set_container(container);
        }
    }

    #[test]
    fn test_project_may_untrack_itself_during_refresh() {
        let fx = Fixture::new();
        fx.register(vec![fx.kit("a"), fx.kit("b")], Some("a"));
        let resolver = fx.resolver();
        fx.manager.add_listener(resolver.listener());

        let project = Arc::new(LeavingProject {
            inner: TestProject::new("leaving-app", "TEST_CONTAINER"),
            resolver: OnceLock::new(),
        });
        resolver.track(project.clone());
        project.resolver.set(Arc::downgrade(&resolver)).unwrap();

        fx.register(vec![fx.kit("a"), fx.kit("b")], Some("b"));
        assert_eq!(project.inner.installs(), 1);
        assert!(project.inner.last().description.contains("[b]"));
        assert!(!resolver.untrack("leaving-app"));
    }

    #[test]
    fn test_listener_outlived_by_manager() {
        let fx = Fixture::new();
        let resolver = fx.resolver();
        fx.manager.add_listener(resolver.listener());
        drop(resolver);
        fx.register(vec![fx.kit("a")], None);
    }
}
