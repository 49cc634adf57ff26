use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use vfswatch::watch::{
    ChangeKind, EventQueue, NativeEvent, NativeWatcher, RegistrationError, WatchHandle,
    WatchStrategy,
};

#[derive(Debug, Default)]
struct FakeState {
    next_handle: u64,
    register_calls: Vec<PathBuf>,
    unregister_calls: Vec<WatchHandle>,
    subdirectory_calls: Vec<(WatchHandle, PathBuf)>,
    active: HashMap<WatchHandle, PathBuf>,
    failures: HashMap<PathBuf, RegistrationError>,
    subdirectory_failure: Option<RegistrationError>,
}

/// A native watcher that never touches the OS.
///
/// - records every register / unregister / subdirectory call
/// - hands out monotonically increasing handles
/// - fails registrations of roots configured through the probe
///
/// Events are injected through [`FakeWatcherProbe`], which shares state with
/// the watcher after it has been boxed into the registry.
#[derive(Debug)]
pub struct FakeNativeWatcher {
    strategy: WatchStrategy,
    state: Arc<Mutex<FakeState>>,
}

impl FakeNativeWatcher {
    pub fn new(strategy: WatchStrategy, queue: Arc<EventQueue>) -> (Self, FakeWatcherProbe) {
        let state = Arc::new(Mutex::new(FakeState {
            next_handle: 1,
            ..FakeState::default()
        }));
        let watcher = Self {
            strategy,
            state: Arc::clone(&state),
        };
        let probe = FakeWatcherProbe { state, queue };
        (watcher, probe)
    }
}

impl NativeWatcher for FakeNativeWatcher {
    fn strategy(&self) -> WatchStrategy {
        self.strategy
    }

    fn register(&mut self, root: &Path) -> Result<WatchHandle, RegistrationError> {
        let mut state = self.state.lock().unwrap();
        state.register_calls.push(root.to_path_buf());
        if let Some(err) = state.failures.get(root) {
            return Err(err.clone());
        }
        let handle = WatchHandle::new(state.next_handle);
        state.next_handle += 1;
        state.active.insert(handle, root.to_path_buf());
        Ok(handle)
    }

    fn unregister(&mut self, handle: WatchHandle) {
        let mut state = self.state.lock().unwrap();
        state.unregister_calls.push(handle);
        state.active.remove(&handle);
    }

    fn watch_subdirectory(
        &mut self,
        handle: WatchHandle,
        dir: &Path,
    ) -> Result<(), RegistrationError> {
        let mut state = self.state.lock().unwrap();
        state.subdirectory_calls.push((handle, dir.to_path_buf()));
        match &state.subdirectory_failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

/// Test-side view of a [`FakeNativeWatcher`].
#[derive(Debug, Clone)]
pub struct FakeWatcherProbe {
    state: Arc<Mutex<FakeState>>,
    queue: Arc<EventQueue>,
}

impl FakeWatcherProbe {
    /// Roots passed to `register`, in call order (failed calls included).
    pub fn register_calls(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().register_calls.clone()
    }

    pub fn unregister_calls(&self) -> Vec<WatchHandle> {
        self.state.lock().unwrap().unregister_calls.clone()
    }

    pub fn subdirectory_calls(&self) -> Vec<(WatchHandle, PathBuf)> {
        self.state.lock().unwrap().subdirectory_calls.clone()
    }

    /// Roots with a live registration, sorted.
    pub fn active_roots(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = self.state.lock().unwrap().active.values().cloned().collect();
        roots.sort();
        roots
    }

    /// Live handle registered for `root`, if any.
    pub fn handle_for(&self, root: impl AsRef<Path>) -> Option<WatchHandle> {
        let state = self.state.lock().unwrap();
        state
            .active
            .iter()
            .find(|(_, r)| r.as_path() == root.as_ref())
            .map(|(h, _)| *h)
    }

    /// Make every future `register(root)` fail with `err`.
    pub fn fail_registration(&self, root: impl AsRef<Path>, err: RegistrationError) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(root.as_ref().to_path_buf(), err);
    }

    pub fn clear_failure(&self, root: impl AsRef<Path>) {
        self.state.lock().unwrap().failures.remove(root.as_ref());
    }

    pub fn fail_subdirectories(&self, err: Option<RegistrationError>) {
        self.state.lock().unwrap().subdirectory_failure = err;
    }

    /// Deliver a change for `handle`, whether or not it is still registered
    /// (a real backend can race with unregistration).
    pub fn emit(&self, handle: WatchHandle, path: impl Into<PathBuf>, kind: ChangeKind) {
        self.queue.push(NativeEvent::new(handle, path, kind));
    }

    /// Deliver a change on behalf of whatever currently watches `root`.
    pub fn emit_under(&self, root: impl AsRef<Path>, path: impl Into<PathBuf>, kind: ChangeKind) {
        let handle = self
            .handle_for(root.as_ref())
            .expect("emit_under: root is not registered");
        self.emit(handle, path, kind);
    }

    pub fn overflow(&self, handle: WatchHandle) {
        self.queue.push_overflow(handle);
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }
}
