//! Dev-mode watch loop.
//!
//! Polls modification times under the source root, debounces bursts of
//! changes and serializes rebuilds. Child-process supervision (restarting
//! the application entry file) is left to the external runner.

use crate::config::LoadedConfig;
use crate::logging::Logger;
use crate::perform_compile::{perform_build_with_program, BuildOptions};
use crate::sdk::GeneratorFactory;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};
use ts::HostCompiler;

/// Watch configuration.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub poll_interval: Duration,
    pub debounce: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(250),
            debounce: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Clone)]
pub enum FileChangeEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Deleted(PathBuf),
}

/// Mtime-polling watcher over the `.ts` files of a directory tree.
pub struct WatchCompiler {
    root: PathBuf,
    options: WatchOptions,
    file_times: HashMap<PathBuf, SystemTime>,
}

impl WatchCompiler {
    pub fn new(root: PathBuf, options: WatchOptions) -> Self {
        Self {
            root,
            options,
            file_times: HashMap::new(),
        }
    }

    fn scan(&self, dir: &Path, out: &mut HashMap<PathBuf, SystemTime>) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                if path.file_name().map(|n| n == "node_modules").unwrap_or(false) {
                    continue;
                }
                self.scan(&path, out);
            } else if path.extension().map(|e| e == "ts" || e == "tsx").unwrap_or(false) {
                if let Ok(meta) = entry.metadata() {
                    if let Ok(modified) = meta.modified() {
                        out.insert(path, modified);
                    }
                }
            }
        }
    }

    /// One poll tick; returns the changes since the previous tick.
    pub fn check_for_changes(&mut self) -> Vec<FileChangeEvent> {
        let mut current = HashMap::new();
        self.scan(&self.root.clone(), &mut current);
        let mut changes = Vec::new();
        for (path, modified) in &current {
            match self.file_times.get(path) {
                Some(prev) if modified > prev => {
                    changes.push(FileChangeEvent::Modified(path.clone()));
                }
                None if !self.file_times.is_empty() => {
                    changes.push(FileChangeEvent::Created(path.clone()));
                }
                _ => {}
            }
        }
        for path in self.file_times.keys() {
            if !current.contains_key(path) {
                changes.push(FileChangeEvent::Deleted(path.clone()));
            }
        }
        self.file_times = current;
        changes
    }

    /// Waits out the debounce window so bursts coalesce into one rebuild.
    fn debounce(&mut self) {
        loop {
            std::thread::sleep(self.options.debounce);
            if self.check_for_changes().is_empty() {
                return;
            }
        }
    }
}

/// Runs the watch loop until `shutdown` is set. Rebuilds are serialized:
/// a change detected mid-build triggers another rebuild afterwards. Each
/// rebuild runs the full pipeline, SDK hand-off included, with a fresh
/// generator from the factory.
pub fn perform_watch(
    opts: &BuildOptions,
    loaded: &LoadedConfig,
    host: &dyn HostCompiler,
    sdk_factory: Option<&GeneratorFactory>,
    shutdown: &AtomicBool,
    logger: &dyn Logger,
) -> i32 {
    let root = loaded
        .config
        .source_root
        .clone()
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let p = &opts.project;
            if p.is_dir() {
                p.clone()
            } else {
                p.parent().unwrap_or(Path::new(".")).to_path_buf()
            }
        });
    let mut watcher = WatchCompiler::new(root, WatchOptions::default());

    logger.info("watching for file changes");
    let mut first = true;
    loop {
        if shutdown.load(Ordering::SeqCst) {
            return 0;
        }
        let rebuild = if first {
            watcher.check_for_changes();
            first = false;
            true
        } else {
            let changes = watcher.check_for_changes();
            if changes.is_empty() {
                std::thread::sleep(watcher.options.poll_interval);
                false
            } else {
                watcher.debounce();
                true
            }
        };
        if rebuild {
            let parsed = host.parse_project(&opts.project, &opts.compiler_overrides);
            if !parsed.errors.is_empty() {
                for d in &parsed.errors {
                    logger.error(&d.to_string());
                }
                continue;
            }
            let program = host.create_program(&parsed);
            let code = perform_build_with_program(
                opts,
                loaded,
                program.as_ref(),
                sdk_factory.map(|f| f()),
                Some(shutdown),
                logger,
            );
            logger.info(&format!(
                "build finished with exit code {}, watching for file changes",
                code
            ));
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn detects_modified_and_deleted_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.ts");
        std::fs::write(&file, "export {}").unwrap();

        let mut watcher = WatchCompiler::new(dir.path().to_path_buf(), WatchOptions::default());
        assert!(watcher.check_for_changes().is_empty());

        // Push the mtime forward explicitly; wall-clock sleeps are flaky.
        let later = SystemTime::now() + Duration::from_secs(5);
        let times = std::fs::OpenOptions::new()
            .append(true)
            .open(&file)
            .and_then(|f| f.set_times(std::fs::FileTimes::new().set_modified(later)));
        assert!(times.is_ok());
        let changes = watcher.check_for_changes();
        assert_eq!(changes.len(), 1);
        assert!(matches!(changes[0], FileChangeEvent::Modified(_)));

        std::fs::remove_file(&file).unwrap();
        let changes = watcher.check_for_changes();
        assert_eq!(changes.len(), 1);
        assert!(matches!(changes[0], FileChangeEvent::Deleted(_)));
    }
}
