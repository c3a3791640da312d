// SDK hand-off
//
// The SDK generator itself ships separately; the driver only decides when
// regeneration is needed (the OpenAPI document's hash changed) and runs
// the registered generator on a background thread, joined before exit.

use crate::config::hash_bytes;
use crate::logging::Logger;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

pub const SDK_HASH_FILE: &str = ".sdk-hash";

/// External SDK generator entry point.
pub trait SdkGenerator: Send {
    fn generate(&self, openapi_doc: &Path, output_dir: &Path) -> Result<(), String>;
}

/// Produces a fresh generator per build; a single boxed generator cannot be
/// reused across watch-mode rebuilds.
pub type GeneratorFactory = Box<dyn Fn() -> Box<dyn SdkGenerator> + Send + Sync>;

static REGISTERED: once_cell::sync::OnceCell<GeneratorFactory> = once_cell::sync::OnceCell::new();

/// Called once by the generator package's initializer.
pub fn register_generator(factory: GeneratorFactory) -> Result<(), &'static str> {
    REGISTERED
        .set(factory)
        .map_err(|_| "sdk generator already registered")
}

/// A fresh generator instance from the registered factory, if any.
pub fn registered_generator() -> Option<Box<dyn SdkGenerator>> {
    REGISTERED.get().map(|f| f())
}

/// The registered factory itself, for callers that build repeatedly.
pub fn registered_factory() -> Option<&'static GeneratorFactory> {
    REGISTERED.get()
}

/// A running background generation, joined before the build exits.
pub struct SdkTask {
    handle: JoinHandle<Result<(), String>>,
}

impl SdkTask {
    pub fn join(self, logger: &dyn Logger) -> bool {
        match self.handle.join() {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                logger.warn(&format!("sdk: generation failed: {}", e));
                false
            }
            Err(_) => {
                logger.warn("sdk: generation task panicked");
                false
            }
        }
    }
}

/// Spawns SDK generation when the OpenAPI document changed since the hash
/// recorded in `<sdk-output>/.sdk-hash`. Returns `None` when up to date or
/// when the document cannot be read.
pub fn spawn_if_stale(
    openapi_doc: &Path,
    sdk_output: &Path,
    generator: Box<dyn SdkGenerator>,
    logger: &dyn Logger,
) -> Option<SdkTask> {
    let bytes = match fs::read(openapi_doc) {
        Ok(b) => b,
        Err(e) => {
            logger.warn(&format!(
                "sdk: cannot read {}: {}",
                openapi_doc.display(),
                e
            ));
            return None;
        }
    };
    let hash = hash_bytes(&bytes);
    let marker = sdk_output.join(SDK_HASH_FILE);
    if fs::read_to_string(&marker)
        .map(|h| h.trim() == hash)
        .unwrap_or(false)
    {
        return None;
    }

    let doc: PathBuf = openapi_doc.to_path_buf();
    let out: PathBuf = sdk_output.to_path_buf();
    let handle = std::thread::spawn(move || {
        fs::create_dir_all(&out).map_err(|e| e.to_string())?;
        generator.generate(&doc, &out)?;
        fs::write(out.join(SDK_HASH_FILE), hash).map_err(|e| e.to_string())?;
        Ok(())
    });
    Some(SdkTask { handle })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::logging::NullLogger;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct CountingGenerator(Arc<AtomicBool>);

    impl SdkGenerator for CountingGenerator {
        fn generate(&self, _doc: &Path, _out: &Path) -> Result<(), String> {
            self.0.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn regenerates_only_when_document_hash_changes() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("openapi.json");
        let out = dir.path().join("sdk");
        fs::write(&doc, b"{\"openapi\":\"3.1.0\"}").unwrap();
        let logger = NullLogger::new();

        let ran = Arc::new(AtomicBool::new(false));
        let task = spawn_if_stale(
            &doc,
            &out,
            Box::new(CountingGenerator(ran.clone())),
            &logger,
        )
        .expect("stale on first run");
        assert!(task.join(&logger));
        assert!(ran.load(Ordering::SeqCst));
        assert!(out.join(SDK_HASH_FILE).exists());

        // Unchanged document: nothing to do.
        let ran2 = Arc::new(AtomicBool::new(false));
        assert!(spawn_if_stale(&doc, &out, Box::new(CountingGenerator(ran2.clone())), &logger).is_none());
        assert!(!ran2.load(Ordering::SeqCst));

        // Changed document regenerates.
        fs::write(&doc, b"{\"openapi\":\"3.1.0\",\"info\":{}}").unwrap();
        let ran3 = Arc::new(AtomicBool::new(false));
        let task = spawn_if_stale(&doc, &out, Box::new(CountingGenerator(ran3.clone())), &logger).unwrap();
        assert!(task.join(&logger));
        assert!(ran3.load(Ordering::SeqCst));
    }
}
