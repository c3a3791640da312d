// tsnest — build driver for decorator-routed TypeScript servers.

use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn main() {
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        // INT/TERM request orderly shutdown: in-flight rewrites finish and
        // the SDK task is joined before the process exits.
        let _ = ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::SeqCst);
        });
    }

    let args: Vec<String> = std::env::args().collect();
    let code = tsnest_compiler_cli::main_entry::main_fn(&args, &shutdown);
    process::exit(code);
}
