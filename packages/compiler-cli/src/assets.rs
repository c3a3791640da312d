// Static assets
//
// Non-TypeScript files matched by the asset globs are copied into the
// output tree, preserving their path relative to the source root.

use crate::logging::Logger;
use std::fs;
use std::path::Path;

pub fn copy_assets(
    patterns: &[String],
    source_root: &str,
    out_dir: &str,
    logger: &dyn Logger,
) -> usize {
    let root = Path::new(source_root);
    let mut copied = 0;
    for pattern in patterns {
        let absolute = if Path::new(pattern).is_absolute() {
            pattern.clone()
        } else {
            format!("{}/{}", source_root.trim_end_matches('/'), pattern)
        };
        let entries = match glob::glob(&absolute) {
            Ok(entries) => entries,
            Err(e) => {
                logger.warn(&format!("assets: invalid glob `{}`: {}", pattern, e));
                continue;
            }
        };
        for entry in entries.flatten() {
            if !entry.is_file() {
                continue;
            }
            let name = entry.to_string_lossy();
            if name.ends_with(".ts") || name.ends_with(".tsx") {
                continue;
            }
            let rel = entry.strip_prefix(root).unwrap_or(&entry);
            let target = Path::new(out_dir).join(rel);
            if let Some(parent) = target.parent() {
                let _ = fs::create_dir_all(parent);
            }
            match fs::copy(&entry, &target) {
                Ok(_) => copied += 1,
                Err(e) => logger.warn(&format!("assets: cannot copy {}: {}", name, e)),
            }
        }
    }
    copied
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::logging::NullLogger;

    #[test]
    fn copies_matching_non_ts_files_preserving_layout() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let out = dir.path().join("dist");
        fs::create_dir_all(src.join("mail")).unwrap();
        fs::write(src.join("mail/welcome.html"), "<p>hi</p>").unwrap();
        fs::write(src.join("mail/welcome.ts"), "export {}").unwrap();

        let copied = copy_assets(
            &["**/*.html".to_string()],
            &src.to_string_lossy(),
            &out.to_string_lossy(),
            &NullLogger::new(),
        );
        assert_eq!(copied, 1);
        assert!(out.join("mail/welcome.html").exists());
        assert!(!out.join("mail/welcome.ts").exists());
    }
}
