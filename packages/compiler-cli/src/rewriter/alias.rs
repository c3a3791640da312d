// Path-alias resolution
//
// Import specifiers matching a tsconfig `paths` pattern are rewritten to a
// relative path computed from the emitted file's location and the resolved
// target inside the output tree. `.ts`/`.tsx` normalize to `.js`; bare
// directory imports resolve to `/index.js`.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

pub type ExistsFn = Box<dyn Fn(&str) -> bool>;

struct AliasPattern {
    prefix: String,
    suffix: String,
    has_star: bool,
    targets: Vec<String>,
}

pub struct AliasResolver {
    patterns: Vec<AliasPattern>,
    base_url: String,
    root_dir: String,
    out_dir: String,
    exists: ExistsFn,
}

static IMPORT_SPECIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?m)((?:\bimport|\bexport)\s[^;'"]*?\bfrom\s*|\bimport\s*\(\s*|\brequire\s*\(\s*)(["'])([^"']+)(["'])"#,
    )
    .expect("import specifier regex")
});

impl AliasResolver {
    pub fn new(
        paths: &[(String, Vec<String>)],
        base_url: &str,
        root_dir: &str,
        out_dir: &str,
        exists: ExistsFn,
    ) -> Self {
        let patterns = paths
            .iter()
            .map(|(pattern, targets)| {
                let (prefix, suffix, has_star) = match pattern.split_once('*') {
                    Some((pre, suf)) => (pre.to_string(), suf.to_string(), true),
                    None => (pattern.clone(), String::new(), false),
                };
                AliasPattern {
                    prefix,
                    suffix,
                    has_star,
                    targets: targets.clone(),
                }
            })
            .collect();
        Self {
            patterns,
            base_url: trim_slash(base_url),
            root_dir: trim_slash(root_dir),
            out_dir: trim_slash(out_dir),
            exists,
        }
    }

    /// Rewrites every aliased specifier in `text`. Unmatched specifiers are
    /// left untouched; the returned flag says whether anything changed.
    pub fn rewrite_imports(&self, text: &str, importer_out_path: &str) -> (String, bool) {
        let mut changed = false;
        let out = IMPORT_SPECIFIER.replace_all(text, |caps: &Captures<'_>| {
            let spec = &caps[3];
            match self.resolve_specifier(spec, importer_out_path) {
                Some(resolved) => {
                    changed = true;
                    format!("{}{}{}{}", &caps[1], &caps[2], resolved, &caps[4])
                }
                None => caps[0].to_string(),
            }
        });
        if changed {
            (out.into_owned(), true)
        } else {
            (text.to_string(), false)
        }
    }

    /// Resolves one specifier against the alias table, or `None` when no
    /// pattern matches a real source file.
    pub fn resolve_specifier(&self, spec: &str, importer_out_path: &str) -> Option<String> {
        if spec.starts_with('.') || spec.starts_with('/') {
            return None;
        }
        // Longest matched prefix wins, matching the host's precedence.
        let mut best: Option<(usize, &AliasPattern, &str)> = None;
        for pattern in &self.patterns {
            if pattern.has_star {
                if spec.starts_with(&pattern.prefix)
                    && spec.ends_with(&pattern.suffix)
                    && spec.len() >= pattern.prefix.len() + pattern.suffix.len()
                {
                    let captured = &spec[pattern.prefix.len()..spec.len() - pattern.suffix.len()];
                    let score = pattern.prefix.len() + 1;
                    if best.as_ref().map(|(s, _, _)| score > *s).unwrap_or(true) {
                        best = Some((score, pattern, captured));
                    }
                }
            } else if spec == pattern.prefix {
                let score = usize::MAX;
                if best.as_ref().map(|(s, _, _)| score > *s).unwrap_or(true) {
                    best = Some((score, pattern, ""));
                }
            }
        }
        let (_, pattern, captured) = best?;

        for target in &pattern.targets {
            let substituted = target.replace('*', captured);
            let candidate = join(&self.base_url, &substituted);
            if let Some(source) = self.probe_source(&candidate) {
                let out = self.source_to_output(&source)?;
                return Some(relative_specifier(importer_out_path, &out));
            }
        }
        None
    }

    /// Finds the real source file a resolved target denotes.
    fn probe_source(&self, candidate: &str) -> Option<String> {
        if candidate.ends_with(".ts") || candidate.ends_with(".tsx") {
            if (self.exists)(candidate) {
                return Some(candidate.to_string());
            }
            return None;
        }
        for ext in [".ts", ".tsx"] {
            let with_ext = format!("{}{}", candidate, ext);
            if (self.exists)(&with_ext) {
                return Some(with_ext);
            }
        }
        let index = format!("{}/index.ts", candidate);
        if (self.exists)(&index) {
            return Some(index);
        }
        None
    }

    /// Maps a source path under `rootDir` into the output tree with a `.js`
    /// extension.
    fn source_to_output(&self, source: &str) -> Option<String> {
        let rel = source
            .strip_prefix(&self.root_dir)
            .map(|r| r.trim_start_matches('/'))?;
        let rel = rel
            .strip_suffix(".tsx")
            .or_else(|| rel.strip_suffix(".ts"))
            .map(|r| format!("{}.js", r))
            .unwrap_or_else(|| rel.to_string());
        Some(join(&self.out_dir, &rel))
    }
}

fn trim_slash(p: &str) -> String {
    p.trim_end_matches('/').to_string()
}

fn join(base: &str, rel: &str) -> String {
    if base.is_empty() {
        rel.to_string()
    } else {
        format!("{}/{}", base, rel.trim_start_matches('/'))
    }
}

/// A relative module specifier from the importer's directory to `target`,
/// always starting with `./` or `../`.
pub fn relative_specifier(importer: &str, target: &str) -> String {
    let from_dir: Vec<&str> = match importer.rfind('/') {
        Some(i) => importer[..i].split('/').filter(|s| !s.is_empty()).collect(),
        None => Vec::new(),
    };
    let to: Vec<&str> = target.split('/').filter(|s| !s.is_empty()).collect();
    let mut common = 0;
    while common < from_dir.len() && common < to.len() && from_dir[common] == to[common] {
        common += 1;
    }
    let mut parts: Vec<String> = Vec::new();
    for _ in common..from_dir.len() {
        parts.push("..".to_string());
    }
    for seg in &to[common..] {
        parts.push(seg.to_string());
    }
    let joined = parts.join("/");
    if joined.starts_with("..") {
        joined
    } else {
        format!("./{}", joined)
    }
}
