// Path composition
//
// Effective route path: global-prefix / version-prefix / controller-base /
// method-suffix, with duplicate separators collapsed.

/// Joins path segments, collapsing duplicate `/` and guaranteeing a single
/// leading slash.
pub fn compose_path(segments: &[&str]) -> String {
    let mut out = String::from("/");
    for segment in segments {
        for part in segment.split('/') {
            if part.is_empty() {
                continue;
            }
            if !out.ends_with('/') {
                out.push('/');
            }
            out.push_str(part);
        }
    }
    out
}
