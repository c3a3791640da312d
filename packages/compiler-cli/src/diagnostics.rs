// Diagnostics
//
// Gathering, dedup and reporting of host-compiler diagnostics, plus the
// exit-code policy.

use ts::{Diagnostic, DiagnosticCategory};

fn sort_key(d: &Diagnostic) -> (String, usize, i32, String) {
    (
        d.file.clone().unwrap_or_default(),
        d.start.unwrap_or(0),
        d.code,
        d.message.clone(),
    )
}

/// Sorts diagnostics into a stable order and drops duplicates reported by
/// more than one channel.
pub fn dedupe_diagnostics(mut diags: Vec<Diagnostic>) -> Vec<Diagnostic> {
    diags.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
    diags.dedup_by(|a, b| sort_key(a) == sort_key(b));
    diags
}

/// Line-oriented rendering, stable across runs.
pub fn format_diagnostics(diags: &[Diagnostic]) -> String {
    let mut out = String::new();
    for d in diags {
        out.push_str(&d.to_string());
        out.push('\n');
    }
    out
}

pub fn error_count(diags: &[Diagnostic]) -> usize {
    diags
        .iter()
        .filter(|d| d.category == DiagnosticCategory::Error)
        .count()
}

/// Exit policy: 0 on success, 1 on diagnostic errors with files still
/// emitted, 2 when the host skipped emission because of an errors gate.
pub fn exit_code(diags: &[Diagnostic], emit_skipped: bool) -> i32 {
    if error_count(diags) == 0 {
        0
    } else if emit_skipped {
        2
    } else {
        1
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dedupes_across_channels_and_sorts_by_position() {
        let diags = vec![
            Diagnostic::error_at("/b.ts", 10, "second"),
            Diagnostic::error_at("/a.ts", 5, "first"),
            Diagnostic::error_at("/b.ts", 10, "second"),
        ];
        let deduped = dedupe_diagnostics(diags);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].file.as_deref(), Some("/a.ts"));
    }

    #[test]
    fn exit_codes_follow_the_emit_gate() {
        let ok: Vec<Diagnostic> = vec![Diagnostic::warning("just a warning")];
        assert_eq!(exit_code(&ok, false), 0);

        let errs = vec![Diagnostic::error("boom")];
        assert_eq!(exit_code(&errs, false), 1);
        assert_eq!(exit_code(&errs, true), 2);
    }

    #[test]
    fn formatting_is_line_oriented() {
        let diags = vec![Diagnostic::error_at("/a.ts", 3, "bad")];
        let text = format_diagnostics(&diags);
        assert_eq!(text, "error TS-1: bad (/a.ts:3)\n");
    }
}
