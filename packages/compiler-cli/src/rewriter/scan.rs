// Lightweight scanning of emitted JavaScript.
//
// The rewriter operates on compiler-emitted text, which is regular enough
// (semicolons present, standard indentation) that string/comment-aware
// bracket matching is reliable. Nothing here parses JavaScript fully.

/// Byte offset right after the leading import region: the start of the
/// first line that is not blank, a comment, a directive prologue, or part
/// of an import statement.
pub fn import_region_end(text: &str) -> usize {
    let mut offset = 0;
    let mut in_import = false;
    let mut in_block_comment = false;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim();
        let consume = if in_block_comment {
            if trimmed.contains("*/") {
                in_block_comment = false;
            }
            true
        } else if in_import {
            if trimmed.contains(';') {
                in_import = false;
            }
            true
        } else if trimmed.is_empty()
            || trimmed.starts_with("//")
            || trimmed.starts_with("\"use strict\"")
            || trimmed.starts_with("'use strict'")
        {
            true
        } else if trimmed.starts_with("/*") {
            if !trimmed.contains("*/") {
                in_block_comment = true;
            }
            true
        } else if trimmed.starts_with("import ") || trimmed.starts_with("import\"")
            || trimmed.starts_with("import'") || trimmed.starts_with("import{")
        {
            if !trimmed.contains(';') {
                in_import = true;
            }
            true
        } else {
            false
        };
        if !consume {
            break;
        }
        offset += line.len();
    }
    offset
}

/// Inserts lines at the end of the import region.
pub fn insert_after_imports(text: &str, lines: &[String]) -> String {
    if lines.is_empty() {
        return text.to_string();
    }
    let at = import_region_end(text);
    let mut out = String::with_capacity(text.len() + lines.iter().map(|l| l.len() + 1).sum::<usize>());
    out.push_str(&text[..at]);
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(&text[at..]);
    out
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Normal,
    SingleQuote,
    DoubleQuote,
    Template,
    LineComment,
    BlockComment,
}

/// A string/comment-aware scanner over JS text.
struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
    state: ScanState,
    /// Template-literal nesting for `${ ... }` expressions.
    template_stack: Vec<()>,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str, start: usize) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos: start,
            state: ScanState::Normal,
            template_stack: Vec::new(),
        }
    }

    /// Advances one byte, returning `Some(byte)` when the byte is in normal
    /// code (not inside a string or comment).
    fn next_code_byte(&mut self) -> Option<(usize, u8)> {
        while self.pos < self.bytes.len() {
            let i = self.pos;
            let b = self.bytes[i];
            self.pos += 1;
            match self.state {
                ScanState::Normal => match b {
                    b'\'' => self.state = ScanState::SingleQuote,
                    b'"' => self.state = ScanState::DoubleQuote,
                    b'`' => self.state = ScanState::Template,
                    b'/' if self.peek() == Some(b'/') => self.state = ScanState::LineComment,
                    b'/' if self.peek() == Some(b'*') => self.state = ScanState::BlockComment,
                    b'}' if !self.template_stack.is_empty() => {
                        // Close of a `${` expression resumes the template.
                        self.template_stack.pop();
                        self.state = ScanState::Template;
                    }
                    _ => return Some((i, b)),
                },
                ScanState::SingleQuote => match b {
                    b'\\' => self.pos += 1,
                    b'\'' | b'\n' => self.state = ScanState::Normal,
                    _ => {}
                },
                ScanState::DoubleQuote => match b {
                    b'\\' => self.pos += 1,
                    b'"' | b'\n' => self.state = ScanState::Normal,
                    _ => {}
                },
                ScanState::Template => match b {
                    b'\\' => self.pos += 1,
                    b'`' => self.state = ScanState::Normal,
                    b'$' if self.peek() == Some(b'{') => {
                        self.pos += 1;
                        self.template_stack.push(());
                        self.state = ScanState::Normal;
                    }
                    _ => {}
                },
                ScanState::LineComment => {
                    if b == b'\n' {
                        self.state = ScanState::Normal;
                    }
                }
                ScanState::BlockComment => {
                    if b == b'*' && self.peek() == Some(b'/') {
                        self.pos += 1;
                        self.state = ScanState::Normal;
                    }
                }
            }
        }
        None
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }
}

/// Offset just past the `}` matching the `{` at `open`, ignoring brackets
/// inside strings and comments.
pub fn matching_brace_end(text: &str, open: usize) -> Option<usize> {
    let mut scanner = Scanner::new(text, open);
    let mut depth = 0usize;
    while let Some((i, b)) = scanner.next_code_byte() {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Offset just past the `)` matching the `(` at `open`.
pub fn matching_paren_end(text: &str, open: usize) -> Option<usize> {
    let mut scanner = Scanner::new(text, open);
    let mut depth = 0usize;
    while let Some((i, b)) = scanner.next_code_byte() {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// A `return <expr>;` statement belonging to the method itself (not to a
/// nested function).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnStmt {
    /// Offset of the `return` keyword.
    pub start: usize,
    /// Expression range, exclusive of the terminating `;`.
    pub expr_start: usize,
    pub expr_end: usize,
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// Finds the method's own `return` statements within `body`, skipping
/// returns of nested function expressions and arrow bodies.
pub fn method_returns(text: &str, body_start: usize, body_end: usize) -> Vec<ReturnStmt> {
    let bytes = text.as_bytes();
    let mut scanner = Scanner::new(text, body_start);
    let mut out = Vec::new();
    let mut fn_stack: Vec<bool> = Vec::new();
    // `function` keyword survives the name and parameter list; an arrow only
    // opens a function body when `{` is the next non-whitespace token.
    let mut pending_fn_kw = false;
    let mut pending_arrow = false;
    let mut last_word: Vec<u8> = Vec::new();

    while let Some((i, b)) = scanner.next_code_byte() {
        if i >= body_end {
            break;
        }
        if pending_arrow {
            if b == b'{' {
                fn_stack.push(true);
                pending_arrow = false;
                last_word.clear();
                continue;
            }
            if b != b'>' && !(b as char).is_whitespace() {
                pending_arrow = false;
            }
        }
        if is_ident_byte(b) {
            last_word.push(b);
            continue;
        }
        let word = std::mem::take(&mut last_word);
        if word == b"function" {
            pending_fn_kw = true;
        }
        match b {
            b'=' if scanner.peek() == Some(b'>') => {
                pending_arrow = true;
            }
            b'{' => {
                fn_stack.push(pending_fn_kw);
                pending_fn_kw = false;
            }
            b'}' => {
                if fn_stack.pop().is_none() {
                    break;
                }
            }
            _ => {
                if word == b"return" && !fn_stack.iter().any(|f| *f) {
                    let kw_start = i - word.len();
                    let mut expr_start = i;
                    while expr_start < body_end
                        && (bytes[expr_start] == b' ' || bytes[expr_start] == b'\t')
                    {
                        expr_start += 1;
                    }
                    if bytes.get(expr_start) == Some(&b';') || bytes.get(expr_start) == Some(&b'\n')
                    {
                        continue;
                    }
                    let mut inner = Scanner::new(text, expr_start);
                    let mut depth = 0usize;
                    let mut expr_end = body_end;
                    while let Some((j, c)) = inner.next_code_byte() {
                        match c {
                            b'(' | b'[' | b'{' => depth += 1,
                            b')' | b']' | b'}' => {
                                if depth == 0 {
                                    expr_end = j;
                                    break;
                                }
                                depth -= 1;
                            }
                            b';' if depth == 0 => {
                                expr_end = j;
                                break;
                            }
                            _ => {}
                        }
                    }
                    out.push(ReturnStmt {
                        start: kw_start,
                        expr_start,
                        expr_end,
                    });
                    scanner = Scanner::new(text, expr_end);
                }
            }
        }
    }
    out
}

/// Locates a method inside a class body: returns `(signature start, offset
/// just past the opening brace, line indent)`.
pub fn find_method(
    text: &str,
    class_body: (usize, usize),
    method: &str,
) -> Option<(usize, usize, String)> {
    let (start, end) = class_body;
    let hay = &text[start..end];
    let bytes = hay.as_bytes();
    let mut search_from = 0;
    while let Some(found) = hay[search_from..].find(method) {
        let at = search_from + found;
        search_from = at + method.len();
        // Must be a whole identifier.
        if at > 0 && is_ident_byte(bytes[at - 1]) {
            continue;
        }
        let after = at + method.len();
        if after < bytes.len() && is_ident_byte(bytes[after]) {
            continue;
        }
        // Skip whitespace to `(`.
        let mut k = after;
        while k < bytes.len() && (bytes[k] as char).is_whitespace() {
            k += 1;
        }
        if bytes.get(k) != Some(&b'(') {
            continue;
        }
        let paren_end = matching_paren_end(text, start + k)?;
        let mut m = paren_end;
        let tb = text.as_bytes();
        while m < end && (tb[m] as char).is_whitespace() {
            m += 1;
        }
        if tb.get(m) != Some(&b'{') {
            continue;
        }
        // Indent of the line the signature starts on.
        let line_start = text[..start + at].rfind('\n').map(|p| p + 1).unwrap_or(0);
        let sig_start = start + at;
        let indent: String = text[line_start..]
            .chars()
            .take_while(|c| *c == ' ' || *c == '\t')
            .collect();
        return Some((sig_start, m + 1, indent));
    }
    None
}

/// Locates a class declaration's body: `(body start, body end)` offsets
/// just inside the braces, plus the offset past the closing brace.
pub fn find_class(text: &str, class_name: &str) -> Option<(usize, usize, usize)> {
    let needle = format!("class {}", class_name);
    let mut search_from = 0;
    while let Some(found) = text[search_from..].find(&needle) {
        let at = search_from + found;
        search_from = at + needle.len();
        let after = at + needle.len();
        let bytes = text.as_bytes();
        if after < bytes.len() && is_ident_byte(bytes[after]) {
            continue;
        }
        let open = match text[after..].find('{') {
            Some(o) => after + o,
            None => return None,
        };
        let close = matching_brace_end(text, open)?;
        return Some((open + 1, close - 1, close));
    }
    None
}

/// Nth (0-based) occurrence of `callee(` as a whole identifier in normal
/// code; returns `(callee start, open paren offset)`.
pub fn nth_call_site(text: &str, callee: &str, n: usize) -> Option<(usize, usize)> {
    let mut scanner = Scanner::new(text, 0);
    let mut last_word_start = 0usize;
    let mut last_word: Vec<u8> = Vec::new();
    let mut seen = 0usize;
    while let Some((i, b)) = scanner.next_code_byte() {
        if is_ident_byte(b) {
            if last_word.is_empty() {
                last_word_start = i;
            }
            last_word.push(b);
            continue;
        }
        let word = std::mem::take(&mut last_word);
        if b == b'(' && word == callee.as_bytes() {
            if seen == n {
                return Some((last_word_start, i));
            }
            seen += 1;
        }
    }
    None
}

/// Count of whole-identifier `callee(` occurrences in normal code.
pub fn call_site_count(text: &str, callee: &str) -> usize {
    let mut n = 0;
    while nth_call_site(text, callee, n).is_some() {
        n += 1;
    }
    n
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn import_region_ends_before_first_statement() {
        let text = "// header\nimport { a } from \"./a.js\";\nimport {\n  b,\n} from \"./b.js\";\n\nconst x = 1;\n";
        let end = import_region_end(text);
        assert!(text[end..].starts_with("const x"));
    }

    #[test]
    fn inserts_lines_after_imports() {
        let text = "import { a } from \"./a.js\";\nconst x = 1;\n";
        let out = insert_after_imports(text, &["import { b } from \"./b.js\";".to_string()]);
        assert_eq!(
            out,
            "import { a } from \"./a.js\";\nimport { b } from \"./b.js\";\nconst x = 1;\n"
        );
    }

    #[test]
    fn brace_matching_skips_strings_and_comments() {
        let text = "{ const s = \"}\"; // }\n /* } */ { } }";
        let end = matching_brace_end(text, 0).unwrap();
        assert_eq!(end, text.len());
    }

    #[test]
    fn finds_method_and_returns() {
        let text = "class UserController {\n  async findAll() {\n    const go = () => { return 1; };\n    if (x) {\n      return this.svc.all();\n    }\n    return [];\n  }\n}\n";
        let (_, body_end, _) = find_class(text, "UserController").unwrap();
        let (_, after_brace, indent) = find_method(text, (22, body_end), "findAll").unwrap();
        assert_eq!(indent, "  ");
        let body_close = matching_brace_end(text, after_brace - 1).unwrap();
        let returns = method_returns(text, after_brace, body_close - 1);
        assert_eq!(returns.len(), 2);
        let first = &returns[0];
        assert_eq!(&text[first.expr_start..first.expr_end], "this.svc.all()");
        let second = &returns[1];
        assert_eq!(&text[second.expr_start..second.expr_end], "[]");
    }

    #[test]
    fn nth_call_site_skips_strings() {
        let text = "const a = validate(x); const s = \"validate(\"; validate(y);";
        let (s0, _) = nth_call_site(text, "validate", 0).unwrap();
        assert_eq!(&text[s0..s0 + 8], "validate");
        let (s1, _) = nth_call_site(text, "validate", 1).unwrap();
        assert!(s1 > s0);
        assert_eq!(call_site_count(text, "validate"), 2);
        assert!(nth_call_site(text, "validate", 2).is_none());
    }
}
