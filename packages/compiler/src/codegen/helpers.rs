//! The single shared helpers module emitted once per output root.
//!
//! Every companion imports from this file through a relative specifier, so
//! it must stay dependency-free and stable across builds.

pub const HELPERS_FILE_NAME: &str = "__helpers.js";

pub const HELPERS_JS: &str = r#"// Generated by tsnest. Shared companion helpers.
export class ValidationError extends Error {
  constructor(typeName, errors) {
    super(
      "validation failed for " + typeName + " (" + errors.length +
      " error" + (errors.length === 1 ? "" : "s") + ")"
    );
    this.name = "ValidationError";
    this.typeName = typeName;
    this.errors = errors;
  }
}

export function __t(v) {
  return v === null ? "null" : Array.isArray(v) ? "array" : typeof v;
}

export function __s(v) {
  return JSON.stringify(v);
}

export function __n(v) {
  return Number.isFinite(v) ? String(v) : "null";
}

export function __j(v) {
  const s = JSON.stringify(v);
  return s === undefined ? "null" : s;
}

export function __repr(v) {
  const s = typeof v === "string" ? JSON.stringify(v) : String(v);
  return s.length > 80 ? s.slice(0, 77) + "..." : s;
}

export function __uniq(a) {
  const seen = new Set();
  for (const x of a) {
    const k = typeof x === "object" && x !== null ? JSON.stringify(x) : typeof x + ":" + String(x);
    if (seen.has(k)) return false;
    seen.add(k);
  }
  return true;
}

export const __re = {
  email: /^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$/,
  uuid: /^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$/,
  url: /^https?:\/\/\S+$/,
  "date-time": /^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:\d{2})$/,
  date: /^\d{4}-\d{2}-\d{2}$/,
  time: /^\d{2}:\d{2}:\d{2}(?:\.\d+)?$/,
  ipv4: /^(?:(?:25[0-5]|2[0-4]\d|1?\d?\d)\.){3}(?:25[0-5]|2[0-4]\d|1?\d?\d)$/,
  ipv6: /^[0-9a-fA-F:]+$/,
  jwt: /^[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]*$/,
  ulid: /^[0-9A-HJKMNP-TV-Z]{26}$/,
  cuid: /^c[a-z0-9]{8,}$/,
  nanoid: /^[A-Za-z0-9_-]{21}$/,
  "hex-color": /^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$/,
  base64: /^(?:[A-Za-z0-9+/]{4})*(?:[A-Za-z0-9+/]{2}==|[A-Za-z0-9+/]{3}=)?$/,
  semver: /^\d+\.\d+\.\d+(?:-[0-9A-Za-z.-]+)?(?:\+[0-9A-Za-z.-]+)?$/,
  phone: /^\+?[0-9 ()-]{7,}$/,
  lowercase: /^[^A-Z]*$/,
  uppercase: /^[^a-z]*$/,
};
"#;

/// JS accessor for a format's regex in the `__re` table.
pub(crate) fn format_regex_access(keyword: &str) -> String {
    if keyword.contains('-') {
        format!("__re[\"{}\"]", keyword)
    } else {
        format!("__re.{}", keyword)
    }
}
