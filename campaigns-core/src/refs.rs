//! Git ref name helpers.
//!
//! Branch names arrive both abbreviated (`run-gofmt`, from specs) and fully
//! qualified (`refs/heads/run-gofmt`, from code hosts). Compare them only
//! after passing both through [`ensure_ref_prefix`].

const HEADS_PREFIX: &str = "refs/heads/";

/// Qualify `name` with `refs/heads/` unless it is already a full ref.
pub fn ensure_ref_prefix(name: &str) -> String {
    if name.starts_with("refs/") {
        name.to_string()
    } else {
        format!("{HEADS_PREFIX}{name}")
    }
}

/// Strip a leading `refs/heads/` for display.
pub fn abbreviate_ref(name: &str) -> &str {
    name.strip_prefix(HEADS_PREFIX).unwrap_or(name)
}
