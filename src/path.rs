//! Trace-path derivation and filesystem layout (C5, `spec.md` §4.5).

use crate::error::SinkError;
use crate::ir::TraceIr;
use std::path::{Path, PathBuf};

/// Replace a path segment equal to `.` with `_`, `..` with `__`; strip
/// trailing separators; substitute `"trace"` if the result is empty.
///
/// Idempotent (`spec.md` §8 I5): sanitizing an already-sanitized path is a
/// no-op, since no output segment is ever itself `.` or `..` or empty.
pub fn sanitize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    let segments: Vec<String> = trimmed
        .split('/')
        .filter(|seg| !seg.is_empty())
        .map(|seg| match seg {
            "." => "_".to_string(),
            ".." => "__".to_string(),
            other => other.to_string(),
        })
        .collect();
    let joined = segments.join("/");
    if joined.is_empty() {
        "trace".to_string()
    } else {
        joined
    }
}

fn is_valid_iso8601(s: &str) -> bool {
    chrono::DateTime::parse_from_rfc3339(s).is_ok()
}

/// Recognizes a tracer_major/tracer_minor pair eligible for the structured
/// LTTng layout: major >= 3, or major == 2 and minor >= 11.
fn tracer_version_supports_layout(major: i64, minor: i64) -> bool {
    major >= 3 || (major == 2 && minor >= 11)
}

/// Builds the relative (pre-sanitization) path per `spec.md` §4.5 step 2,
/// inspecting the upstream trace's LTTng-convention environment values.
/// Returns `None` when any required field is missing or fails validation,
/// signaling the caller to fall back per step 2's last bullet.
fn derive_lttng_relative_path(trace: &TraceIr) -> Option<String> {
    let tracer_name = trace.env_str("tracer_name")?;
    if tracer_name != "lttng-ust" && tracer_name != "lttng-modules" {
        return None;
    }
    let tracer_major = trace.env_int("tracer_major")?;
    let tracer_minor = trace.env_int("tracer_minor")?;
    if !tracer_version_supports_layout(tracer_major, tracer_minor) {
        return None;
    }

    let hostname = trace.env_str("hostname")?;
    let trace_name = trace.env_str("trace_name")?;
    let trace_creation_datetime = trace.env_str("trace_creation_datetime")?;
    if !is_valid_iso8601(trace_creation_datetime) {
        return None;
    }
    let domain = trace.env_str("domain")?;

    let mut path = format!("{hostname}/{trace_name}-{trace_creation_datetime}/{domain}");

    match domain {
        "ust" => {
            let scheme = trace.env_str("tracer_buffering_scheme")?;
            path.push('/');
            path.push_str(scheme);
            match scheme {
                "uid" => {
                    let buffering_id = trace.env_int("tracer_buffering_id")?;
                    let arch_bits = trace.env_int("architecture_bit_width")?;
                    path.push_str(&format!("/{buffering_id}/{arch_bits}-bit"));
                }
                "pid" => {
                    let procname = trace.env_str("procname")?;
                    let vpid = trace.env_int("vpid")?;
                    let vpid_datetime = trace.env_str("vpid_datetime")?;
                    if !is_valid_iso8601(vpid_datetime) {
                        return None;
                    }
                    path.push_str(&format!("/{procname}-{vpid}-{vpid_datetime}"));
                }
                _ => {}
            }
        }
        "kernel" => {
            // No further domain-specific suffix (SPEC_FULL.md §4.5 supplement).
        }
        _ => return None,
    }

    Some(path)
}

/// Step 2 of `spec.md` §4.5: build the relative path, falling back to the
/// trace name and then the literal `"trace"`.
fn relative_path_for_trace(trace: &TraceIr) -> String {
    if let Some(p) = derive_lttng_relative_path(trace) {
        return p;
    }
    if let Some(name) = trace.name.as_deref() {
        return name.to_string();
    }
    "trace".to_string()
}

/// Step 4: if `{base}/{sanitized}` exists, try `-0`, `-1`, … until free.
fn uniquify(base: &Path, sanitized: &str) -> PathBuf {
    let candidate = base.join(sanitized);
    if !candidate.exists() {
        return candidate;
    }
    let mut n: u64 = 0;
    loop {
        let candidate = base.join(format!("{sanitized}-{n}"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Produces the final directory path for a trace and creates it (mode
/// 0755, parents included). `spec.md` §8 I6: the returned path did not
/// exist immediately before the call returned.
pub fn make_trace_path(
    base: &Path,
    trace: &TraceIr,
    assume_single_trace: bool,
) -> Result<PathBuf, SinkError> {
    let path = if assume_single_trace {
        base.to_path_buf()
    } else {
        let relative = relative_path_for_trace(trace);
        let sanitized = sanitize(&relative);
        uniquify(base, &sanitized)
    };

    create_dir_mode_0755(&path)?;
    Ok(path)
}

#[cfg(unix)]
fn create_dir_mode_0755(path: &Path) -> Result<(), SinkError> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o755)
        .create(path)
        .map_err(SinkError::from)
}

#[cfg(not(unix))]
fn create_dir_mode_0755(path: &Path) -> Result<(), SinkError> {
    std::fs::create_dir_all(path).map_err(SinkError::from)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::{EnvValue, TraceHandle};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn trace_with_env(entries: &[(&str, EnvValue)]) -> TraceIr {
        let mut env = BTreeMap::new();
        for (k, v) in entries {
            env.insert(k.to_string(), v.clone());
        }
        TraceIr {
            handle: TraceHandle(0),
            name: None,
            uuid: None,
            env,
            stream_classes: vec![],
        }
    }

    #[test]
    fn sanitize_dot_and_dotdot_segments() {
        assert_eq!(sanitize("./a/../b/.//c/"), "_/a/__/b/_/c");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let inputs = ["./a/../b/.//c/", "plain/path", "", "."];
        for input in inputs {
            let once = sanitize(input);
            let twice = sanitize(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn sanitize_empty_becomes_trace() {
        assert_eq!(sanitize(""), "trace");
        assert_eq!(sanitize("///"), "trace");
    }

    #[test]
    fn lttng_uid_buffering_path() {
        let trace = trace_with_env(&[
            ("tracer_name", EnvValue::String("lttng-ust".into())),
            ("tracer_major", EnvValue::Integer(2)),
            ("tracer_minor", EnvValue::Integer(13)),
            ("hostname", EnvValue::String("host".into())),
            ("trace_name", EnvValue::String("app".into())),
            (
                "trace_creation_datetime",
                EnvValue::String("2023-01-02T03:04:05+00:00".into()),
            ),
            ("domain", EnvValue::String("ust".into())),
            ("tracer_buffering_scheme", EnvValue::String("uid".into())),
            ("tracer_buffering_id", EnvValue::Integer(0)),
            ("architecture_bit_width", EnvValue::Integer(64)),
        ]);
        let relative = relative_path_for_trace(&trace);
        assert_eq!(relative, "host/app-2023-01-02T03:04:05+00:00/ust/uid/0/64-bit");
    }

    #[test]
    fn unsupported_tracer_version_falls_back() {
        let trace = trace_with_env(&[
            ("tracer_name", EnvValue::String("lttng-ust".into())),
            ("tracer_major", EnvValue::Integer(2)),
            ("tracer_minor", EnvValue::Integer(10)),
        ]);
        assert!(derive_lttng_relative_path(&trace).is_none());
    }

    #[test]
    fn kernel_domain_has_no_suffix() {
        let trace = trace_with_env(&[
            ("tracer_name", EnvValue::String("lttng-modules".into())),
            ("tracer_major", EnvValue::Integer(2)),
            ("tracer_minor", EnvValue::Integer(11)),
            ("hostname", EnvValue::String("host".into())),
            ("trace_name", EnvValue::String("app".into())),
            (
                "trace_creation_datetime",
                EnvValue::String("2023-01-02T03:04:05+00:00".into()),
            ),
            ("domain", EnvValue::String("kernel".into())),
        ]);
        let relative = relative_path_for_trace(&trace);
        assert_eq!(relative, "host/app-2023-01-02T03:04:05+00:00/kernel");
    }

    #[test]
    fn missing_env_falls_back_to_trace_name() {
        let mut trace = trace_with_env(&[]);
        trace.name = Some("fallback-name".to_string());
        assert_eq!(relative_path_for_trace(&trace), "fallback-name");
    }

    #[test]
    fn missing_env_and_name_falls_back_to_trace_literal() {
        let trace = trace_with_env(&[]);
        assert_eq!(relative_path_for_trace(&trace), "trace");
    }

    #[test]
    fn uniquify_avoids_existing_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("app")).unwrap();
        std::fs::create_dir(dir.path().join("app-0")).unwrap();
        let candidate = uniquify(dir.path(), "app");
        assert_eq!(candidate, dir.path().join("app-1"));
    }
}
