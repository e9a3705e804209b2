use crate::error::SinkError;
use crate::opts::Opts;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// The target CTF metadata version, selecting between TSDL (C3) and
/// JSON-fragment (C4) emission.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum CtfVersion {
    V1,
    V2,
}

impl CtfVersion {
    /// The host message-interchange-protocol version this CTF version
    /// requires (§6: "CTF version 1 requires host MIP version 0; CTF
    /// version 2 requires host MIP version 1").
    pub fn required_mip(self) -> u64 {
        match self {
            CtfVersion::V1 => 0,
            CtfVersion::V2 => 1,
        }
    }
}

/// A generic parameter value, standing in for the plugin host's own
/// parameter-value tree (out of scope per `spec.md` §1).
#[derive(Clone, Debug)]
pub enum Param {
    Bool(bool),
    Str(String),
}

impl Param {
    fn as_bool(&self) -> Option<bool> {
        match self {
            Param::Bool(b) => Some(*b),
            Param::Str(_) => None,
        }
    }

    fn as_str(&self) -> Option<&str> {
        match self {
            Param::Str(s) => Some(s),
            Param::Bool(_) => None,
        }
    }
}

pub type Params = BTreeMap<String, Param>;

/// Resolved sink configuration (§6 "Configuration (recognized parameters)").
#[derive(Clone, Debug)]
pub struct SinkConfig {
    pub path: PathBuf,
    pub assume_single_trace: bool,
    pub ignore_discarded_events: bool,
    pub ignore_discarded_packets: bool,
    pub quiet: bool,
    pub ctf_version: CtfVersion,
}

/// Implements the three-way outcome called for in `spec.md` §9's open
/// question: absent -> v2, "1"/"1.8" -> v1, "2"/"2.0" -> v2, anything else
/// is a configuration error. Unlike the original's fall-through (which
/// treats "absent" and "no match" as the same branch), those two cases are
/// kept distinct here.
fn ctf_version_from_param(value: Option<&str>) -> Result<CtfVersion, SinkError> {
    match value {
        None => Ok(CtfVersion::V2),
        Some("1") | Some("1.8") => Ok(CtfVersion::V1),
        Some("2") | Some("2.0") => Ok(CtfVersion::V2),
        Some(other) => Err(SinkError::config(format!(
            "unrecognized ctf-version parameter value: {other:?}"
        ))),
    }
}

impl SinkConfig {
    pub fn from_params(params: &Params) -> Result<Self, SinkError> {
        let path = params
            .get("path")
            .and_then(Param::as_str)
            .ok_or_else(|| SinkError::config("missing required parameter: path"))?
            .into();

        let flag = |name: &str| -> Result<bool, SinkError> {
            match params.get(name) {
                None => Ok(false),
                Some(p) => p
                    .as_bool()
                    .ok_or_else(|| SinkError::config(format!("parameter {name} must be a bool"))),
            }
        };

        let ctf_version = ctf_version_from_param(
            params
                .get("ctf-version")
                .map(|p| {
                    p.as_str().ok_or_else(|| {
                        SinkError::config("parameter ctf-version must be a string".to_string())
                    })
                })
                .transpose()?,
        )?;

        Ok(SinkConfig {
            path,
            assume_single_trace: flag("assume-single-trace")?,
            ignore_discarded_events: flag("ignore-discarded-events")?,
            ignore_discarded_packets: flag("ignore-discarded-packets")?,
            quiet: flag("quiet")?,
            ctf_version,
        })
    }

    /// Validate the resolved CTF version against the host's MIP version,
    /// per §6's "any other combination is a configuration error".
    pub fn validate_mip(&self, host_mip: u64) -> Result<(), SinkError> {
        let required = self.ctf_version.required_mip();
        if required != host_mip {
            return Err(SinkError::config(format!(
                "ctf-version {:?} requires MIP version {required}, host is at MIP version {host_mip}",
                self.ctf_version
            )));
        }
        Ok(())
    }
}

impl From<Opts> for SinkConfig {
    fn from(opts: Opts) -> Self {
        let ctf_version = ctf_version_from_param(opts.ctf_version.as_deref())
            .unwrap_or(CtfVersion::V2);
        SinkConfig {
            path: opts.path,
            assume_single_trace: opts.assume_single_trace,
            ignore_discarded_events: opts.ignore_discarded_events,
            ignore_discarded_packets: opts.ignore_discarded_packets,
            quiet: opts.quiet,
            ctf_version,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn params_with(entries: &[(&str, Param)]) -> Params {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn ctf_version_absent_defaults_to_v2() {
        assert_eq!(ctf_version_from_param(None).unwrap(), CtfVersion::V2);
    }

    #[test]
    fn ctf_version_v1_aliases() {
        assert_eq!(ctf_version_from_param(Some("1")).unwrap(), CtfVersion::V1);
        assert_eq!(
            ctf_version_from_param(Some("1.8")).unwrap(),
            CtfVersion::V1
        );
    }

    #[test]
    fn ctf_version_v2_aliases() {
        assert_eq!(ctf_version_from_param(Some("2")).unwrap(), CtfVersion::V2);
        assert_eq!(
            ctf_version_from_param(Some("2.0")).unwrap(),
            CtfVersion::V2
        );
    }

    #[test]
    fn ctf_version_unrecognized_is_error() {
        assert!(ctf_version_from_param(Some("3")).is_err());
    }

    #[test]
    fn minimal_params_requires_path() {
        let params = params_with(&[]);
        assert!(SinkConfig::from_params(&params).is_err());
    }

    #[test]
    fn minimal_params_defaults() {
        let params = params_with(&[("path", Param::Str("/tmp/out".to_string()))]);
        let cfg = SinkConfig::from_params(&params).unwrap();
        assert_eq!(cfg.path, PathBuf::from("/tmp/out"));
        assert!(!cfg.assume_single_trace);
        assert_eq!(cfg.ctf_version, CtfVersion::V2);
    }

    #[test]
    fn mip_mismatch_is_config_error() {
        let params = params_with(&[
            ("path", Param::Str("/tmp/out".to_string())),
            ("ctf-version", Param::Str("1".to_string())),
        ]);
        let cfg = SinkConfig::from_params(&params).unwrap();
        assert!(cfg.validate_mip(1).is_err());
        assert!(cfg.validate_mip(0).is_ok());
    }
}
