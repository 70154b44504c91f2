use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifies which backend implementation answered an existence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    #[serde(rename = "s3")]
    S3,
    #[serde(rename = "kopia-fs")]
    KopiaFs,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::S3 => "s3",
            BackendKind::KopiaFs => "kopia-fs",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "s3" => Ok(BackendKind::S3),
            "kopia-fs" => Ok(BackendKind::KopiaFs),
            other => Err(format!("{} (must be 's3' or 'kopia-fs')", other)),
        }
    }
}

/// Outcome of a single backup existence check.
///
/// `namespace` and `pvc` echo the request unchanged. `error` is only set when
/// the backend could not answer, in which case `exists` is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub exists: bool,
    pub namespace: String,
    pub pvc: String,
    pub backend: BackendKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckResult {
    pub fn new(namespace: &str, pvc: &str, backend: BackendKind, exists: bool) -> Self {
        Self {
            exists,
            namespace: namespace.to_string(),
            pvc: pvc.to_string(),
            backend,
            error: None,
        }
    }

    pub fn failed(namespace: &str, pvc: &str, backend: BackendKind, error: impl Into<String>) -> Self {
        Self {
            exists: false,
            namespace: namespace.to_string(),
            pvc: pvc.to_string(),
            backend,
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.as_deref().is_some_and(|e| !e.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_tags() {
        assert_eq!(BackendKind::S3.to_string(), "s3");
        assert_eq!(BackendKind::KopiaFs.to_string(), "kopia-fs");
        assert_eq!("kopia-fs".parse::<BackendKind>(), Ok(BackendKind::KopiaFs));
        assert!("gcs".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_success_omits_error_field() {
        let result = CheckResult::new("karakeep", "data-pvc", BackendKind::S3, true);
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "exists": true,
                "namespace": "karakeep",
                "pvc": "data-pvc",
                "backend": "s3",
            })
        );
        assert!(!result.is_error());
    }

    #[test]
    fn test_failure_carries_error() {
        let result = CheckResult::failed("ns", "pvc", BackendKind::KopiaFs, "connection refused");
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["exists"], false);
        assert_eq!(json["backend"], "kopia-fs");
        assert_eq!(json["error"], "connection refused");
        assert!(result.is_error());
    }

    #[test]
    fn test_empty_error_is_not_an_error() {
        let mut result = CheckResult::new("ns", "pvc", BackendKind::S3, false);
        result.error = Some(String::new());
        assert!(!result.is_error());
    }
}
