//! Error taxonomy for a backup run

use crate::cloudstack::ClientError;
use std::path::PathBuf;

/// Everything that can stop a backup run
///
/// All variants are fatal; nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    /// Missing or contradictory parameters, detected before any network call
    #[error("configuration error: {0}")]
    Config(String),

    /// No zone matched the selector
    #[error("zone {0} not found")]
    ZoneNotFound(String),

    /// More than one zone matched the selector
    #[error("zone {selector} is ambiguous: {count} zones match")]
    ZoneAmbiguous { selector: String, count: usize },

    /// Zone lookup itself failed
    #[error("zone lookup for {selector} failed: {source}")]
    ZoneLookup {
        selector: String,
        #[source]
        source: ClientError,
    },

    /// A fetcher's call to the management API failed
    #[error("fetcher \"{fetcher}\" failed: {source}")]
    Fetch {
        fetcher: String,
        #[source]
        source: ClientError,
    },

    /// Unknown format or serialization failure
    #[error("format error: {0}")]
    Format(String),

    /// The output destination could not be written
    #[error("cannot write \"{}\": {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BackupError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        1
    }

    /// Name of the fetcher that was running, if the error came from one
    pub fn fetcher(&self) -> Option<&str> {
        match self {
            Self::Fetch { fetcher, .. } => Some(fetcher),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_names_fetcher() {
        let err = BackupError::Fetch {
            fetcher: "clusters".to_string(),
            source: ClientError::Setup("boom".to_string()),
        };
        assert!(err.to_string().contains("\"clusters\""));
        assert_eq!(err.fetcher(), Some("clusters"));
    }

    #[test]
    fn test_every_error_exits_with_one() {
        let errors = [
            BackupError::Config("missing key".to_owned()),
            BackupError::ZoneNotFound("z1".to_owned()),
            BackupError::Format("no formatter named xml".to_owned()),
        ];
        for err in errors {
            assert_eq!(err.exit_code(), 1, "{err} should exit with 1");
        }
    }

    #[test]
    fn test_zone_not_found_message() {
        let err = BackupError::ZoneNotFound("lab".to_owned());
        assert_eq!(err.to_string(), "zone lab not found");
    }
}
