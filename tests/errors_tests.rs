use safelink::errors::{Result, SafelinkError};
use std::error::Error;

#[cfg(test)]
mod error_creation_tests {
    use super::*;

    #[test]
    fn test_persistence_error() {
        let error = SafelinkError::persistence("disk full");

        assert!(matches!(error, SafelinkError::Persistence(_)));
        assert_eq!(error.code(), "E001");
        assert!(error.to_string().contains("Persistence Error"));
        assert!(error.to_string().contains("disk full"));
    }

    #[test]
    fn test_classification_error() {
        let error = SafelinkError::classification("timeout");

        assert!(matches!(error, SafelinkError::Classification(_)));
        assert_eq!(error.code(), "E003");
        assert_eq!(error.message(), "timeout");
    }

    #[test]
    fn test_code_space_exhausted_error() {
        let error = SafelinkError::code_space_exhausted("no codes left");
        assert_eq!(error.code(), "E006");
        assert_eq!(error.error_type(), "Code Space Exhausted");
    }

    #[test]
    fn test_codes_are_unique() {
        let errors = [
            SafelinkError::persistence(""),
            SafelinkError::recovery_read(""),
            SafelinkError::classification(""),
            SafelinkError::job(""),
            SafelinkError::validation(""),
            SafelinkError::code_space_exhausted(""),
            SafelinkError::config(""),
            SafelinkError::file_operation(""),
            SafelinkError::serialization(""),
        ];
        let mut codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }
}

#[cfg(test)]
mod error_conversion_tests {
    use super::*;

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let error: SafelinkError = io.into();
        assert!(matches!(error, SafelinkError::FileOperation(_)));
        assert!(error.message().contains("missing"));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error: SafelinkError = json_err.into();
        assert!(matches!(error, SafelinkError::Serialization(_)));
    }

    #[test]
    fn test_from_url_parse_error() {
        let parse_err = url::Url::parse("no scheme").unwrap_err();
        let error: SafelinkError = parse_err.into();
        assert!(matches!(error, SafelinkError::Validation(_)));
    }

    #[test]
    fn test_question_mark_propagation() {
        fn read_missing() -> Result<String> {
            Ok(std::fs::read_to_string("/definitely/missing/safelink/file")?)
        }
        assert!(matches!(read_missing(), Err(SafelinkError::FileOperation(_))));
    }
}

#[cfg(test)]
mod error_format_tests {
    use super::*;

    #[test]
    fn test_format_simple() {
        let error = SafelinkError::job("revalidation failed");
        assert_eq!(error.format_simple(), "Job Error: revalidation failed");
    }

    #[test]
    fn test_format_colored_contains_code() {
        let error = SafelinkError::validation("bad url");
        let out = error.format_colored();
        assert!(out.contains("E005"));
        assert!(out.contains("bad url"));
    }

    #[test]
    fn test_is_std_error() {
        let error = SafelinkError::config("broken");
        assert!(error.source().is_none());
        let boxed: Box<dyn Error + Send + Sync> = Box::new(error);
        assert!(boxed.to_string().contains("broken"));
    }

    #[test]
    fn test_into_anyhow() {
        let error: anyhow::Error = SafelinkError::persistence("io").into();
        assert!(error.to_string().contains("io"));
    }
}
