pub mod url_validator;

pub use url_validator::{NormalizedAddress, UrlValidationError, normalize_address, validate_url};
