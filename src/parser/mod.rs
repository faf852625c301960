pub mod descriptor;
pub mod response;

pub use descriptor::{extract_verify_command, normalize_content, parse_descriptor, parse_feature_id};
pub use response::{parse_response, validate_relative_path, ResponseError};
