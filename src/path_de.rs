use serde::de::DeserializeOwned;
use thiserror::Error;

/// A deserialization failure, with the path of the offending key.
#[derive(Debug, Error)]
#[error("at path {path} → {message}")]
pub struct PathError {
    pub path: String,
    pub message: String,
}

/// Deserialize JSON with path context in error messages.
pub fn from_json_str<T: DeserializeOwned>(src: &str) -> Result<T, PathError> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| PathError {
        path: err.path().to_string(),
        message: err.into_inner().to_string(),
    })
}

/// Deserialize YAML with path context in error messages.
pub fn from_yaml_str<T: DeserializeOwned>(src: &str) -> Result<T, PathError> {
    let de = serde_yaml::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| PathError {
        path: err.path().to_string(),
        message: err.into_inner().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Outer {
        targets: Vec<Inner>,
    }

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Inner {
        renderer: String,
    }

    #[test]
    fn json_errors_name_the_failing_key() {
        let err = from_json_str::<Outer>(r#"{"targets": [{"renderer": "go"}, {"renderer": 3}]}"#).unwrap_err();
        assert_eq!(err.path, "targets[1].renderer");
    }

    #[test]
    fn yaml_errors_name_the_failing_key() {
        let err = from_yaml_str::<Outer>("targets:\n  - renderer: [1]\n").unwrap_err();
        assert_eq!(err.path, "targets[0].renderer");
    }
}
