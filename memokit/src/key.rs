//! Cache key derivation
//!
//! The default key is `memo-{name}-{args}`, where `name` is the registered
//! name of the computation (or its inferred type name) and `args` is the
//! JSON serialization of the argument tuple. Any `Fn(&KeyRequest) -> String`
//! can replace it through the configuration.

use crate::cache::CacheKey;
use crate::engine::Convention;
use crate::error::Result;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Everything a key deriver may look at
#[derive(Debug, Clone, Copy)]
pub struct KeyRequest<'a> {
    /// Name registered through the configuration
    pub name: Option<&'a str>,

    /// Name inferred from the computation's type
    pub fn_name: &'a str,

    /// Serialized argument list
    pub args: &'a Value,

    pub convention: Convention,
}

impl<'a> KeyRequest<'a> {
    /// Registered name if set and non-empty, otherwise the inferred one
    pub fn display_name(&self) -> &'a str {
        match self.name {
            Some(name) if !name.is_empty() => name,
            _ => self.fn_name,
        }
    }
}

/// Shared key derivation function
pub type KeyDeriver = Arc<dyn Fn(&KeyRequest<'_>) -> CacheKey + Send + Sync>;

/// `memo-{name}-{json(args)}`
pub fn default_key(request: &KeyRequest<'_>) -> CacheKey {
    format!("memo-{}-{}", request.display_name(), request.args)
}

pub fn default_deriver() -> KeyDeriver {
    Arc::new(default_key)
}

/// Serialize an argument list into its structural key form
pub fn serialize_args<A: Serialize + ?Sized>(args: &A) -> Result<Value> {
    Ok(serde_json::to_value(args)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request<'a>(name: Option<&'a str>, args: &'a Value) -> KeyRequest<'a> {
        KeyRequest {
            name,
            fn_name: "add",
            args,
            convention: Convention::Sync,
        }
    }

    #[test]
    fn test_default_key_format() {
        let args = serialize_args(&(20, 3)).unwrap();
        assert_eq!(default_key(&request(None, &args)), "memo-add-[20,3]");
    }

    #[test]
    fn test_registered_name_wins() {
        let args = serialize_args(&(20, 3)).unwrap();
        assert_eq!(default_key(&request(Some("MMMM"), &args)), "memo-MMMM-[20,3]");
        assert_eq!(default_key(&request(Some(""), &args)), "memo-add-[20,3]");
    }

    #[test]
    fn test_argument_order_matters() {
        let a = serialize_args(&(1, 2)).unwrap();
        let b = serialize_args(&(2, 1)).unwrap();
        assert_ne!(default_key(&request(None, &a)), default_key(&request(None, &b)));
    }

    #[test]
    fn test_structural_arguments() {
        let args = serialize_args(&(json!({"id": 7}), vec!["a", "b"])).unwrap();
        assert_eq!(
            default_key(&request(None, &args)),
            r#"memo-add-[{"id":7},["a","b"]]"#
        );
    }

    #[test]
    fn test_unit_arguments() {
        let args = serialize_args(&()).unwrap();
        assert_eq!(default_key(&request(None, &args)), "memo-add-null");
    }

    #[test]
    fn test_unserializable_arguments() {
        use std::collections::HashMap;

        let mut bad = HashMap::new();
        bad.insert((1, 2), "tuple keys are not JSON object keys");
        let err = serialize_args(&bad).unwrap_err();
        assert!(matches!(err, crate::error::MemoError::Serialization(_)));
    }
}
