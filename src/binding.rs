mod finite;

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

use crate::error::PartiqlDbError;
use crate::types::{AttributeValue, RowValues, marshal_row_value};

/// Providers may hand back other providers; resolution stops after this many hops.
const MAX_PROVIDER_DEPTH: usize = 32;

/// A value that knows how to turn itself into a driver value, e.g. a domain newtype.
///
/// ```rust
/// use std::sync::Arc;
/// use partiql_middleware::prelude::*;
///
/// #[derive(Debug)]
/// struct UserId(u32);
///
/// impl ValueProvider for UserId {
///     fn resolve(&self) -> Result<Param, PartiqlDbError> {
///         Ok(Param::from(format!("user-{}", self.0)))
///     }
/// }
///
/// let params = bind(&[Param::Provider(Arc::new(UserId(7)))])?;
/// assert_eq!(params, vec![AttributeValue::S("user-7".into())]);
/// # Ok::<(), PartiqlDbError>(())
/// ```
pub trait ValueProvider: fmt::Debug + Send + Sync {
    /// Produce the driver value to bind in place of `self`.
    ///
    /// # Errors
    /// Any error is reported as a binding error for the argument's position.
    fn resolve(&self) -> Result<Param, PartiqlDbError>;
}

/// One positional argument supplied by the caller.
#[derive(Debug, Clone)]
pub enum Param {
    /// Resolved once, then bound like whatever it resolves to.
    Provider(Arc<dyn ValueProvider>),
    /// Already in the backend's typed union; passed through unchanged.
    Attribute(AttributeValue),
    /// Native value marshaled structurally.
    Value(RowValues),
    /// Output of [`Param::from_serialize`]; a serialization failure surfaces from [`bind`].
    Serialized(Serialized),
}

/// A serialized caller value, or the reason it could not be serialized.
#[derive(Debug, Clone)]
pub struct Serialized(Result<JsonValue, String>);

impl Param {
    /// Build a parameter from anything serializable (structs, maps, vectors).
    ///
    /// Never fails here: a value serde cannot represent, or one holding a non-finite float,
    /// is reported by [`bind`] as a binding error at this argument's position.
    pub fn from_serialize<T: serde::Serialize + ?Sized>(value: &T) -> Self {
        let serialized = finite::check_finite(value).and_then(|()| {
            serde_json::to_value(value).map_err(|e| format!("serialization failed: {e}"))
        });
        Param::Serialized(Serialized(serialized))
    }
}

impl From<RowValues> for Param {
    fn from(value: RowValues) -> Self {
        Param::Value(value)
    }
}

impl From<AttributeValue> for Param {
    fn from(value: AttributeValue) -> Self {
        Param::Attribute(value)
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Param::Value(RowValues::Int(value))
    }
}

impl From<i32> for Param {
    fn from(value: i32) -> Self {
        Param::Value(RowValues::Int(i64::from(value)))
    }
}

impl From<f64> for Param {
    fn from(value: f64) -> Self {
        Param::Value(RowValues::Float(value))
    }
}

impl From<bool> for Param {
    fn from(value: bool) -> Self {
        Param::Value(RowValues::Bool(value))
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Value(RowValues::Text(value.to_owned()))
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::Value(RowValues::Text(value))
    }
}

impl From<Vec<u8>> for Param {
    fn from(value: Vec<u8>) -> Self {
        Param::Value(RowValues::Blob(value))
    }
}

impl From<NaiveDateTime> for Param {
    fn from(value: NaiveDateTime) -> Self {
        Param::Value(RowValues::Timestamp(value))
    }
}

impl From<JsonValue> for Param {
    fn from(value: JsonValue) -> Self {
        Param::Value(RowValues::JSON(value))
    }
}

impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(value: Option<T>) -> Self {
        value.map_or(Param::Value(RowValues::Null), Into::into)
    }
}

/// Map ordered caller values onto the backend's typed parameter list.
///
/// Binding stops at the first argument that cannot be converted; the error carries its
/// 1-based position.
///
/// # Errors
/// Returns [`PartiqlDbError::BindingError`] for the first unconvertible argument.
pub fn bind(params: &[Param]) -> Result<Vec<AttributeValue>, PartiqlDbError> {
    params
        .iter()
        .enumerate()
        .map(|(idx, param)| bind_one(param, idx + 1, 0))
        .collect()
}

fn bind_one(param: &Param, position: usize, depth: usize) -> Result<AttributeValue, PartiqlDbError> {
    match param {
        Param::Provider(provider) => {
            if depth >= MAX_PROVIDER_DEPTH {
                return Err(PartiqlDbError::binding(
                    position,
                    format!("value provider did not resolve within {MAX_PROVIDER_DEPTH} steps"),
                ));
            }
            let resolved = provider
                .resolve()
                .map_err(|err| PartiqlDbError::binding(position, err.to_string()))?;
            bind_one(&resolved, position, depth + 1)
        }
        Param::Attribute(value) => Ok(value.clone()),
        Param::Value(value) => {
            marshal_row_value(value).map_err(|reason| PartiqlDbError::binding(position, reason))
        }
        Param::Serialized(Serialized(Ok(json))) => Ok(AttributeValue::from_json(json)),
        Param::Serialized(Serialized(Err(reason))) => {
            Err(PartiqlDbError::binding(position, reason.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct Failing;

    impl ValueProvider for Failing {
        fn resolve(&self) -> Result<Param, PartiqlDbError> {
            Err(PartiqlDbError::NotSupported("no value".into()))
        }
    }

    #[derive(Debug)]
    struct Nested(usize);

    impl ValueProvider for Nested {
        fn resolve(&self) -> Result<Param, PartiqlDbError> {
            if self.0 == 0 {
                Ok(Param::from(99_i64))
            } else {
                Ok(Param::Provider(Arc::new(Nested(self.0 - 1))))
            }
        }
    }

    #[derive(Debug)]
    struct Forever;

    impl ValueProvider for Forever {
        fn resolve(&self) -> Result<Param, PartiqlDbError> {
            Ok(Param::Provider(Arc::new(Forever)))
        }
    }

    #[test]
    fn passes_native_attributes_through() {
        let ss = AttributeValue::Ss(vec!["a".into(), "b".into()]);
        assert_eq!(bind(&[Param::from(ss.clone())]).unwrap(), vec![ss]);
    }

    #[test]
    fn providers_resolve_recursively() {
        let bound = bind(&[Param::Provider(Arc::new(Nested(3)))]).unwrap();
        assert_eq!(bound, vec![AttributeValue::N("99".into())]);
    }

    #[test]
    fn first_failure_reports_its_position() {
        let params = [
            Param::from("ok"),
            Param::from(f64::INFINITY),
            Param::Provider(Arc::new(Failing)),
        ];
        match bind(&params) {
            Err(PartiqlDbError::BindingError { position, .. }) => assert_eq!(position, 2),
            other => panic!("unexpected {other:?}"),
        }
        match bind(&[Param::from(1_i64), Param::Provider(Arc::new(Failing))]) {
            Err(PartiqlDbError::BindingError { position, .. }) => assert_eq!(position, 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn endless_providers_are_cut_off() {
        assert!(matches!(
            bind(&[Param::Provider(Arc::new(Forever))]),
            Err(PartiqlDbError::BindingError { position: 1, .. })
        ));
    }

    #[test]
    fn serializable_values_marshal_structurally() {
        #[derive(serde::Serialize)]
        struct User {
            id: u32,
            tags: Vec<&'static str>,
        }
        let param = Param::from_serialize(&User { id: 1, tags: vec!["x"] });
        let bound = bind(&[param, Param::from(None::<i64>)]).unwrap();
        assert_eq!(
            bound[0],
            AttributeValue::from_json(&json!({"id": 1, "tags": ["x"]}))
        );
        assert_eq!(bound[1], AttributeValue::Null(true));
    }

    #[test]
    fn serialized_values_fail_at_their_position() {
        #[derive(serde::Serialize)]
        struct Score {
            score: f64,
        }
        let params = [
            Param::from("ok"),
            Param::from_serialize(&Score { score: 0.5 }),
            Param::from_serialize(&Score { score: f64::NAN }),
        ];
        match bind(&params) {
            Err(PartiqlDbError::BindingError { position, reason }) => {
                assert_eq!(position, 3);
                assert!(reason.contains("non-finite"));
            }
            other => panic!("unexpected {other:?}"),
        }

        let bad_keys = std::collections::HashMap::from([((1, 2), "pair")]);
        assert!(matches!(
            bind(&[Param::from_serialize(&bad_keys)]),
            Err(PartiqlDbError::BindingError { position: 1, .. })
        ));
    }
}
