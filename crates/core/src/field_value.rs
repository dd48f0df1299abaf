use serde::{Deserialize, Serialize};

/// A single column value as it travels between storage and the rest of the
/// workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b).is_eq(),
            _ => false,
        }
    }
}

impl Eq for FieldValue {}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Text rendering used by exports. `None` for null.
    pub fn render(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::Text(s) => Some(s.clone()),
            FieldValue::Integer(n) => Some(n.to_string()),
            FieldValue::Float(n) => Some(n.to_string()),
        }
    }
}

impl From<Option<f64>> for FieldValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(FieldValue::Null, FieldValue::Float)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_values() {
        assert_eq!(FieldValue::Null.render(), None);
        assert_eq!(FieldValue::Integer(7).render().as_deref(), Some("7"));
        assert_eq!(FieldValue::Float(40.5).render().as_deref(), Some("40.5"));
        assert_eq!(FieldValue::Float(100.0).render().as_deref(), Some("100"));
        assert_eq!(FieldValue::Text("Home".into()).render().as_deref(), Some("Home"));
    }

    #[test]
    fn optional_bounds_map_to_null() {
        assert!(FieldValue::from(None::<f64>).is_null());
        assert_eq!(FieldValue::from(Some(12.5)), FieldValue::Float(12.5));
    }
}
