use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! row_id {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            pub const fn get(&self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

row_id!(CourseId);
row_id!(PageId);
row_id!(ConditionId);
row_id!(GradeItemId);
row_id!(CourseModuleId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_order_by_value() {
        let mut ids = vec![PageId::new(3), PageId::new(1), PageId::new(2)];
        ids.sort();
        assert_eq!(ids, vec![PageId::new(1), PageId::new(2), PageId::new(3)]);
    }

    #[test]
    fn debug_and_display() {
        let id = GradeItemId::from(42);
        assert_eq!(format!("{id:?}"), "GradeItemId(42)");
        assert_eq!(id.to_string(), "42");
        assert_eq!(i64::from(id), 42);
    }
}
