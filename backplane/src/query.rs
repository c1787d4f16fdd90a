//! Fluent queries over an object collection.
//!
//! ```
//! use backplane::Query;
//!
//! let query = Query::new("user")
//!     .field("age")
//!     .is_greater_than(20)
//!     .is_less_than_or_equal_to(40)
//!     .field("friend")
//!     .is_in(&["joe", "bob", "alice"])
//!     .into_query();
//! ```
//!
//! The two styles are equivalent: `field("age").is_greater_than(20)` and
//! `field_is_greater_than("age", 20)` accumulate the same argument. A
//! query only ever operates on one field at a time; call `field` again to
//! move to the next one.

/// A comparison operator applied to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Strictly less than.
    LessThan,
    /// Strictly greater than.
    GreaterThan,
    /// Less than or equal to.
    LessThanOrEqualTo,
    /// Greater than or equal to.
    GreaterThanOrEqualTo,
    /// Member of a list of values.
    In,
}

impl Operator {
    /// The suffix appended to the field name in the argument key.
    pub fn key_suffix(&self) -> &'static str {
        match self {
            Operator::LessThan => "[lt]",
            Operator::GreaterThan => "[gt]",
            Operator::LessThanOrEqualTo => "[lte]",
            Operator::GreaterThanOrEqualTo => "[gte]",
            Operator::In => "[in]",
        }
    }
}

/// A query to execute against an object collection.
///
/// Accumulates `field[op] -> value` arguments in insertion order; adding
/// the same field/operator pair again replaces the previous value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    object_name: String,
    args: Vec<(String, String)>,
}

impl Query {
    /// Create a query over the given object collection.
    pub fn new(object_name: impl Into<String>) -> Self {
        Self {
            object_name: object_name.into(),
            args: Vec::new(),
        }
    }

    /// The object collection this query runs against.
    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    /// The accumulated arguments.
    pub fn arguments(&self) -> &[(String, String)] {
        &self.args
    }

    /// Start building constraints on the given field.
    pub fn field(self, field: impl Into<String>) -> FieldQuery {
        FieldQuery {
            field: field.into(),
            query: self,
        }
    }

    /// Constrain `field` to be a member of `values` (comma-joined).
    pub fn field_is_in<S: AsRef<str>>(self, field: &str, values: &[S]) -> Self {
        let joined = values
            .iter()
            .map(|v| v.as_ref())
            .collect::<Vec<_>>()
            .join(",");
        self.put(field, Operator::In, joined)
    }

    /// Constrain `field` to be strictly less than `value`.
    pub fn field_is_less_than(self, field: &str, value: impl ToString) -> Self {
        self.put(field, Operator::LessThan, value.to_string())
    }

    /// Constrain `field` to be less than or equal to `value`.
    pub fn field_is_less_than_or_equal_to(self, field: &str, value: impl ToString) -> Self {
        self.put(field, Operator::LessThanOrEqualTo, value.to_string())
    }

    /// Constrain `field` to be strictly greater than `value`.
    pub fn field_is_greater_than(self, field: &str, value: impl ToString) -> Self {
        self.put(field, Operator::GreaterThan, value.to_string())
    }

    /// Constrain `field` to be greater than or equal to `value`.
    pub fn field_is_greater_than_or_equal_to(self, field: &str, value: impl ToString) -> Self {
        self.put(field, Operator::GreaterThanOrEqualTo, value.to_string())
    }

    fn put(mut self, field: &str, operator: Operator, value: String) -> Self {
        let key = format!("{field}{}", operator.key_suffix());
        if let Some(entry) = self.args.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.args.push((key, value));
        }
        self
    }
}

/// A query builder focused on a single field.
///
/// Produced by [`Query::field`]; chain constraints, switch fields with
/// [`FieldQuery::field`], and finish with [`FieldQuery::into_query`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldQuery {
    field: String,
    query: Query,
}

impl FieldQuery {
    /// The field constraints currently apply to.
    pub fn field_name(&self) -> &str {
        &self.field
    }

    /// The query built so far.
    pub fn into_query(self) -> Query {
        self.query
    }

    /// Move to the given field. Naming the current field again is a no-op.
    pub fn field(self, field: &str) -> FieldQuery {
        if self.field == field {
            self
        } else {
            FieldQuery {
                field: field.to_string(),
                query: self.query,
            }
        }
    }

    /// Constrain the field to be a member of `values` (comma-joined).
    pub fn is_in<S: AsRef<str>>(self, values: &[S]) -> Self {
        self.apply(|query, field| query.field_is_in(field, values))
    }

    /// Constrain the field to be strictly less than `value`.
    pub fn is_less_than(self, value: impl ToString) -> Self {
        self.apply(|query, field| query.field_is_less_than(field, value))
    }

    /// Constrain the field to be less than or equal to `value`.
    pub fn is_less_than_or_equal_to(self, value: impl ToString) -> Self {
        self.apply(|query, field| query.field_is_less_than_or_equal_to(field, value))
    }

    /// Constrain the field to be strictly greater than `value`.
    pub fn is_greater_than(self, value: impl ToString) -> Self {
        self.apply(|query, field| query.field_is_greater_than(field, value))
    }

    /// Constrain the field to be greater than or equal to `value`.
    pub fn is_greater_than_or_equal_to(self, value: impl ToString) -> Self {
        self.apply(|query, field| query.field_is_greater_than_or_equal_to(field, value))
    }

    fn apply(self, f: impl FnOnce(Query, &str) -> Query) -> Self {
        let Self { field, query } = self;
        let query = f(query, &field);
        Self { field, query }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn args(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_chained_operators_on_one_field() {
        let query = Query::new("user")
            .field("age")
            .is_greater_than(20)
            .field("age")
            .is_less_than_or_equal_to(40)
            .into_query();

        assert_eq!(
            query.arguments(),
            args(&[("age[gt]", "20"), ("age[lte]", "40")])
        );
    }

    #[test]
    fn test_field_is_in_joins_values() {
        let query = Query::new("user").field_is_in("friend", &["a", "b", "c"]);
        assert_eq!(query.arguments(), args(&[("friend[in]", "a,b,c")]));
    }

    #[test]
    fn test_switching_fields() {
        let query = Query::new("user")
            .field("age")
            .is_greater_than_or_equal_to(21)
            .field("name")
            .is_less_than("m")
            .into_query();

        assert_eq!(
            query.arguments(),
            args(&[("age[gte]", "21"), ("name[lt]", "m")])
        );
    }

    #[test]
    fn test_same_field_name_returns_same_builder() {
        let builder = Query::new("user").field("age");
        let same = builder.clone().field("age");
        assert_eq!(builder, same);

        let other = builder.field("name");
        assert_eq!(other.field_name(), "name");
    }

    #[test]
    fn test_repeated_operator_replaces_value() {
        let query = Query::new("user")
            .field_is_greater_than("age", 20)
            .field_is_greater_than("age", 30);

        assert_eq!(query.arguments(), args(&[("age[gt]", "30")]));
    }

    #[test]
    fn test_fluent_and_direct_styles_agree() {
        let fluent = Query::new("user")
            .field("age")
            .is_greater_than(20)
            .is_less_than_or_equal_to(40)
            .into_query();
        let direct = Query::new("user")
            .field_is_greater_than("age", 20)
            .field_is_less_than_or_equal_to("age", 40);

        assert_eq!(fluent, direct);
    }
}
