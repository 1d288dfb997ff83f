use chrono::{DateTime, NaiveDate, Utc};
use shared::domain::{
    AlertSeverity, AlertType, BatchId, BatchStatus, CommandLogId, ProgressStatus, StationId,
    StationStatus,
};

/// A value that can be compared against or written into a stored field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
}

macro_rules! field_value_from {
    ($($ty:ty => |$v:ident| $body:expr),+ $(,)?) => {
        $(impl From<$ty> for FieldValue {
            fn from($v: $ty) -> Self {
                $body
            }
        })+
    };
}

field_value_from! {
    bool => |v| FieldValue::Bool(v),
    i64 => |v| FieldValue::Int(v),
    f64 => |v| FieldValue::Real(v),
    String => |v| FieldValue::Text(v),
    &str => |v| FieldValue::Text(v.to_string()),
    &String => |v| FieldValue::Text(v.clone()),
    DateTime<Utc> => |v| FieldValue::Timestamp(v),
    NaiveDate => |v| FieldValue::Date(v),
    BatchId => |v| FieldValue::Int(v.0),
    CommandLogId => |v| FieldValue::Int(v.0),
    StationId => |v| FieldValue::Text(v.as_str().to_string()),
    ProgressStatus => |v| FieldValue::Text(v.as_str().to_string()),
    StationStatus => |v| FieldValue::Text(v.as_str().to_string()),
    BatchStatus => |v| FieldValue::Text(v.as_str().to_string()),
    AlertType => |v| FieldValue::Text(v.as_str().to_string()),
    AlertSeverity => |v| FieldValue::Text(v.as_str().to_string()),
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(FieldValue),
    In(Vec<FieldValue>),
    Gte(FieldValue),
}

/// Conjunction of single-field conditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub conditions: Vec<(&'static str, Condition)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &'static str, value: impl Into<FieldValue>) -> Self {
        self.conditions.push((field, Condition::Eq(value.into())));
        self
    }

    pub fn in_<I, V>(mut self, field: &'static str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FieldValue>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.conditions.push((field, Condition::In(values)));
        self
    }

    pub fn gte(mut self, field: &'static str, value: impl Into<FieldValue>) -> Self {
        self.conditions.push((field, Condition::Gte(value.into())));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub field: &'static str,
    pub descending: bool,
}

/// Filter plus optional ordering and row limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Filter,
    pub order: Option<Order>,
    pub limit: Option<u32>,
}

impl Query {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &'static str, value: impl Into<FieldValue>) -> Self {
        self.filter = self.filter.eq(field, value);
        self
    }

    pub fn in_<I, V>(mut self, field: &'static str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FieldValue>,
    {
        self.filter = self.filter.in_(field, values);
        self
    }

    pub fn gte(mut self, field: &'static str, value: impl Into<FieldValue>) -> Self {
        self.filter = self.filter.gte(field, value);
        self
    }

    pub fn order_asc(mut self, field: &'static str) -> Self {
        self.order = Some(Order {
            field,
            descending: false,
        });
        self
    }

    pub fn order_desc(mut self, field: &'static str) -> Self {
        self.order = Some(Order {
            field,
            descending: true,
        });
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl From<Filter> for Query {
    fn from(filter: Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }
}
