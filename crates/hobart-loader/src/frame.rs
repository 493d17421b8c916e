//! A single symbol's table, either materialized or deferred.

use std::fmt;

use derive_more::From;
use polars::prelude::*;

use crate::Result;

/// One symbol's table.
///
/// Transformations keep the mode: an eager frame is transformed through a lazy plan and
/// materialized again, a lazy frame just grows its plan.
#[derive(Clone, From)]
pub enum Frame {
    /// Materialized table
    Eager(DataFrame),
    /// Deferred query plan
    Lazy(LazyFrame),
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eager(df) => f.debug_tuple("Eager").field(&df.shape()).finish(),
            Self::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

impl Frame {
    /// Returns true when the frame is materialized.
    pub const fn is_eager(&self) -> bool {
        matches!(self, Self::Eager(_))
    }

    /// Returns true when the frame is a deferred plan.
    pub const fn is_lazy(&self) -> bool {
        matches!(self, Self::Lazy(_))
    }

    /// Converts into a lazy plan without executing anything.
    pub fn lazy(self) -> LazyFrame {
        match self {
            Self::Eager(df) => df.lazy(),
            Self::Lazy(lf) => lf,
        }
    }

    /// Materializes the frame.
    pub fn collect(self) -> Result<DataFrame> {
        match self {
            Self::Eager(df) => Ok(df),
            Self::Lazy(lf) => Ok(lf.collect()?),
        }
    }

    /// Materialized view, if the frame is eager.
    pub const fn as_eager(&self) -> Option<&DataFrame> {
        match self {
            Self::Eager(df) => Some(df),
            Self::Lazy(_) => None,
        }
    }

    /// Applies a plan-level transformation while preserving the mode.
    pub fn map<F>(self, f: F) -> Result<Self>
    where
        F: FnOnce(LazyFrame) -> LazyFrame,
    {
        match self {
            Self::Eager(df) => Ok(Self::Eager(f(df.lazy()).collect()?)),
            Self::Lazy(lf) => Ok(Self::Lazy(f(lf))),
        }
    }

    /// Fallible variant of [`Frame::map`].
    pub fn try_map<F>(self, f: F) -> Result<Self>
    where
        F: FnOnce(LazyFrame) -> Result<LazyFrame>,
    {
        match self {
            Self::Eager(df) => Ok(Self::Eager(f(df.lazy())?.collect()?)),
            Self::Lazy(lf) => Ok(Self::Lazy(f(lf)?)),
        }
    }

    /// Column names in schema order. Resolves the schema of lazy plans.
    pub fn columns(&self) -> Result<Vec<String>> {
        match self {
            Self::Eager(df) => Ok(df.get_column_names().into_iter().map(|s| s.to_string()).collect()),
            Self::Lazy(lf) => {
                let schema = lf.clone().collect_schema()?;
                Ok(schema.iter_names().map(|s| s.to_string()).collect())
            }
        }
    }

    /// Schema of the frame.
    pub fn schema(&self) -> Result<SchemaRef> {
        match self {
            Self::Eager(df) => Ok(df.clone().lazy().collect_schema()?),
            Self::Lazy(lf) => Ok(lf.clone().collect_schema()?),
        }
    }

    /// Row count of an eager frame.
    pub fn height(&self) -> Option<usize> {
        self.as_eager().map(DataFrame::height)
    }
}
