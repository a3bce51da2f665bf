//! Routing producer failures into a collection.

use std::fmt::Display;

use anyhow::Error;

use crate::collection::ErrorCollection;

/// Extension trait that hands a failed result to a collection.
pub trait ResultExt<T> {
    /// Adds the error (if any) to `collection` and returns the value as an `Option`.
    ///
    /// The entry records the location of the call to `or_collect`.
    fn or_collect(self, collection: &ErrorCollection) -> Option<T>;

    /// Like [`or_collect`], with `context` wrapped around the error.
    ///
    /// [`or_collect`]: ResultExt::or_collect
    fn or_collect_with(self, collection: &ErrorCollection, context: impl Display) -> Option<T>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<Error>,
{
    #[track_caller]
    fn or_collect(self, collection: &ErrorCollection) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                collection.add(e);
                None
            }
        }
    }

    #[track_caller]
    fn or_collect_with(self, collection: &ErrorCollection, context: impl Display) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                let error: Error = e.into();
                collection.add(error.context(context.to_string()));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Error, ErrorKind::PermissionDenied};

    use anyhow::anyhow;

    use crate::{collection::ErrorCollection, error::operational::ResultExt};

    #[test]
    fn test_or_collect_passes_values_through() {
        let collection = ErrorCollection::new(4);
        let result: Result<i32, Error> = Ok(5);

        assert_eq!(result.or_collect(&collection), Some(5));
        assert_eq!(collection.length(), 0);
    }

    #[test]
    fn test_or_collect_records_error_and_location() {
        let collection = ErrorCollection::new(4);
        let result: Result<i32, Error> = Err(Error::new(PermissionDenied, "read-only volume"));

        let line = line!() + 1;
        assert_eq!(result.or_collect(&collection), None);

        let entry = collection.pop().unwrap();
        assert_eq!(entry.message(), "read-only volume");
        assert_eq!(entry.origin().file(), file!());
        assert_eq!(entry.origin().line(), line);
    }

    #[test]
    fn test_or_collect_with_context() {
        let collection = ErrorCollection::new(4);
        let result: Result<(), anyhow::Error> = Err(anyhow!("timeout"));

        assert_eq!(result.or_collect_with(&collection, "syncing replica"), None);

        let entry = collection.get_error().unwrap();
        assert_eq!(entry.message(), "syncing replica");
        assert_eq!(format!("{:#}", entry.error()), "syncing replica: timeout");
    }
}
