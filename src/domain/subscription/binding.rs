//! Channel bindings: which topic a subscription listens on, and how it filters.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::domain::event::{Event, Topic};
use crate::domain::foundation::{DomainError, ErrorCode};

use super::Arguments;

/// Filter predicate evaluated for every event on a bound topic.
///
/// Must be a pure function of the event and the subscription arguments.
pub type FilterFn = Arc<dyn Fn(&Event, &Arguments) -> Result<bool, DomainError> + Send + Sync>;

/// A topic plus the filter applied to events published on it.
#[derive(Clone)]
pub struct ChannelBinding {
    topic: Topic,
    filter: FilterFn,
}

impl ChannelBinding {
    /// Binds to `topic` with a custom filter.
    pub fn new<F>(topic: Topic, filter: F) -> Self
    where
        F: Fn(&Event, &Arguments) -> Result<bool, DomainError> + Send + Sync + 'static,
    {
        Self {
            topic,
            filter: Arc::new(filter),
        }
    }

    /// Binds to `topic` with a filter that always passes.
    pub fn always(topic: Topic) -> Self {
        Self::new(topic, |_, _| Ok(true))
    }

    /// Passes when the event's `event_field` equals the argument `argument`.
    ///
    /// An event without the field never matches; a request without the
    /// argument is a filter error.
    pub fn field_equals(topic: Topic, event_field: &str, argument: &str) -> Self {
        let event_field = event_field.to_string();
        let argument = argument.to_string();
        Self::new(topic, move |event, args| {
            let expected = args.get(&argument).ok_or_else(|| {
                DomainError::new(
                    ErrorCode::ValidationFailed,
                    format!("missing argument '{}'", argument),
                )
            })?;
            Ok(event.field(&event_field) == Some(expected))
        })
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Evaluates the filter.
    ///
    /// A panicking filter is reported as an error rather than unwinding
    /// into the dispatch loop.
    pub fn matches(&self, event: &Event, arguments: &Arguments) -> Result<bool, DomainError> {
        match catch_unwind(AssertUnwindSafe(|| (self.filter)(event, arguments))) {
            Ok(result) => result,
            Err(_) => Err(DomainError::new(
                ErrorCode::InternalError,
                format!("filter for topic '{}' panicked", self.topic),
            )),
        }
    }
}

impl fmt::Debug for ChannelBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelBinding")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn topic() -> Topic {
        Topic::new("newCommentsChannel").unwrap()
    }

    fn args(repo: &str) -> Arguments {
        let mut args = Arguments::new();
        args.insert("repoFullName".into(), json!(repo));
        args
    }

    fn comment(repo: &str) -> Event {
        Event::new(
            topic(),
            json!({"id": 123, "content": "Test", "repoFullName": repo}),
        )
    }

    #[test]
    fn always_binding_matches_everything() {
        let binding = ChannelBinding::always(topic());
        assert!(binding.matches(&comment("a/b"), &Arguments::new()).unwrap());
    }

    #[test]
    fn field_equals_matches_same_repo_only() {
        let binding = ChannelBinding::field_equals(topic(), "repoFullName", "repoFullName");
        let wanted = args("apollostack/GitHunt-API");

        assert!(binding
            .matches(&comment("apollostack/GitHunt-API"), &wanted)
            .unwrap());
        assert!(!binding.matches(&comment("other/repo"), &wanted).unwrap());
    }

    #[test]
    fn field_equals_errors_on_missing_argument() {
        let binding = ChannelBinding::field_equals(topic(), "repoFullName", "repoFullName");
        assert!(binding.matches(&comment("a/b"), &Arguments::new()).is_err());
    }

    #[test]
    fn panicking_filter_becomes_error() {
        let binding = ChannelBinding::new(topic(), |_, _| panic!("bad filter"));
        let err = binding.matches(&comment("a/b"), &Arguments::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::InternalError);
    }

    #[test]
    fn debug_output_names_topic() {
        let binding = ChannelBinding::always(topic());
        assert!(format!("{:?}", binding).contains("newCommentsChannel"));
    }
}
