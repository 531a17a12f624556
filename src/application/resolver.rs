//! ChannelResolver - Maps a subscription request to its channel bindings.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::domain::event::Topic;
use crate::domain::foundation::{DomainError, ResolutionError};
use crate::domain::subscription::{ChannelBinding, SubscriptionRequest};

/// Host-supplied setup for one logical subscription name.
pub type SetupFn =
    Arc<dyn Fn(&SubscriptionRequest) -> Result<Vec<ChannelBinding>, DomainError> + Send + Sync>;

/// Resolves logical subscription names to topic bindings.
///
/// Names with a registered setup function get whatever bindings it
/// returns (possibly several topics, each with its own filter). Any other
/// name binds to the topic of the same name with an always-true filter.
#[derive(Clone, Default)]
pub struct ChannelResolver {
    setups: HashMap<String, SetupFn>,
}

impl ChannelResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a setup function, builder style.
    pub fn with_setup<F>(mut self, name: impl Into<String>, setup: F) -> Self
    where
        F: Fn(&SubscriptionRequest) -> Result<Vec<ChannelBinding>, DomainError>
            + Send
            + Sync
            + 'static,
    {
        self.register_setup(name, setup);
        self
    }

    /// Registers (or replaces) the setup function for `name`.
    pub fn register_setup<F>(&mut self, name: impl Into<String>, setup: F)
    where
        F: Fn(&SubscriptionRequest) -> Result<Vec<ChannelBinding>, DomainError>
            + Send
            + Sync
            + 'static,
    {
        self.setups.insert(name.into(), Arc::new(setup));
    }

    pub fn has_setup(&self, name: &str) -> bool {
        self.setups.contains_key(name)
    }

    /// Produces the bindings for a request.
    ///
    /// Setup functions run synchronously and see the full request,
    /// including the context returned by `on_subscribe`.
    pub fn resolve(
        &self,
        request: &SubscriptionRequest,
    ) -> Result<Vec<ChannelBinding>, ResolutionError> {
        let setup_failed = |source: DomainError| ResolutionError::SetupFailed {
            name: request.name.clone(),
            source,
        };

        match self.setups.get(&request.name) {
            Some(setup) => {
                let bindings = setup(request).map_err(setup_failed)?;

                // One binding per topic, or a single publish would be delivered twice
                let mut seen = HashSet::with_capacity(bindings.len());
                if let Some(duplicate) = bindings.iter().find(|b| !seen.insert(b.topic().clone())) {
                    return Err(ResolutionError::DuplicateTopic {
                        name: request.name.clone(),
                        topic: duplicate.topic().to_string(),
                    });
                }

                tracing::trace!(
                    name = %request.name,
                    bindings = bindings.len(),
                    "Resolved subscription through setup function"
                );
                Ok(bindings)
            }
            None => {
                let topic = Topic::new(request.name.as_str())
                    .map_err(|e| setup_failed(DomainError::from(e)))?;
                Ok(vec![ChannelBinding::always(topic)])
            }
        }
    }
}

impl fmt::Debug for ChannelResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.setups.keys().collect();
        names.sort();
        f.debug_struct("ChannelResolver")
            .field("setups", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::Event;
    use crate::domain::foundation::{AuthContext, ConnectionId, ErrorCode};
    use crate::domain::subscription::{Arguments, ExecutionContext};
    use serde_json::json;

    fn request(name: &str, arguments: serde_json::Value) -> SubscriptionRequest {
        let arguments: Arguments = match arguments {
            serde_json::Value::Object(map) => map,
            _ => Arguments::new(),
        };
        SubscriptionRequest::new(
            name,
            arguments,
            ExecutionContext::new(ConnectionId::new(), AuthContext::Anonymous),
        )
    }

    fn github_resolver() -> ChannelResolver {
        ChannelResolver::new().with_setup("commentAdded", |_| {
            Ok(vec![ChannelBinding::field_equals(
                Topic::new("newCommentsChannel")?,
                "repoName",
                "repoFullName",
            )])
        })
    }

    #[test]
    fn unknown_name_binds_to_topic_of_same_name() {
        let bindings = ChannelResolver::new()
            .resolve(&request("postAdded", json!({})))
            .unwrap();

        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].topic().as_str(), "postAdded");

        let event = Event::new(Topic::new("postAdded").unwrap(), json!({"anything": 1}));
        assert!(bindings[0].matches(&event, &Arguments::new()).unwrap());
    }

    #[test]
    fn setup_function_supplies_topic_and_filter() {
        let req = request("commentAdded", json!({"repoFullName": "apollostack/GitHunt"}));
        let bindings = github_resolver().resolve(&req).unwrap();

        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].topic().as_str(), "newCommentsChannel");

        let topic = Topic::new("newCommentsChannel").unwrap();
        let hit = Event::new(topic.clone(), json!({"repoName": "apollostack/GitHunt"}));
        let miss = Event::new(topic, json!({"repoName": "other/repo"}));
        assert!(bindings[0].matches(&hit, &req.arguments).unwrap());
        assert!(!bindings[0].matches(&miss, &req.arguments).unwrap());
    }

    #[test]
    fn setup_may_bind_several_topics() {
        let resolver = ChannelResolver::new().with_setup("activity", |_| {
            Ok(vec![
                ChannelBinding::always(Topic::new("comments")?),
                ChannelBinding::always(Topic::new("votes")?),
            ])
        });

        let bindings = resolver.resolve(&request("activity", json!({}))).unwrap();
        let topics: Vec<&str> = bindings.iter().map(|b| b.topic().as_str()).collect();
        assert_eq!(topics, vec!["comments", "votes"]);
    }

    #[test]
    fn setup_binding_one_topic_twice_is_rejected() {
        let resolver = ChannelResolver::new().with_setup("commentAdded", |_| {
            Ok(vec![
                ChannelBinding::always(Topic::new("newCommentsChannel")?),
                ChannelBinding::always(Topic::new("votes")?),
                ChannelBinding::always(Topic::new("newCommentsChannel")?),
            ])
        });

        let err = resolver
            .resolve(&request("commentAdded", json!({})))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ResolutionFailed);
        assert!(matches!(
            err,
            ResolutionError::DuplicateTopic { ref topic, .. } if topic == "newCommentsChannel"
        ));
    }

    #[test]
    fn failing_setup_is_reported_as_resolution_error() {
        let resolver = ChannelResolver::new().with_setup("broken", |_| {
            Err(DomainError::new(ErrorCode::ValidationFailed, "missing repo"))
        });

        let err = resolver.resolve(&request("broken", json!({}))).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ResolutionFailed);
        assert!(matches!(err, ResolutionError::SetupFailed { ref name, .. } if name == "broken"));
    }

    #[test]
    fn empty_name_cannot_be_resolved() {
        let err = ChannelResolver::new()
            .resolve(&request("", json!({})))
            .unwrap_err();
        assert!(matches!(err, ResolutionError::SetupFailed { .. }));
    }

    #[test]
    fn register_setup_replaces_previous() {
        let mut resolver = github_resolver();
        resolver.register_setup("commentAdded", |_| {
            Ok(vec![ChannelBinding::always(Topic::new("replaced")?)])
        });

        let bindings = resolver
            .resolve(&request("commentAdded", json!({})))
            .unwrap();
        assert_eq!(bindings[0].topic().as_str(), "replaced");
        assert!(resolver.has_setup("commentAdded"));
    }
}
