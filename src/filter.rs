//! Message filter specification
//!
//! A `FilterSpecification` collects predicates at configuration time and
//! is turned into an immutable `MessageFilter` by `build()`. All registered
//! predicates must hold for a message to be audited; with none registered
//! every message matches.

use crate::error::{AuditError, Result};
use crate::types::{Message, MessageContext};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Boolean test over a message context
pub type FilterPredicate = Arc<dyn Fn(&MessageContext) -> bool + Send + Sync>;

enum Rule {
    IncludeTypes(BTreeSet<String>),
    ExcludeType(String),
    IncludeWhen(FilterPredicate),
    ExcludeWhen(FilterPredicate),
}

/// Configuration-time filter builder
///
/// Handed to the filter callback of `AuditOptionsBuilder::filter`.
#[derive(Default)]
pub struct FilterSpecification {
    rules: Vec<Rule>,
}

impl FilterSpecification {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only audit messages of type `M`
    pub fn include<M: Message>(&mut self) -> &mut Self {
        self.include_type(M::MESSAGE_TYPE)
    }

    /// Never audit messages of type `M`
    pub fn exclude<M: Message>(&mut self) -> &mut Self {
        self.exclude_type(M::MESSAGE_TYPE)
    }

    /// Only audit messages with the given type name
    pub fn include_type(&mut self, message_type: impl Into<String>) -> &mut Self {
        self.include_types([message_type])
    }

    /// Only audit messages whose type is one of `message_types`
    ///
    /// Registers a single predicate; the types inside the set are alternatives.
    pub fn include_types<I, S>(&mut self, message_types: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set = message_types.into_iter().map(Into::into).collect();
        self.rules.push(Rule::IncludeTypes(set));
        self
    }

    /// Never audit messages with the given type name
    pub fn exclude_type(&mut self, message_type: impl Into<String>) -> &mut Self {
        self.rules.push(Rule::ExcludeType(message_type.into()));
        self
    }

    /// Only audit messages for which `predicate` returns true
    pub fn include_when<F>(&mut self, predicate: F) -> &mut Self
    where
        F: Fn(&MessageContext) -> bool + Send + Sync + 'static,
    {
        self.rules.push(Rule::IncludeWhen(Arc::new(predicate)));
        self
    }

    /// Never audit messages for which `predicate` returns true
    pub fn exclude_when<F>(&mut self, predicate: F) -> &mut Self
    where
        F: Fn(&MessageContext) -> bool + Send + Sync + 'static,
    {
        self.rules.push(Rule::ExcludeWhen(Arc::new(predicate)));
        self
    }

    /// Number of registered predicates
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Validate the registrations and produce the filter
    ///
    /// Fails on blank type names, empty include sets, and registrations
    /// that can never match together (a type both included and excluded,
    /// or include sets with no type in common).
    pub fn build(self) -> Result<MessageFilter> {
        let mut allowed: Option<BTreeSet<String>> = None;
        let mut excluded = BTreeSet::new();

        for rule in &self.rules {
            match rule {
                Rule::IncludeTypes(set) => {
                    if set.is_empty() {
                        return Err(AuditError::Config(
                            "include_types requires at least one message type".to_string(),
                        ));
                    }
                    if let Some(name) = set.iter().find(|t| t.trim().is_empty()) {
                        return Err(AuditError::Config(format!(
                            "Invalid message type name '{}' in filter",
                            name
                        )));
                    }
                    allowed = Some(match allowed {
                        None => set.clone(),
                        Some(prev) => prev.intersection(set).cloned().collect(),
                    });
                }
                Rule::ExcludeType(name) => {
                    if name.trim().is_empty() {
                        return Err(AuditError::Config(format!(
                            "Invalid message type name '{}' in filter",
                            name
                        )));
                    }
                    excluded.insert(name.clone());
                }
                Rule::IncludeWhen(_) | Rule::ExcludeWhen(_) => {}
            }
        }

        if let Some(allowed) = &allowed {
            if allowed.is_empty() {
                return Err(AuditError::Config(
                    "Filter includes message types with nothing in common; no message could match"
                        .to_string(),
                ));
            }
            if allowed.is_subset(&excluded) {
                return Err(AuditError::Config(format!(
                    "Filter both includes and excludes message types {:?}",
                    allowed
                )));
            }
        }

        let predicates = self
            .rules
            .into_iter()
            .map(|rule| -> FilterPredicate {
                match rule {
                    Rule::IncludeTypes(set) => {
                        Arc::new(move |ctx: &MessageContext| set.contains(&ctx.message_type))
                    }
                    Rule::ExcludeType(name) => {
                        Arc::new(move |ctx: &MessageContext| ctx.message_type != name)
                    }
                    Rule::IncludeWhen(p) => p,
                    Rule::ExcludeWhen(p) => Arc::new(move |ctx: &MessageContext| !p(ctx)),
                }
            })
            .collect();

        Ok(MessageFilter { predicates })
    }
}

/// Immutable, reentrant filter evaluated once per observed message
#[derive(Clone, Default)]
pub struct MessageFilter {
    predicates: Vec<FilterPredicate>,
}

impl MessageFilter {
    /// A filter that matches every message
    pub fn all() -> Self {
        Self::default()
    }

    /// Build a filter by running a configuration callback
    pub fn configure(configure: impl FnOnce(&mut FilterSpecification)) -> Result<Self> {
        let mut spec = FilterSpecification::new();
        configure(&mut spec);
        spec.build()
    }

    /// Whether the message should be audited
    pub fn matches(&self, ctx: &MessageContext) -> bool {
        self.predicates.iter().all(|p| p(ctx))
    }

    pub fn is_match_all(&self) -> bool {
        self.predicates.is_empty()
    }
}

impl std::fmt::Debug for MessageFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageFilter")
            .field("predicates", &self.predicates.len())
            .finish()
    }
}
