use crate::descriptor::{ActionDescriptor, PluginDescriptor};
use crate::error::CoreError;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Process-lifetime catalog of plugin descriptors.
///
/// Populated once at startup, before any lookup is reachable, then shared
/// read-only (typically as `Arc<Registry>`). Lookups never lock; concurrent
/// registration is not a supported use case.
#[derive(Default)]
pub struct Registry {
    plugins: HashMap<String, Arc<PluginDescriptor>>,
}

impl Debug for Registry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let plugins = self.plugins.keys().collect::<Vec<_>>();
        f.write_fmt(format_args!("Registry {{ plugins: {plugins:?} }}"))
    }
}

impl Registry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a descriptor under its `type`. Registering the same type twice
    /// is a programmer error and fails loudly, so two plugins can never
    /// silently shadow one another.
    pub fn register(&mut self, descriptor: PluginDescriptor) -> Result<(), CoreError> {
        descriptor.validate()?;
        if self.plugins.contains_key(&descriptor.r#type) {
            return Err(CoreError::DuplicatePlugin(descriptor.r#type));
        }
        self.plugins.insert(descriptor.r#type.clone(), Arc::new(descriptor));
        Ok(())
    }

    /// Absent is a valid "type unknown" result, not an error; callers fall
    /// back to built-in system types.
    pub fn get(&self, r#type: &str) -> Option<Arc<PluginDescriptor>> {
        self.plugins.get(r#type).cloned()
    }

    pub fn contains(&self, r#type: &str) -> bool {
        self.plugins.contains_key(r#type)
    }

    /// Registered types ordered lexicographically by label (ties broken by
    /// type), so listings are stable regardless of registration order.
    pub fn types_sorted(&self) -> Vec<String> {
        let mut entries: Vec<_> = self
            .plugins
            .values()
            .map(|plugin| (plugin.label.as_str(), plugin.r#type.as_str()))
            .collect();
        entries.sort_unstable();
        entries.into_iter().map(|(_, r#type)| r#type.to_owned()).collect()
    }

    /// Every registered plugin's actions, flattened, in `types_sorted`
    /// order with each plugin's actions in declared order. Used by
    /// action-pickers agnostic to which plugin owns an action.
    pub fn all_actions(&self) -> Vec<(Arc<PluginDescriptor>, &ActionDescriptor)> {
        let mut actions = Vec::new();
        for r#type in self.types_sorted() {
            let plugin = &self.plugins[&r#type];
            for action in &plugin.actions {
                actions.push((plugin.clone(), action));
            }
        }
        actions
    }

    pub fn action(
        &self,
        r#type: &str,
        slug: &str,
    ) -> Result<(Arc<PluginDescriptor>, &ActionDescriptor), CoreError> {
        let plugin = self
            .plugins
            .get(r#type)
            .ok_or_else(|| CoreError::PluginNotFound(r#type.to_owned()))?;
        let action = plugin.action(slug).ok_or_else(|| CoreError::ActionNotFound {
            plugin: r#type.to_owned(),
            slug: slug.to_owned(),
        })?;
        Ok((plugin.clone(), action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::Credentials;
    use crate::descriptor::ConfigField;
    use crate::descriptor::ConfigFieldKind;
    use crate::step::{HandlerError, StepHandler, StepInput, StepOutcome};
    use async_trait::async_trait;

    struct NoopHandler;

    #[async_trait]
    impl StepHandler for NoopHandler {
        async fn execute(
            &self,
            _input: &StepInput,
            _credentials: &Credentials,
        ) -> Result<StepOutcome, HandlerError> {
            Ok(StepOutcome::success(Default::default()))
        }
    }

    fn descriptor(r#type: &str, label: &str, slugs: &[&str]) -> PluginDescriptor {
        PluginDescriptor {
            r#type: r#type.to_owned(),
            label: label.to_owned(),
            description: format!("{label} integration"),
            form_fields: vec![],
            test: None,
            actions: slugs
                .iter()
                .map(|slug| ActionDescriptor {
                    slug: (*slug).to_owned(),
                    label: (*slug).to_owned(),
                    description: String::new(),
                    category: label.to_owned(),
                    handler: Arc::new(NoopHandler),
                    config_fields: vec![],
                    output_fields: vec![],
                })
                .collect(),
        }
    }

    #[test]
    fn types_sorted_by_label_not_registration_order() {
        let mut registry = Registry::new();
        registry.register(descriptor("zeta", "Zeta", &[])).unwrap();
        registry.register(descriptor("axiom", "Axiom", &[])).unwrap();
        registry.register(descriptor("firecrawl", "Firecrawl", &[])).unwrap();

        assert_eq!(registry.types_sorted(), vec!["axiom", "firecrawl", "zeta"]);

        // Same set registered in another order yields the same listing.
        let mut other = Registry::new();
        other.register(descriptor("firecrawl", "Firecrawl", &[])).unwrap();
        other.register(descriptor("axiom", "Axiom", &[])).unwrap();
        other.register(descriptor("zeta", "Zeta", &[])).unwrap();
        assert_eq!(other.types_sorted(), registry.types_sorted());
    }

    #[test]
    fn duplicate_type_fails_loudly() {
        let mut registry = Registry::new();
        registry.register(descriptor("axiom", "Axiom", &["query-logs"])).unwrap();
        let err = registry.register(descriptor("axiom", "Axiom 2", &[])).unwrap_err();
        assert!(matches!(err, CoreError::DuplicatePlugin(r#type) if r#type == "axiom"));

        // The first registration stays in place.
        assert_eq!(registry.get("axiom").unwrap().label, "Axiom");
    }

    #[test]
    fn lookup_is_total() {
        let mut registry = Registry::new();
        registry.register(descriptor("axiom", "Axiom", &[])).unwrap();

        assert!(registry.get("axiom").is_some());
        assert!(registry.get("does-not-exist").is_none());
    }

    #[test]
    fn all_actions_flattens_in_listing_order() {
        let mut registry = Registry::new();
        registry.register(descriptor("zeta", "Zeta", &["one"])).unwrap();
        registry
            .register(descriptor("axiom", "Axiom", &["query-logs", "ingest-events"]))
            .unwrap();

        let actions: Vec<(String, String)> = registry
            .all_actions()
            .into_iter()
            .map(|(plugin, action)| (plugin.r#type.clone(), action.slug.clone()))
            .collect();
        assert_eq!(
            actions,
            vec![
                ("axiom".to_owned(), "query-logs".to_owned()),
                ("axiom".to_owned(), "ingest-events".to_owned()),
                ("zeta".to_owned(), "one".to_owned()),
            ]
        );
    }

    #[test]
    fn duplicate_action_slug_is_rejected() {
        let mut registry = Registry::new();
        let err = registry
            .register(descriptor("axiom", "Axiom", &["query-logs", "query-logs"]))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidDescriptor(_)));
    }

    #[test]
    fn select_default_must_be_declared() {
        let mut plugin = descriptor("axiom", "Axiom", &["create-annotation"]);
        plugin.actions[0].config_fields.push(ConfigField::new(
            "type",
            "Type",
            ConfigFieldKind::Select {
                options: vec![crate::descriptor::SelectOption::new("deploy", "Deployment")],
                default: Some("incident".into()),
            },
        ));

        let mut registry = Registry::new();
        assert!(matches!(
            registry.register(plugin).unwrap_err(),
            CoreError::InvalidDescriptor(_)
        ));
    }

    #[test]
    fn action_lookup_distinguishes_plugin_and_slug_misses() {
        let mut registry = Registry::new();
        registry.register(descriptor("axiom", "Axiom", &["query-logs"])).unwrap();

        assert!(registry.action("axiom", "query-logs").is_ok());
        assert!(matches!(
            registry.action("missing", "query-logs").unwrap_err(),
            CoreError::PluginNotFound(_)
        ));
        assert!(matches!(
            registry.action("axiom", "missing").unwrap_err(),
            CoreError::ActionNotFound { .. }
        ));
    }
}
