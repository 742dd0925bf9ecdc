use stitch_core::descriptor::PluginDescriptor;
use stitch_core::error::CoreError;
use stitch_core::registry::Registry;

/// Descriptors for every integration bundled with this workspace.
pub fn descriptors() -> Vec<PluginDescriptor> {
    vec![stitch_axiom::descriptor(), stitch_firecrawl::descriptor()]
}

/// Registers every bundled integration. Called once at startup, before the
/// registry is shared with any consumer.
pub fn register_all(registry: &mut Registry) -> Result<(), CoreError> {
    for descriptor in descriptors() {
        registry.register(descriptor)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_integrations_register_cleanly() {
        let mut registry = Registry::new();
        register_all(&mut registry).unwrap();

        assert_eq!(registry.types_sorted(), vec!["axiom", "firecrawl"]);

        let slugs: Vec<String> = registry
            .all_actions()
            .into_iter()
            .map(|(plugin, action)| format!("{}/{}", plugin.r#type, action.slug))
            .collect();
        assert_eq!(
            slugs,
            vec![
                "axiom/query-logs",
                "axiom/ingest-events",
                "axiom/create-annotation",
                "axiom/list-datasets",
                "firecrawl/scrape",
                "firecrawl/search",
            ]
        );
    }
}
