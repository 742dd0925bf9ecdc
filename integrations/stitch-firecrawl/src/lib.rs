use std::sync::Arc;
use stitch_core::descriptor::{
    ActionDescriptor, ConfigField, ConfigFieldKind, FormField, FormFieldKind, OutputField,
    PluginDescriptor,
};

pub mod api;
mod steps;

pub const TYPE: &str = "firecrawl";

pub(crate) const API_KEY_MISSING: &str = "Firecrawl API Key is not configured.";

pub fn descriptor() -> PluginDescriptor {
    PluginDescriptor {
        r#type: TYPE.into(),
        label: "Firecrawl".into(),
        description: "Scrape websites and search the web with Firecrawl".into(),
        form_fields: vec![FormField::new(
            "apiKey",
            "API Key",
            FormFieldKind::Password,
            "FIRECRAWL_API_KEY",
        )
        .placeholder("fc-...")
        .help_text("Get your API key from ")
        .help_link("firecrawl.dev/app/api-keys", "https://www.firecrawl.dev/app/api-keys")],
        test: None,
        actions: vec![
            ActionDescriptor {
                slug: "scrape".into(),
                label: "Scrape".into(),
                description: "Scrape content from a URL".into(),
                category: "Firecrawl".into(),
                handler: Arc::new(steps::Scrape),
                config_fields: vec![
                    ConfigField::new("url", "URL", ConfigFieldKind::Template)
                        .placeholder("https://example.com or {{NodeName.url}}")
                        .example("https://example.com")
                        .required(),
                    ConfigField::new("formats", "Formats", ConfigFieldKind::Text)
                        .placeholder("markdown,links")
                        .example("markdown"),
                ],
                output_fields: vec![
                    OutputField::new("markdown", "Scraped content as markdown"),
                    OutputField::new("metadata", "Page metadata (title, description, ...)"),
                ],
            },
            ActionDescriptor {
                slug: "search".into(),
                label: "Search".into(),
                description: "Search the web".into(),
                category: "Firecrawl".into(),
                handler: Arc::new(steps::Search),
                config_fields: vec![
                    ConfigField::new("query", "Search Query", ConfigFieldKind::Template)
                        .placeholder("Search query or {{NodeName.query}}")
                        .required(),
                    ConfigField::new("limit", "Result Limit", ConfigFieldKind::Text)
                        .placeholder("5"),
                ],
                output_fields: vec![
                    OutputField::new("web", "Array of web results"),
                    OutputField::new("count", "Number of results returned"),
                ],
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_is_valid() {
        descriptor().validate().unwrap();
    }
}
