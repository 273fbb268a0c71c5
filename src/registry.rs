//! Capability registry
//!
//! Holds the registered tools, prompts, static resources, and resource
//! templates. Entries are insertion-ordered: listings and template-match
//! iteration walk them in registration order, so the backing stores are
//! vectors with linear key lookup rather than hash maps. Re-registering a
//! key replaces the existing entry in place (last write wins, position
//! kept).

use std::sync::Arc;

use crate::prompt::Prompt;
use crate::protocol::{
    PromptsCapability, ResourcesCapability, ServerCapabilities, ToolsCapability,
};
use crate::resource::{Resource, ResourceTemplate};
use crate::tool::Tool;

#[derive(Clone, Default)]
pub(crate) struct Registry {
    tools: Vec<Arc<Tool>>,
    prompts: Vec<Arc<Prompt>>,
    resources: Vec<Arc<Resource>>,
    templates: Vec<Arc<ResourceTemplate>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert_tool(&mut self, tool: Tool) {
        let tool = Arc::new(tool);
        match self.tools.iter_mut().find(|t| t.name == tool.name) {
            Some(slot) => *slot = tool,
            None => self.tools.push(tool),
        }
    }

    pub(crate) fn tool(&self, name: &str) -> Option<Arc<Tool>> {
        self.tools.iter().find(|t| t.name == name).cloned()
    }

    pub(crate) fn tools(&self) -> &[Arc<Tool>] {
        &self.tools
    }

    pub(crate) fn insert_prompt(&mut self, prompt: Prompt) {
        let prompt = Arc::new(prompt);
        match self.prompts.iter_mut().find(|p| p.name == prompt.name) {
            Some(slot) => *slot = prompt,
            None => self.prompts.push(prompt),
        }
    }

    pub(crate) fn prompt(&self, name: &str) -> Option<Arc<Prompt>> {
        self.prompts.iter().find(|p| p.name == name).cloned()
    }

    pub(crate) fn prompts(&self) -> &[Arc<Prompt>] {
        &self.prompts
    }

    pub(crate) fn insert_resource(&mut self, resource: Resource) {
        let resource = Arc::new(resource);
        match self.resources.iter_mut().find(|r| r.uri == resource.uri) {
            Some(slot) => *slot = resource,
            None => self.resources.push(resource),
        }
    }

    pub(crate) fn resource(&self, uri: &str) -> Option<Arc<Resource>> {
        self.resources.iter().find(|r| r.uri == uri).cloned()
    }

    pub(crate) fn resources(&self) -> &[Arc<Resource>] {
        &self.resources
    }

    pub(crate) fn insert_template(&mut self, template: ResourceTemplate) {
        let template = Arc::new(template);
        match self
            .templates
            .iter_mut()
            .find(|t| t.uri_template == template.uri_template)
        {
            Some(slot) => *slot = template,
            None => self.templates.push(template),
        }
    }

    pub(crate) fn templates(&self) -> &[Arc<ResourceTemplate>] {
        &self.templates
    }

    /// Capabilities advertised for the current registry contents.
    pub(crate) fn capabilities(&self) -> ServerCapabilities {
        ServerCapabilities {
            tools: (!self.tools.is_empty()).then(|| ToolsCapability { list_changed: true }),
            resources: (!self.resources.is_empty() || !self.templates.is_empty())
                .then(ResourcesCapability::default),
            prompts: (!self.prompts.is_empty()).then(|| PromptsCapability { list_changed: true }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::PromptBuilder;
    use crate::protocol::{CallToolResult, ReadResourceResult};
    use crate::resource::{ResourceBuilder, ResourceTemplateBuilder};
    use crate::tool::ToolBuilder;

    fn make_tool(name: &str, reply: &'static str) -> Tool {
        ToolBuilder::new(name)
            .raw_handler(move |_args, _ctx| async move { Ok(CallToolResult::text(reply)) })
    }

    #[test]
    fn test_tools_preserve_insertion_order() {
        let mut registry = Registry::new();
        registry.insert_tool(make_tool("zeta", "z"));
        registry.insert_tool(make_tool("alpha", "a"));

        let names: Vec<&str> = registry.tools().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut registry = Registry::new();
        registry.insert_tool(make_tool("a", "first"));
        registry.insert_tool(make_tool("b", "second"));
        registry.insert_tool(make_tool("a", "replaced"));

        let names: Vec<&str> = registry.tools().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(registry.tools().len(), 2);
    }

    #[test]
    fn test_lookup_by_key() {
        let mut registry = Registry::new();
        registry.insert_tool(make_tool("echo", "hi"));
        assert!(registry.tool("echo").is_some());
        assert!(registry.tool("missing").is_none());
    }

    #[test]
    fn test_capabilities_empty_registry() {
        let registry = Registry::new();
        let caps = registry.capabilities();
        assert!(caps.tools.is_none());
        assert!(caps.resources.is_none());
        assert!(caps.prompts.is_none());
    }

    #[test]
    fn test_capabilities_follow_contents() {
        let mut registry = Registry::new();
        registry.insert_tool(make_tool("t", "x"));
        registry.insert_prompt(PromptBuilder::new("p").user_message("hello"));
        registry.insert_resource(ResourceBuilder::new("memory://x").text("x"));

        let caps = registry.capabilities();
        assert!(caps.tools.unwrap().list_changed);
        assert!(caps.prompts.unwrap().list_changed);
        assert!(caps.resources.is_some());
    }

    #[test]
    fn test_templates_enable_resources_capability() {
        let mut registry = Registry::new();
        let template = ResourceTemplateBuilder::new("file:///{path}")
            .handler(|_uri, _vars, _ctx| async { Ok(ReadResourceResult { contents: vec![] }) })
            .unwrap();
        registry.insert_template(template);

        assert!(registry.capabilities().resources.is_some());
        assert_eq!(registry.templates().len(), 1);
    }
}
