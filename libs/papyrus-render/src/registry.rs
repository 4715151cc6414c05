use std::collections::HashMap;

use crate::feature::GeoJsonRenderer;
use crate::xsd::XsdGenerator;

#[derive(Clone)]
pub enum Renderer {
    GeoJson(GeoJsonRenderer),
    Xsd(XsdGenerator),
}

/// Renderers by name, shared with the HTTP layer.
///
/// The default registry holds `geojson` and `xsd` with default settings.
#[derive(Clone)]
pub struct RendererRegistry {
    renderers: HashMap<String, Renderer>,
}

impl Default for RendererRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("geojson", Renderer::GeoJson(GeoJsonRenderer::default()));
        registry.register("xsd", Renderer::Xsd(XsdGenerator::default()));
        registry
    }
}

impl RendererRegistry {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            renderers: HashMap::new(),
        }
    }

    /// Register a renderer, replacing any previous one with that name.
    pub fn register(&mut self, name: impl Into<String>, renderer: Renderer) {
        self.renderers.insert(name.into(), renderer);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Renderer> {
        self.renderers.get(name)
    }

    #[must_use]
    pub fn geojson(&self, name: &str) -> Option<&GeoJsonRenderer> {
        match self.get(name)? {
            Renderer::GeoJson(r) => Some(r),
            Renderer::Xsd(_) => None,
        }
    }

    #[must_use]
    pub fn xsd(&self, name: &str) -> Option<&XsdGenerator> {
        match self.get(name)? {
            Renderer::Xsd(r) => Some(r),
            Renderer::GeoJson(_) => None,
        }
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.renderers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
