//! HTML rendering with minijinja.

use super::view::PageView;
use crate::error::{DashboardError, Result};
use minijinja::Environment;

const PAGE_TEMPLATE: &str = include_str!("templates/page.html");
const PAGE_NAME: &str = "page.html";

/// Compiled page templates.
///
/// Template names end in `.html`, so values are HTML-escaped on output.
#[derive(Debug)]
pub struct Renderer {
    env: Environment<'static>,
}

impl Renderer {
    /// Compiles the built-in templates.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::Config`] if a template fails to compile.
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template(PAGE_NAME, PAGE_TEMPLATE)
            .map_err(|e| DashboardError::Config(format!("Invalid page template: {e}")))?;
        Ok(Self { env })
    }

    /// Renders the dashboard page.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::Config`] if rendering fails.
    pub fn render_page(&self, page: &PageView) -> Result<String> {
        self.env
            .get_template(PAGE_NAME)
            .and_then(|tmpl| tmpl.render(page))
            .map_err(|e| DashboardError::Config(format!("Template render error: {e}")))
    }
}
