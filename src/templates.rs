use minijinja::Environment;
use serde::Serialize;
use std::sync::Arc;

/// Every page template, embedded at compile time so the binary is
/// self-contained. Names keep the `.html` suffix so minijinja's default
/// auto-escaping applies to all of them.
const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    ("content_list.html", include_str!("../templates/content_list.html")),
    ("content_detail.html", include_str!("../templates/content_detail.html")),
    ("content_form.html", include_str!("../templates/content_form.html")),
    ("content_confirm_delete.html", include_str!("../templates/content_confirm_delete.html")),
    ("my_content.html", include_str!("../templates/my_content.html")),
    ("login.html", include_str!("../templates/login.html")),
    ("register.html", include_str!("../templates/register.html")),
];

/// TemplateEngine
///
/// A minijinja environment with all page templates pre-registered. Built once
/// at startup and shared through the application state; rendering is by name.
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    /// Registers the embedded templates and the `datefmt` filter used to show
    /// timestamps as plain dates. Registration failures are programming
    /// errors (a template that does not parse), so startup fails fast.
    pub fn new() -> Self {
        let mut env = Environment::new();
        for (name, source) in TEMPLATES {
            env.add_template(name, source)
                .expect("embedded template failed to parse");
        }
        // RFC 3339 timestamps read poorly in page chrome; keep the date part.
        env.add_filter("datefmt", |value: String| -> String {
            value.chars().take(10).collect()
        });
        Self { env }
    }

    pub fn render<C: Serialize>(&self, name: &str, context: C) -> Result<String, minijinja::Error> {
        self.env.get_template(name)?.render(context)
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// TemplateState
///
/// The concrete type used to share the engine across the application state.
pub type TemplateState = Arc<TemplateEngine>;
