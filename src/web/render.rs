use axum::response::Html;
use handlebars::Handlebars;
use serde::Serialize;

const PARTIALS: [(&str, &str); 2] = [
    ("header", include_str!("../../templates/header.hbs")),
    ("footer", include_str!("../../templates/footer.hbs")),
];

const PAGES: [(&str, &str); 9] = [
    ("login", include_str!("../../templates/login.hbs")),
    ("register", include_str!("../../templates/register.hbs")),
    ("dashboard", include_str!("../../templates/dashboard.hbs")),
    ("subjects", include_str!("../../templates/subjects.hbs")),
    ("timetable", include_str!("../../templates/timetable.hbs")),
    ("attendance", include_str!("../../templates/attendance.hbs")),
    ("tasks", include_str!("../../templates/tasks.hbs")),
    ("resources", include_str!("../../templates/resources.hbs")),
    ("coding", include_str!("../../templates/coding.hbs")),
];

/// Page templates compiled into the binary.
pub struct Templates {
    registry: Handlebars<'static>,
}

impl Templates {
    pub fn new() -> anyhow::Result<Self> {
        let mut registry = Handlebars::new();
        for (name, source) in PARTIALS {
            registry.register_partial(name, source)?;
        }
        for (name, source) in PAGES {
            registry.register_template_string(name, source)?;
        }
        Ok(Self { registry })
    }

    pub fn render<T: Serialize>(&self, name: &str, context: &T) -> Result<Html<String>, handlebars::RenderError> {
        self.registry.render(name, context).map(Html)
    }
}
