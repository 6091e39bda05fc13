//! Standalone HTML document around a rendered note.

use crate::error::{Error, Result};

use minijinja::{Environment, context};

const TEMPLATE_NAME: &str = "note.html";

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{{ title }}</title>
</head>
<body>
<article>
{{ body|safe }}
</article>
</body>
</html>
"#;

const UNTITLED: &str = "Untitled";

/// Wraps sanitized fragments in a minimal document. The title is escaped.
#[derive(Debug)]
pub struct DocumentShell {
    env: Environment<'static>,
}

impl DocumentShell {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template(TEMPLATE_NAME, TEMPLATE)
            .map_err(|e| Error::Internal(e.into()))?;
        Ok(Self { env })
    }

    /// `body` must already be sanitized.
    pub fn wrap(&self, title: &str, body: &str) -> Result<String> {
        let title = match title.trim() {
            "" => UNTITLED,
            trimmed => trimmed,
        };
        self.env
            .get_template(TEMPLATE_NAME)
            .and_then(|template| template.render(context! { title, body }))
            .map_err(|e| Error::Internal(e.into()))
    }
}
