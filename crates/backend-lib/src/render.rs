// ============================
// enrol-backend-lib/src/render.rs
// ============================
//! Page rendering.
//!
//! Handlers only name a template and pass a variable map; the [`Renderer`]
//! decides what markup comes out. [`BuiltinRenderer`] ships the three pages
//! the service needs as plain HTML.
use serde_json::{Map, Value};

use crate::config::SiteSettings;
use crate::error::AppError;

pub const SIGNUP_FORM: &str = "auth/signup_form.html";
pub const LOGIN_FORM: &str = "auth/login_form.html";
pub const INDEX: &str = "public/index.html";

/// Template-rendering collaborator
pub trait Renderer: Send + Sync {
    fn render(&self, template: &str, vars: &Map<String, Value>) -> Result<String, AppError>;
}

/// Renderer with the pages compiled in
#[derive(Debug, Clone)]
pub struct BuiltinRenderer {
    globals: Map<String, Value>,
}

impl BuiltinRenderer {
    pub fn new(site: &SiteSettings) -> Self {
        let mut globals = Map::new();
        globals.insert("app_name".into(), site.app_name.clone().into());
        globals.insert("environment".into(), site.environment.clone().into());
        globals.insert("domain".into(), site.domain.clone().into());
        globals.insert("app_version".into(), site.app_version.clone().into());
        Self { globals }
    }

    fn lookup<'a>(&'a self, vars: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
        vars.get(key).or_else(|| self.globals.get(key))
    }

    fn text(&self, vars: &Map<String, Value>, key: &str) -> String {
        match self.lookup(vars, key) {
            Some(Value::String(s)) => escape(s),
            Some(Value::Null) | None => String::new(),
            Some(other) => escape(&other.to_string()),
        }
    }

    fn layout(&self, vars: &Map<String, Value>, title: &str, content: &str) -> String {
        let app_name = self.text(vars, "app_name");
        let version = self.text(vars, "app_version");
        let environment = self.text(vars, "environment");
        format!(
            "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title} - {app_name}</title></head>\n<body>\n<header><a href=\"/\">{app_name}</a></header>\n{flashes}<main>\n{content}</main>\n<footer>{app_name} {version} ({environment})</footer>\n</body>\n</html>\n",
            flashes = self.flashes(vars),
        )
    }

    fn flashes(&self, vars: &Map<String, Value>) -> String {
        let Some(Value::Array(items)) = vars.get("flashes") else {
            return String::new();
        };
        let mut out = String::from("<ul class=\"flashes\">\n");
        for item in items {
            let level = item.get("level").and_then(Value::as_str).unwrap_or("info");
            let message = item.get("message").and_then(Value::as_str).unwrap_or_default();
            out.push_str(&format!(
                "<li class=\"flash {}\">{}</li>\n",
                escape(level),
                escape(message)
            ));
        }
        out.push_str("</ul>\n");
        out
    }

    fn error_line(&self, vars: &Map<String, Value>) -> String {
        let error = self.text(vars, "error");
        if error.is_empty() {
            String::new()
        } else {
            format!("<p class=\"error\">{error}</p>\n")
        }
    }

    fn signup_form(&self, vars: &Map<String, Value>) -> String {
        let content = format!(
            "<h1>Sign up</h1>\n{error}<form method=\"post\" action=\"/signup/\">\n\
             <label>Email <input type=\"email\" name=\"email\" value=\"{email}\" required></label>\n\
             <label>Password <input type=\"password\" name=\"password\" required></label>\n\
             <label>Name <input type=\"text\" name=\"name\" value=\"{name}\" required></label>\n\
             <label>Surname <input type=\"text\" name=\"surname\" value=\"{surname}\" required></label>\n\
             <button type=\"submit\">Sign up</button>\n</form>\n\
             <p>Already registered? <a href=\"/login\">Log in</a></p>\n",
            error = self.error_line(vars),
            email = self.text(vars, "email"),
            name = self.text(vars, "name"),
            surname = self.text(vars, "surname"),
        );
        self.layout(vars, "Sign up", &content)
    }

    fn login_form(&self, vars: &Map<String, Value>) -> String {
        let content = format!(
            "<h1>Log in</h1>\n{error}<form method=\"post\" action=\"/login\">\n\
             <label>Email <input type=\"email\" name=\"email\" value=\"{email}\" required></label>\n\
             <label>Password <input type=\"password\" name=\"password\" required></label>\n\
             <button type=\"submit\">Log in</button>\n</form>\n\
             <p>No account yet? <a href=\"/signup/\">Sign up</a></p>\n",
            error = self.error_line(vars),
            email = self.text(vars, "email"),
        );
        self.layout(vars, "Log in", &content)
    }

    fn index(&self, vars: &Map<String, Value>) -> String {
        let content = match vars.get("user") {
            Some(user @ Value::Object(_)) => {
                let field = |key: &str| escape(user.get(key).and_then(Value::as_str).unwrap_or_default());
                format!(
                    "<h1>Welcome, {} {}</h1>\n<p>Signed in as {}.</p>\n<p><a href=\"/logout\">Log out</a></p>\n",
                    field("name"),
                    field("surname"),
                    field("email"),
                )
            },
            _ => "<h1>Welcome</h1>\n<p><a href=\"/signup/\">Sign up</a> or <a href=\"/login\">log in</a>.</p>\n"
                .to_string(),
        };
        self.layout(vars, "Home", &content)
    }
}

impl Renderer for BuiltinRenderer {
    fn render(&self, template: &str, vars: &Map<String, Value>) -> Result<String, AppError> {
        match template {
            SIGNUP_FORM => Ok(self.signup_form(vars)),
            LOGIN_FORM => Ok(self.login_form(vars)),
            INDEX => Ok(self.index(vars)),
            other => Err(AppError::Internal(format!("unknown template `{other}`"))),
        }
    }
}

/// Escape text for use in HTML content and quoted attributes
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
