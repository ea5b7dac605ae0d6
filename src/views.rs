#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{error, info};
use poem::http::StatusCode;
use poem::web::{Data, Form, Html, Path};
use poem::handler;
use tera::{Context, Tera};

use crate::utils::errors::StoreError;
use crate::utils::record_types::UserRecord;
use crate::utils::user_store::UserRecordStore;

// ***************************************************************************
//                                Templates
// ***************************************************************************
const LAYOUT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>{{ title }}</title>
  <link rel="stylesheet" href="/static/style.css">
</head>
<body>
  <h1><a href="/">{{ title }}</a></h1>
  {% block content %}{% endblock content %}
</body>
</html>
"#;

const INDEX_TEMPLATE: &str = r#"{% extends "layout.html" %}
{% block content %}
{% if users %}
<ul class="users">
{% for user in users %}
  <li><a href="/{{ user.username }}">{{ user.name.full }}</a></li>
{% endfor %}
</ul>
{% else %}
<p>No users.</p>
{% endif %}
{% endblock content %}
"#;

const USER_TEMPLATE: &str = r#"{% extends "layout.html" %}
{% block content %}
<h2>{{ user.name.full }}</h2>
<p class="username">{{ user.username }}</p>
<dl class="location">
{% for field, value in user.location %}
  <dt>{{ field }}</dt><dd>{{ value }}</dd>
{% endfor %}
</dl>
{% endblock content %}
"#;

// ***************************************************************************
//                                  Views
// ***************************************************************************
/** Renders records as HTML pages.  The store hands over plain records; all
 * markup lives in the templates above.
 */
#[derive(Debug)]
pub struct Views {
    tera: Tera,
    title: String,
}

impl Views {
    pub fn new(title: &str) -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            ("layout.html", LAYOUT_TEMPLATE),
            ("index.html", INDEX_TEMPLATE),
            ("user.html", USER_TEMPLATE),
        ])?;
        Ok(Self {tera, title: title.to_string()})
    }

    pub fn render_index(&self, users: &[UserRecord]) -> Result<String, tera::Error> {
        let mut ctx = Context::new();
        ctx.insert("title", &self.title);
        ctx.insert("users", users);
        self.tera.render("index.html", &ctx)
    }

    pub fn render_user(&self, user: &UserRecord) -> Result<String, tera::Error> {
        let mut ctx = Context::new();
        ctx.insert("title", &self.title);
        ctx.insert("user", user);
        self.tera.render("user.html", &ctx)
    }
}

// ***************************************************************************
//                                Handlers
// ***************************************************************************
// ---------------------------------------------------------------------------
// index:
// ---------------------------------------------------------------------------
#[handler]
pub async fn index(store: Data<&Arc<UserRecordStore>>, views: Data<&Arc<Views>>)
-> poem::Result<Html<String>> {
    let users = store.list_all().await.map_err(store_error)?;
    let page = views.render_index(&users).map_err(render_error)?;
    Ok(Html(page))
}

// ---------------------------------------------------------------------------
// show:
// ---------------------------------------------------------------------------
#[handler]
pub async fn show(Path(username): Path<String>, store: Data<&Arc<UserRecordStore>>,
                  views: Data<&Arc<Views>>) -> poem::Result<Html<String>> {
    let user = store.read_one(&username).await.map_err(store_error)?;
    let page = views.render_user(&user).map_err(render_error)?;
    Ok(Html(page))
}

// ---------------------------------------------------------------------------
// update:
// ---------------------------------------------------------------------------
/** The form fields become the user's new location. */
#[handler]
pub async fn update(Path(username): Path<String>, Form(location): Form<BTreeMap<String, String>>,
                    store: Data<&Arc<UserRecordStore>>) -> poem::Result<StatusCode> {
    store.update_location(&username, location).await.map_err(store_error)?;
    info!("Location of user {} updated from form.", username);
    Ok(StatusCode::OK)
}

// ---------------------------------------------------------------------------
// remove:
// ---------------------------------------------------------------------------
#[handler]
pub async fn remove(Path(username): Path<String>, store: Data<&Arc<UserRecordStore>>)
-> poem::Result<StatusCode> {
    store.delete_user(&username).await.map_err(store_error)?;
    Ok(StatusCode::OK)
}

// ***************************************************************************
//                          Private Functions
// ***************************************************************************
fn store_error(e: StoreError) -> poem::Error {
    let status = StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status != StatusCode::NOT_FOUND {
        error!("ERROR: {}", e);
    }
    poem::Error::from_string(e.to_string(), status)
}

fn render_error(e: tera::Error) -> poem::Error {
    let msg = format!("ERROR: template rendering failed: {:?}", e);
    error!("{}", msg);
    poem::Error::from_string(msg, StatusCode::INTERNAL_SERVER_ERROR)
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::record_types::FullName;

    fn alice() -> UserRecord {
        UserRecord {
            username: "alice".to_string(),
            name: FullName {first: "alice".to_string(), last: "smith".to_string(), full: "Alice Smith".to_string()},
            location: [("city".to_string(), "Nyc".to_string())].into_iter().collect(),
        }
    }

    #[test]
    fn index_lists_full_names() {
        let views = Views::new("Directory").unwrap();
        let page = views.render_index(&[alice()]).unwrap();
        assert!(page.contains("<title>Directory</title>"));
        assert!(page.contains(r#"<a href="/alice">Alice Smith</a>"#));
    }

    #[test]
    fn empty_index() {
        let views = Views::new("Directory").unwrap();
        let page = views.render_index(&[]).unwrap();
        assert!(page.contains("No users."));
    }

    #[test]
    fn user_page_shows_location() {
        let views = Views::new("Directory").unwrap();
        let page = views.render_user(&alice()).unwrap();
        assert!(page.contains("<h2>Alice Smith</h2>"));
        assert!(page.contains("<dt>city</dt><dd>Nyc</dd>"));
    }

    #[test]
    fn user_page_escapes_values() {
        let views = Views::new("Directory").unwrap();
        let mut user = alice();
        user.location.insert("street".to_string(), "<B>".to_string());
        let page = views.render_user(&user).unwrap();
        assert!(page.contains("&lt;B&gt;"));
        assert!(!page.contains("<B>"));
    }
}
