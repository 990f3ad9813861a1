//! Login page rendering. The page is a single self-contained document: the
//! client's labels, the CSRF hidden field and one button per connector.

use crate::clients::Client;

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn render(client: &Client, csrf_token: &str) -> String {
    let labels = &client.login_page;

    let mut connector_buttons = String::new();
    for connector in &client.connectors {
        connector_buttons.push_str(&format!(
            r#"      <a class="connector" href="/{id}/login" style="--c: {color}; --c-hover: {color_hover};">{icon} {connect_with} {name}</a>
"#,
            id = escape(&connector.id),
            color = connector.color,
            color_hover = connector.color_hover,
            icon = connector.icon_html,
            connect_with = escape(&labels.connect_with),
            name = escape(&connector.name),
        ));
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>
    <style>
      body {{ font-family: system-ui, sans-serif; display: flex; justify-content: center; padding-top: 4rem; }}
      main {{ width: 20rem; }}
      label {{ display: block; margin-top: 1rem; }}
      input {{ width: 100%; padding: .5rem; margin-top: .25rem; box-sizing: border-box; }}
      button {{ width: 100%; margin-top: 1.5rem; padding: .6rem; }}
      .connector {{ display: block; margin-top: .75rem; padding: .6rem; text-align: center; color: white; text-decoration: none; background-color: var(--c); }}
      .connector:hover {{ background-color: var(--c-hover); }}
    </style>
  </head>
  <body>
    <main>
      <h1>{title}</h1>
      <form method="post" action="/authorize">
        <input type="hidden" name="csrf_token" value="{csrf_token}">
        <label>{email_label}
          <input type="email" name="email" autocomplete="username" required>
        </label>
        <label>{password_label}
          <input type="password" name="password" autocomplete="current-password" required>
        </label>
        <button type="submit">{submit_label}</button>
      </form>
{connector_buttons}    </main>
  </body>
</html>
"#,
        title = escape(&labels.title),
        csrf_token = escape(csrf_token),
        email_label = escape(&labels.email),
        password_label = escape(&labels.password),
        submit_label = escape(&labels.submit),
        connector_buttons = connector_buttons,
    )
}
