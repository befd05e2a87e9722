//! HTML building blocks shared by the pages.

use crate::model::{Amount, Transaction, SHEET_HEADERS};
use crate::session::{Flash, FlashKind};
use axum::response::Html;
use rust_decimal::Decimal;
use std::fmt::Write;

const STYLE: &str = r#"
body { font-family: sans-serif; margin: 0; background: #f5f6f8; color: #222; }
nav { background: #075eb2; padding: 0.8em 1.5em; display: flex; gap: 1.2em; align-items: center; }
nav a, nav span { color: white; text-decoration: none; }
nav form { margin-left: auto; }
main { max-width: 960px; margin: 1.5em auto; padding: 0 1em; }
.cards { display: flex; gap: 1em; margin: 1em 0; }
.card { flex: 1; background: white; border-radius: 6px; padding: 1em; box-shadow: 0 1px 3px #ccc; }
.card .value { font-size: 1.5em; font-weight: bold; }
.income { color: #2ecc71; } .expense { color: #e74c3c; } .balance { color: #075eb2; }
.flash { padding: 0.8em 1em; border-radius: 6px; margin: 1em 0; }
.flash.success { background: #d4efdf; } .flash.warning { background: #fcf3cf; }
.flash.error { background: #f5b7b1; }
table { border-collapse: collapse; background: white; width: 100%; }
th, td { border-bottom: 1px solid #ddd; padding: 0.4em 0.6em; text-align: left; }
td.num { text-align: right; }
form.inline { display: flex; gap: 0.6em; align-items: end; flex-wrap: wrap; margin: 1em 0; }
label { display: flex; flex-direction: column; font-size: 0.9em; }
.chart { background: white; margin: 1em 0; }
"#;

/// Escapes text for use in element content and quoted attributes.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// A currency value as `R$ 1.234,56`.
pub fn money(value: Decimal) -> String {
    Amount::from(value).to_string()
}

/// Wraps `body` in the common layout. The navigation bar only appears for a logged-in `user`.
pub fn page(title: &str, user: Option<&str>, flash: Option<&Flash>, body: &str) -> Html<String> {
    let nav = match user {
        Some(user) => format!(
            r#"<nav><a href="/painel">Painel</a><a href="/dados">Dados</a><a href="/tendencias">Tendências</a>
<form method="post" action="/logout"><span>{}</span> <button type="submit">Sair</button></form></nav>"#,
            escape(user)
        ),
        None => String::new(),
    };
    let flash = flash.map(flash_html).unwrap_or_default();
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="pt-BR">
<head><meta charset="utf-8"><title>{title} | Finanças da Casa</title><style>{STYLE}</style></head>
<body>
{nav}
<main>
<h1>{title}</h1>
{flash}
{body}
</main>
</body>
</html>"#,
        title = escape(title),
    ))
}

pub fn flash_html(flash: &Flash) -> String {
    let class = match flash.kind {
        FlashKind::Success => "success",
        FlashKind::Warning => "warning",
        FlashKind::Error => "error",
    };
    format!(
        r#"<div class="flash {class}">{}</div>"#,
        escape(&flash.message)
    )
}

/// A metric card. `class` picks the value colour.
pub fn card(label: &str, value: Decimal, class: &str) -> String {
    format!(
        r#"<div class="card"><div>{}</div><div class="value {class}">{}</div></div>"#,
        escape(label),
        escape(&money(value))
    )
}

/// `<option>` elements for `values`, with `selected` marked.
pub fn options<T: ToString>(values: impl IntoIterator<Item = T>, selected: &str) -> String {
    let mut out = String::new();
    for value in values {
        let value = escape(&value.to_string());
        let mark = if value == escape(selected) { " selected" } else { "" };
        let _ = write!(out, r#"<option value="{value}"{mark}>{value}</option>"#);
    }
    out
}

/// The columns the data page can show, in display order: the sheet's own, then the derived ones.
pub fn table_columns() -> Vec<&'static str> {
    SHEET_HEADERS.into_iter().chain(["Grupo", "Tipo"]).collect()
}

/// The known columns among `requested`, in display order. Nothing requested means every column.
pub fn selected_columns(requested: &[String]) -> Vec<&'static str> {
    let all = table_columns();
    let chosen: Vec<&'static str> = all
        .iter()
        .copied()
        .filter(|column| requested.iter().any(|r| r.trim() == *column))
        .collect();
    if chosen.is_empty() {
        all
    } else {
        chosen
    }
}

/// One `col` checkbox per column, checked when it is in `selected`.
pub fn column_checkboxes(selected: &[&str]) -> String {
    let mut out = String::new();
    for column in table_columns() {
        let mark = if selected.contains(&column) { " checked" } else { "" };
        let _ = write!(
            out,
            r#"<label><input type="checkbox" name="col" value="{0}"{mark}> {0}</label>"#,
            escape(column)
        );
    }
    out
}

fn cell(t: &Transaction, column: &str) -> String {
    match column {
        "Data" => format!("<td>{}</td>", t.date().format("%d/%m/%Y")),
        "Categorias" => format!("<td>{}</td>", escape(t.category())),
        "Valor" => format!(r#"<td class="num">{}</td>"#, escape(&t.amount().to_string())),
        "Descrição" => format!("<td>{}</td>", escape(t.description().unwrap_or_default())),
        "Grupo" => format!("<td>{}</td>", escape(t.principal())),
        "Tipo" => format!("<td>{}</td>", t.flow()),
        _ => "<td></td>".to_string(),
    }
}

/// The raw transaction rows as a table of `columns`.
pub fn transactions_table(rows: &[Transaction], columns: &[&str]) -> String {
    if rows.is_empty() {
        return "<p>Nenhum lançamento encontrado.</p>".to_string();
    }
    let mut out = String::from("<table><thead><tr>");
    for column in columns {
        let _ = write!(out, "<th>{}</th>", escape(column));
    }
    out.push_str("</tr></thead><tbody>");
    for t in rows {
        out.push_str("<tr>");
        for column in columns {
            out.push_str(&cell(t, column));
        }
        out.push_str("</tr>");
    }
    out.push_str("</tbody></table>");
    out
}
