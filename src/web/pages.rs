//! Route handlers.

use super::html::{self, escape, money, page};
use super::{charts, AppState, Visit, SESSION_COOKIE};
use crate::error::{ErrorType, Res};
use crate::forecast::{self, ForecastView, DEFAULT_HORIZON, MAX_HORIZON};
use crate::model::date::parse_sheet_date;
use crate::model::{Amount, NewTransaction, Transactions};
use crate::report::{self, MonthSelection};
use crate::session::Flash;
use axum::extract::{Query, State};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use chrono::NaiveDate;
use serde::Deserialize;
use std::fmt::Write;
use std::str::FromStr;
use tracing::{debug, error, info, warn};

/// The number of rows the head and tail views show by default.
const DEFAULT_ROWS: usize = 10;

#[derive(Debug, Deserialize)]
pub(super) struct LoginForm {
    username: String,
    password: String,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct DashboardQuery {
    mes: Option<String>,
}

/// The data page's options. `col` may repeat, so the query is read as pairs.
#[derive(Debug, Default)]
pub(super) struct DataQuery {
    view: Option<String>,
    n: Option<String>,
    columns: Vec<String>,
}

impl DataQuery {
    fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "view" => query.view = Some(value),
                "n" => query.n = Some(value),
                "col" => query.columns.push(value),
                _ => {}
            }
        }
        query
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct EntryForm {
    date: String,
    category: String,
    amount: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct TrendsQuery {
    horizonte: Option<String>,
    visao: Option<String>,
}

pub(super) async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub(super) async fn login_page(State(state): State<AppState>, headers: HeaderMap) -> Response {
    info!("GET /");
    let visit = Visit::start(&state.sessions, &headers).await;
    if visit.session.is_logged_in() {
        return visit.respond(Redirect::to("/painel"));
    }
    let flash = take_flash(&state, &visit).await;
    let body = r#"<form method="post" action="/login" class="inline">
<label>Usuário <input name="username" autocomplete="username" required></label>
<label>Senha <input name="password" type="password" autocomplete="current-password" required></label>
<button type="submit">Entrar</button>
</form>"#;
    let html = page("Entrar", None, flash.as_ref(), body);
    visit.respond(html)
}

pub(super) async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Response {
    info!("POST /login for user '{}'", form.username.trim());
    let visit = Visit::start(&state.sessions, &headers).await;
    let users = state.source.config().users();
    if state
        .sessions
        .login(visit.id, users, &form.username, &form.password)
        .await
    {
        let loaded = state.source.load().await;
        state
            .sessions
            .update(visit.id, |session| match loaded.warning {
                Some(warning) => session.set_flash(Flash::warning(warning)),
                None => session.set_table(loaded.table),
            })
            .await;
        visit.respond(Redirect::to("/painel"))
    } else {
        state
            .sessions
            .update(visit.id, |session| {
                session.set_flash(Flash::error("Usuário ou senha incorretos."))
            })
            .await;
        visit.respond(Redirect::to("/"))
    }
}

pub(super) async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    info!("POST /logout");
    let visit = Visit::start(&state.sessions, &headers).await;
    state.sessions.logout(visit.id).await;
    let mut response = Redirect::to("/").into_response();
    if let Ok(value) = HeaderValue::from_str(&format!("{SESSION_COOKIE}=; Path=/; Max-Age=0")) {
        response.headers_mut().insert(SET_COOKIE, value);
    }
    response
}

pub(super) async fn dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<DashboardQuery>,
) -> Response {
    info!("GET /painel {query:?}");
    let (visit, user) = match logged_in(&state, &headers).await {
        Ok(ok) => ok,
        Err(redirect) => return redirect,
    };
    let (table, mut flash) = refresh(&state, &visit).await;

    let requested = query.mes.unwrap_or_default();
    let selection = match MonthSelection::from_str(&requested) {
        Ok(selection) => selection,
        Err(e) => {
            warn!("Ignoring month selection '{requested}': {e:#}");
            flash = Some(Flash::warning(format!("Mês inválido: {requested}")));
            MonthSelection::All
        }
    };

    let totals = report::monthly_balance(&table, selection);
    let selected = selected_rows(&table, selection);
    let mut body = String::new();
    let _ = write!(
        body,
        r#"<form method="get" action="/painel" class="inline"><label>Mês <select name="mes">{}</select></label><button type="submit">Ver</button></form>"#,
        html::options(report::available_months(&table), &selection.to_string())
    );
    let _ = write!(
        body,
        r#"<div class="cards">{}{}{}</div>"#,
        html::card("Receitas", totals.income, "income"),
        html::card("Despesas", totals.expense, "expense"),
        html::card("Saldo", totals.balance, "balance"),
    );
    let _ = write!(
        body,
        r#"<div class="chart">{}</div>"#,
        chart(charts::expense_pie(&report::expense_by_principal(&selected)))
    );

    body.push_str(
        "<h2>Médias por categoria</h2><table><thead><tr><th>Categoria</th>\
         <th>Média por lançamento</th><th>Média mensal</th></tr></thead><tbody>",
    );
    for label in report::category_labels(&table) {
        let _ = write!(
            body,
            r#"<tr><td>{}</td><td class="num">{}</td><td class="num">{}</td></tr>"#,
            escape(&label),
            money(report::category_average(&table, &label)),
            money(report::detailed_category_monthly_average(&table, &label)),
        );
    }
    body.push_str("</tbody></table>");

    let html = page("Painel", Some(&user), flash.as_ref(), &body);
    visit.respond(html)
}

pub(super) async fn data(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let query = DataQuery::from_pairs(pairs);
    info!("GET /dados {query:?}");
    let (visit, user) = match logged_in(&state, &headers).await {
        Ok(ok) => ok,
        Err(redirect) => return redirect,
    };
    let (table, flash) = refresh(&state, &visit).await;

    let view = query.view.as_deref().unwrap_or("all");
    let n = query
        .n
        .as_deref()
        .and_then(|n| n.trim().parse::<usize>().ok())
        .unwrap_or(DEFAULT_ROWS);
    let rows = match view {
        "head" => table.head(n),
        "tail" => table.tail(n),
        _ => table.data(),
    };
    let columns = html::selected_columns(&query.columns);

    let mut body = String::new();
    let today = chrono::Local::now().date_naive();
    let categories: String = report::category_labels(&table)
        .iter()
        .map(|label| format!(r#"<option value="{}">"#, escape(label)))
        .collect();
    let _ = write!(
        body,
        r#"<h2>Novo lançamento</h2>
<form method="post" action="/dados" class="inline">
<label>Data <input type="date" name="date" value="{today}" required></label>
<label>Categoria <input name="category" list="categorias" required></label>
<datalist id="categorias">{categories}</datalist>
<label>Valor <input name="amount" inputmode="decimal" placeholder="1.234,56" required></label>
<label>Descrição <input name="description"></label>
<button type="submit">Salvar</button>
</form>"#,
        today = today.format("%Y-%m-%d"),
    );
    let _ = write!(
        body,
        r#"<h2>Lançamentos</h2>
<form method="get" action="/dados" class="inline">
<label>Exibir <select name="view">
<option value="all"{}>Todos</option><option value="head"{}>Primeiros</option><option value="tail"{}>Últimos</option>
</select></label>
<label>Linhas <input type="number" name="n" min="1" value="{n}"></label>
<fieldset><legend>Colunas</legend>{}</fieldset>
<button type="submit">Ver</button>
</form>
<p>{} de {} lançamentos. Tabela com {} linhas e {} colunas.</p>"#,
        selected_attr(!matches!(view, "head" | "tail")),
        selected_attr(view == "head"),
        selected_attr(view == "tail"),
        html::column_checkboxes(&columns),
        rows.len(),
        table.len(),
        rows.len(),
        columns.len(),
    );
    body.push_str(&html::transactions_table(rows, &columns));

    let html = page("Dados", Some(&user), flash.as_ref(), &body);
    visit.respond(html)
}

pub(super) async fn append(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<EntryForm>,
) -> Response {
    info!("POST /dados for category '{}'", form.category.trim());
    let (visit, _) = match logged_in(&state, &headers).await {
        Ok(ok) => ok,
        Err(redirect) => return redirect,
    };

    let flash = match new_transaction(&form) {
        Err(message) => Flash::error(message),
        Ok(row) => match state.source.append(&row).await {
            Ok(loaded) => {
                let before = visit.session.table().map_or(0, Transactions::len);
                debug!("The table went from {before} to {} rows", loaded.table.len());
                match loaded.warning {
                    Some(warning) => Flash::warning(warning),
                    None => {
                        state
                            .sessions
                            .update(visit.id, |session| session.set_table(loaded.table))
                            .await;
                        Flash::success("Lançamento salvo com sucesso!")
                    }
                }
            }
            Err(e) if e.error_type() == ErrorType::Validation => Flash::error(e.message()),
            Err(e) => {
                error!("Unable to append a row: {e:#}");
                Flash::error(format!("Não foi possível salvar o lançamento: {e}"))
            }
        },
    };
    state
        .sessions
        .update(visit.id, |session| session.set_flash(flash))
        .await;
    visit.respond(Redirect::to("/dados"))
}

pub(super) async fn trends(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TrendsQuery>,
) -> Response {
    info!("GET /tendencias {query:?}");
    let (visit, user) = match logged_in(&state, &headers).await {
        Ok(ok) => ok,
        Err(redirect) => return redirect,
    };
    let (table, flash) = refresh(&state, &visit).await;
    let trend = report::monthly_trend(&table);

    let mut body = String::new();
    let _ = write!(
        body,
        r#"<div class="chart">{}</div><div class="chart">{}</div>"#,
        chart(charts::trend_lines(&trend)),
        chart(charts::trend_bars(&trend)),
    );
    body.push_str(
        "<table><thead><tr><th>Mês</th><th>Receitas</th><th>Despesas</th><th>Saldo</th></tr>\
         </thead><tbody>",
    );
    for row in &trend {
        let _ = write!(
            body,
            r#"<tr><td>{}</td><td class="num">{}</td><td class="num">{}</td><td class="num">{}</td></tr>"#,
            row.month,
            money(row.income),
            money(row.expense),
            money(row.balance),
        );
    }
    body.push_str("</tbody></table>");

    let view = query
        .visao
        .as_deref()
        .and_then(|v| ForecastView::from_str(v).ok())
        .unwrap_or_default();
    let horizon_text = query.horizonte.clone().unwrap_or_default();
    let view_options: String = ForecastView::ALL
        .iter()
        .map(|v| {
            format!(
                r#"<option value="{v}"{}>{}</option>"#,
                selected_attr(*v == view),
                escape(v.label())
            )
        })
        .collect();
    let _ = write!(
        body,
        r#"<h2>Previsão</h2>
<form method="get" action="/tendencias" class="inline">
<label>Meses <input type="number" name="horizonte" min="1" max="{MAX_HORIZON}" value="{}"></label>
<label>Visão <select name="visao">{view_options}</select></label>
<button type="submit">Prever</button>
</form>"#,
        if horizon_text.is_empty() {
            DEFAULT_HORIZON.to_string()
        } else {
            escape(&horizon_text)
        },
    );

    if query.horizonte.is_some() {
        body.push_str(&forecast_section(&state, &trend, &horizon_text, view));
    }

    let html = page("Tendências", Some(&user), flash.as_ref(), &body);
    visit.respond(html)
}

fn forecast_section(
    state: &AppState,
    trend: &[report::MonthlyTrend],
    horizon: &str,
    view: ForecastView,
) -> String {
    let Ok(horizon) = horizon.trim().parse::<usize>() else {
        return html::flash_html(&Flash::error(format!(
            "Informe um número de meses entre 1 e {MAX_HORIZON}."
        )));
    };
    match forecast::forecast(trend, horizon, &*state.forecaster) {
        Ok(result) => format!(
            r#"<div class="cards">{}{}{}</div><div class="chart">{}</div>"#,
            html::card("Receita prevista", result.projected_income(), "income"),
            html::card("Despesa prevista", result.projected_expense(), "expense"),
            html::card("Saldo previsto", result.projected_balance(), "balance"),
            chart(charts::forecast_lines(&result, view)),
        ),
        Err(e) => {
            warn!("Forecast failed: {e:#}");
            html::flash_html(&Flash::error(format!(
                "Não foi possível gerar a previsão: {}",
                e.message()
            )))
        }
    }
}

/// The visit and user name of a logged-in session, or the redirect to the login page.
async fn logged_in(state: &AppState, headers: &HeaderMap) -> Result<(Visit, String), Response> {
    let visit = Visit::start(&state.sessions, headers).await;
    match visit.session.user().map(str::to_string) {
        Some(user) => Ok((visit, user)),
        None => Err(visit.respond(Redirect::to("/"))),
    }
}

/// The table the page renders and the message to show with it. The session's snapshot is used
/// while it is younger than the cache window. Otherwise the table is loaded again and becomes the
/// new snapshot, unless the load failed, in which case the page shows an empty table and the
/// connectivity warning.
async fn refresh(state: &AppState, visit: &Visit) -> (Transactions, Option<Flash>) {
    if let Some(table) = visit.session.fresh_table(state.source.config().cache_ttl()) {
        return (table.clone(), take_flash(state, visit).await);
    }
    let loaded = state.source.load().await;
    let pending = state
        .sessions
        .update(visit.id, |session| {
            if loaded.warning.is_none() {
                session.set_table(loaded.table.clone());
            }
            session.take_flash()
        })
        .await
        .flatten();
    (loaded.table, pending.or(loaded.warning.map(Flash::warning)))
}

async fn take_flash(state: &AppState, visit: &Visit) -> Option<Flash> {
    state
        .sessions
        .update(visit.id, |session| session.take_flash())
        .await
        .flatten()
}

fn selected_rows(table: &Transactions, selection: MonthSelection) -> Transactions {
    match selection {
        MonthSelection::All => table.clone(),
        MonthSelection::Month(month) => Transactions::from_data(
            table
                .iter()
                .filter(|t| t.month() == month)
                .cloned()
                .collect(),
        ),
    }
}

fn selected_attr(selected: bool) -> &'static str {
    if selected {
        " selected"
    } else {
        ""
    }
}

fn chart(svg: Res<String>) -> String {
    match svg {
        Ok(svg) => svg,
        Err(e) => {
            error!("Unable to draw a chart: {e:#}");
            "<p>Não foi possível desenhar o gráfico.</p>".to_string()
        }
    }
}

/// Builds the row from the entry form, or the message explaining what is wrong with it.
fn new_transaction(form: &EntryForm) -> std::result::Result<NewTransaction, String> {
    let date = parse_form_date(&form.date)
        .ok_or_else(|| format!("Data inválida: {}", form.date.trim()))?;
    let amount = parse_form_amount(&form.amount)
        .ok_or_else(|| format!("Valor inválido: {}", form.amount.trim()))?;
    Ok(NewTransaction {
        date,
        category: form.category.trim().to_string(),
        amount,
        description: form.description.trim().to_string(),
    })
}

/// Accepts the ISO date of a date input, or a `DD/MM/YYYY` date typed by hand.
fn parse_form_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_sheet_date(raw))
}

/// Reads the value the way sheet cells are read, so `1.500` is one thousand five hundred and
/// `12,50` has cents.
fn parse_form_amount(raw: &str) -> Option<Amount> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    Amount::from_str(raw).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Mode, TestSheetState};
    use crate::source::DataSource;
    use crate::test::{TestEnv, TEST_PASSWORD, TEST_USER};
    use crate::web::router;
    use axum::body::Body;
    use axum::http::header::{CONTENT_TYPE, COOKIE, LOCATION};
    use axum::http::Request;
    use axum::Router;
    use tower::ServiceExt;

    async fn app() -> (TestEnv, Router) {
        let (env, state) = app_state().await;
        (env, router(state))
    }

    async fn app_state() -> (TestEnv, AppState) {
        let env = TestEnv::new().await;
        let source = DataSource::new(env.config(), Mode::Test);
        (env, AppState::new(source))
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn post(uri: &str, cookie: Option<&str>, form: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        builder.body(Body::from(form.to_string())).unwrap()
    }

    async fn body(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn location(response: &Response) -> &str {
        response.headers()[LOCATION].to_str().unwrap()
    }

    /// Logs in and returns the `Cookie` header value for the session.
    async fn login_cookie(app: &Router) -> String {
        let form = format!("username={TEST_USER}&password={TEST_PASSWORD}");
        let response = app
            .clone()
            .oneshot(post("/login", None, &form))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/painel");
        let set_cookie = response.headers()[SET_COOKIE].to_str().unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let (_env, app) = app().await;
        let response = app.oneshot(get("/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(response).await, "ok");
    }

    #[tokio::test]
    async fn test_protected_pages_redirect_without_session() {
        let (_env, app) = app().await;
        for uri in ["/painel", "/dados", "/tendencias?horizonte=3"] {
            let response = app.clone().oneshot(get(uri, None)).await.unwrap();
            assert_eq!(response.status(), StatusCode::SEE_OTHER, "{uri}");
            assert_eq!(location(&response), "/", "{uri}");
        }
        let response = app
            .oneshot(post("/dados", None, "date=2024-06-01&category=Luz&amount=10"))
            .await
            .unwrap();
        assert_eq!(location(&response), "/");
    }

    #[tokio::test]
    async fn test_wrong_password_is_not_logged_in() {
        let (_env, app) = app().await;
        let form = format!("username={TEST_USER}&password=errada");
        let response = app
            .clone()
            .oneshot(post("/login", None, &form))
            .await
            .unwrap();
        assert_eq!(location(&response), "/");
        let set_cookie = response.headers()[SET_COOKIE].to_str().unwrap();
        let cookie = set_cookie.split(';').next().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(get("/painel", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(location(&response), "/");

        let response = app.oneshot(get("/", Some(&cookie))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body(response).await.contains("Usuário ou senha incorretos."));
    }

    #[tokio::test]
    async fn test_dashboard() {
        let (_env, app) = app().await;
        let cookie = login_cookie(&app).await;

        let response = app
            .clone()
            .oneshot(get("/painel", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body(response).await;
        assert!(html.contains("Saldo Atual"));
        assert!(html.contains("Feb/2024"));
        assert!(html.contains("<svg"));
        assert!(html.contains("Médias por categoria"));

        let response = app
            .clone()
            .oneshot(get("/painel?mes=Feb%2F2024", Some(&cookie)))
            .await
            .unwrap();
        let html = body(response).await;
        assert!(html.contains(r#"<option value="Feb/2024" selected>"#));

        let response = app
            .oneshot(get("/painel?mes=Foo", Some(&cookie)))
            .await
            .unwrap();
        assert!(body(response).await.contains("Mês inválido"));
    }

    #[tokio::test]
    async fn test_login_page_redirects_when_logged_in() {
        let (_env, app) = app().await;
        let cookie = login_cookie(&app).await;
        let response = app.oneshot(get("/", Some(&cookie))).await.unwrap();
        assert_eq!(location(&response), "/painel");
    }

    #[tokio::test]
    async fn test_append_row() {
        let (env, app) = app().await;
        let cookie = login_cookie(&app).await;

        let response = app
            .clone()
            .oneshot(post(
                "/dados",
                Some(&cookie),
                "date=2024-06-03&category=Dentista&amount=1.250%2C75&description=limpeza",
            ))
            .await
            .unwrap();
        assert_eq!(location(&response), "/dados");

        let response = app
            .oneshot(get("/dados?view=tail&n=1", Some(&cookie)))
            .await
            .unwrap();
        let html = body(response).await;
        assert!(html.contains("Lançamento salvo com sucesso!"));
        assert!(html.contains("limpeza"));
        assert!(html.contains("03/06/2024"));

        let rows = env.get_state().worksheets[env.config().worksheet()].clone();
        assert_eq!(
            rows.last().unwrap(),
            &vec!["03/06/2024", "Dentista", "1250,75", "limpeza"]
        );
    }

    #[tokio::test]
    async fn test_append_rejects_bad_input() {
        let (env, app) = app().await;
        let cookie = login_cookie(&app).await;
        let before = env.get_state().worksheets[env.config().worksheet()].len();

        for (form, message) in [
            ("date=2024-06-03&category=Luz&amount=0", "O valor deve ser maior que zero."),
            ("date=2024-06-03&category=&amount=10", "Selecione uma categoria."),
            ("date=ontem&category=Luz&amount=10", "Data inválida"),
            ("date=2024-06-03&category=Luz&amount=dez", "Valor inválido"),
        ] {
            let response = app
                .clone()
                .oneshot(post("/dados", Some(&cookie), form))
                .await
                .unwrap();
            assert_eq!(location(&response), "/dados");
            let response = app
                .clone()
                .oneshot(get("/dados", Some(&cookie)))
                .await
                .unwrap();
            assert!(body(response).await.contains(message), "{form}");
        }
        assert_eq!(
            env.get_state().worksheets[env.config().worksheet()].len(),
            before
        );
    }

    #[tokio::test]
    async fn test_offline_sheet_shows_warning() {
        let (env, app) = app().await;
        env.set_state(TestSheetState {
            offline: true,
            ..Default::default()
        });
        let cookie = login_cookie(&app).await;
        let response = app
            .oneshot(get("/painel", Some(&cookie)))
            .await
            .unwrap();
        let html = body(response).await;
        assert!(html.contains(crate::source::CONNECTIVITY_WARNING));
        assert!(html.contains("R$ 0,00"));
    }

    #[tokio::test]
    async fn test_trends_and_forecast() {
        let (_env, app) = app().await;
        let cookie = login_cookie(&app).await;

        let response = app
            .clone()
            .oneshot(get("/tendencias", Some(&cookie)))
            .await
            .unwrap();
        let html = body(response).await;
        assert!(html.contains("Evolução mensal"));
        assert!(!html.contains("Receita prevista"));

        let response = app
            .clone()
            .oneshot(get("/tendencias?horizonte=3&visao=balance", Some(&cookie)))
            .await
            .unwrap();
        let html = body(response).await;
        assert!(html.contains("Receita prevista"));
        assert!(html.contains("Saldo Líquido"));

        let response = app
            .oneshot(get("/tendencias?horizonte=99", Some(&cookie)))
            .await
            .unwrap();
        assert!(body(response).await.contains("Não foi possível gerar a previsão"));
    }

    #[tokio::test]
    async fn test_logout() {
        let (_env, app) = app().await;
        let cookie = login_cookie(&app).await;
        let response = app
            .clone()
            .oneshot(post("/logout", Some(&cookie), ""))
            .await
            .unwrap();
        assert_eq!(location(&response), "/");
        let response = app.oneshot(get("/painel", Some(&cookie))).await.unwrap();
        assert_eq!(location(&response), "/");
    }

    #[test]
    fn test_parse_form_amount() {
        let expect = |s: &str| Amount::from_str(s).unwrap();
        assert_eq!(parse_form_amount("1.250,75"), Some(expect("1250,75")));
        assert_eq!(parse_form_amount(" 30 "), Some(expect("30")));
        assert_eq!(parse_form_amount("R$ 12,50"), Some(expect("12,50")));
        assert_eq!(parse_form_amount(""), None);
        assert_eq!(parse_form_amount("dez"), None);
    }

    #[test]
    fn test_form_amount_matches_sheet_reading() {
        for raw in ["1.500", "1.500,00", "12,5", "R$ 2.000.000,10", "7"] {
            assert_eq!(
                parse_form_amount(raw),
                Some(Amount::normalize(Some(raw))),
                "{raw}"
            );
        }
        assert_eq!(
            parse_form_amount("1.500").map(|a| a.to_string()),
            Some("R$ 1.500,00".to_string())
        );
    }

    #[test]
    fn test_parse_form_date() {
        let june = NaiveDate::from_ymd_opt(2024, 6, 3);
        assert_eq!(parse_form_date("2024-06-03"), june);
        assert_eq!(parse_form_date("03/06/2024"), june);
        assert_eq!(parse_form_date("03/06/24"), june);
        assert_eq!(parse_form_date("31/04/2024"), None);
    }

    #[tokio::test]
    async fn test_anonymous_requests_keep_no_sessions() {
        let (_env, state) = app_state().await;
        let app = router(state.clone());
        for _ in 0..200 {
            let response = app.clone().oneshot(get("/", None)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let response = app.clone().oneshot(get("/painel", None)).await.unwrap();
            assert_eq!(location(&response), "/");
        }
        assert_eq!(state.sessions.len().await, 0);

        login_cookie(&app).await;
        assert_eq!(state.sessions.len().await, 1);
    }

    #[tokio::test]
    async fn test_pages_render_the_session_snapshot() {
        let (env, state) = app_state().await;
        let app = router(state.clone());
        let cookie = login_cookie(&app).await;

        env.set_rows(&[
            &["Data", "Categorias", "Valor", "Descrição"],
            &["01/05/24", "Luz", "10,00", "conta nova"],
        ]);
        state.source.invalidate().await;

        let response = app
            .clone()
            .oneshot(get("/dados", Some(&cookie)))
            .await
            .unwrap();
        let html = body(response).await;
        assert!(!html.contains("conta nova"));

        let other = login_cookie(&app).await;
        let response = app.oneshot(get("/dados", Some(&other))).await.unwrap();
        let html = body(response).await;
        assert!(html.contains("conta nova"));
        assert!(html.contains("1 de 1 lançamentos."));
    }

    #[tokio::test]
    async fn test_data_columns_and_shape() {
        let (env, app) = app().await;
        env.set_rows(&[
            &["Data", "Categorias", "Valor", "Descrição"],
            &["01/05/24", "Luz", "10,00", "maio"],
            &["01/06/24", "Luz", "12,00", "junho"],
        ]);
        let cookie = login_cookie(&app).await;

        let response = app
            .clone()
            .oneshot(get("/dados?view=all&col=Data&col=Valor", Some(&cookie)))
            .await
            .unwrap();
        let html = body(response).await;
        assert!(html.contains("<thead><tr><th>Data</th><th>Valor</th></tr></thead>"));
        assert!(!html.contains("junho"));
        assert!(html.contains("Tabela com 2 linhas e 2 colunas."));

        let response = app
            .oneshot(get("/dados?view=head&n=1", Some(&cookie)))
            .await
            .unwrap();
        let html = body(response).await;
        assert!(html.contains("<th>Descrição</th>"));
        assert!(html.contains("Tabela com 1 linhas e 6 colunas."));
    }

    #[tokio::test]
    async fn test_login_ignores_password_whitespace() {
        let (_env, app) = app().await;
        let form = format!("username={TEST_USER}&password=%20{TEST_PASSWORD}%20");
        let response = app.oneshot(post("/login", None, &form)).await.unwrap();
        assert_eq!(location(&response), "/painel");
    }
}
