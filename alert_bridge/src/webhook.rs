use anyhow::{anyhow, Context, Result};
use serde_json::{json, Value};
use tiny_http::{Header, Method, Request, Response, Server};
use tokio::runtime::Runtime;

use crate::adapter::AlertAdapter;
use crate::alert::Alert;
use crate::error::AdapterError;
use crate::exchange::Exchange;
use crate::settings::WebhookSettings;

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub body: Value,
}

impl Reply {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }
}

/// Blocking HTTP front end. Requests are served one at a time, so alerts never
/// overlap on the exchange.
pub struct WebhookServer<E> {
    adapter: AlertAdapter<E>,
    settings: WebhookSettings,
}

impl<E: Exchange> WebhookServer<E> {
    pub fn new(adapter: AlertAdapter<E>, settings: WebhookSettings) -> Self {
        Self { adapter, settings }
    }

    pub fn run(&self, rt: &Runtime) -> Result<()> {
        let server = Server::http(&self.settings.bind)
            .map_err(|err| anyhow!("start webhook server on {}: {err}", self.settings.bind))?;
        log::info!("webhook listening on http://{}", self.settings.bind);

        for mut request in server.incoming_requests() {
            let method = request.method().clone();
            let url = request.url().to_string();
            let body = match read_body(&mut request) {
                Ok(body) => body,
                Err(err) => {
                    log::warn!("{method} {url}: {err:#}");
                    respond(request, Reply::error(400, "unreadable body"));
                    continue;
                }
            };

            let reply = rt.block_on(self.route(&method, &url, &body));
            log::info!("{method} {url} -> {}", reply.status);
            respond(request, reply);
        }
        Ok(())
    }

    pub async fn route(&self, method: &Method, url: &str, body: &str) -> Reply {
        let path = url.split('?').next().unwrap_or(url);
        match (method, path) {
            (Method::Get, "/health") => {
                let ready = self.adapter.is_account_ready().await;
                Reply::ok(json!({ "ready": ready }))
            }
            (Method::Get, p) if p.starts_with("/orders/") => {
                let raw = &p["/orders/".len()..];
                match raw.parse::<u32>() {
                    Ok(client_id) => {
                        let filled = self.adapter.is_order_filled(client_id).await;
                        Reply::ok(json!({ "client_id": client_id, "filled": filled }))
                    }
                    Err(_) => Reply::error(400, format!("invalid client id: {raw}")),
                }
            }
            (Method::Post, "/") | (Method::Post, "/webhook") => self.handle_alert(body).await,
            _ => Reply::error(404, "not found"),
        }
    }

    async fn handle_alert(&self, body: &str) -> Reply {
        let alert: Alert = match serde_json::from_str(body) {
            Ok(alert) => alert,
            Err(err) => return Reply::error(400, format!("invalid alert: {err}")),
        };

        if let Some(expected) = self.settings.passphrase.as_deref() {
            if alert.passphrase.as_deref() != Some(expected) {
                log::warn!("rejected alert for {}: passphrase mismatch", alert.market);
                return Reply::error(401, "passphrase mismatch");
            }
        }

        log::info!("alert received: {} {}", alert.order, alert.market);

        if !self.adapter.is_account_ready().await {
            return Reply::error(503, "account is not ready");
        }

        match self.adapter.place_order(&alert).await {
            Ok(result) => match serde_json::to_value(&result) {
                Ok(body) => Reply::ok(body),
                Err(err) => Reply::error(500, err.to_string()),
            },
            Err(err @ AdapterError::InvalidAlert(_)) => Reply::error(400, err.to_string()),
            Err(err) => Reply::error(500, err.to_string()),
        }
    }
}

fn read_body(request: &mut Request) -> Result<String> {
    let mut body = String::new();
    request
        .as_reader()
        .read_to_string(&mut body)
        .context("read request body")?;
    Ok(body)
}

fn respond(request: Request, reply: Reply) {
    let mut response =
        Response::from_string(reply.body.to_string()).with_status_code(reply.status);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        response = response.with_header(header);
    }
    if let Err(err) = request.respond(response) {
        log::warn!("failed to write response: {err}");
    }
}
