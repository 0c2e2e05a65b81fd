//! Embedded web dashboard
//!
//! A small static UI for deploying and inspecting containers, served from
//! string constants so the binary ships self-contained. It talks to the
//! /api/v1/containers endpoints from the browser.

use crate::error::{full, HttpBody};
use hyper::header::CONTENT_TYPE;
use hyper::{Response, StatusCode};

/// Serve the dashboard HTML
pub fn serve_dashboard() -> Response<HttpBody> {
    static_response("text/html; charset=utf-8", DASHBOARD_HTML)
}

/// Serve dashboard CSS
pub fn serve_css() -> Response<HttpBody> {
    static_response("text/css", DASHBOARD_CSS)
}

/// Serve dashboard JavaScript
pub fn serve_js() -> Response<HttpBody> {
    static_response("application/javascript", DASHBOARD_JS)
}

fn static_response(content_type: &'static str, body: &'static str) -> Response<HttpBody> {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type)
        .body(full(body))
        .expect("valid response with static headers")
}

const DASHBOARD_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Lightship</title>
    <link rel="stylesheet" href="/style.css">
</head>
<body>
    <nav class="navbar">
        <h1>&#9973; Lightship</h1>
        <button class="btn btn-primary" onclick="showDeployForm()">Deploy</button>
    </nav>

    <main>
        <section id="deploy-form" class="card hidden">
            <h2>Deploy a container</h2>
            <label>Image
                <input type="text" id="deploy-image" placeholder="nginx:latest">
            </label>
            <label>Git repository (optional, built instead of pulled)
                <input type="text" id="deploy-repo" placeholder="https://github.com/user/app.git">
            </label>
            <label>Name (optional, becomes the subdomain)
                <input type="text" id="deploy-name" placeholder="my-app">
            </label>
            <div class="actions">
                <button class="btn btn-primary" onclick="deploy()">Deploy</button>
                <button class="btn" onclick="hideDeployForm()">Cancel</button>
            </div>
            <p id="deploy-status"></p>
        </section>

        <section class="card">
            <h2>Containers</h2>
            <table id="containers">
                <thead>
                    <tr>
                        <th>Name</th><th>Image</th><th>State</th>
                        <th>Backend</th><th></th>
                    </tr>
                </thead>
                <tbody></tbody>
            </table>
        </section>

        <section id="log-viewer" class="card hidden">
            <h2>Logs: <span id="log-title"></span></h2>
            <pre id="log-output"></pre>
        </section>
    </main>

    <script src="/app.js"></script>
</body>
</html>
"##;

const DASHBOARD_CSS: &str = r#"
* { box-sizing: border-box; margin: 0; padding: 0; }
body { font-family: -apple-system, "Segoe UI", sans-serif; background: #f4f6f8; color: #1f2933; }
.navbar { display: flex; justify-content: space-between; align-items: center;
          padding: 0.75rem 1.5rem; background: #102a43; color: #fff; }
main { max-width: 960px; margin: 1.5rem auto; padding: 0 1rem; }
.card { background: #fff; border-radius: 8px; padding: 1.25rem; margin-bottom: 1.5rem;
        box-shadow: 0 1px 3px rgba(0,0,0,0.1); }
.card h2 { margin-bottom: 0.75rem; font-size: 1.1rem; }
.hidden { display: none; }
label { display: block; margin-bottom: 0.75rem; font-size: 0.9rem; }
input { display: block; width: 100%; margin-top: 0.25rem; padding: 0.5rem;
        border: 1px solid #cbd2d9; border-radius: 4px; }
.actions { margin-top: 0.5rem; }
.btn { padding: 0.45rem 1rem; border: 1px solid #cbd2d9; border-radius: 4px;
       background: #fff; cursor: pointer; }
.btn-primary { background: #2186eb; border-color: #2186eb; color: #fff; }
table { width: 100%; border-collapse: collapse; font-size: 0.9rem; }
th, td { text-align: left; padding: 0.5rem; border-bottom: 1px solid #e4e7eb; }
.state-running { color: #0f8a4b; font-weight: 600; }
.state-exited { color: #ba2525; }
pre { background: #102a43; color: #d9e2ec; padding: 0.75rem; border-radius: 4px;
      max-height: 24rem; overflow: auto; font-size: 0.8rem; }
"#;

const DASHBOARD_JS: &str = r#"
const API = '/api/v1/containers';

async function refresh() {
    const res = await fetch(API);
    if (!res.ok) return;
    const containers = await res.json();
    const tbody = document.querySelector('#containers tbody');
    tbody.innerHTML = '';
    for (const c of containers) {
        const row = document.createElement('tr');
        row.innerHTML = `
            <td>${esc(c.name)}</td>
            <td>${esc(c.image)}</td>
            <td class="state-${esc(c.state)}">${esc(c.state)}</td>
            <td>${esc(c.backend_address || '-')}</td>
            <td>
                <button class="btn" onclick="showLogs('${esc(c.id)}', '${esc(c.name)}')">Logs</button>
                <button class="btn" onclick="stop('${esc(c.id)}')">Stop</button>
            </td>`;
        tbody.appendChild(row);
    }
}

async function deploy() {
    const image = document.getElementById('deploy-image').value.trim();
    const repo = document.getElementById('deploy-repo').value.trim();
    const name = document.getElementById('deploy-name').value.trim();
    const status = document.getElementById('deploy-status');

    const body = {};
    if (image) body.image = image;
    if (repo) body.repo_url = repo;
    if (name) body.name = name;

    status.textContent = 'Deploying...';
    const res = await fetch(API, {
        method: 'POST',
        headers: { 'Content-Type': 'application/json' },
        body: JSON.stringify(body),
    });
    if (res.ok) {
        status.textContent = 'Deployed.';
        hideDeployForm();
        refresh();
    } else {
        const err = await res.json().catch(() => ({ message: res.statusText }));
        status.textContent = 'Failed: ' + err.message;
    }
}

async function stop(id) {
    await fetch(`${API}/${id}`, { method: 'DELETE' });
    refresh();
}

async function showLogs(id, name) {
    const res = await fetch(`${API}/${id}/logs`);
    document.getElementById('log-title').textContent = name;
    document.getElementById('log-output').textContent = await res.text();
    document.getElementById('log-viewer').classList.remove('hidden');
}

function showDeployForm() {
    document.getElementById('deploy-form').classList.remove('hidden');
}

function hideDeployForm() {
    document.getElementById('deploy-form').classList.add('hidden');
    document.getElementById('deploy-status').textContent = '';
}

function esc(s) {
    return String(s).replace(/[&<>"']/g,
        ch => ({'&':'&amp;','<':'&lt;','>':'&gt;','"':'&quot;',"'":'&#39;'}[ch]));
}

refresh();
setInterval(refresh, 5000);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dashboard_content_types() {
        assert_eq!(
            serve_dashboard().headers().get(CONTENT_TYPE).unwrap(),
            "text/html; charset=utf-8"
        );
        assert_eq!(serve_css().headers().get(CONTENT_TYPE).unwrap(), "text/css");
        assert_eq!(
            serve_js().headers().get(CONTENT_TYPE).unwrap(),
            "application/javascript"
        );
    }

    #[test]
    fn test_dashboard_references_served_assets() {
        assert!(DASHBOARD_HTML.contains("/style.css"));
        assert!(DASHBOARD_HTML.contains("/app.js"));
        assert!(DASHBOARD_JS.contains("/api/v1/containers"));
    }
}
