//! HTML pages

use std::fmt::Write;

use dt_core::config::{DvrConfig, MAX_CHANNEL};

const STYLE: &str = r#"
  body { font-family: system-ui, sans-serif; margin: 0; background: #0f172a; color: #e2e8f0; }
  header { padding: 14px 22px; background: #111827; border-bottom: 1px solid #1f2937; }
  header h1 { margin: 0; font-size: 20px; }
  main { padding: 22px; }
  .card { background: #111827; border: 1px solid #1f2937; border-radius: 10px; padding: 16px; margin-bottom: 16px; }
  .row { display: flex; gap: 16px; flex-wrap: wrap; }
  .col { flex: 1; min-width: 220px; }
  label { display: block; margin: 8px 0 4px; font-size: 13px; color: #94a3b8; }
  input, select { width: 100%; padding: 8px; border-radius: 6px; border: 1px solid #334155; background: #0b1220; color: #e2e8f0; }
  button, .btn { display: inline-block; padding: 9px 14px; border: 0; border-radius: 6px; background: #2563eb; color: #fff; text-decoration: none; cursor: pointer; }
  .actions { margin-top: 16px; display: flex; gap: 10px; }
  .toolbar { display: flex; gap: 10px; flex-wrap: wrap; margin-bottom: 16px; }
  .grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(320px, 1fr)); gap: 12px; }
  .muted { color: #94a3b8; font-size: 13px; }
  img { max-width: 100%; display: block; border-radius: 6px; }
"#;

/// Escape text for HTML element content and attribute values
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn document(title: &str, body: &str) -> String {
    format!(
        "<!doctype html>\n<html>\n<head>\n  <meta charset=\"utf-8\">\n  <title>{}</title>\n  <style>{}</style>\n</head>\n<body>\n  <header><h1>DVR viewer</h1></header>\n  <main>\n{}  </main>\n</body>\n</html>\n",
        escape(title),
        STYLE,
        body
    )
}

fn selected(on: bool) -> &'static str {
    if on {
        " selected"
    } else {
        ""
    }
}

/// Connection form prefilled with the current settings
pub fn index(settings: &DvrConfig, connected: bool) -> String {
    let mut options = String::new();
    for ch in 1..=MAX_CHANNEL {
        let _ = writeln!(
            options,
            "          <option value=\"{ch}\"{}>Channel {ch}</option>",
            selected(settings.channels.contains(&ch))
        );
    }

    let viewer_link = if connected {
        "\n          <a class=\"btn\" style=\"background:#16a34a\" href=\"/view\">Go to viewer</a>"
    } else {
        ""
    };

    let status = if connected {
        format!(
            "Streaming channels {:?} from {}",
            settings.channels,
            escape(&settings.ip)
        )
    } else {
        "Not connected".to_string()
    };

    let body = format!(
        r#"    <div class="card">
      <h2 style="margin-top:0">Connect to the DVR</h2>
      <p class="muted">{status}</p>
      <form method="post" action="/connect">
        <div class="row">
          <div class="col">
            <label>DVR address</label>
            <input name="ip" value="{ip}" placeholder="192.168.0.18" required>
          </div>
          <div class="col">
            <label>User</label>
            <input name="user" value="{user}" placeholder="admin" required>
          </div>
          <div class="col">
            <label>Password</label>
            <input name="password" type="password" placeholder="{password_hint}">
          </div>
        </div>
        <div class="row">
          <div class="col">
            <label>Channels (Ctrl/Shift to select several)</label>
            <select name="channels" multiple size="10">
{options}            </select>
          </div>
          <div class="col">
            <label>Stream</label>
            <select name="subtype">
              <option value="0"{main}>Main (full quality)</option>
              <option value="1"{sub}>Sub (lighter, lower latency)</option>
            </select>
            <label>Frame height (px)</label>
            <input name="target_height" type="number" min="180" max="1080" step="10" value="{height}">
            <div class="muted">Taller frames look sharper and cost more CPU.</div>
          </div>
        </div>
        <div class="actions">
          <button type="submit">Connect</button>{viewer_link}
        </div>
      </form>
    </div>
"#,
        status = status,
        ip = escape(&settings.ip),
        user = escape(&settings.user),
        password_hint = if settings.password.is_empty() {
            ""
        } else {
            "unchanged"
        },
        viewer_link = viewer_link,
        options = options,
        main = selected(settings.subtype == 0),
        sub = selected(settings.subtype == 1),
        height = settings.target_height,
    );

    document("DVR viewer - connect", &body)
}

/// Mosaic shown at the top of the view page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Row,
    Grid2,
    Grid4,
}

impl ViewMode {
    /// Parse the `mode` query value; anything unknown shows no mosaic
    pub fn parse(mode: Option<&str>) -> Option<Self> {
        match mode.unwrap_or("row") {
            "row" => Some(Self::Row),
            "grid2" => Some(Self::Grid2),
            "grid4" => Some(Self::Grid4),
            _ => None,
        }
    }

    fn title(self) -> &'static str {
        match self {
            Self::Row => "Side by side",
            Self::Grid2 => "2x2 grid (first four)",
            Self::Grid4 => "4x4 grid (all)",
        }
    }

    fn stream_path(self) -> &'static str {
        match self {
            Self::Row => "/mosaic.mjpg?mode=row",
            Self::Grid2 => "/mosaic.mjpg?mode=grid&amp;cols=2&amp;subset=first4",
            Self::Grid4 => "/mosaic.mjpg?mode=grid&amp;cols=4&amp;subset=all",
        }
    }
}

/// Mosaic plus one tile per active channel
pub fn view(mode: Option<ViewMode>, channels: &[u8]) -> String {
    let mut body = String::from(
        r#"    <div class="toolbar">
      <a class="btn" href="/view?mode=row">Side by side</a>
      <a class="btn" href="/view?mode=grid2">2x2 grid</a>
      <a class="btn" href="/view?mode=grid4">4x4 grid</a>
      <a class="btn" href="/">Reconfigure</a>
    </div>
"#,
    );

    if let Some(mode) = mode {
        let _ = write!(
            body,
            "    <div class=\"card\">\n      <h3>{}</h3>\n      <img src=\"{}\">\n    </div>\n",
            mode.title(),
            mode.stream_path()
        );
    }

    body.push_str("    <h3 style=\"margin-top:22px\">Cameras</h3>\n    <div class=\"grid\">\n");
    for ch in channels {
        let _ = write!(
            body,
            "      <div class=\"card\">\n        <div class=\"muted\">Channel {ch}</div>\n        <img src=\"/ch{ch}.mjpg\">\n      </div>\n"
        );
    }
    body.push_str("    </div>\n");

    document("DVR viewer", &body)
}
