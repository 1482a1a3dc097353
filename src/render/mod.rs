//! Server-side HTML rendering. Pages are assembled with `format!` from the
//! mirrored state; every interpolated value goes through [`html_escape`] or
//! [`html_attr`].
pub mod admin;
pub mod public;

use crate::admin::{Notice, NoticeLevel};

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn html_attr(s: &str) -> String {
    html_escape(s).replace('"', "&quot;")
}

/// Full document shell. `stylesheet` is the href of the site CSS.
pub fn page(title: &str, stylesheet: &str, body_class: &str, body: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="pt-BR">
  <head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{}</title>
    <link rel="stylesheet" href="{}">
  </head>
  <body class="{}">
{}
  </body>
</html>
"#,
        html_escape(title),
        html_attr(stylesheet),
        html_attr(body_class),
        body
    )
}

pub fn notice_html(notice: &Notice) -> String {
    let class = match notice.level {
        NoticeLevel::Success => "notice ok",
        NoticeLevel::Error => "notice err",
    };
    format!(
        "<div class=\"{}\" role=\"alert\">{}</div>",
        class,
        html_escape(&notice.message)
    )
}

pub const DEFAULT_STYLE: &str = r#"
:root {
  color-scheme: light dark;
  --fg: #1e293b;
  --bg: #ffffff;
  --muted: #64748b;
  --primary: #f2b90d;
  --panel: #18181b;
  --line: #27272a;
}

@media (prefers-color-scheme: dark) {
  :root {
    --fg: #e2e8f0;
    --bg: #0f172a;
    --muted: #94a3b8;
  }
}

html,
body {
  margin: 0;
  padding: 0;
  background: var(--bg);
  color: var(--fg);
  font: 16px/1.6 -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto,
        'Helvetica Neue', Arial, 'Noto Sans', sans-serif;
}

a { color: inherit; }

nav.top {
  position: sticky;
  top: 0;
  z-index: 10;
  display: flex;
  align-items: center;
  justify-content: space-between;
  padding: 12px 24px;
  background: rgba(15, 23, 42, .85);
  color: #fff;
}
nav.top img { height: 40px; }
nav.top a { margin-left: 16px; text-decoration: none; font-size: 13px; text-transform: uppercase; letter-spacing: .1em; }

.hero {
  min-height: 80vh;
  display: flex;
  align-items: center;
  justify-content: center;
  text-align: center;
  color: #fff;
  background-size: cover;
  background-position: center;
  padding: 48px 24px;
}
.hero h1 { font-size: clamp(2.5rem, 6vw, 5rem); line-height: 1.1; margin: 0 0 24px; }
.hero h1 .accent { display: block; color: var(--primary); font-style: italic; }
.hero p { max-width: 640px; margin: 0 auto 32px; color: #cbd5e1; }

.btn {
  display: inline-block;
  padding: 14px 32px;
  border-radius: 999px;
  border: 0;
  background: var(--primary);
  color: #000;
  font-weight: 700;
  text-transform: uppercase;
  letter-spacing: .1em;
  text-decoration: none;
  cursor: pointer;
}
.btn.ghost { background: transparent; color: inherit; border: 1px solid currentColor; }
.btn[disabled] { opacity: .5; }

section { padding: 64px 24px; max-width: 1100px; margin: 0 auto; }
section h2 { text-align: center; font-size: 2.2rem; }

.cards { display: grid; grid-template-columns: repeat(auto-fit, minmax(240px, 1fr)); gap: 24px; }
.card { border: 1px solid #94a3b833; border-radius: 16px; padding: 24px; }
.card.recommended { border-color: var(--primary); }

.tabs { display: flex; justify-content: center; gap: 12px; margin-bottom: 32px; }
.tabs a { padding: 8px 20px; border-radius: 999px; text-decoration: none; border: 1px solid #94a3b855; }
.tabs a.active { background: var(--primary); color: #000; border-color: var(--primary); }

.gallery { columns: 3 260px; column-gap: 24px; }
.gallery figure { margin: 0 0 24px; break-inside: avoid; position: relative; border-radius: 12px; overflow: hidden; }
.gallery img { width: 100%; display: block; }
.gallery figcaption { position: absolute; left: 0; right: 0; bottom: 0; padding: 12px; color: #fff; background: linear-gradient(transparent, #000c); }
.gallery .play { position: absolute; inset: 0; display: flex; align-items: center; justify-content: center; font-size: 48px; color: #fff; text-decoration: none; }

.empty { text-align: center; color: var(--muted); padding: 48px 0; }

.modal { position: fixed; inset: 0; z-index: 50; background: #000e; display: flex; flex-direction: column; align-items: center; justify-content: center; }
.modal video { max-width: 90vw; max-height: 75vh; }
.modal .bar { width: min(90vw, 960px); height: 6px; background: #fff3; cursor: pointer; margin-top: 12px; }
.modal .bar span { display: block; height: 100%; background: var(--primary); }
.modal .meta { color: #fff; margin-top: 8px; font-variant-numeric: tabular-nums; }
.modal .close { position: absolute; top: 16px; right: 24px; color: #fff; font-size: 32px; text-decoration: none; }
.modal .badge { position: absolute; top: 24px; left: 50%; transform: translateX(-50%); color: #000; background: var(--primary); padding: 4px 12px; border-radius: 999px; display: none; }

form.stack label { display: block; font-size: 11px; text-transform: uppercase; color: var(--muted); margin: 12px 0 4px; }
form.stack input, form.stack select, form.stack textarea {
  width: 100%;
  box-sizing: border-box;
  padding: 10px 12px;
  border-radius: 8px;
  border: 1px solid #94a3b855;
  background: transparent;
  color: inherit;
  font: inherit;
}

footer { padding: 32px 24px; text-align: center; color: var(--muted); border-top: 1px solid #94a3b833; }

.whatsapp-float { position: fixed; right: 24px; bottom: 24px; z-index: 20; width: 56px; height: 56px; border-radius: 50%; background: #25d366; color: #fff; display: flex; align-items: center; justify-content: center; text-decoration: none; font-weight: 700; }

body.admin { background: #09090b; color: #e4e4e7; }
.admin-shell { display: flex; min-height: 100vh; }
.admin-shell aside { width: 400px; background: var(--panel); padding: 32px; border-right: 1px solid var(--line); }
.admin-shell main { flex: 1; padding: 32px; }
.admin-grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(220px, 1fr)); gap: 20px; }
.admin-grid .tile { position: relative; aspect-ratio: 16/9; border-radius: 12px; overflow: hidden; background: var(--panel); border: 1px solid var(--line); }
.admin-grid .tile img { width: 100%; height: 100%; object-fit: cover; opacity: .6; }
.admin-grid .tile .info { position: absolute; left: 12px; bottom: 8px; right: 12px; }
.admin-grid .tile .info small { color: var(--primary); text-transform: uppercase; font-size: 10px; letter-spacing: .1em; }
.admin-grid .tile .delete { position: absolute; top: 8px; right: 8px; color: #ef4444; text-decoration: none; }
.logo-preview { max-height: 64px; margin-top: 8px; background: #fff1; padding: 4px; border-radius: 8px; }

.notice { padding: 12px 16px; border-radius: 8px; margin-bottom: 16px; }
.notice.ok { background: #14532d; color: #dcfce7; }
.notice.err { background: #7f1d1d; color: #fee2e2; }
progress { width: 100%; }

.noselect {
  -webkit-user-select: none;
  user-select: none;
}
"#;
