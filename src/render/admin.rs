//! Admin pages: login, dashboard and delete confirmation.
use super::{html_attr, html_escape, notice_html, page};
use crate::admin::{Notice, PortfolioForm, CONFIRM_DELETE, EMPTY_LIST};
use crate::gallery::GalleryTab;
use crate::model::{Category, PortfolioItem, SettingsField, SiteSettings};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AdminTab {
    #[default]
    Portfolio,
    Settings,
}

impl AdminTab {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminTab::Portfolio => "portfolio",
            AdminTab::Settings => "settings",
        }
    }

    pub fn parse(s: Option<&str>) -> Self {
        match s {
            Some("settings") => AdminTab::Settings,
            _ => AdminTab::Portfolio,
        }
    }
}

/// Login page. `error` is shown above the submit button.
pub fn render_login(site_title: &str, stylesheet: &str, email: &str, error: Option<&Notice>) -> String {
    let error = error.map(notice_html).unwrap_or_default();
    let body = format!(
        r#"<section class="admin-shell" style="align-items: center; justify-content: center">
  <form class="stack" method="post" action="/admin/login" style="width: min(420px, 90vw)">
    <h2>Área Restrita</h2>
    <p>Acesse com sua conta cadastrada</p>
    <label for="email">E-mail</label>
    <input id="email" type="email" name="email" placeholder="seu@email.com" value="{}" required>
    <label for="password">Senha</label>
    <input id="password" type="password" name="password" placeholder="••••••••" required>
    {}
    <p><button class="btn" type="submit">Entrar no Painel</button></p>
    <p><a href="/">Voltar ao site</a></p>
  </form>
</section>
"#,
        html_attr(email),
        error
    );
    page(&format!("{site_title} · Admin"), stylesheet, "admin", &body)
}

/// Everything the dashboard needs for one render.
#[derive(Debug, Clone, Copy)]
pub struct DashboardView<'a> {
    pub site_title: &'a str,
    pub stylesheet: &'a str,
    pub tab: AdminTab,
    pub sub_tab: GalleryTab,
    /// Items of `sub_tab` only.
    pub items: &'a [PortfolioItem],
    pub form: &'a PortfolioForm,
    pub settings: &'a SiteSettings,
    pub notice: Option<&'a Notice>,
    pub busy: bool,
    pub progress: Option<u8>,
    pub max_upload_mb: u64,
}

pub fn render_dashboard(v: &DashboardView<'_>) -> String {
    let tabs: String = [(AdminTab::Portfolio, "Portfólio"), (AdminTab::Settings, "Configurações")]
        .iter()
        .map(|(tab, label)| {
            format!(
                "<a href=\"/admin?tab={}\" class=\"{}\">{}</a>",
                tab.as_str(),
                if *tab == v.tab { "active" } else { "" },
                label
            )
        })
        .collect();

    let notice = v.notice.map(notice_html).unwrap_or_default();
    let (aside, heading, main) = match v.tab {
        AdminTab::Portfolio => (
            portfolio_forms(v),
            format!("Gerenciar Itens ({})", v.items.len()),
            item_grid(v.items, v.sub_tab),
        ),
        AdminTab::Settings => (
            settings_form(v.settings, v.busy),
            "Configurações do Site".to_string(),
            logo_preview(v.settings),
        ),
    };

    let body = format!(
        r#"<div class="admin-shell">
  <aside>
    <nav class="tabs">{tabs}</nav>
    {notice}
    {aside}
  </aside>
  <main>
    <div style="display: flex; justify-content: space-between; align-items: center">
      <h3>{heading}</h3>
      <div>
        <a class="btn ghost" href="/">Fechar Painel</a>
        <form method="post" action="/admin/logout" style="display: inline"><button class="btn ghost" type="submit">Sair</button></form>
      </div>
    </div>
    {main}
  </main>
</div>
"#,
        tabs = tabs,
        notice = notice,
        aside = aside,
        heading = html_escape(&heading),
        main = main,
    );
    page(&format!("{} · Painel", v.site_title), v.stylesheet, "admin", &body)
}

fn portfolio_forms(v: &DashboardView<'_>) -> String {
    let options: String = Category::ALL
        .iter()
        .map(|c| {
            format!(
                "<option{}>{}</option>",
                if *c == v.form.category { " selected" } else { "" },
                c
            )
        })
        .collect();
    let progress = match v.progress {
        Some(p) => format!("<progress id=\"upload-progress\" max=\"100\" value=\"{p}\">{p}%</progress>"),
        None => "<progress id=\"upload-progress\" max=\"100\" value=\"0\" hidden></progress>".to_string(),
    };
    let disabled = if v.busy { " disabled" } else { "" };
    let save_label = if v.busy { "Salvando..." } else { "Salvar no Portfólio" };

    format!(
        r#"<h3>Adicionar Novo Trabalho</h3>
<form class="stack upload" method="post" action="/admin/upload/image" enctype="multipart/form-data">
  <label for="image-file">Enviar Imagem (até {limit} MB)</label>
  <input id="image-file" type="file" name="file" accept="image/*" required>
  <button class="btn ghost" type="submit"{disabled}>Enviar Imagem</button>
</form>
<form class="stack upload" method="post" action="/admin/upload/video" enctype="multipart/form-data">
  <label for="video-file">Enviar Vídeo (até {limit} MB)</label>
  <input id="video-file" type="file" name="file" accept="video/*" required>
  <button class="btn ghost" type="submit"{disabled}>Enviar Vídeo</button>
</form>
{progress}
<form class="stack" method="post" action="/admin/portfolio">
  <label for="title">Título</label>
  <input id="title" name="title" value="{title}" required>
  <label for="category">Categoria</label>
  <select id="category" name="category">{options}</select>
  <label for="image">URL da Imagem</label>
  <input id="image" name="image" value="{image}" required>
  <label for="videoUrl">URL do Vídeo (Link Direto MP4)</label>
  <input id="videoUrl" name="videoUrl" value="{video}">
  <p><button class="btn" type="submit"{disabled}>{save_label}</button></p>
</form>
<script>
(function () {{
  var bar = document.getElementById('upload-progress');
  document.querySelectorAll('form.upload').forEach(function (form) {{
    form.addEventListener('submit', function () {{
      bar.hidden = false;
      // Polls until the response to this form replaces the page.
      setInterval(function () {{
        fetch('/admin/upload/progress').then(function (r) {{ return r.json(); }}).then(function (s) {{
          if (s.percent !== null) bar.value = s.percent;
        }});
      }}, 300);
    }});
  }});
}})();
</script>
"#,
        limit = v.max_upload_mb,
        disabled = disabled,
        progress = progress,
        title = html_attr(&v.form.title),
        options = options,
        image = html_attr(&v.form.image),
        video = html_attr(&v.form.video_url),
        save_label = save_label,
    )
}

fn item_grid(items: &[PortfolioItem], sub_tab: GalleryTab) -> String {
    let tabs: String = [GalleryTab::Photos, GalleryTab::Videos]
        .iter()
        .map(|t| {
            format!(
                "<a href=\"/admin?tab=portfolio&amp;view={}\" class=\"{}\">{}</a>",
                t.as_str(),
                if *t == sub_tab { "active" } else { "" },
                t.label()
            )
        })
        .collect();

    if items.is_empty() {
        return format!("<nav class=\"tabs\">{tabs}</nav><p class=\"empty\">{EMPTY_LIST}</p>");
    }

    let tiles: String = items
        .iter()
        .map(|item| {
            format!(
                r#"<div class="tile"><img src="{}" alt="{}" loading="lazy"><a class="delete" href="/admin/portfolio/{}/delete" aria-label="Excluir">&#10005;</a><div class="info"><small>{}</small><h4>{}</h4></div></div>"#,
                html_attr(&item.image),
                html_attr(&item.title),
                html_attr(&urlencoding::encode(&item.id)),
                item.category,
                html_escape(&item.title)
            )
        })
        .collect();
    format!("<nav class=\"tabs\">{tabs}</nav><div class=\"admin-grid\">{tiles}</div>")
}

fn settings_form(settings: &SiteSettings, busy: bool) -> String {
    let field = |f: SettingsField| {
        format!(
            "<label for=\"{key}\">{label}</label>\n  <input id=\"{key}\" name=\"{key}\" value=\"{value}\">",
            key = f.key(),
            label = html_escape(f.label()),
            value = html_attr(settings.get(f)),
        )
    };
    let appearance: Vec<String> = [
        SettingsField::LogoUrl,
        SettingsField::HeroTitle,
        SettingsField::HeroSubtitle,
        SettingsField::HeroBackground,
    ]
    .into_iter()
    .map(field)
    .collect();
    let contact: Vec<String> = [
        SettingsField::WhatsappNumber,
        SettingsField::PhoneDisplay,
        SettingsField::Email,
        SettingsField::Location,
        SettingsField::InstagramUrl,
        SettingsField::FacebookUrl,
    ]
    .into_iter()
    .map(field)
    .collect();

    format!(
        r#"<form class="stack" method="post" action="/admin/settings">
  <h3>Aparência do Site</h3>
  {}
  <h3>Contato &amp; Redes Sociais</h3>
  {}
  <p><button class="btn" type="submit"{}>{}</button></p>
</form>
"#,
        appearance.join("\n  "),
        contact.join("\n  "),
        if busy { " disabled" } else { "" },
        if busy { "Atualizando..." } else { "Atualizar Site" }
    )
}

fn logo_preview(settings: &SiteSettings) -> String {
    format!(
        "<h4>Pré-visualização da Logo</h4><img class=\"logo-preview\" src=\"{}\" alt=\"Logo\">",
        html_attr(&settings.logo_url)
    )
}

/// Confirmation step before a permanent delete.
pub fn render_confirm_delete(site_title: &str, stylesheet: &str, item: &PortfolioItem) -> String {
    let body = format!(
        r#"<section class="admin-shell" style="align-items: center; justify-content: center">
  <form class="stack" method="post" action="/admin/portfolio/{}/delete" style="width: min(480px, 90vw)">
    <img class="logo-preview" src="{}" alt="">
    <h3>{}</h3>
    <p>{}</p>
    <p><button class="btn" type="submit">Excluir</button> <a class="btn ghost" href="/admin">Cancelar</a></p>
  </form>
</section>
"#,
        html_attr(&urlencoding::encode(&item.id)),
        html_attr(&item.image),
        html_escape(&item.title),
        CONFIRM_DELETE
    );
    page(&format!("{site_title} · Excluir"), stylesheet, "admin", &body)
}
