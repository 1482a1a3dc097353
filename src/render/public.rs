//! Public landing page.
use super::{html_attr, html_escape, page};
use crate::gallery::{
    self, GalleryTab, PlayerAction, VideoPlayer, KEY_BINDINGS, VOLUME_BADGE_TTL, VOLUME_STEP,
};
use crate::model::{PortfolioItem, SiteSettings};
use crate::quote::{self, QuoteRequest, EVENT_TYPES, PACKAGES};

const HERO_ACCENT: &str = " de cima";

struct Service {
    title: &'static str,
    icon: &'static str,
    blurb: &'static str,
}

const SERVICES: [Service; 3] = [
    Service {
        title: "Casamentos",
        icon: "favorite",
        blurb: "Cerimônia e festa vistas do alto, do cortejo ao pôr do sol.",
    },
    Service {
        title: "Aniversários",
        icon: "celebration",
        blurb: "A grandiosidade da sua festa registrada em cada detalhe.",
    },
    Service {
        title: "Eventos Sociais",
        icon: "apartment",
        blurb: "Lançamentos, inaugurações e eventos corporativos.",
    },
];

struct Testimonial {
    name: &'static str,
    event: &'static str,
    quote: &'static str,
}

const TESTIMONIALS: [Testimonial; 3] = [
    Testimonial {
        name: "Mariana & Roberto",
        event: "Casamento no Resort",
        quote: "O trabalho do José foi o diferencial do nosso casamento. Ver a cerimônia de cima, com o pôr do sol, trouxe uma emoção que as fotos tradicionais não conseguem passar. Profissionalismo impecável!",
    },
    Testimonial {
        name: "Ricardo Mendes",
        event: "Lançamento Imobiliário",
        quote: "Contratamos a filmagem aérea para um projeto corporativo e o resultado superou todas as expectativas. A qualidade da imagem 4K e a precisão das manobras valorizaram muito nosso empreendimento.",
    },
    Testimonial {
        name: "Cláudia Oliveira",
        event: "Festa de 15 Anos",
        quote: "A filmagem da entrada da minha filha foi de tirar o fôlego! O drone capturou toda a grandiosidade da festa. Super atencioso e entregou o material editado muito rápido.",
    },
];

/// Everything the landing page needs for one render.
#[derive(Debug, Clone, Copy)]
pub struct LandingView<'a> {
    pub site_title: &'a str,
    pub stylesheet: &'a str,
    pub settings: &'a SiteSettings,
    pub items: &'a [PortfolioItem],
    pub tab: GalleryTab,
    /// Video opened in the player modal, if any.
    pub playing: Option<VideoPlayer<'a>>,
    pub quote: &'a QuoteRequest,
    pub logged_in: bool,
}

/// Hero heading; a title ending in " de cima" gets its last words set apart.
pub fn hero_title_html(title: &str) -> String {
    let split = title.len().checked_sub(HERO_ACCENT.len());
    match split {
        Some(at)
            if title.is_char_boundary(at) && title[at..].eq_ignore_ascii_case(HERO_ACCENT) =>
        {
            format!(
                "{}<span class=\"accent\">de Cima</span>",
                html_escape(&title[..at])
            )
        }
        _ => html_escape(title),
    }
}

pub fn render_landing(v: &LandingView<'_>) -> String {
    let mut body = String::new();
    body.push_str(&navbar(v.settings, v.logged_in));
    body.push_str(&hero(v.settings));
    body.push_str(&services());
    body.push_str(&portfolio(v.items, v.tab));
    body.push_str(&testimonials());
    body.push_str(&quote_section(v.quote));
    body.push_str(&footer(v.settings));
    body.push_str(&format!(
        "<a class=\"whatsapp-float\" href=\"{}\" target=\"_blank\" rel=\"noopener\" aria-label=\"WhatsApp\">WA</a>\n",
        html_attr(&quote::chat_link(&v.settings.whatsapp_number))
    ));
    if let Some(player) = &v.playing {
        body.push_str(&player_modal(player));
    }
    page(v.site_title, v.stylesheet, "site", &body)
}

fn navbar(s: &SiteSettings, logged_in: bool) -> String {
    let admin = if logged_in {
        "<a href=\"/admin\">Painel</a>"
    } else {
        "<a href=\"/admin/login\" aria-label=\"Área restrita\">Entrar</a>"
    };
    format!(
        r##"<nav class="top">
  <a href="#inicio"><img src="{}" alt="Logo"></a>
  <div>
    <a href="#inicio">Início</a><a href="#servicos">Serviços</a><a href="#portfolio">Portfólio</a><a href="#orcamento">Contato</a>{}
  </div>
</nav>
"##,
        html_attr(&s.logo_url),
        admin
    )
}

fn hero(s: &SiteSettings) -> String {
    format!(
        r##"<header id="inicio" class="hero" style="background-image: linear-gradient(#0009, #000c), url('{}')">
  <div>
    <span class="noselect">Cinematografia Aérea Premium</span>
    <h1>{}</h1>
    <p>{}</p>
    <a class="btn" href="{}" target="_blank" rel="noopener">Fale no WhatsApp</a>
    <a class="btn ghost" href="#portfolio">Ver Portfólio</a>
  </div>
</header>
"##,
        html_attr(&s.hero_background),
        hero_title_html(&s.hero_title),
        html_escape(&s.hero_subtitle),
        html_attr(&quote::chat_link(&s.whatsapp_number))
    )
}

fn services() -> String {
    let cards: String = SERVICES
        .iter()
        .map(|s| {
            format!(
                "<div class=\"card\" data-icon=\"{}\"><h3>{}</h3><p>{}</p></div>",
                s.icon, s.title, s.blurb
            )
        })
        .collect();
    format!(
        "<section id=\"servicos\"><h2>Serviços Exclusivos</h2><div class=\"cards\">{}</div></section>\n",
        cards
    )
}

fn portfolio(items: &[PortfolioItem], tab: GalleryTab) -> String {
    let tabs: String = [GalleryTab::Photos, GalleryTab::Videos]
        .iter()
        .map(|t| {
            format!(
                "<a href=\"/?tab={}#portfolio\" class=\"{}\">{}</a>",
                t.as_str(),
                if *t == tab { "active" } else { "" },
                t.label()
            )
        })
        .collect();

    let shown = gallery::visible(items, tab);
    let grid = if shown.is_empty() {
        format!("<p class=\"empty\">{}</p>", tab.empty_message())
    } else {
        let figures: String = shown.iter().map(|item| figure(item)).collect();
        format!("<div class=\"gallery\">{}</div>", figures)
    };

    format!(
        "<section id=\"portfolio\"><h2>Portfólio</h2><nav class=\"tabs\">{}</nav>{}</section>\n",
        tabs, grid
    )
}

fn figure(item: &PortfolioItem) -> String {
    let play = if item.is_video() {
        format!(
            "<a class=\"play\" href=\"/?tab=videos&amp;play={}#portfolio\" aria-label=\"Assistir\">&#9654;</a>",
            html_attr(&urlencoding::encode(&item.id))
        )
    } else {
        String::new()
    };
    format!(
        "<figure><img src=\"{}\" alt=\"{}\" loading=\"lazy\" decoding=\"async\">{}<figcaption><small>{}</small><br>{}</figcaption></figure>",
        html_attr(&item.image),
        html_attr(&item.title),
        play,
        item.category,
        html_escape(&item.title)
    )
}

/// `{"Space":"toggle",...}` for the modal script.
fn key_map_json() -> String {
    let map: serde_json::Map<String, serde_json::Value> = KEY_BINDINGS
        .iter()
        .map(|(code, action)| (code.to_string(), action.as_str().into()))
        .collect();
    serde_json::Value::Object(map).to_string()
}

fn player_modal(player: &VideoPlayer<'_>) -> String {
    let item = player.item();
    format!(
        r##"<div class="modal" id="player" data-close="/?tab=videos#portfolio">
  <a class="close" href="/?tab=videos#portfolio" aria-label="Fechar">&times;</a>
  <div class="badge" id="volume-badge">{vol}%</div>
  <video id="player-video" src="{src}" poster="{poster}" autoplay playsinline></video>
  <div class="bar" id="player-bar"><span style="width: 0%"></span></div>
  <div class="meta"><span id="player-time">{elapsed}</span> · {title}</div>
</div>
<script>
(function () {{
  var KEYS = {keys};
  var STEP = {step};
  var BADGE_MS = {badge_ms};
  var v = document.getElementById('player-video');
  var bar = document.getElementById('player-bar');
  var fill = bar.firstElementChild;
  var clock = document.getElementById('player-time');
  var badge = document.getElementById('volume-badge');
  var closeHref = document.getElementById('player').dataset.close;
  var badgeTimer;
  v.volume = {initial};
  function mmss(t) {{ t = Math.max(0, Math.floor(t || 0)); var s = t % 60; return Math.floor(t / 60) + ':' + (s < 10 ? '0' : '') + s; }}
  function toggle() {{ v.paused ? v.play() : v.pause(); }}
  v.addEventListener('timeupdate', function () {{
    fill.style.width = (v.duration ? v.currentTime / v.duration * 100 : 0) + '%';
    clock.textContent = mmss(v.currentTime);
  }});
  v.addEventListener('click', toggle);
  bar.addEventListener('click', function (e) {{
    var r = bar.getBoundingClientRect();
    if (v.duration) v.currentTime = Math.min(1, Math.max(0, (e.clientX - r.left) / r.width)) * v.duration;
  }});
  function volume(d) {{
    v.volume = Math.min(10, Math.max(0, Math.round((v.volume + d) * 10))) / 10;
    badge.textContent = Math.round(v.volume * 100) + '%';
    badge.style.display = 'block';
    clearTimeout(badgeTimer);
    badgeTimer = setTimeout(function () {{ badge.style.display = 'none'; }}, BADGE_MS);
  }}
  window.addEventListener('keydown', function (e) {{
    var action = KEYS[e.code];
    if (!action) return;
    e.preventDefault();
    if (action === '{toggle}') toggle();
    else if (action === '{up}') volume(STEP);
    else if (action === '{down}') volume(-STEP);
    else if (action === '{close}') window.location.href = closeHref;
  }});
}})();
</script>
"##,
        vol = (player.initial_volume() * 100.0).round() as u32,
        src = html_attr(player.video_url()),
        poster = html_attr(&item.image),
        elapsed = player.elapsed_label(),
        title = html_escape(&item.title),
        keys = key_map_json(),
        step = VOLUME_STEP,
        badge_ms = VOLUME_BADGE_TTL.as_millis(),
        initial = player.initial_volume(),
        toggle = PlayerAction::TogglePlay.as_str(),
        up = PlayerAction::VolumeUp.as_str(),
        down = PlayerAction::VolumeDown.as_str(),
        close = PlayerAction::Close.as_str(),
    )
}

fn testimonials() -> String {
    let cards: String = TESTIMONIALS
        .iter()
        .map(|t| {
            format!(
                "<blockquote class=\"card\"><p>“{}”</p><footer><strong>{}</strong><br><small>{}</small></footer></blockquote>",
                t.quote, t.name, t.event
            )
        })
        .collect();
    format!(
        "<section id=\"depoimentos\"><h2>O que nossos clientes dizem</h2><div class=\"cards\">{}</div></section>\n",
        cards
    )
}

fn quote_section(q: &QuoteRequest) -> String {
    let packages: String = PACKAGES
        .iter()
        .map(|p| {
            let details: String = p.details.iter().map(|d| format!("<li>{d}</li>")).collect();
            format!(
                "<div class=\"card{}\" data-icon=\"{}\"><h3>{}</h3><small>{}</small><p>{}</p><p><em>{}</em></p><ul>{}</ul><a class=\"btn\" href=\"/?pacote={}#orcamento\">Solicitar</a></div>",
                if p.recommended { " recommended" } else { "" },
                p.icon,
                p.title,
                p.subtitle,
                p.description,
                p.accent,
                details,
                p.id
            )
        })
        .collect();

    let options: String = std::iter::once(("", "Selecione..."))
        .chain(EVENT_TYPES.iter().map(|t| (*t, *t)))
        .map(|(value, label)| {
            format!(
                "<option value=\"{}\"{}>{}</option>",
                html_attr(value),
                if value == q.event_type { " selected" } else { "" },
                html_escape(label)
            )
        })
        .collect();

    format!(
        r##"<section id="orcamento">
  <h2>Sua História Sob um Novo Ângulo</h2>
  <div class="cards">{packages}</div>
  <form id="contato-form" class="stack" method="post" action="/orcamento" target="_blank">
    <label for="eventType">Tipo de Evento</label>
    <select id="eventType" name="eventType">{options}</select>
    <label for="date">Data</label>
    <input id="date" type="date" name="date" value="{date}">
    <label for="location">Local</label>
    <input id="location" type="text" name="location" placeholder="Cidade / Bairro" value="{location}">
    <label for="time">Horário</label>
    <input id="time" type="text" name="time" placeholder="Ex: 15h às 21h" value="{time}">
    <label for="objective">Objetivo</label>
    <textarea id="objective" name="objective" rows="4" placeholder="Conte um pouco sobre o que você imagina para as imagens...">{objective}</textarea>
    <p><button class="btn" type="submit">Solicitar Orçamento via WhatsApp</button></p>
  </form>
</section>
"##,
        packages = packages,
        options = options,
        date = html_attr(&q.date),
        location = html_attr(&q.location),
        time = html_attr(&q.time),
        objective = html_escape(&q.objective),
    )
}

fn footer(s: &SiteSettings) -> String {
    format!(
        r#"<footer>
  <p>{} · {} · <a href="mailto:{}">{}</a></p>
  <p><a href="{}" target="_blank" rel="noopener">Instagram</a> · <a href="{}" target="_blank" rel="noopener">Facebook</a></p>
</footer>
"#,
        html_escape(&s.location),
        html_escape(&s.phone_display),
        html_attr(&s.email),
        html_escape(&s.email),
        html_attr(&s.instagram_url),
        html_attr(&s.facebook_url)
    )
}
