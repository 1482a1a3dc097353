//! Quote request form and the prefilled WhatsApp link it opens.
use serde::Deserialize;

pub const EVENT_TYPES: [&str; 6] = [
    "Casamento",
    "Aniversário",
    "Evento Social",
    "Evento Corporativo",
    "Ensaio Externo",
    "Outro",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Package {
    pub id: u8,
    pub title: &'static str,
    pub subtitle: &'static str,
    pub icon: &'static str,
    pub description: &'static str,
    pub accent: &'static str,
    pub recommended: bool,
    pub details: &'static [&'static str],
}

pub static PACKAGES: [Package; 3] = [
    Package {
        id: 1,
        title: "Pacote Inicial",
        subtitle: "Entrada Profissional",
        icon: "flight_takeoff",
        description: "Ideal para pequenas comemorações que precisam de um toque aéreo cinematográfico.",
        accent: "Essencial & Qualidade",
        recommended: false,
        details: &[
            "Até 30 minutos de voo",
            "Fotos aéreas em alta resolução",
            "Vídeo bruto (sem edição)",
            "Entrega via Google Drive",
        ],
    },
    Package {
        id: 2,
        title: "Pacote Profissional",
        subtitle: "Cobertura Completa",
        icon: "auto_awesome",
        description: "A escolha certa para quem busca impacto visual e uma narrativa completa do seu evento.",
        accent: "Entrega Premium & Edição",
        recommended: true,
        details: &[
            "Até 60 minutos de voo",
            "Fotos aéreas ilimitadas",
            "Vídeo editado (Highlights 1-3 min)",
            "Trilha sonora licenciada",
            "Entrega em 48 horas",
        ],
    },
    Package {
        id: 3,
        title: "Pacote Completo",
        subtitle: "Experiência VIP",
        icon: "diamond",
        description: "Produção de alto nível com múltiplos voos e entrega de conteúdo pronto para todas as mídias.",
        accent: "Máximo Impacto & Exclusividade",
        recommended: false,
        details: &[
            "Voos ilimitados (conforme necessidade)",
            "Cobertura completa do evento",
            "Vídeo longo + Reels/Shorts",
            "Color grading cinematográfico",
            "Prioridade na edição",
        ],
    },
];

pub fn package(id: u8) -> Option<&'static Package> {
    PACKAGES.iter().find(|p| p.id == id)
}

/// Fields of the public quote form. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuoteRequest {
    pub event_type: String,
    pub date: String,
    pub location: String,
    pub time: String,
    pub objective: String,
}

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        placeholder
    } else {
        trimmed
    }
}

impl QuoteRequest {
    /// Prefix the objective with interest in a package, as the package
    /// cards do before scrolling to the form.
    pub fn with_package_interest(mut self, package_title: &str) -> Self {
        self.objective = format!("Interesse no {package_title}. {}", self.objective);
        self
    }

    pub fn message(&self) -> String {
        format!(
            "Olá José! Gostaria de solicitar um orçamento para filmagem aérea.\n\n\
             📌 *Detalhes do Evento:*\n\
             • *Tipo:* {}\n\
             • *Data:* {}\n\
             • *Local:* {}\n\
             • *Horário:* {}\n\
             • *Objetivo:* {}\n\n\
             Aguardo seu contato para conversarmos mais sobre o projeto!",
            or_placeholder(&self.event_type, "Não informado"),
            or_placeholder(&self.date, "Não informada"),
            or_placeholder(&self.location, "Não informado"),
            or_placeholder(&self.time, "Não informado"),
            or_placeholder(&self.objective, "Não informado"),
        )
    }

    pub fn whatsapp_link(&self, number: &str) -> String {
        format!(
            "https://wa.me/{}?text={}",
            digits(number),
            urlencoding::encode(&self.message())
        )
    }
}

/// Plain chat link for the floating button and footer.
pub fn chat_link(number: &str) -> String {
    format!("https://wa.me/{}", digits(number))
}

/// Keep only ASCII digits of a phone number.
pub fn digits(number: &str) -> String {
    number.chars().filter(char::is_ascii_digit).collect()
}
