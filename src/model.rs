use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Fixed key of the singleton settings record.
pub const SETTINGS_ID: &str = "site_settings";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Category {
    #[default]
    Casamento,
    Social,
    Ensaio,
    Corporativo,
    Evento,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Casamento,
        Category::Social,
        Category::Ensaio,
        Category::Corporativo,
        Category::Evento,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Casamento => "Casamento",
            Category::Social => "Social",
            Category::Ensaio => "Ensaio",
            Category::Corporativo => "Corporativo",
            Category::Evento => "Evento",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioItem {
    pub id: String,
    pub title: String,
    pub category: Category,
    pub image: String,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl PortfolioItem {
    /// An item is a video entry iff it carries a non-empty video URL.
    pub fn is_video(&self) -> bool {
        self.video_url.as_deref().is_some_and(|u| !u.is_empty())
    }

    /// URLs of media owned by this item (image first, then video).
    pub fn media_urls(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.image.as_str())
            .chain(self.video_url.as_deref())
            .filter(|u| !u.is_empty())
    }
}

/// Payload for creating a portfolio record; the store assigns id and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewPortfolioItem {
    pub title: String,
    pub category: Category,
    pub image: String,
    pub video_url: Option<String>,
}

/// One field of the settings record. `key` is the in-app camelCase name,
/// `column` the snake_case name used by row-oriented backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SettingsField {
    LogoUrl,
    HeroBackground,
    HeroTitle,
    HeroSubtitle,
    WhatsappNumber,
    PhoneDisplay,
    Email,
    Location,
    InstagramUrl,
    FacebookUrl,
}

impl SettingsField {
    pub const ALL: [SettingsField; 10] = [
        SettingsField::LogoUrl,
        SettingsField::HeroBackground,
        SettingsField::HeroTitle,
        SettingsField::HeroSubtitle,
        SettingsField::WhatsappNumber,
        SettingsField::PhoneDisplay,
        SettingsField::Email,
        SettingsField::Location,
        SettingsField::InstagramUrl,
        SettingsField::FacebookUrl,
    ];

    pub fn key(self) -> &'static str {
        match self {
            SettingsField::LogoUrl => "logoUrl",
            SettingsField::HeroBackground => "heroBackground",
            SettingsField::HeroTitle => "heroTitle",
            SettingsField::HeroSubtitle => "heroSubtitle",
            SettingsField::WhatsappNumber => "whatsappNumber",
            SettingsField::PhoneDisplay => "phoneDisplay",
            SettingsField::Email => "email",
            SettingsField::Location => "location",
            SettingsField::InstagramUrl => "instagramUrl",
            SettingsField::FacebookUrl => "facebookUrl",
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            SettingsField::LogoUrl => "logo_url",
            SettingsField::HeroBackground => "hero_background",
            SettingsField::HeroTitle => "hero_title",
            SettingsField::HeroSubtitle => "hero_subtitle",
            SettingsField::WhatsappNumber => "whatsapp_number",
            SettingsField::PhoneDisplay => "phone_display",
            SettingsField::Email => "email",
            SettingsField::Location => "location",
            SettingsField::InstagramUrl => "instagram_url",
            SettingsField::FacebookUrl => "facebook_url",
        }
    }

    /// Accepts either naming convention.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.key() == name || f.column() == name)
    }

    /// Form label shown in the dashboard.
    pub fn label(self) -> &'static str {
        match self {
            SettingsField::LogoUrl => "URL da Logo",
            SettingsField::HeroBackground => "Imagem de Fundo do Hero",
            SettingsField::HeroTitle => "Título do Hero",
            SettingsField::HeroSubtitle => "Subtítulo do Hero",
            SettingsField::WhatsappNumber => "WhatsApp (Apenas Números - 55...)",
            SettingsField::PhoneDisplay => "Telefone (Visual)",
            SettingsField::Email => "E-mail",
            SettingsField::Location => "Localização",
            SettingsField::InstagramUrl => "Instagram URL",
            SettingsField::FacebookUrl => "Facebook URL",
        }
    }
}

/// Display copy and contact details shown across the site.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SiteSettings {
    pub logo_url: String,
    pub hero_background: String,
    pub hero_title: String,
    pub hero_subtitle: String,
    pub whatsapp_number: String,
    pub phone_display: String,
    pub email: String,
    pub location: String,
    pub instagram_url: String,
    pub facebook_url: String,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            logo_url: "/logo-new.png".into(),
            hero_background: "https://lh3.googleusercontent.com/aida-public/AB6AXuBtr9jNzsI7ZlPMLywSViXJpV2I1EAnBBrsjtEQbFJO2AY6RBvhOsmXmHOCSmG0cT23njuUKvKAEqZF-VTkIQCAPrPLjDBxb2462NJul4E1zklI7BwCAQhLdKkwbGflBu2Zm7BIN3NAOZ6jlXFZXZBs3m3bxaq2hlF4COR44kJIlSPmwUAzTHskcvRy5x8dwpfAhAmGhLoyFtLtcDmEXAkHk6J7RX-_ovyq5DQNHSU-X1ACgRt_CoJyAbdzvdezQE_JZVGZBXmFVCs".into(),
            hero_title: "Capturando seus Melhores Momentos de Cima".into(),
            hero_subtitle: "Transformando suas celebrações em memórias cinematográficas inesquecíveis com a mais alta tecnologia em drones.".into(),
            whatsapp_number: "5582993716239".into(),
            phone_display: "(82) 99371-6239".into(),
            email: "jose_evilanio@hotmail.com".into(),
            location: "Maceió - Alagoas, Brasil".into(),
            instagram_url: "https://www.instagram.com/jose_evilanio/".into(),
            facebook_url: "https://www.facebook.com/joseevilanio".into(),
        }
    }
}

impl SiteSettings {
    pub fn get(&self, field: SettingsField) -> &str {
        match field {
            SettingsField::LogoUrl => &self.logo_url,
            SettingsField::HeroBackground => &self.hero_background,
            SettingsField::HeroTitle => &self.hero_title,
            SettingsField::HeroSubtitle => &self.hero_subtitle,
            SettingsField::WhatsappNumber => &self.whatsapp_number,
            SettingsField::PhoneDisplay => &self.phone_display,
            SettingsField::Email => &self.email,
            SettingsField::Location => &self.location,
            SettingsField::InstagramUrl => &self.instagram_url,
            SettingsField::FacebookUrl => &self.facebook_url,
        }
    }

    fn slot_mut(&mut self, field: SettingsField) -> &mut String {
        match field {
            SettingsField::LogoUrl => &mut self.logo_url,
            SettingsField::HeroBackground => &mut self.hero_background,
            SettingsField::HeroTitle => &mut self.hero_title,
            SettingsField::HeroSubtitle => &mut self.hero_subtitle,
            SettingsField::WhatsappNumber => &mut self.whatsapp_number,
            SettingsField::PhoneDisplay => &mut self.phone_display,
            SettingsField::Email => &mut self.email,
            SettingsField::Location => &mut self.location,
            SettingsField::InstagramUrl => &mut self.instagram_url,
            SettingsField::FacebookUrl => &mut self.facebook_url,
        }
    }

    /// Overwrite only the fields present in `patch`.
    pub fn merge(&mut self, patch: &SettingsPatch) {
        for (field, value) in patch.iter() {
            *self.slot_mut(field) = value.to_string();
        }
    }

    pub fn merged(mut self, patch: &SettingsPatch) -> Self {
        self.merge(patch);
        self
    }
}

/// A partial settings record. Absent fields are left untouched by a merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    fields: BTreeMap<SettingsField, String>,
}

impl SettingsPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: SettingsField, value: impl Into<String>) -> &mut Self {
        self.fields.insert(field, value.into());
        self
    }

    pub fn with(mut self, field: SettingsField, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    pub fn get(&self, field: SettingsField) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SettingsField, &str)> {
        self.fields.iter().map(|(f, v)| (*f, v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Build a patch from whatever fields `lookup` can resolve.
    pub fn from_lookup<F>(mut lookup: F) -> Self
    where
        F: FnMut(SettingsField) -> Option<String>,
    {
        let fields = SettingsField::ALL
            .into_iter()
            .filter_map(|f| lookup(f).map(|v| (f, v)))
            .collect();
        Self { fields }
    }
}

impl From<&SiteSettings> for SettingsPatch {
    fn from(settings: &SiteSettings) -> Self {
        Self::from_lookup(|f| Some(settings.get(f).to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, video: Option<&str>) -> PortfolioItem {
        PortfolioItem {
            id: id.into(),
            title: format!("item {id}"),
            category: Category::Social,
            image: format!("https://cdn/{id}.jpg"),
            video_url: video.map(str::to_string),
            created_at: None,
        }
    }

    #[test]
    fn video_classification_follows_video_url() {
        assert!(!item("a", None).is_video());
        assert!(!item("b", Some("")).is_video());
        assert!(item("c", Some("https://cdn/c.mp4")).is_video());
    }

    #[test]
    fn category_parse_accepts_known_names_only() {
        assert_eq!(Category::parse("casamento"), Some(Category::Casamento));
        assert_eq!(Category::parse(" Evento "), Some(Category::Evento));
        assert_eq!(Category::parse("Aniversário"), None);
    }

    #[test]
    fn merge_only_touches_patched_fields() {
        let base = SiteSettings::default();
        let patch = SettingsPatch::new().with(SettingsField::HeroTitle, "Novo título");
        let merged = base.clone().merged(&patch);
        assert_eq!(merged.hero_title, "Novo título");
        assert_eq!(merged.email, base.email);
        assert_eq!(merged.facebook_url, base.facebook_url);
    }

    #[test]
    fn merge_is_idempotent() {
        let patch = SettingsPatch::new()
            .with(SettingsField::Email, "contato@example.com")
            .with(SettingsField::Location, "Recife");
        let once = SiteSettings::default().merged(&patch);
        let twice = once.clone().merged(&patch);
        assert_eq!(once, twice);
    }

    #[test]
    fn field_names_round_trip_both_conventions() {
        for f in SettingsField::ALL {
            assert_eq!(SettingsField::from_name(f.key()), Some(f));
            assert_eq!(SettingsField::from_name(f.column()), Some(f));
        }
    }

    #[test]
    fn full_patch_reproduces_settings() {
        let s = SiteSettings::default();
        let patch = SettingsPatch::from(&s);
        assert_eq!(patch.len(), SettingsField::ALL.len());
        let rebuilt = SiteSettings {
            hero_title: String::new(),
            ..s.clone()
        }
        .merged(&patch);
        assert_eq!(rebuilt, s);
    }

    #[test]
    fn settings_serialize_camel_case() {
        let json = serde_json::to_value(SiteSettings::default()).unwrap();
        for f in SettingsField::ALL {
            assert!(json.get(f.key()).is_some(), "missing {}", f.key());
        }
    }
}
