//! Public gallery: photo/video partition and the video player model.
use std::time::Duration;

use crate::model::PortfolioItem;

pub const VOLUME_STEP: f64 = 0.1;
/// How long the volume badge stays up after a change.
pub const VOLUME_BADGE_TTL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GalleryTab {
    #[default]
    Photos,
    Videos,
}

impl GalleryTab {
    pub fn as_str(&self) -> &'static str {
        match self {
            GalleryTab::Photos => "photos",
            GalleryTab::Videos => "videos",
        }
    }

    /// Unknown values fall back to the photo tab.
    pub fn parse(s: Option<&str>) -> Self {
        match s {
            Some("videos") | Some("video") => GalleryTab::Videos,
            _ => GalleryTab::Photos,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GalleryTab::Photos => "Fotos",
            GalleryTab::Videos => "Vídeos",
        }
    }

    pub fn empty_message(&self) -> &'static str {
        match self {
            GalleryTab::Photos => "Nenhuma foto encontrada.",
            GalleryTab::Videos => "Nenhum vídeo encontrado.",
        }
    }
}

/// Split items into (photos, videos), preserving order.
pub fn partition(items: &[PortfolioItem]) -> (Vec<&PortfolioItem>, Vec<&PortfolioItem>) {
    items.iter().partition(|item| !item.is_video())
}

/// The subset shown under `tab`.
pub fn visible(items: &[PortfolioItem], tab: GalleryTab) -> Vec<&PortfolioItem> {
    let (photos, videos) = partition(items);
    match tab {
        GalleryTab::Photos => photos,
        GalleryTab::Videos => videos,
    }
}

/// What a key press does in the player modal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerAction {
    TogglePlay,
    VolumeUp,
    VolumeDown,
    Close,
}

impl PlayerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerAction::TogglePlay => "toggle",
            PlayerAction::VolumeUp => "volumeUp",
            PlayerAction::VolumeDown => "volumeDown",
            PlayerAction::Close => "close",
        }
    }
}

/// Keyboard `code` values the player reacts to. The page script is
/// generated from this table.
pub const KEY_BINDINGS: [(&str, PlayerAction); 4] = [
    ("Space", PlayerAction::TogglePlay),
    ("ArrowUp", PlayerAction::VolumeUp),
    ("ArrowDown", PlayerAction::VolumeDown),
    ("Escape", PlayerAction::Close),
];

/// The video shown in the player modal. Playback itself runs in the
/// browser; this decides which item is open and how the modal starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoPlayer<'a> {
    item: &'a PortfolioItem,
    url: &'a str,
}

impl<'a> VideoPlayer<'a> {
    /// Open the item `id` names. Photos and unknown ids open nothing.
    pub fn open(items: &'a [PortfolioItem], id: &str) -> Option<Self> {
        let item = items.iter().find(|item| item.id == id)?;
        let url = item.video_url.as_deref().filter(|u| !u.is_empty())?;
        Some(Self { item, url })
    }

    pub fn item(&self) -> &'a PortfolioItem {
        self.item
    }

    pub fn video_url(&self) -> &'a str {
        self.url
    }

    /// Volume when the modal opens, 0.0..=1.0.
    pub fn initial_volume(&self) -> f64 {
        1.0
    }

    pub fn elapsed_label(&self) -> String {
        format_clock(0.0)
    }
}

/// `m:ss` rendering of a time in seconds.
pub fn format_clock(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Category;

    fn item(id: &str, video: Option<&str>) -> PortfolioItem {
        PortfolioItem {
            id: id.into(),
            title: id.into(),
            category: Category::Evento,
            image: format!("https://cdn/{id}.jpg"),
            video_url: video.map(str::to_string),
            created_at: None,
        }
    }

    #[test]
    fn partition_covers_all_items_without_overlap() {
        let items = vec![
            item("a", None),
            item("b", Some("https://cdn/b.mp4")),
            item("c", Some("")),
            item("d", Some("https://cdn/d.mp4")),
        ];
        let (photos, videos) = partition(&items);
        assert_eq!(photos.len() + videos.len(), items.len());
        assert!(photos.iter().all(|i| !i.is_video()));
        assert!(videos.iter().all(|i| i.is_video()));
        let ids: Vec<_> = videos.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d"]);
        assert_eq!(visible(&items, GalleryTab::Photos).len(), 2);
    }

    #[test]
    fn tab_parse_and_empty_messages() {
        assert_eq!(GalleryTab::parse(Some("videos")), GalleryTab::Videos);
        assert_eq!(GalleryTab::parse(Some("xyz")), GalleryTab::Photos);
        assert_eq!(GalleryTab::parse(None), GalleryTab::Photos);
        assert_eq!(GalleryTab::Photos.empty_message(), "Nenhuma foto encontrada.");
        assert_eq!(GalleryTab::Videos.empty_message(), "Nenhum vídeo encontrado.");
    }

    #[test]
    fn player_opens_only_video_items() {
        let items = vec![item("p", None), item("v", Some("https://cdn/v.mp4")), item("e", Some(""))];
        let player = VideoPlayer::open(&items, "v").unwrap();
        assert_eq!(player.item().id, "v");
        assert_eq!(player.video_url(), "https://cdn/v.mp4");
        assert_eq!(player.initial_volume(), 1.0);
        assert_eq!(player.elapsed_label(), "0:00");
        assert!(VideoPlayer::open(&items, "p").is_none());
        assert!(VideoPlayer::open(&items, "e").is_none());
        assert!(VideoPlayer::open(&items, "missing").is_none());
    }

    #[test]
    fn key_bindings_are_unique() {
        let mut codes: Vec<_> = KEY_BINDINGS.iter().map(|(code, _)| *code).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), KEY_BINDINGS.len());
        let actions: Vec<_> = KEY_BINDINGS.iter().map(|(_, a)| a.as_str()).collect();
        assert_eq!(actions, vec!["toggle", "volumeUp", "volumeDown", "close"]);
    }

    #[test]
    fn clock_format() {
        assert_eq!(format_clock(0.0), "0:00");
        assert_eq!(format_clock(9.9), "0:09");
        assert_eq!(format_clock(75.2), "1:15");
        assert_eq!(format_clock(600.0), "10:00");
        assert_eq!(format_clock(-3.0), "0:00");
    }
}
