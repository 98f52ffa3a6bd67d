// What the avatar slot shows: the photo, initials, or a placeholder
use crate::upload::Phase;

/// Shown when a stored photo fails to load
pub const PLACEHOLDER_IMAGE: &str = "/placeholder.svg";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvatarDisplay {
    Image(String),
    Initials(String),
    Placeholder,
}

impl AvatarDisplay {
    /// Pick what to render for a profile
    ///
    /// `load_failed` is set once the image element reported an error for `avatar_url`.
    pub fn resolve(avatar_url: Option<&str>, display_name: &str, load_failed: bool) -> Self {
        match avatar_url.map(str::trim).filter(|url| !url.is_empty()) {
            Some(_) if load_failed => AvatarDisplay::Placeholder,
            Some(url) => AvatarDisplay::Image(url.to_string()),
            None => {
                let letters = initials(display_name);
                if letters.is_empty() {
                    AvatarDisplay::Placeholder
                } else {
                    AvatarDisplay::Initials(letters)
                }
            }
        }
    }

    /// Image source to hand to a renderer, if this display is an image at all
    pub fn image_src(&self) -> Option<&str> {
        match self {
            AvatarDisplay::Image(url) => Some(url),
            AvatarDisplay::Placeholder => Some(PLACEHOLDER_IMAGE),
            AvatarDisplay::Initials(_) => None,
        }
    }
}

/// Up to two uppercase initials from a display name
pub fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .take(2)
        .flat_map(char::to_uppercase)
        .collect()
}

// Status overlay on the avatar button
impl Phase {
    pub fn icon(&self) -> &'static str {
        match self {
            Phase::Idle => "📷",
            Phase::InProgress => "⟳",
            Phase::Succeeded => "✓",
            Phase::Failed => "✗",
        }
    }

    pub fn color_code(&self) -> &'static str {
        match self {
            Phase::Idle => "default",
            Phase::InProgress => "blue",
            Phase::Succeeded => "green",
            Phase::Failed => "red",
        }
    }

    pub fn caption(&self) -> &'static str {
        match self {
            Phase::Idle => "Change photo",
            Phase::InProgress => "Uploading...",
            Phase::Succeeded => "Photo updated",
            Phase::Failed => "Upload failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initials() {
        assert_eq!(initials("ana paula oliveira"), "AP");
        assert_eq!(initials("  Érica  "), "É");
        assert_eq!(initials(""), "");
    }

    #[test]
    fn test_resolve_prefers_photo() {
        assert_eq!(
            AvatarDisplay::resolve(Some("https://cdn.test/a.png"), "Ana", false),
            AvatarDisplay::Image("https://cdn.test/a.png".into())
        );
    }

    #[test]
    fn test_broken_photo_falls_back_to_placeholder() {
        let display = AvatarDisplay::resolve(Some("https://cdn.test/gone.png"), "Ana", true);
        assert_eq!(display, AvatarDisplay::Placeholder);
        assert_eq!(display.image_src(), Some(PLACEHOLDER_IMAGE));
    }

    #[test]
    fn test_missing_photo_shows_initials() {
        assert_eq!(
            AvatarDisplay::resolve(Some("   "), "Pedro Santos", false),
            AvatarDisplay::Initials("PS".into())
        );
        assert_eq!(AvatarDisplay::resolve(None, " ", false), AvatarDisplay::Placeholder);
    }

    #[test]
    fn test_every_phase_has_a_distinct_icon() {
        let phases = [Phase::Idle, Phase::InProgress, Phase::Succeeded, Phase::Failed];
        let icons: std::collections::HashSet<_> = phases.iter().map(Phase::icon).collect();
        assert_eq!(icons.len(), phases.len());
        assert_eq!(Phase::Failed.color_code(), "red");
    }
}
