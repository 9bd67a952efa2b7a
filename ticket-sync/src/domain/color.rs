//! Calendar event colours and the traveller → colour mapping.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Google Calendar event colour.
///
/// The discriminant is the calendar API's `colorId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventColor {
    Lavender = 1,
    Sage = 2,
    Grape = 3,
    Flamingo = 4,
    Banana = 5,
    Tangerine = 6,
    Peacock = 7,
    Graphite = 8,
    Blueberry = 9,
    Basil = 10,
    Tomato = 11,
}

impl EventColor {
    /// The `colorId` value sent to the calendar API.
    pub fn color_id(self) -> String {
        (self as u8).to_string()
    }
}

impl fmt::Display for EventColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One traveller's aliases and the colour their events get.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelerColor {
    /// Names the traveller appears under on tickets.
    pub aliases: Vec<String>,
    /// Colour for events of this traveller.
    pub color: EventColor,
}

/// Chooses an event colour by finding a known traveller in ticket text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TravelerColors {
    travelers: Vec<TravelerColor>,
    default: EventColor,
}

impl TravelerColors {
    /// Create a mapping with a fallback colour.
    pub fn new(travelers: Vec<TravelerColor>, default: EventColor) -> Self {
        Self { travelers, default }
    }

    /// The colour used when no traveller matches.
    pub fn default_color(&self) -> EventColor {
        self.default
    }

    /// First traveller (in configuration order) with an alias occurring in
    /// `text`, compared case-insensitively; otherwise the default colour.
    ///
    /// # Examples
    ///
    /// ```
    /// use ticket_sync::domain::{EventColor, TravelerColor, TravelerColors};
    ///
    /// let colors = TravelerColors::new(
    ///     vec![TravelerColor { aliases: vec!["Asha Rao".into()], color: EventColor::Tomato }],
    ///     EventColor::Banana,
    /// );
    /// assert_eq!(colors.for_text("Passenger: ASHA RAO, 34"), EventColor::Tomato);
    /// assert_eq!(colors.for_text("Passenger: Someone Else"), EventColor::Banana);
    /// ```
    pub fn for_text(&self, text: &str) -> EventColor {
        let haystack = text.to_lowercase();
        self.travelers
            .iter()
            .find(|traveler| {
                traveler
                    .aliases
                    .iter()
                    .map(|alias| alias.trim().to_lowercase())
                    .any(|alias| !alias.is_empty() && haystack.contains(&alias))
            })
            .map(|traveler| traveler.color)
            .unwrap_or(self.default)
    }
}

impl Default for TravelerColors {
    fn default() -> Self {
        Self::new(Vec::new(), EventColor::Banana)
    }
}
