//! Four-slot entity taxonomy.

/// Domain of the entity.
pub const CLASS: &[&str] = &[
    "Air", "Ground", "Sea", "Weapon", "Sensor", "Navaid", "Misc", "Space",
];

/// Size / weight class.
pub const ATTRIBUTE: &[&str] = &["Static", "Heavy", "Medium", "Light", "Minor"];

/// Airframe or vehicle kind.
pub const BASIC: &[&str] = &[
    "FixedWing",
    "Rotorcraft",
    "Armor",
    "AntiAircraft",
    "Vehicle",
    "Watercraft",
    "Human",
    "Biologic",
    "Missile",
    "Rocket",
    "Bomb",
    "Torpedo",
    "Projectile",
    "Beam",
    "Decoy",
    "Building",
    "Bullseye",
    "Waypoint",
    "Spacecraft",
];

/// Fine-grained kind.
pub const SPECIFIC: &[&str] = &[
    "Tank",
    "Warship",
    "AircraftCarrier",
    "Submarine",
    "Infantry",
    "Parachutist",
    "Shell",
    "Bullet",
    "Grenade",
    "Flare",
    "Chaff",
    "SmokeGrenade",
    "Aerodrome",
    "Container",
    "Shrapnel",
    "Explosion",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Class,
    Attribute,
    Basic,
    Specific,
}

impl Slot {
    pub const ALL: [Slot; 4] = [Slot::Class, Slot::Attribute, Slot::Basic, Slot::Specific];

    fn vocabulary(self) -> &'static [&'static str] {
        match self {
            Slot::Class => CLASS,
            Slot::Attribute => ATTRIBUTE,
            Slot::Basic => BASIC,
            Slot::Specific => SPECIFIC,
        }
    }

    /// The slot whose vocabulary contains `token`, checked in [`Slot::ALL`] order.
    pub fn of(token: &str) -> Option<(Slot, &'static str)> {
        Slot::ALL.into_iter().find_map(|slot| {
            slot.vocabulary()
                .iter()
                .find(|word| **word == token)
                .map(|word| (slot, *word))
        })
    }
}

/// Strip whitespace and the punctuation `-_!@#$%^&()` from a token or name.
pub fn clean_token(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '_' | '!' | '@' | '#' | '$' | '%' | '^' | '&' | '(' | ')'))
        .collect()
}

/// Split a `+`-joined type string and clean each part.
pub fn split_type(raw: &str) -> impl Iterator<Item = String> + '_ {
    raw.split('+').map(clean_token)
}

/// At most one vocabulary word per slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Taxonomy {
    pub class: Option<&'static str>,
    pub attribute: Option<&'static str>,
    pub basic: Option<&'static str>,
    pub specific: Option<&'static str>,
}

impl Taxonomy {
    /// Classify cleaned tokens. Later tokens overwrite earlier ones in the same slot;
    /// tokens outside every vocabulary are dropped.
    pub fn classify<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut taxonomy = Self::default();
        for token in tokens {
            if let Some((slot, word)) = Slot::of(token.as_ref()) {
                *taxonomy.slot_mut(slot) = Some(word);
            }
        }
        taxonomy
    }

    pub fn from_type_string(raw: &str) -> Self {
        Self::classify(split_type(raw))
    }

    pub fn slot(&self, slot: Slot) -> Option<&'static str> {
        match slot {
            Slot::Class => self.class,
            Slot::Attribute => self.attribute,
            Slot::Basic => self.basic,
            Slot::Specific => self.specific,
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut Option<&'static str> {
        match slot {
            Slot::Class => &mut self.class,
            Slot::Attribute => &mut self.attribute,
            Slot::Basic => &mut self.basic,
            Slot::Specific => &mut self.specific,
        }
    }

    /// Whether a candidate with this taxonomy may represent `target`.
    pub fn accepts(&self, target: &Taxonomy) -> bool {
        Slot::ALL.into_iter().all(|slot| match self.slot(slot) {
            Some(word) => target.slot(slot) == Some(word),
            None => true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_each_slot() {
        let taxonomy = Taxonomy::from_type_string("Ground+Heavy+Armor+Tank");
        assert_eq!(taxonomy.class, Some("Ground"));
        assert_eq!(taxonomy.attribute, Some("Heavy"));
        assert_eq!(taxonomy.basic, Some("Armor"));
        assert_eq!(taxonomy.specific, Some("Tank"));
    }

    #[test]
    fn cleans_tokens_before_lookup() {
        let taxonomy = Taxonomy::from_type_string(" Air + Fixed_Wing ");
        assert_eq!(taxonomy.class, Some("Air"));
        assert_eq!(taxonomy.basic, Some("FixedWing"));
    }

    #[test]
    fn later_tokens_overwrite_slot() {
        let taxonomy = Taxonomy::from_type_string("Air+Sea+Unknown");
        assert_eq!(taxonomy.class, Some("Sea"));
        assert_eq!(taxonomy.basic, None);
    }

    #[test]
    fn empty_slots_are_wildcards() {
        let candidate = Taxonomy::from_type_string("Air");
        assert!(candidate.accepts(&Taxonomy::from_type_string("Air+FixedWing")));
        assert!(!candidate.accepts(&Taxonomy::from_type_string("Ground+Vehicle")));

        let strict = Taxonomy::from_type_string("Air+Rotorcraft");
        assert!(!strict.accepts(&Taxonomy::from_type_string("Air")));
        assert!(Taxonomy::default().accepts(&Taxonomy::default()));
    }

    #[test]
    fn clean_token_keeps_wildcard() {
        assert_eq!(clean_token("*"), "*");
        assert_eq!(clean_token("F-16 (C)"), "F16C");
    }
}
