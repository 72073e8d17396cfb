//! ============================================================================
//! Persona Types - Coaching archetypes and their identifiers
//! ============================================================================

use serde::{Deserialize, Serialize};

/// Identifier of one of the eight coaching personas.
///
/// Declaration order is the classifier's tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PersonaId {
    Financial,
    Fitness,
    Study,
    Career,
    /// Fallback for tasks that match no keyword
    #[default]
    Life,
    Creative,
    Wellness,
    Cooking,
}

impl PersonaId {
    pub const ALL: [PersonaId; 8] = [
        PersonaId::Financial,
        PersonaId::Fitness,
        PersonaId::Study,
        PersonaId::Career,
        PersonaId::Life,
        PersonaId::Creative,
        PersonaId::Wellness,
        PersonaId::Cooking,
    ];

    /// The persona used when nothing else scores.
    pub const FALLBACK: PersonaId = PersonaId::Life;

    pub fn as_str(&self) -> &'static str {
        match self {
            PersonaId::Financial => "financial",
            PersonaId::Fitness => "fitness",
            PersonaId::Study => "study",
            PersonaId::Career => "career",
            PersonaId::Life => "life",
            PersonaId::Creative => "creative",
            PersonaId::Wellness => "wellness",
            PersonaId::Cooking => "cooking",
        }
    }
}

impl std::fmt::Display for PersonaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PersonaId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PersonaId::ALL
            .iter()
            .copied()
            .find(|id| id.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown persona: {}", s))
    }
}

/// A coaching persona: display metadata, prompt, and keyword triggers.
#[derive(Debug, Clone, Serialize)]
pub struct Persona {
    pub id: PersonaId,
    pub name: &'static str,
    pub emoji: &'static str,
    pub color: &'static str,
    pub description: &'static str,
    pub tone: &'static str,
    /// Lowercase trigger words; each weighs its character count
    pub keywords: &'static [&'static str],
    pub system_prompt: &'static str,
}

impl Persona {
    /// Length-weighted score of this persona against already-lowercased text.
    pub fn score(&self, folded_text: &str) -> usize {
        self.keywords
            .iter()
            .filter(|kw| folded_text.contains(*kw))
            .map(|kw| kw.chars().count())
            .sum()
    }
}

/// Persona fields copied onto a task when it is created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaStamp {
    pub persona_id: PersonaId,
    pub persona_name: String,
    pub persona_emoji: String,
    pub persona_color: String,
}

impl From<&Persona> for PersonaStamp {
    fn from(persona: &Persona) -> Self {
        Self {
            persona_id: persona.id,
            persona_name: persona.name.to_string(),
            persona_emoji: persona.emoji.to_string(),
            persona_color: persona.color.to_string(),
        }
    }
}

impl Default for PersonaStamp {
    fn default() -> Self {
        Self::from(super::get_persona(PersonaId::FALLBACK.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persona_id_round_trip_names() {
        for id in PersonaId::ALL {
            assert_eq!(id.as_str().parse::<PersonaId>().unwrap(), id);
        }
        assert!("astrology".parse::<PersonaId>().is_err());
        assert_eq!(" Fitness ".parse::<PersonaId>().unwrap(), PersonaId::Fitness);
    }

    #[test]
    fn test_default_is_fallback() {
        assert_eq!(PersonaId::default(), PersonaId::FALLBACK);
        assert_eq!(PersonaStamp::default().persona_id, PersonaId::Life);
    }
}
