use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::FetchError;

/// Unresolved reference to a Pokémon, as returned by the list endpoint.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct PokemonStub {
    pub name: String,
    #[serde(default)]
    pub url: String,
}

impl PokemonStub {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// One page of the `/pokemon?limit=&offset=` listing.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct PokemonPage {
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    #[serde(default)]
    pub results: Vec<PokemonStub>,
}

/// Identifier accepted by the detail endpoint: a name or a national-dex id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PokemonRef {
    Id(u32),
    Name(String),
}

impl FromStr for PokemonRef {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.contains('/') {
            return Err(FetchError::InvalidRef(s.to_string()));
        }
        match s.parse::<u32>() {
            Ok(0) => Err(FetchError::InvalidRef(s.to_string())),
            Ok(id) => Ok(PokemonRef::Id(id)),
            Err(_) => Ok(PokemonRef::Name(s.to_lowercase())),
        }
    }
}

impl fmt::Display for PokemonRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PokemonRef::Id(id) => write!(f, "{}", id),
            PokemonRef::Name(name) => f.write_str(name),
        }
    }
}

/// `{ name, url }` pair used all over the PokeAPI payloads.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct NamedResource {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
}

impl NamedResource {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: String::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct TypeSlot {
    #[serde(default)]
    pub slot: u8,
    #[serde(rename = "type", default)]
    pub kind: NamedResource,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct StatSlot {
    #[serde(default)]
    pub base_stat: u32,
    #[serde(default)]
    pub stat: NamedResource,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AbilitySlot {
    #[serde(default)]
    pub ability: NamedResource,
    #[serde(default)]
    pub is_hidden: bool,
}

/// Raw sprite block. Only the fields the viewer uses are typed; the
/// generation-specific tree stays loose because any hop may be absent.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Sprites {
    #[serde(default)]
    pub front_default: Option<String>,
    #[serde(default)]
    pub versions: Option<serde_json::Value>,
}

impl Sprites {
    /// Gen V black/white animated front sprite, if the payload carries one.
    pub fn animated_front(&self) -> Option<&str> {
        self.versions
            .as_ref()?
            .get("generation-v")?
            .get("black-white")?
            .get("animated")?
            .get("front_default")?
            .as_str()
            .filter(|s| !s.is_empty())
    }

    /// Animated sprite, else the static default, else a placeholder.
    pub fn pick(&self) -> Sprite {
        if let Some(url) = self.animated_front() {
            return Sprite::Animated(url.to_string());
        }
        match self.front_default.as_deref() {
            Some(url) if !url.is_empty() => Sprite::Static(url.to_string()),
            _ => Sprite::Placeholder,
        }
    }
}

/// Raw `/pokemon/{name|id}` payload. Every field defaults so that partial
/// responses still decode.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct PokemonDetail {
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub types: Vec<TypeSlot>,
    #[serde(default)]
    pub sprites: Sprites,
    #[serde(default)]
    pub stats: Vec<StatSlot>,
    #[serde(default)]
    pub abilities: Vec<AbilitySlot>,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub weight: u32,
    #[serde(default)]
    pub base_experience: Option<u32>,
    #[serde(default)]
    pub species: Option<NamedResource>,
}

impl PokemonDetail {
    /// Type names ordered by slot.
    pub fn type_names(&self) -> Vec<String> {
        let mut slots: Vec<&TypeSlot> = self.types.iter().collect();
        slots.sort_by_key(|t| t.slot);
        slots
            .into_iter()
            .map(|t| t.kind.name.clone())
            .filter(|n| !n.is_empty())
            .collect()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct DamageRelations {
    #[serde(default)]
    pub double_damage_from: Vec<NamedResource>,
    #[serde(default)]
    pub double_damage_to: Vec<NamedResource>,
    #[serde(default)]
    pub half_damage_from: Vec<NamedResource>,
    #[serde(default)]
    pub half_damage_to: Vec<NamedResource>,
    #[serde(default)]
    pub no_damage_from: Vec<NamedResource>,
    #[serde(default)]
    pub no_damage_to: Vec<NamedResource>,
}

/// Raw `/type/{name}` payload.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct TypeRelation {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub damage_relations: DamageRelations,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct FlavorText {
    #[serde(default)]
    pub flavor_text: String,
    #[serde(default)]
    pub language: NamedResource,
}

/// Bare `{ url }` link, as used for the species' evolution chain.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct ApiLink {
    #[serde(default)]
    pub url: String,
}

impl ApiLink {
    /// Trailing numeric id of a PokeAPI resource URL
    /// (`.../evolution-chain/1/` → `1`).
    pub fn id(&self) -> Option<u32> {
        self.url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .and_then(|s| s.parse().ok())
    }
}

/// Raw `/pokemon-species/{name}` payload, reduced to the flavor texts and the
/// evolution chain link.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Species {
    #[serde(default)]
    pub flavor_text_entries: Vec<FlavorText>,
    #[serde(default)]
    pub evolution_chain: Option<ApiLink>,
}

impl Species {
    /// First English flavor text with the game-text line breaks flattened.
    pub fn english_description(&self) -> Option<String> {
        self.flavor_text_entries
            .iter()
            .find(|e| e.language.name == "en")
            .map(|e| {
                e.flavor_text
                    .replace(['\n', '\u{c}'], " ")
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
            })
    }
}

/// One stage of an evolution chain and everything it evolves into.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ChainLink {
    #[serde(default)]
    pub species: NamedResource,
    #[serde(default)]
    pub evolves_to: Vec<ChainLink>,
}

/// Raw `/evolution-chain/{id}` payload.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct EvolutionChain {
    #[serde(default)]
    pub chain: ChainLink,
}

impl EvolutionChain {
    /// Species names in chain order: each stage before the stages it evolves
    /// into, branches left to right.
    pub fn species_names(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack = vec![&self.chain];
        while let Some(link) = stack.pop() {
            if !link.species.name.is_empty() && !out.contains(&link.species.name) {
                out.push(link.species.name.clone());
            }
            stack.extend(link.evolves_to.iter().rev());
        }
        out
    }
}

/// Sprite chosen for display.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Default)]
#[serde(tag = "kind", content = "url", rename_all = "snake_case")]
pub enum Sprite {
    Animated(String),
    Static(String),
    #[default]
    Placeholder,
}

impl Sprite {
    pub fn url(&self) -> Option<&str> {
        match self {
            Sprite::Animated(url) | Sprite::Static(url) => Some(url),
            Sprite::Placeholder => None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct Stat {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub base: u32,
}

pub const NO_DESCRIPTION: &str = "No description available.";

/// Display-ready Pokémon. Built once per fetch and replaced wholesale on
/// refresh.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct PokemonRecord {
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub sprite: Sprite,
    #[serde(default)]
    pub stats: Vec<Stat>,
    #[serde(default)]
    pub abilities: Vec<String>,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub weight: u32,
    #[serde(default)]
    pub base_experience: u32,
    #[serde(default)]
    pub description: String,
    /// Species names of the whole evolution family, in chain order.
    #[serde(default)]
    pub evolutions: Vec<String>,
}

impl PokemonRecord {
    /// Base fields from a detail payload; weaknesses, strengths and
    /// description are filled in by the enricher.
    pub fn from_detail(stub: &PokemonStub, detail: &PokemonDetail) -> Self {
        let name = if detail.name.is_empty() {
            stub.name.clone()
        } else {
            detail.name.clone()
        };
        Self {
            id: detail.id,
            name,
            url: stub.url.clone(),
            types: detail.type_names(),
            weaknesses: Vec::new(),
            strengths: Vec::new(),
            sprite: detail.sprites.pick(),
            stats: detail
                .stats
                .iter()
                .map(|s| Stat {
                    name: s.stat.name.clone(),
                    base: s.base_stat,
                })
                .collect(),
            abilities: detail
                .abilities
                .iter()
                .map(|a| a.ability.name.clone())
                .filter(|n| !n.is_empty())
                .collect(),
            height: detail.height,
            weight: detail.weight,
            base_experience: detail.base_experience.unwrap_or(0),
            description: NO_DESCRIPTION.to_string(),
            evolutions: Vec::new(),
        }
    }

    pub fn has_type(&self, kind: &str) -> bool {
        self.types.iter().any(|t| t.eq_ignore_ascii_case(kind))
    }

    /// Height in metres (PokeAPI reports decimetres).
    pub fn height_m(&self) -> f32 {
        self.height as f32 / 10.0
    }

    /// Weight in kilograms (PokeAPI reports hectograms).
    pub fn weight_kg(&self) -> f32 {
        self.weight as f32 / 10.0
    }

    pub fn is_weak_to(&self, kind: &str) -> bool {
        self.weaknesses.iter().any(|t| t.eq_ignore_ascii_case(kind))
    }
}

/// Outcome of enriching one stub.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EnrichedEntry {
    /// Detail and every type relation resolved.
    Complete(PokemonRecord),
    /// Detail resolved but the listed type relations did not; weaknesses and
    /// strengths cover only the relations that did.
    Partial {
        record: PokemonRecord,
        missing_relations: Vec<String>,
    },
    /// The detail fetch itself failed.
    Failed {
        stub: PokemonStub,
        reason: String,
        #[serde(default)]
        retryable: bool,
    },
}

impl EnrichedEntry {
    pub fn record(&self) -> Option<&PokemonRecord> {
        match self {
            EnrichedEntry::Complete(record) | EnrichedEntry::Partial { record, .. } => Some(record),
            EnrichedEntry::Failed { .. } => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            EnrichedEntry::Complete(record) | EnrichedEntry::Partial { record, .. } => &record.name,
            EnrichedEntry::Failed { stub, .. } => &stub.name,
        }
    }

    pub fn id(&self) -> Option<u32> {
        self.record().map(|r| r.id)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, EnrichedEntry::Failed { .. })
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, EnrichedEntry::Partial { .. })
    }
}

/// Tally of entry outcomes for one run.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryCounts {
    pub complete: usize,
    pub partial: usize,
    pub failed: usize,
}

impl EntryCounts {
    pub fn tally(entries: &[EnrichedEntry]) -> Self {
        entries.iter().fold(Self::default(), |mut c, e| {
            match e {
                EnrichedEntry::Complete(_) => c.complete += 1,
                EnrichedEntry::Partial { .. } => c.partial += 1,
                EnrichedEntry::Failed { .. } => c.failed += 1,
            }
            c
        })
    }

    pub fn total(&self) -> usize {
        self.complete + self.partial + self.failed
    }
}

/// The eighteen elemental types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementType {
    Normal,
    Fighting,
    Flying,
    Poison,
    Ground,
    Rock,
    Bug,
    Ghost,
    Steel,
    Fire,
    Water,
    Grass,
    Electric,
    Psychic,
    Ice,
    Dragon,
    Dark,
    Fairy,
}

impl ElementType {
    pub const ALL: [ElementType; 18] = [
        ElementType::Normal,
        ElementType::Fighting,
        ElementType::Flying,
        ElementType::Poison,
        ElementType::Ground,
        ElementType::Rock,
        ElementType::Bug,
        ElementType::Ghost,
        ElementType::Steel,
        ElementType::Fire,
        ElementType::Water,
        ElementType::Grass,
        ElementType::Electric,
        ElementType::Psychic,
        ElementType::Ice,
        ElementType::Dragon,
        ElementType::Dark,
        ElementType::Fairy,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ElementType::Normal => "normal",
            ElementType::Fighting => "fighting",
            ElementType::Flying => "flying",
            ElementType::Poison => "poison",
            ElementType::Ground => "ground",
            ElementType::Rock => "rock",
            ElementType::Bug => "bug",
            ElementType::Ghost => "ghost",
            ElementType::Steel => "steel",
            ElementType::Fire => "fire",
            ElementType::Water => "water",
            ElementType::Grass => "grass",
            ElementType::Electric => "electric",
            ElementType::Psychic => "psychic",
            ElementType::Ice => "ice",
            ElementType::Dragon => "dragon",
            ElementType::Dark => "dark",
            ElementType::Fairy => "fairy",
        }
    }

    /// Badge colour used by the viewer.
    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            ElementType::Normal => (168, 168, 120),
            ElementType::Fire => (240, 128, 48),
            ElementType::Water => (104, 144, 240),
            ElementType::Grass => (120, 200, 80),
            ElementType::Electric => (248, 208, 48),
            ElementType::Ice => (152, 216, 216),
            ElementType::Fighting => (192, 48, 40),
            ElementType::Poison => (160, 64, 160),
            ElementType::Ground => (224, 192, 104),
            ElementType::Flying => (168, 144, 240),
            ElementType::Psychic => (248, 88, 136),
            ElementType::Bug => (168, 184, 32),
            ElementType::Rock => (184, 160, 56),
            ElementType::Ghost => (112, 88, 152),
            ElementType::Dragon => (112, 56, 248),
            ElementType::Dark => (112, 88, 72),
            ElementType::Steel => (184, 184, 208),
            ElementType::Fairy => (238, 153, 172),
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        ElementType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| format!("unknown type {:?}", s))
    }
}
