//! In-memory PokeAPI used by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use pokedex_tui::api::PokeApi;
use pokedex_tui::error::FetchError;
use pokedex_tui::models::{
    DamageRelations, EvolutionChain, NamedResource, PokemonDetail, PokemonPage, PokemonRef,
    PokemonStub, Species, TypeRelation,
};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub type RelationTable = HashMap<String, TypeRelation>;

#[derive(Default)]
pub struct MockApi {
    pub stubs: Vec<PokemonStub>,
    pub details: HashMap<String, PokemonDetail>,
    pub relations: RelationTable,
    pub descriptions: HashMap<String, String>,
    /// Species name to evolution chain id.
    pub species_chains: HashMap<String, u32>,
    pub chains: HashMap<u32, EvolutionChain>,
    pub failing_details: HashSet<String>,
    pub failing_types: HashSet<String>,
    /// Extra latency for the detail request of a given name.
    pub delays: HashMap<String, Duration>,
    pub default_delay: Duration,
    /// Extra latency for the relation request of a given type.
    pub type_delays: HashMap<String, Duration>,
    pub list_delay: Duration,
    pub detail_calls: Mutex<Vec<String>>,
    pub type_calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl MockApi {
    /// Bulbasaur, Charmander, Squirtle and Pidgey with real type-chart data.
    pub fn kanto() -> Self {
        let mut api = MockApi::default();
        api.add_pokemon(1, "bulbasaur", &["grass", "poison"]);
        api.add_pokemon(4, "charmander", &["fire"]);
        api.add_pokemon(7, "squirtle", &["water"]);
        api.add_pokemon(16, "pidgey", &["normal", "flying"]);
        api.add_relation(
            "grass",
            &["flying", "poison", "bug", "fire", "ice"],
            &["ground", "rock", "water"],
        );
        api.add_relation("poison", &["ground", "psychic"], &["grass", "fairy"]);
        api.add_relation("fire", &["ground", "rock", "water"], &["bug", "steel", "grass", "ice"]);
        api.add_relation("water", &["grass", "electric"], &["ground", "rock", "fire"]);
        api.add_relation("normal", &["fighting"], &[]);
        api.add_relation("flying", &["rock", "electric", "ice"], &["fighting", "bug", "grass"]);
        api.descriptions.insert(
            "bulbasaur".into(),
            "A strange seed was\nplanted on its\u{c}back at birth.".into(),
        );
        api.add_chain(1, &[&["bulbasaur"], &["ivysaur"], &["venusaur"]]);
        api.add_chain(2, &[&["charmander"], &["charmeleon"], &["charizard"]]);
        api
    }

    pub fn add_pokemon(&mut self, id: u32, name: &str, types: &[&str]) {
        let types: Vec<_> = types
            .iter()
            .enumerate()
            .map(|(i, t)| json!({ "slot": i + 1, "type": { "name": t, "url": format!("https://pokeapi.co/api/v2/type/{}/", t) } }))
            .collect();
        let detail: PokemonDetail = serde_json::from_value(json!({
            "id": id,
            "name": name,
            "types": types,
            "height": 7,
            "weight": 69,
            "base_experience": 64,
            "sprites": { "front_default": format!("https://img.test/{}.png", id) },
            "stats": [
                { "base_stat": 45, "stat": { "name": "hp", "url": "" } },
                { "base_stat": 49, "stat": { "name": "attack", "url": "" } }
            ],
            "abilities": [ { "ability": { "name": "overgrow", "url": "" } } ],
            "species": { "name": name, "url": "" }
        }))
        .expect("detail fixture");
        self.stubs.push(PokemonStub::new(
            name,
            format!("https://pokeapi.co/api/v2/pokemon/{}/", id),
        ));
        self.details.insert(name.to_string(), detail);
    }

    pub fn add_relation(&mut self, name: &str, from: &[&str], to: &[&str]) {
        let named = |xs: &[&str]| xs.iter().map(|x| NamedResource::named(*x)).collect();
        self.relations.insert(
            name.to_string(),
            TypeRelation {
                name: name.to_string(),
                damage_relations: DamageRelations {
                    double_damage_from: named(from),
                    double_damage_to: named(to),
                    ..Default::default()
                },
            },
        );
    }

    /// Linear chain of stages; every species of a stage evolves from the
    /// first species of the previous one.
    pub fn add_chain(&mut self, id: u32, stages: &[&[&str]]) {
        fn link(stages: &[&[&str]]) -> Vec<serde_json::Value> {
            match stages.split_first() {
                None => Vec::new(),
                Some((stage, rest)) => stage
                    .iter()
                    .enumerate()
                    .map(|(i, name)| {
                        let next = if i == 0 { link(rest) } else { Vec::new() };
                        json!({ "species": { "name": name, "url": "" }, "evolves_to": next })
                    })
                    .collect(),
            }
        }
        let root = link(stages).into_iter().next().unwrap_or_else(|| json!({}));
        let chain: EvolutionChain =
            serde_json::from_value(json!({ "chain": root })).expect("chain fixture");
        for stage in stages {
            for name in stage.iter() {
                self.species_chains.insert(name.to_string(), id);
            }
        }
        self.chains.insert(id, chain);
    }

    pub fn stubs(&self, names: &[&str]) -> Vec<PokemonStub> {
        names
            .iter()
            .map(|n| {
                self.stubs
                    .iter()
                    .find(|s| s.name == *n)
                    .cloned()
                    .unwrap_or_else(|| PokemonStub::new(*n, ""))
            })
            .collect()
    }

    pub fn type_calls(&self) -> Vec<String> {
        self.type_calls.lock().unwrap().clone()
    }

    fn url(path: &str) -> String {
        format!("mock://{}", path)
    }
}

#[async_trait]
impl PokeApi for MockApi {
    async fn list(&self, limit: usize, offset: usize) -> Result<PokemonPage, FetchError> {
        if !self.list_delay.is_zero() {
            tokio::time::sleep(self.list_delay).await;
        }
        Ok(PokemonPage {
            count: self.stubs.len() as u32,
            next: None,
            previous: None,
            results: self.stubs.iter().skip(offset).take(limit).cloned().collect(),
        })
    }

    async fn pokemon(&self, which: &PokemonRef) -> Result<PokemonDetail, FetchError> {
        let key = which.to_string();
        self.detail_calls.lock().unwrap().push(key.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = self.delays.get(&key).copied().unwrap_or(self.default_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        } else {
            tokio::task::yield_now().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_details.contains(&key) {
            return Err(FetchError::Status {
                url: Self::url(&key),
                status: 500,
            });
        }
        let found = match which {
            PokemonRef::Name(name) => self.details.get(name),
            PokemonRef::Id(id) => self.details.values().find(|d| d.id == *id),
        };
        found.cloned().ok_or(FetchError::Status {
            url: Self::url(&key),
            status: 404,
        })
    }

    async fn type_relation(&self, name: &str) -> Result<TypeRelation, FetchError> {
        self.type_calls.lock().unwrap().push(name.to_string());
        if let Some(delay) = self.type_delays.get(name) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing_types.contains(name) {
            return Err(FetchError::Transport {
                url: Self::url(name),
                message: "connection reset".into(),
            });
        }
        self.relations.get(name).cloned().ok_or(FetchError::Status {
            url: Self::url(name),
            status: 404,
        })
    }

    async fn species(&self, name: &str) -> Result<Species, FetchError> {
        let text = self.descriptions.get(name);
        let chain = self.species_chains.get(name);
        if text.is_none() && chain.is_none() {
            return Err(FetchError::Status {
                url: Self::url(name),
                status: 404,
            });
        }
        let mut entries = vec![json!({ "flavor_text": "Une graine.", "language": { "name": "fr", "url": "" } })];
        if let Some(text) = text {
            entries.push(json!({ "flavor_text": text, "language": { "name": "en", "url": "" } }));
        }
        let link = chain.map(|id| json!({ "url": format!("https://pokeapi.co/api/v2/evolution-chain/{}/", id) }));
        let species = serde_json::from_value(json!({
            "flavor_text_entries": entries,
            "evolution_chain": link
        }))
        .expect("species fixture");
        Ok(species)
    }

    async fn evolution_chain(&self, id: u32) -> Result<EvolutionChain, FetchError> {
        self.chains.get(&id).cloned().ok_or(FetchError::Status {
            url: Self::url(&format!("evolution-chain/{}", id)),
            status: 404,
        })
    }

    async fn sprite(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if !url.starts_with("https://img.test/") {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            });
        }
        Ok(tiny_png())
    }
}

pub fn tiny_png() -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(4, 4, image::Rgba([120, 200, 80, 255]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageOutputFormat::Png)
        .expect("encode png");
    buf
}

pub fn names(entries: &[pokedex_tui::models::EnrichedEntry]) -> Vec<String> {
    entries.iter().map(|e| e.name().to_string()).collect()
}
