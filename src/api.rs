//! PokeAPI access.
//!
//! [`PokeApi`] is the seam between the enrichment pipeline and the network;
//! [`HttpPokeApi`] is the reqwest implementation used by the binary.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::error::FetchError;
use crate::models::{
    EvolutionChain, PokemonDetail, PokemonPage, PokemonRef, Species, TypeRelation,
};

pub const DEFAULT_BASE_URL: &str = "https://pokeapi.co/api/v2";

/// Read-only view of the remote Pokédex.
#[async_trait]
pub trait PokeApi: Send + Sync {
    /// One page of stubs, `limit` entries starting at `offset`.
    async fn list(&self, limit: usize, offset: usize) -> Result<PokemonPage, FetchError>;

    /// Canonical detail record for one Pokémon.
    async fn pokemon(&self, which: &PokemonRef) -> Result<PokemonDetail, FetchError>;

    /// Damage relations of one elemental type.
    async fn type_relation(&self, name: &str) -> Result<TypeRelation, FetchError>;

    /// Species record (flavor texts, evolution chain link).
    async fn species(&self, name: &str) -> Result<Species, FetchError>;

    /// Evolution family by chain id.
    async fn evolution_chain(&self, id: u32) -> Result<EvolutionChain, FetchError>;

    /// Raw image bytes behind a sprite URL.
    async fn sprite(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Offset of a 1-based page.
pub fn page_offset(page: usize, limit: usize) -> usize {
    page.saturating_sub(1) * limit
}

pub struct HttpPokeApi {
    base_url: String,
    client: reqwest::Client,
}

impl HttpPokeApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pokedex_tui/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::from_reqwest(base_url, e))?;
        Ok(Self::with_client(base_url, client))
    }

    pub fn with_client(base_url: &str, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn list_url(&self, limit: usize, offset: usize) -> String {
        format!("{}/pokemon?limit={}&offset={}", self.base_url, limit, offset)
    }

    pub fn pokemon_url(&self, which: &PokemonRef) -> String {
        format!("{}/pokemon/{}", self.base_url, which)
    }

    pub fn type_url(&self, name: &str) -> String {
        format!("{}/type/{}", self.base_url, name)
    }

    pub fn species_url(&self, name: &str) -> String {
        format!("{}/pokemon-species/{}", self.base_url, name)
    }

    pub fn evolution_chain_url(&self, id: u32) -> String {
        format!("{}/evolution-chain/{}", self.base_url, id)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        debug!(url, "GET");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        let resp = resp
            .error_for_status()
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        debug!(url, "GET bytes");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl PokeApi for HttpPokeApi {
    async fn list(&self, limit: usize, offset: usize) -> Result<PokemonPage, FetchError> {
        self.get_json(&self.list_url(limit, offset)).await
    }

    async fn pokemon(&self, which: &PokemonRef) -> Result<PokemonDetail, FetchError> {
        self.get_json(&self.pokemon_url(which)).await
    }

    async fn type_relation(&self, name: &str) -> Result<TypeRelation, FetchError> {
        self.get_json(&self.type_url(name)).await
    }

    async fn species(&self, name: &str) -> Result<Species, FetchError> {
        self.get_json(&self.species_url(name)).await
    }

    async fn evolution_chain(&self, id: u32) -> Result<EvolutionChain, FetchError> {
        self.get_json(&self.evolution_chain_url(id)).await
    }

    async fn sprite(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.get_bytes(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api() -> HttpPokeApi {
        HttpPokeApi::with_client("https://pokeapi.co/api/v2/", reqwest::Client::new())
    }

    #[test]
    fn builds_endpoint_urls() {
        let api = api();
        assert_eq!(api.base_url(), "https://pokeapi.co/api/v2");
        assert_eq!(
            api.list_url(150, 300),
            "https://pokeapi.co/api/v2/pokemon?limit=150&offset=300"
        );
        assert_eq!(
            api.pokemon_url(&PokemonRef::Id(25)),
            "https://pokeapi.co/api/v2/pokemon/25"
        );
        assert_eq!(
            api.pokemon_url(&PokemonRef::Name("mr-mime".into())),
            "https://pokeapi.co/api/v2/pokemon/mr-mime"
        );
        assert_eq!(api.type_url("fire"), "https://pokeapi.co/api/v2/type/fire");
        assert_eq!(
            api.species_url("bulbasaur"),
            "https://pokeapi.co/api/v2/pokemon-species/bulbasaur"
        );
        assert_eq!(
            api.evolution_chain_url(1),
            "https://pokeapi.co/api/v2/evolution-chain/1"
        );
    }

    #[test]
    fn page_offsets_are_one_based() {
        assert_eq!(page_offset(1, 150), 0);
        assert_eq!(page_offset(3, 10), 20);
        assert_eq!(page_offset(0, 10), 0);
    }
}
