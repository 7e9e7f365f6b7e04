//! Small text helpers shared by the viewer and the CLI.

use crate::models::PokemonRecord;

/// Format a Pokémon `name` into a human-friendly form.
///
/// Examples: `mr-mime` -> `Mr Mime`, `ho_oh` -> `Ho Oh`.
pub fn format_name(name: &str) -> String {
    let replaced = name.replace(['-', '_'], " ");
    let parts: Vec<String> = replaced
        .split_whitespace()
        .map(|w| {
            let mut chs = w.chars();
            match chs.next() {
                None => String::new(),
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chs.as_str().to_lowercase()
                }
            }
        })
        .collect();
    parts.join(" ")
}

pub fn text_to_lines(s: &str, width: usize) -> Vec<String> {
    // Wrap text into lines no longer than `width` (simple greedy algorithm).
    let mut lines = vec![];
    let mut current = String::new();
    for word in s.split_whitespace() {
        if current.len() + word.len() + 1 > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Short column label for a base stat.
pub fn stat_label(name: &str) -> String {
    match name {
        "hp" => "HP".to_string(),
        "attack" => "ATK".to_string(),
        "defense" => "DEF".to_string(),
        "special-attack" => "SpA".to_string(),
        "special-defense" => "SpD".to_string(),
        "speed" => "SPD".to_string(),
        other => format_name(other),
    }
}

/// Plain-text card used by `pokedex show`.
pub fn describe_record(p: &PokemonRecord) -> String {
    let mut s = format!("{} (#{})\n", format_name(&p.name), p.id);
    s.push_str(&format!("Types: {}\n", p.types.join(", ")));
    s.push_str(&format!("Weak to: {}\n", list_or_none(&p.weaknesses)));
    s.push_str(&format!("Strong against: {}\n", list_or_none(&p.strengths)));
    if !p.abilities.is_empty() {
        s.push_str(&format!("Abilities: {}\n", p.abilities.join(", ")));
    }
    s.push_str(&format!("{}\n", size_line(p)));
    if let Some(line) = evolution_line(&p.evolutions) {
        s.push_str(&format!("Evolutions: {}\n", line));
    }
    for st in &p.stats {
        s.push_str(&format!("  {:<4} {:>3}\n", stat_label(&st.name), st.base));
    }
    if let Some(url) = p.sprite.url() {
        s.push_str(&format!("Sprite: {}\n", url));
    }
    s.push_str(&p.description);
    s
}

/// Height and weight in metres and kilograms, plus base experience.
pub fn size_line(p: &PokemonRecord) -> String {
    format!(
        "Height: {:.1} m  Weight: {:.1} kg  Base EXP: {}",
        p.height_m(),
        p.weight_kg(),
        p.base_experience
    )
}

/// `Bulbasaur → Ivysaur → Venusaur`, or `None` for a Pokémon with no
/// known family.
pub fn evolution_line(names: &[String]) -> Option<String> {
    if names.is_empty() {
        return None;
    }
    let names: Vec<String> = names.iter().map(|n| format_name(n)).collect();
    Some(names.join(" → "))
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none known".to_string()
    } else {
        items.join(", ")
    }
}
