use crate::normalize;

/// Coarse heuristic deciding whether a query names a visitor.
///
/// Resident keywords win over everything else. Otherwise the query needs at least
/// `min_name_tokens` tokens that are longer than one character and are not connective
/// particles.
pub fn looks_like_person_name(raw: &str, cfg: &portaria_config::Classifier) -> bool {
	let text = normalize::canonical_upper(raw);

	let is_resident_query = cfg
		.resident_keywords
		.iter()
		.any(|keyword| text.contains(&normalize::canonical_upper(keyword)));

	if is_resident_query {
		return false;
	}

	let tokens: Vec<&str> = text.split_whitespace().collect();

	if tokens.len() < 2 {
		return false;
	}

	let significant = tokens
		.iter()
		.filter(|token| token.chars().count() > 1)
		.filter(|token| !is_particle(token, &cfg.name_particles))
		.count();

	significant >= cfg.min_name_tokens
}

fn is_particle(token: &str, particles: &[String]) -> bool {
	particles.iter().any(|particle| particle.eq_ignore_ascii_case(token))
}
