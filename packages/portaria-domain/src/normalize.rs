use unicode_normalization::UnicodeNormalization;

/// Decomposes `text` and drops combining diacritical marks, so "JOÃO" becomes "JOAO".
pub fn fold_diacritics(text: &str) -> String {
	text.nfd().filter(|ch| !('\u{0300}'..='\u{036f}').contains(ch)).collect()
}

/// Diacritic-free, upper-cased and trimmed form used for matching and classification.
pub fn canonical_upper(text: &str) -> String {
	fold_diacritics(text).to_uppercase().trim().to_string()
}

/// Rewrites a free-text query into the form that is embedded for vector search.
///
/// Short queries are padded with access-log context terms. When the query carries no
/// visitor-role keyword it is also repeated after each person term, which weights person
/// matches above location or vehicle matches.
pub fn normalize_query(raw: &str, cfg: &portaria_config::Normalizer) -> String {
	let text = canonical_upper(raw);

	if text.chars().count() >= cfg.short_query_chars {
		return text;
	}

	let contexts = cfg.context_terms.join(" ");
	let has_visitor_keyword =
		cfg.visitor_keywords.iter().any(|keyword| text.contains(&canonical_upper(keyword)));

	if has_visitor_keyword {
		return join_nonempty([contexts.as_str(), text.as_str()]);
	}

	let mut parts = Vec::with_capacity(cfg.person_terms.len() * 2 + 2);

	for term in &cfg.person_terms {
		parts.push(term.as_str());
		parts.push(text.as_str());
	}

	parts.push(contexts.as_str());
	parts.push(text.as_str());

	join_nonempty(parts)
}

fn join_nonempty<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
	parts.into_iter().filter(|part| !part.is_empty()).collect::<Vec<_>>().join(" ")
}
