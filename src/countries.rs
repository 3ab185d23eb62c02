//! Static country tables consulted by every component.

/// Language tokenizer used for a country's tenders, keyed by 2-alpha code.
pub fn language_for(country: &str) -> Option<&'static str> {
    let language = match country {
        "HR" => "hbs",
        "BE" => "nl",
        "BG" => "bg",
        "HU" => "hu",
        "PT" => "pt",
        "LV" => "lv",
        "NO" => "nn",
        "EL" => "el",
        "PL" => "pl",
        "SK" => "sk",
        "DK" => "da",
        "LT" => "lt",
        "ES" => "es",
        "SI" => "sl",
        "CZ" => "cs",
        "IT" => "it",
        "CY" => "el",
        "NL" => "nl",
        "SE" => "sv",
        "EE" => "et",
        "FI" => "fi",
        "DE" => "de",
        "IE" => "en",
        "RO" => "ro",
        "MT" => "en",
        "FR" => "fr",
        "AT" => "de",
        "LU" => "de",
        "UK" => "en",
        "CH" => "fr",
        _ => return None,
    };
    Some(language)
}

/// Human-readable country name for a 2-alpha code.
pub fn display_name(country: &str) -> Option<&'static str> {
    let name = match country {
        "UK" => "United Kingdom",
        "DE" => "Germany",
        "HR" => "Croatia",
        "AT" => "Austria",
        "NL" => "The Netherlands",
        "IT" => "Italy",
        "FR" => "France",
        "BE" => "Belgium",
        "BG" => "Bulgaria",
        "HU" => "Hungary",
        "PT" => "Portugal",
        "LV" => "Latvia",
        "NO" => "Norway",
        "EL" => "Greece",
        "PL" => "Poland",
        "SK" => "Slovakia",
        "DK" => "Denmark",
        "LT" => "Lithuania",
        "ES" => "Spain",
        "SI" => "Slovenia",
        "CZ" => "Czechia",
        "CY" => "Cyprus",
        "SE" => "Sweden",
        "EE" => "Estonia",
        "FI" => "Finland",
        "LU" => "Luxembourg",
        "IE" => "Ireland",
        "RO" => "Romania",
        "MT" => "Malta",
        "CH" => "Switzerland",
        _ => return None,
    };
    Some(name)
}

pub fn is_supported(country: &str) -> bool {
    language_for(country).is_some()
}
