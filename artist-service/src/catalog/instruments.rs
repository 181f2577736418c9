/// Family shown for instruments that are not in the table below.
pub const DEFAULT_FAMILY: &str = "Autres instruments";

const FAMILIES: &[(&str, &[&str])] = &[
    (
        "Cordes traditionnelles",
        &["Harpe arquée", "Harpe-luth Sawa", "Mvet", "Nkuu"],
    ),
    (
        "Cordes modernes",
        &[
            "Banjo",
            "Contrebasse",
            "Guitare acoustique",
            "Guitare basse",
            "Guitare électrique",
            "Harpe classique",
            "Mandoline",
            "Ukulélé",
            "Violon",
            "Violoncelle",
        ],
    ),
    (
        "Vents traditionnels",
        &[
            "Algaita",
            "Corne d'antilope",
            "Flûte en bambou",
            "Flûte peule",
            "Kakaki",
            "Sifflet rituel",
        ],
    ),
    (
        "Vents modernes",
        &[
            "Clarinette",
            "Flûte traversière",
            "Harmonica",
            "Hautbois",
            "Saxophone alto",
            "Saxophone soprano",
            "Saxophone ténor",
            "Trombone",
            "Trompette",
            "Tuba",
        ],
    ),
    (
        "Percussions sacrées",
        &["Balafon", "Bendré", "Djembé", "Tam-tam royal", "Tambour parlant"],
    ),
    (
        "Percussions traditionnelles",
        &[
            "Dum-dum",
            "Konga",
            "Maracas traditionnelles",
            "Mbole",
            "Nding",
            "Ndong-mo-ba",
            "Tam-tam",
        ],
    ),
    (
        "Percussions modernes",
        &[
            "Batterie complète",
            "Bongos",
            "Cajon",
            "Cloches",
            "Congas",
            "Cymbales",
            "Gong",
            "Shaker",
            "Tambourin",
            "Triangle",
        ],
    ),
    (
        "Claviers et harmoniques",
        &[
            "Accordéon",
            "Clavier MIDI",
            "Kalimba",
            "Orgue électronique",
            "Piano acoustique",
            "Piano électrique",
            "Sanza",
            "Synthétiseur",
        ],
    ),
    (
        "Instruments électroniques",
        &["Boîte à rythmes", "Sampler", "Turntables"],
    ),
];

/// Instrument family used to group instruments on profiles. Matching is on
/// the exact instrument name.
pub fn instrument_family(name: &str) -> &'static str {
    FAMILIES
        .iter()
        .find(|(_, members)| members.contains(&name))
        .map(|(family, _)| *family)
        .unwrap_or(DEFAULT_FAMILY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_instruments() {
        assert_eq!(instrument_family("Mvet"), "Cordes traditionnelles");
        assert_eq!(instrument_family("Balafon"), "Percussions sacrées");
        assert_eq!(instrument_family("Saxophone ténor"), "Vents modernes");
        assert_eq!(instrument_family("Turntables"), "Instruments électroniques");
    }

    #[test]
    fn test_unknown_instrument_uses_default_family() {
        assert_eq!(instrument_family("Theremin"), DEFAULT_FAMILY);
        assert_eq!(instrument_family("balafon"), DEFAULT_FAMILY);
    }

    #[test]
    fn test_no_instrument_in_two_families() {
        let mut seen = std::collections::HashSet::new();
        for (_, members) in FAMILIES {
            for name in *members {
                assert!(seen.insert(*name), "{} listed twice", name);
            }
        }
    }
}
