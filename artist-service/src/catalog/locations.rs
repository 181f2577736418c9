use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Choice {
    pub value: &'static str,
    pub label: &'static str,
}

const fn choice(value: &'static str, label: &'static str) -> Choice {
    Choice { value, label }
}

/// The ten regions of Cameroon.
pub const REGIONS: &[Choice] = &[
    choice("adamaoua", "Adamaoua"),
    choice("centre", "Centre"),
    choice("est", "Est"),
    choice("extreme-nord", "Extrême-Nord"),
    choice("littoral", "Littoral"),
    choice("nord", "Nord"),
    choice("nord-ouest", "Nord-Ouest"),
    choice("ouest", "Ouest"),
    choice("sud", "Sud"),
    choice("sud-ouest", "Sud-Ouest"),
];

pub const MAJOR_CITIES: &[Choice] = &[
    choice("douala", "Douala"),
    choice("yaounde", "Yaoundé"),
    choice("bamenda", "Bamenda"),
    choice("bafoussam", "Bafoussam"),
    choice("garoua", "Garoua"),
    choice("maroua", "Maroua"),
    choice("ngaoundere", "Ngaoundéré"),
    choice("bertoua", "Bertoua"),
    choice("buea", "Buea"),
    choice("limbe", "Limbé"),
    choice("edea", "Edéa"),
    choice("kumba", "Kumba"),
    choice("foumban", "Foumban"),
    choice("dschang", "Dschang"),
    choice("ebolowa", "Ebolowa"),
    choice("sangmelima", "Sangmélima"),
];

/// Display label for a region or city filter value, if it is a known one.
pub fn label_for(value: &str) -> Option<&'static str> {
    REGIONS
        .iter()
        .chain(MAJOR_CITIES.iter())
        .find(|c| c.value == value)
        .map(|c| c.label)
}
