use serde::Serialize;

/// Predefined opening messages offered on the WhatsApp contact page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageTemplate {
    General,
    Wedding,
    Birthday,
    Corporate,
    Concert,
    Custom,
}

impl MessageTemplate {
    pub const ALL: [MessageTemplate; 6] = [
        MessageTemplate::General,
        MessageTemplate::Wedding,
        MessageTemplate::Birthday,
        MessageTemplate::Corporate,
        MessageTemplate::Concert,
        MessageTemplate::Custom,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            MessageTemplate::General => "general",
            MessageTemplate::Wedding => "wedding",
            MessageTemplate::Birthday => "birthday",
            MessageTemplate::Corporate => "corporate",
            MessageTemplate::Concert => "concert",
            MessageTemplate::Custom => "custom",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            MessageTemplate::General => "Contact général",
            MessageTemplate::Wedding => "Mariage",
            MessageTemplate::Birthday => "Anniversaire",
            MessageTemplate::Corporate => "Événement d'entreprise",
            MessageTemplate::Concert => "Concert/Festival",
            MessageTemplate::Custom => "Message personnalisé",
        }
    }

    /// Unknown ids fall back to the general template.
    pub fn from_id(id: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|t| t.id() == id)
            .unwrap_or(MessageTemplate::General)
    }

    /// The message text with the artist's display name filled in. The
    /// custom template has no text of its own.
    pub fn message(&self, artist_name: &str) -> String {
        match self {
            MessageTemplate::General => format!(
                "Bonjour {}, je vous contacte via TalentZik pour discuter d'une collaboration.",
                artist_name
            ),
            MessageTemplate::Wedding => format!(
                "Bonjour {}, je prépare un mariage et j'aimerais connaître vos disponibilités et tarifs.",
                artist_name
            ),
            MessageTemplate::Birthday => format!(
                "Bonjour {}, j'organise un anniversaire et je recherche un artiste comme vous. Êtes-vous disponible ?",
                artist_name
            ),
            MessageTemplate::Corporate => format!(
                "Bonjour {}, notre entreprise organise un événement et nous recherchons un artiste professionnel. Pouvons-nous discuter ?",
                artist_name
            ),
            MessageTemplate::Concert => format!(
                "Bonjour {}, nous organisons un concert/festival et aimerions vous proposer une participation. Intéressé(e) ?",
                artist_name
            ),
            MessageTemplate::Custom => String::new(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TemplateView {
    pub id: &'static str,
    pub title: &'static str,
    pub message: String,
}

pub fn templates_for(artist_name: &str) -> Vec<TemplateView> {
    MessageTemplate::ALL
        .iter()
        .map(|t| TemplateView {
            id: t.id(),
            title: t.title(),
            message: t.message(artist_name),
        })
        .collect()
}

/// Text actually sent: a non-blank custom message wins when the custom
/// template is chosen, otherwise the chosen (or general) template.
pub fn compose_message(artist_name: &str, message_type: &str, custom_message: Option<&str>) -> String {
    let template = MessageTemplate::from_id(message_type);
    let custom = custom_message.map(str::trim).filter(|m| !m.is_empty());

    match (template, custom) {
        (MessageTemplate::Custom, Some(text)) => text.to_string(),
        (MessageTemplate::Custom, None) => MessageTemplate::General.message(artist_name),
        (template, _) => template.message(artist_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_templates_fill_in_name() {
        let templates = templates_for("Charlotte Dipanda");
        assert_eq!(templates.len(), 6);
        assert_eq!(templates[0].id, "general");
        assert!(templates[1].message.starts_with("Bonjour Charlotte Dipanda, je prépare un mariage"));
        assert_eq!(templates[5].message, "");
    }

    #[test]
    fn test_compose_custom_message() {
        assert_eq!(
            compose_message("Petit Pays", "custom", Some("  Disponible le 12 ?  ")),
            "Disponible le 12 ?"
        );
    }

    #[test]
    fn test_blank_custom_message_falls_back_to_general() {
        assert_eq!(
            compose_message("Petit Pays", "custom", Some("   ")),
            MessageTemplate::General.message("Petit Pays")
        );
    }

    #[test]
    fn test_unknown_type_falls_back_to_general() {
        assert_eq!(
            compose_message("Petit Pays", "funeral", None),
            MessageTemplate::General.message("Petit Pays")
        );
        assert_eq!(
            compose_message("Petit Pays", "concert", Some("ignored")),
            MessageTemplate::Concert.message("Petit Pays")
        );
    }
}
