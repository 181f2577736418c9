//! Text helpers used across the marketplace: slugs, contact links and
//! human friendly formatting of sizes and durations.

/// Build a URL slug from a display name.
///
/// Accented latin letters are folded to ASCII, characters that are neither
/// alphanumeric, whitespace, `-` nor `_` are dropped, and runs of whitespace
/// or dashes become a single `-`.
pub fn slugify(value: &str) -> String {
    let mut cleaned = String::with_capacity(value.len());
    for c in value.chars().flat_map(fold_accent) {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c.is_whitespace() {
            cleaned.push(c);
        }
    }

    let mut slug = String::with_capacity(cleaned.len());
    let mut pending_dash = false;
    for c in cleaned.trim().chars() {
        if c == '-' || c.is_whitespace() {
            pending_dash = true;
            continue;
        }
        if pending_dash && !slug.is_empty() {
            slug.push('-');
        }
        pending_dash = false;
        slug.push(c);
    }

    slug.trim_matches(|c| c == '-' || c == '_').to_string()
}

fn fold_accent(c: char) -> Vec<char> {
    let folded: &str = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => "a",
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => "A",
        'ç' => "c",
        'Ç' => "C",
        'è' | 'é' | 'ê' | 'ë' => "e",
        'È' | 'É' | 'Ê' | 'Ë' => "E",
        'ì' | 'í' | 'î' | 'ï' => "i",
        'Ì' | 'Í' | 'Î' | 'Ï' => "I",
        'ñ' => "n",
        'Ñ' => "N",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' => "o",
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' => "O",
        'ù' | 'ú' | 'û' | 'ü' => "u",
        'Ù' | 'Ú' | 'Û' | 'Ü' => "U",
        'ý' | 'ÿ' => "y",
        'Ý' | 'Ÿ' => "Y",
        'œ' => "oe",
        'Œ' => "OE",
        'æ' => "ae",
        'Æ' => "AE",
        _ => return vec![c],
    };
    folded.chars().collect()
}

/// Emails are unique identifiers: trim and lowercase the domain part.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.to_string(),
    }
}

/// `first last`, trimmed, as used for display when no stage or
/// organization name is set.
pub fn full_name(first_name: &str, last_name: &str) -> String {
    format!("{} {}", first_name.trim(), last_name.trim())
        .trim()
        .to_string()
}

/// Pick the first non-blank name, falling back to the full name.
pub fn display_name(preferred: Option<&str>, first_name: &str, last_name: &str) -> String {
    match preferred.map(str::trim).filter(|s| !s.is_empty()) {
        Some(name) => name.to_string(),
        None => full_name(first_name, last_name),
    }
}

/// Cameroon country calling code, prefixed to local numbers.
pub const COUNTRY_CODE: &str = "237";

/// International digits for a phone number, or `None` when it has no digits.
pub fn international_number(phone: &str) -> Option<String> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    if digits.starts_with(COUNTRY_CODE) {
        return Some(digits);
    }
    Some(format!("{}{}", COUNTRY_CODE, digits.trim_start_matches('0')))
}

/// `https://wa.me/<number>` with an optional pre-filled message.
pub fn whatsapp_link(phone: &str, message: &str) -> Option<String> {
    let number = international_number(phone)?;
    if message.is_empty() {
        Some(format!("https://wa.me/{}", number))
    } else {
        Some(format!(
            "https://wa.me/{}?text={}",
            number,
            urlencoding::encode(message)
        ))
    }
}

pub fn human_file_size(bytes: i64) -> String {
    let size = bytes.max(0) as f64;
    if size < 1024.0 {
        format!("{} B", bytes.max(0))
    } else if size < 1024.0 * 1024.0 {
        format!("{:.1} KB", size / 1024.0)
    } else {
        format!("{:.1} MB", size / (1024.0 * 1024.0))
    }
}

/// `MM:SS`; minutes are not wrapped into hours.
pub fn format_duration(seconds: Option<i32>) -> String {
    match seconds {
        Some(s) if s > 0 => format!("{:02}:{:02}", s / 60, s % 60),
        _ => "00:00".to_string(),
    }
}
