use crate::types::ApiError;

pub const MAX_SLUG_LENGTH: usize = 60;

/// Keeps whole words from the front of `title` while the result stays within
/// `MAX_SLUG_LENGTH` characters.
pub fn clamp_title(title: &str) -> Result<String, ApiError> {
    let mut result = String::new();

    for word in title.trim().split(' ').filter(|word| !word.is_empty()) {
        let word_len = word.chars().count();
        if result.is_empty() {
            if word_len > MAX_SLUG_LENGTH {
                return Err(ApiError::InvalidTitle);
            }
            result.push_str(word);
            continue;
        }

        if result.chars().count() + 1 + word_len > MAX_SLUG_LENGTH {
            break;
        }
        result.push(' ');
        result.push_str(word);
    }

    if result.is_empty() {
        Err(ApiError::InvalidTitle)
    } else {
        Ok(result)
    }
}

/// Derives the article slug. Uniqueness is left to the store.
pub fn slugify_title(title: &str) -> Result<String, ApiError> {
    let clamped = clamp_title(title)?;
    let mut slug = ::slug::slugify(clamped);

    // Transliteration can lengthen the text again.
    if slug.len() > MAX_SLUG_LENGTH {
        slug.truncate(MAX_SLUG_LENGTH);
        let trimmed = slug.trim_end_matches('-').len();
        slug.truncate(trimmed);
    }

    if slug.is_empty() {
        Err(ApiError::InvalidTitle)
    } else {
        Ok(slug)
    }
}
