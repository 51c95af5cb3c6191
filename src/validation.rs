use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{ContentInput, ContentPatch, ContentStatus, NewContent, IMAGE_MAX_BYTES};

// --- Field Rules ---

pub const TITLE_MIN_CHARS: usize = 3;
pub const TITLE_MAX_CHARS: usize = 200;
pub const DESCRIPTION_MIN_CHARS: usize = 10;
pub const USERNAME_MIN_CHARS: usize = 3;
pub const USERNAME_MAX_CHARS: usize = 32;
pub const PASSWORD_MIN_CHARS: usize = 8;

/// MIME types accepted for a content image.
pub const IMAGE_CONTENT_TYPES: &[&str] =
    &["image/jpeg", "image/png", "image/gif", "image/webp"];

const MSG_REQUIRED: &str = "This field is required.";
const MSG_TITLE_LENGTH: &str = "Title must be between 3 and 200 characters.";
const MSG_DESCRIPTION_LENGTH: &str = "Description must be at least 10 characters.";
const MSG_STATUS: &str = "Status must be one of: draft, published.";
const MSG_IMAGE_TYPE: &str = "Only JPEG, PNG, GIF, or WebP images are accepted.";
const MSG_IMAGE_SIZE: &str = "Image may not exceed 5 MiB.";
const MSG_USERNAME: &str =
    "Username must be 3 to 32 characters of letters, digits, hyphens, or underscores.";
const MSG_PASSWORD: &str = "Password must be at least 8 characters.";

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("username pattern"));

// Opening or closing markers of tags that can execute or embed foreign code.
// The inner text survives; only the markers are removed.
static EXECUTABLE_TAGS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<\s*/?\s*(script|iframe|object|embed)\b[^>]*>").expect("tag pattern")
});

// --- Error Collection ---

/// ValidationErrors
///
/// Ordered field-to-messages mapping. One submission reports every failing
/// field at once; keys use wire names, so body problems land under `content`.
/// Serializes transparently as the inner map for the JSON error body.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    errors: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn add(&mut self, field: &str, message: &str) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        for (field, mut messages) in other.errors {
            self.errors.entry(field).or_default().append(&mut messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of distinct failing fields.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn field(&self, name: &str) -> Option<&[String]> {
        self.errors.get(name).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields: Vec<&str> = self.errors.keys().map(String::as_str).collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

// --- Sanitization ---

/// Strips executable tag markers (`<script>`, `<iframe>`, `<object>`,
/// `<embed>`, any case, with or without attributes) while keeping the text
/// between them. Inert markup such as `<b>` passes through untouched.
///
/// Runs after the field checks, so markup-heavy input is judged on its raw
/// length and then neutralized rather than rejected.
pub fn sanitize_markup(input: &str) -> String {
    EXECUTABLE_TAGS.replace_all(input, "").into_owned()
}

// --- Content Validation ---

fn trimmed(value: &Option<String>) -> &str {
    value.as_deref().map(str::trim).unwrap_or("")
}

fn check_title(title: &str, errors: &mut ValidationErrors) -> bool {
    if title.is_empty() {
        errors.add("title", MSG_REQUIRED);
        return false;
    }
    let length = title.chars().count();
    if !(TITLE_MIN_CHARS..=TITLE_MAX_CHARS).contains(&length) {
        errors.add("title", MSG_TITLE_LENGTH);
        return false;
    }
    true
}

fn check_description(description: &str, errors: &mut ValidationErrors) -> bool {
    if description.is_empty() {
        errors.add("description", MSG_REQUIRED);
        return false;
    }
    if description.chars().count() < DESCRIPTION_MIN_CHARS {
        errors.add("description", MSG_DESCRIPTION_LENGTH);
        return false;
    }
    true
}

/// Validates a full create submission. Checks run against the raw (trimmed)
/// input and every failing field is reported; only a fully valid submission is
/// sanitized and promoted to a [`NewContent`].
///
/// A missing status defaults to draft rather than failing, matching the HTML
/// form where the select always has a value.
pub fn validate_new(
    input: &ContentInput,
    author_id: Uuid,
    author: &str,
) -> Result<NewContent, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let title = trimmed(&input.title);
    check_title(title, &mut errors);

    let description = trimmed(&input.description);
    check_description(description, &mut errors);

    let body = trimmed(&input.body);
    if body.is_empty() {
        errors.add("content", MSG_REQUIRED);
    }

    let status = match input.status.as_deref().map(str::trim) {
        None | Some("") => ContentStatus::default(),
        Some(literal) => literal.parse().unwrap_or_else(|_| {
            errors.add("status", MSG_STATUS);
            ContentStatus::default()
        }),
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(NewContent {
        title: sanitize_markup(title),
        description: sanitize_markup(description),
        body: sanitize_markup(body),
        status,
        image: None,
        author_id,
        author: author.to_string(),
    })
}

/// Validates a partial update. Absent fields are left alone; a field that is
/// present must satisfy the same rules as on creation, so an explicit empty
/// title is rejected rather than treated as "unchanged".
pub fn validate_patch(input: &ContentInput) -> Result<ContentPatch, ValidationErrors> {
    let mut errors = ValidationErrors::default();
    let mut patch = ContentPatch::default();

    if let Some(raw) = &input.title {
        let title = raw.trim();
        if check_title(title, &mut errors) {
            patch.title = Some(sanitize_markup(title));
        }
    }

    if let Some(raw) = &input.description {
        let description = raw.trim();
        if check_description(description, &mut errors) {
            patch.description = Some(sanitize_markup(description));
        }
    }

    if let Some(raw) = &input.body {
        let body = raw.trim();
        if body.is_empty() {
            errors.add("content", MSG_REQUIRED);
        } else {
            patch.body = Some(sanitize_markup(body));
        }
    }

    if let Some(raw) = &input.status {
        match raw.trim().parse() {
            Ok(status) => patch.status = Some(status),
            Err(_) => errors.add("status", MSG_STATUS),
        }
    }

    if errors.is_empty() { Ok(patch) } else { Err(errors) }
}

/// Checks an uploaded image before it touches storage. The declared MIME type
/// must be on the allow list and the payload must fit the 5 MiB cap; both
/// problems are reported together under the `image` field.
pub fn validate_image(content_type: &str, size: usize) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let essence = content_type.split(';').next().unwrap_or("").trim();
    if !IMAGE_CONTENT_TYPES.contains(&essence) {
        errors.add("image", MSG_IMAGE_TYPE);
    }
    if size > IMAGE_MAX_BYTES {
        errors.add("image", MSG_IMAGE_SIZE);
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Validates registration credentials. The username doubles as the display
/// name on content records, hence the conservative character set.
pub fn validate_credentials(username: &str, password: &str) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let username = username.trim();
    let length = username.chars().count();
    if !(USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&length)
        || !USERNAME_RE.is_match(username)
    {
        errors.add("username", MSG_USERNAME);
    }

    if password.chars().count() < PASSWORD_MIN_CHARS {
        errors.add("password", MSG_PASSWORD);
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
