//! Field-name heuristics table for the Synthetic Generator (§4.3).
//!
//! Matching is case-insensitive substring matching against the field name;
//! the table is consulted top to bottom and the first match wins. This is
//! the same table the Behavior Store uses to annotate stored string
//! descriptors with [`FormatHint`]s after learning (see
//! [`crate::schema::descriptor::FormatHint`]), so that the Drift Detector
//! can notice when a field's inferred format changes shape.

use crate::schema::FormatHint;

/// A field-name-driven synthesis strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Id,
    Email,
    FirstName,
    LastName,
    Name,
    Username,
    Url,
    Timestamp,
    Price,
    Count,
    Phone,
    Address,
    Status,
    Password,
    Token,
    Avatar,
    Description,
    Title,
    Company,
    Country,
    City,
    ZipCode,
    Latitude,
    Longitude,
    Gender,
    Age,
    Color,
    Currency,
    Language,
    Timezone,
    Role,
    Category,
    Tag,
    Rating,
    Code,
    Boolean,
    Slug,
    Domain,
    IpAddress,
    Percentage,
    Duration,
}

/// One entry of the heuristic table: substrings to match, and the kind they
/// resolve to.
pub struct FieldRule {
    pub patterns: &'static [&'static str],
    pub kind: FieldKind,
}

/// The ~40-entry field-name heuristic table, in priority order.
pub static FIELD_RULES: &[FieldRule] = &[
    FieldRule { patterns: &["id"], kind: FieldKind::Id },
    FieldRule { patterns: &["email"], kind: FieldKind::Email },
    FieldRule { patterns: &["firstname", "first_name", "given_name"], kind: FieldKind::FirstName },
    FieldRule { patterns: &["lastname", "last_name", "surname", "family_name"], kind: FieldKind::LastName },
    FieldRule { patterns: &["name"], kind: FieldKind::Name },
    FieldRule { patterns: &["username", "login", "handle"], kind: FieldKind::Username },
    FieldRule { patterns: &["url", "link", "href"], kind: FieldKind::Url },
    FieldRule { patterns: &["created", "updated", "date", "time"], kind: FieldKind::Timestamp },
    FieldRule { patterns: &["price", "amount", "cost", "total"], kind: FieldKind::Price },
    FieldRule { patterns: &["count", "qty", "quantity"], kind: FieldKind::Count },
    FieldRule { patterns: &["phone", "mobile", "telephone"], kind: FieldKind::Phone },
    FieldRule { patterns: &["address", "street"], kind: FieldKind::Address },
    FieldRule { patterns: &["city"], kind: FieldKind::City },
    FieldRule { patterns: &["status", "state"], kind: FieldKind::Status },
    FieldRule { patterns: &["password", "passwd", "secret"], kind: FieldKind::Password },
    FieldRule { patterns: &["token", "apikey", "api_key"], kind: FieldKind::Token },
    FieldRule { patterns: &["avatar", "photo", "picture"], kind: FieldKind::Avatar },
    FieldRule { patterns: &["description", "summary", "bio"], kind: FieldKind::Description },
    FieldRule { patterns: &["title", "subject", "headline"], kind: FieldKind::Title },
    FieldRule { patterns: &["company", "employer", "organization"], kind: FieldKind::Company },
    FieldRule { patterns: &["country"], kind: FieldKind::Country },
    FieldRule { patterns: &["zip", "postal", "postcode"], kind: FieldKind::ZipCode },
    FieldRule { patterns: &["latitude", "lat"], kind: FieldKind::Latitude },
    FieldRule { patterns: &["longitude", "lng", "lon"], kind: FieldKind::Longitude },
    FieldRule { patterns: &["gender", "sex"], kind: FieldKind::Gender },
    FieldRule { patterns: &["age"], kind: FieldKind::Age },
    FieldRule { patterns: &["color", "colour"], kind: FieldKind::Color },
    FieldRule { patterns: &["currency"], kind: FieldKind::Currency },
    FieldRule { patterns: &["language", "locale", "lang"], kind: FieldKind::Language },
    FieldRule { patterns: &["timezone", "tz"], kind: FieldKind::Timezone },
    FieldRule { patterns: &["role", "permission"], kind: FieldKind::Role },
    FieldRule { patterns: &["category", "genre"], kind: FieldKind::Category },
    FieldRule { patterns: &["tag", "label"], kind: FieldKind::Tag },
    FieldRule { patterns: &["rating", "score", "stars"], kind: FieldKind::Rating },
    FieldRule { patterns: &["code"], kind: FieldKind::Code },
    FieldRule { patterns: &["is_", "has_", "enabled", "active", "flag"], kind: FieldKind::Boolean },
    FieldRule { patterns: &["slug"], kind: FieldKind::Slug },
    FieldRule { patterns: &["domain", "hostname"], kind: FieldKind::Domain },
    FieldRule { patterns: &["ip_address", "ipaddr", "ip"], kind: FieldKind::IpAddress },
    FieldRule { patterns: &["percent", "ratio"], kind: FieldKind::Percentage },
    FieldRule { patterns: &["duration", "interval"], kind: FieldKind::Duration },
];

/// Resolve a field name to a heuristic generation strategy, if any matches.
pub fn classify_field(field_name: &str) -> Option<FieldKind> {
    let lower = field_name.to_lowercase();
    FIELD_RULES
        .iter()
        .find(|rule| rule.patterns.iter().any(|p| lower.contains(p)))
        .map(|rule| rule.kind)
}

/// Map a field-name classification to the string [`FormatHint`] it implies,
/// when the generated value is itself a string (numbers/bools carry no
/// format hint).
pub fn format_hint_for(kind: FieldKind) -> Option<FormatHint> {
    match kind {
        FieldKind::Id => Some(FormatHint::Uuid),
        FieldKind::Email => Some(FormatHint::Email),
        FieldKind::Url => Some(FormatHint::Url),
        FieldKind::Timestamp => Some(FormatHint::IsoDate),
        FieldKind::Slug => Some(FormatHint::Slug),
        FieldKind::Token => Some(FormatHint::Base64),
        FieldKind::Code => Some(FormatHint::Hex),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_matches_before_other_rules() {
        assert_eq!(classify_field("user_id"), Some(FieldKind::Id));
    }

    #[test]
    fn email_is_classified() {
        assert_eq!(classify_field("contact_email"), Some(FieldKind::Email));
    }

    #[test]
    fn unmatched_field_returns_none() {
        assert_eq!(classify_field("xyzzy"), None);
    }

    #[test]
    fn price_family_matches() {
        for f in ["price", "total_amount", "cost", "grand_total"] {
            assert_eq!(classify_field(f), Some(FieldKind::Price), "field {f}");
        }
    }
}
