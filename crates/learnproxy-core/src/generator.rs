//! Synthetic Generator (§4.3): produces realistic JSON instances from a
//! schema descriptor, optionally echoing fields from a request body.

use rand::{Rng, RngCore};
use serde_json::{Map, Value};

use crate::formats::{classify_field, FieldKind};
use crate::schema::Descriptor;

/// Generate a synthetic JSON value from a descriptor using a
/// thread-local RNG, weighting union branches by observation count.
pub fn generate(descriptor: &Descriptor, request_body: Option<&Value>) -> Value {
    let mut rng = rand::rng();
    let mut mode = Mode::Weighted(&mut rng);
    generate_node(descriptor, None, request_body, &mut mode)
}

/// Generate deterministically: union branches always resolve to the first
/// non-null branch, and primitive values are produced from a fixed seed.
/// Used by round-trip tests (§8 property 6) where reproducibility matters
/// more than variety.
pub fn generate_deterministic(descriptor: &Descriptor, request_body: Option<&Value>) -> Value {
    use rand::SeedableRng;
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    let mut mode = Mode::Deterministic(&mut rng);
    generate_node(descriptor, None, request_body, &mut mode)
}

enum Mode<'a> {
    Weighted(&'a mut dyn RngCore),
    Deterministic(&'a mut dyn RngCore),
}

impl Mode<'_> {
    fn rng(&mut self) -> &mut dyn RngCore {
        match self {
            Self::Weighted(r) => *r,
            Self::Deterministic(r) => *r,
        }
    }

    fn is_deterministic(&self) -> bool {
        matches!(self, Self::Deterministic(_))
    }
}

fn generate_node(
    descriptor: &Descriptor,
    field_name: Option<&str>,
    request_body: Option<&Value>,
    mode: &mut Mode,
) -> Value {
    match descriptor {
        Descriptor::Null { .. } => Value::Null,
        Descriptor::Bool { .. } => Value::Bool(mode.rng().next_u32() % 2 == 0),
        Descriptor::Number { .. } => generate_number(field_name, mode),
        Descriptor::String { .. } => generate_string(field_name, mode),
        Descriptor::Object { fields, .. } => generate_object(fields, request_body, mode),
        Descriptor::Array { element, min_len, .. } => {
            generate_array(element, *min_len, field_name, request_body, mode)
        }
        Descriptor::Union { branches, .. } => {
            let chosen = pick_branch(branches, mode);
            generate_node(chosen, field_name, request_body, mode)
        }
    }
}

fn generate_object(
    fields: &std::collections::BTreeMap<String, Descriptor>,
    request_body: Option<&Value>,
    mode: &mut Mode,
) -> Value {
    let mut map = Map::new();
    for (name, field_descriptor) in fields {
        if let Some(body) = request_body {
            if let Some(echoed) = find_echo(body, name, field_descriptor) {
                map.insert(name.clone(), echoed);
                continue;
            }
        }
        map.insert(name.clone(), generate_node(field_descriptor, Some(name), request_body, mode));
    }
    Value::Object(map)
}

fn generate_array(
    element: &Descriptor,
    min_len: usize,
    field_name: Option<&str>,
    request_body: Option<&Value>,
    mode: &mut Mode,
) -> Value {
    let n = if min_len > 3 {
        min_len
    } else {
        1 + (mode.rng().next_u32() as usize % 3)
    };
    let items = (0..n).map(|_| generate_node(element, field_name, request_body, mode)).collect();
    Value::Array(items)
}

fn pick_branch<'a>(branches: &'a [Descriptor], mode: &mut Mode) -> &'a Descriptor {
    if mode.is_deterministic() {
        return branches
            .iter()
            .find(|b| !matches!(b, Descriptor::Null { .. }))
            .unwrap_or(&branches[0]);
    }

    let total: u64 = branches.iter().map(|b| b.count().max(1)).sum();
    let mut pick = mode.rng().next_u64() % total.max(1);
    for branch in branches {
        let weight = branch.count().max(1);
        if pick < weight {
            return branch;
        }
        pick -= weight;
    }
    branches.last().unwrap_or(&branches[0])
}

fn generate_number(field_name: Option<&str>, mode: &mut Mode) -> Value {
    let kind = field_name.and_then(classify_field);
    match kind {
        Some(FieldKind::Price) => {
            let cents = 100 + (mode.rng().next_u32() % 999_800);
            let value = f64::from(cents) / 100.0;
            serde_json::Number::from_f64(value)
                .map(Value::Number)
                .unwrap_or(Value::Number(0.into()))
        }
        Some(FieldKind::Count) => Value::Number((mode.rng().next_u32() % 101).into()),
        Some(FieldKind::Age) => Value::Number((18 + mode.rng().next_u32() % 70).into()),
        Some(FieldKind::Rating) => Value::Number((mode.rng().next_u32() % 6).into()),
        Some(FieldKind::Latitude) => {
            let v = (mode.rng().next_u32() % 18000) as f64 / 100.0 - 90.0;
            serde_json::Number::from_f64(v).map(Value::Number).unwrap_or(Value::Number(0.into()))
        }
        Some(FieldKind::Longitude) => {
            let v = (mode.rng().next_u32() % 36000) as f64 / 100.0 - 180.0;
            serde_json::Number::from_f64(v).map(Value::Number).unwrap_or(Value::Number(0.into()))
        }
        Some(FieldKind::Percentage) => Value::Number((mode.rng().next_u32() % 101).into()),
        _ => Value::Number((mode.rng().next_u32() % 1000).into()),
    }
}

fn generate_string(field_name: Option<&str>, mode: &mut Mode) -> Value {
    let kind = field_name.and_then(classify_field);
    let s = match kind {
        Some(FieldKind::Id) => random_uuid(mode),
        Some(FieldKind::Email) => format!("user{}@example.com", mode.rng().next_u32() % 10_000),
        Some(FieldKind::FirstName) => pick(FIRST_NAMES, mode).to_string(),
        Some(FieldKind::LastName) => pick(LAST_NAMES, mode).to_string(),
        Some(FieldKind::Name) => format!("{} {}", pick(FIRST_NAMES, mode), pick(LAST_NAMES, mode)),
        Some(FieldKind::Username) => format!("user_{}", random_alphanumeric(8, mode)),
        Some(FieldKind::Url) => format!("https://example.com/{}", random_alphanumeric(6, mode)),
        Some(FieldKind::Timestamp) => iso_timestamp(mode),
        Some(FieldKind::Phone) => format!("+1555{:07}", mode.rng().next_u32() % 10_000_000),
        Some(FieldKind::Address) => format!("{} Main St", 1 + mode.rng().next_u32() % 9999),
        Some(FieldKind::Status) => pick(&["active", "pending", "inactive"], mode).to_string(),
        Some(FieldKind::Password) => random_alphanumeric(12, mode),
        Some(FieldKind::Token) => random_alphanumeric(24, mode),
        Some(FieldKind::Avatar) => format!("https://example.com/avatars/{}.png", random_alphanumeric(8, mode)),
        Some(FieldKind::Description) => "Lorem ipsum dolor sit amet.".to_string(),
        Some(FieldKind::Title) => format!("{} {}", pick(&["Report", "Summary", "Update"], mode), mode.rng().next_u32() % 100),
        Some(FieldKind::Company) => format!("{} Inc.", pick(LAST_NAMES, mode)),
        Some(FieldKind::Country) => pick(&["US", "GB", "DE", "FR", "JP"], mode).to_string(),
        Some(FieldKind::City) => "Springfield".to_string(),
        Some(FieldKind::ZipCode) => format!("{:05}", mode.rng().next_u32() % 100_000),
        Some(FieldKind::Gender) => pick(&["female", "male", "non-binary"], mode).to_string(),
        Some(FieldKind::Color) => pick(&["red", "green", "blue", "black", "white"], mode).to_string(),
        Some(FieldKind::Currency) => pick(&["USD", "EUR", "GBP", "JPY"], mode).to_string(),
        Some(FieldKind::Language) => pick(&["en", "fr", "de", "ja"], mode).to_string(),
        Some(FieldKind::Timezone) => pick(&["UTC", "America/New_York", "Europe/Berlin"], mode).to_string(),
        Some(FieldKind::Role) => pick(&["admin", "member", "viewer"], mode).to_string(),
        Some(FieldKind::Category) => pick(&["electronics", "books", "clothing"], mode).to_string(),
        Some(FieldKind::Tag) => pick(&["new", "sale", "featured"], mode).to_string(),
        Some(FieldKind::Code) => random_hex(8, mode),
        Some(FieldKind::Slug) => format!("{}-{}", pick(LAST_NAMES, mode).to_lowercase(), mode.rng().next_u32() % 1000),
        Some(FieldKind::Domain) => "example.com".to_string(),
        Some(FieldKind::IpAddress) => format!(
            "{}.{}.{}.{}",
            mode.rng().next_u32() % 256,
            mode.rng().next_u32() % 256,
            mode.rng().next_u32() % 256,
            mode.rng().next_u32() % 256
        ),
        Some(FieldKind::Duration) => format!("{}s", mode.rng().next_u32() % 3600),
        Some(FieldKind::Boolean) | None => random_alphanumeric(6 + (mode.rng().next_u32() as usize % 7), mode),
    };
    Value::String(s)
}

fn pick<'a>(options: &'a [&'a str], mode: &mut Mode) -> &'a str {
    let idx = mode.rng().next_u32() as usize % options.len();
    options[idx]
}

fn random_alphanumeric(len: usize, mode: &mut Mode) -> String {
    const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    (0..len)
        .map(|_| CHARS[mode.rng().next_u32() as usize % CHARS.len()] as char)
        .collect()
}

fn random_hex(len: usize, mode: &mut Mode) -> String {
    const CHARS: &[u8] = b"0123456789abcdef";
    (0..len)
        .map(|_| CHARS[mode.rng().next_u32() as usize % CHARS.len()] as char)
        .collect()
}

fn random_uuid(mode: &mut Mode) -> String {
    let hex = random_hex(32, mode);
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

fn iso_timestamp(mode: &mut Mode) -> String {
    // Deterministic-friendly: offset a fixed epoch instant by a bounded
    // random number of seconds, rather than calling `Utc::now()` (which
    // would make generation non-reproducible under a seeded RNG).
    let base = chrono::DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap();
    let offset_secs = (mode.rng().next_u32() % (3600 * 24 * 365)) as i64;
    let stamped = base + chrono::Duration::seconds(offset_secs);
    stamped.to_rfc3339()
}

static FIRST_NAMES: &[&str] =
    &["Alex", "Jordan", "Taylor", "Morgan", "Casey", "Riley", "Sam", "Drew", "Jamie", "Avery"];
static LAST_NAMES: &[&str] =
    &["Smith", "Johnson", "Lee", "Brown", "Garcia", "Davis", "Miller", "Wilson", "Clark", "Young"];

/// Depth-first search for a field named `name` in `body` whose value is a
/// primitive compatible with `target` — the generator's echo rule.
fn find_echo(body: &Value, name: &str, target: &Descriptor) -> Option<Value> {
    match body {
        Value::Object(map) => {
            if let Some(v) = map.get(name) {
                if compatible_primitive(v, target) {
                    return Some(v.clone());
                }
            }
            map.values().find_map(|v| find_echo(v, name, target))
        }
        Value::Array(items) => items.iter().find_map(|v| find_echo(v, name, target)),
        _ => None,
    }
}

fn compatible_primitive(value: &Value, descriptor: &Descriptor) -> bool {
    match descriptor {
        Descriptor::Union { branches, .. } => {
            branches.iter().any(|b| compatible_primitive(value, b))
        }
        _ => matches!(
            (value, descriptor),
            (Value::String(_), Descriptor::String { .. })
                | (Value::Number(_), Descriptor::Number { .. })
                | (Value::Bool(_), Descriptor::Bool { .. })
                | (Value::Null, Descriptor::Null { .. })
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::infer;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn generates_well_formed_json_for_object_schema() {
        let sample = json!({"id": 1, "email": "a@b.com", "active": true});
        let descriptor = infer(&sample);
        let generated = generate_deterministic(&descriptor, None);
        assert!(generated.is_object());
        assert!(generated.get("id").is_some());
        assert!(generated.get("email").unwrap().is_string());
    }

    #[test]
    fn echo_rule_prefers_request_field_value() {
        let sample = json!({"email": "a@b.com", "pw": "x"});
        let descriptor = infer(&sample);
        let request = json!({"email": "z@z.com", "pw": "y"});
        let generated = generate_deterministic(&descriptor, Some(&request));
        assert_eq!(generated.get("email").unwrap(), "z@z.com");
    }

    #[test]
    fn array_respects_length_lower_bound_when_large() {
        let sample = json!([1, 2, 3, 4, 5]);
        let descriptor = infer(&sample);
        let generated = generate_deterministic(&descriptor, None);
        assert_eq!(generated.as_array().unwrap().len(), 5);
    }

    #[test]
    fn round_trip_generate_then_learn_yields_superset_schema() {
        use crate::schema::learn;
        let sample = json!({"id": 1, "name": "Alex", "email": "a@b.com"});
        let schema = infer(&sample);
        let generated = generate_deterministic(&schema, None);
        let relearned = learn(Some(schema.clone()), &generated);

        if let (Descriptor::Object { fields: original, .. }, Descriptor::Object { fields: grown, .. }) =
            (&schema, &relearned)
        {
            for key in original.keys() {
                assert!(grown.contains_key(key), "missing field {key} after round trip");
            }
        } else {
            panic!("expected object descriptors");
        }
    }

    fn arb_flat_object() -> impl Strategy<Value = Value> {
        proptest::collection::btree_map(
            "[a-z]{1,5}",
            proptest::prop_oneof![any::<bool>().prop_map(Value::Bool), any::<i32>().prop_map(|n| json!(n))],
            0..6,
        )
        .prop_map(|map| Value::Object(map.into_iter().collect()))
    }

    proptest! {
        /// Property 6: learning from a generated instance never drops a
        /// field the source schema had.
        #[test]
        fn prop_generate_then_learn_is_superset(sample in arb_flat_object()) {
            use crate::schema::learn;
            let schema = infer(&sample);
            let generated = generate_deterministic(&schema, None);
            let relearned = learn(Some(schema.clone()), &generated);
            if let (
                Descriptor::Object { fields: original, .. },
                Descriptor::Object { fields: grown, .. },
            ) = (&schema, &relearned)
            {
                for key in original.keys() {
                    prop_assert!(grown.contains_key(key));
                }
            }
        }
    }
}
