use crate::CustomerSequenceId;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// Serializes as the canonical string, e.g. `"A-000a01"`.
impl Serialize for CustomerSequenceId {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.collect_str(self)
    }
}

/// Deserializes from the canonical string only. Any other shape is an error;
/// the lenient "treat as absent" policy belongs to the caller.
impl<'de> Deserialize<'de> for CustomerSequenceId {
    fn deserialize<D>(d: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TokenVisitor;

        impl de::Visitor<'_> for TokenVisitor {
            type Value = CustomerSequenceId;

            fn expecting(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str("a customer ID such as \"A-000a01\"")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                CustomerSequenceId::parse(v).map_err(E::custom)
            }
        }

        d.deserialize_str(TokenVisitor)
    }
}
