use serde::Deserialize;

/// CORS configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorsConfig {
    /// Origins allowed to read responses; empty disables CORS entirely
    #[serde(default)]
    pub allowed_origins: AllowList,
}

/// Either the wildcard `"*"` or an explicit list of origins
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowList {
    /// Any origin
    Any,
    /// Explicit origins; an empty list allows nothing
    Origins(Vec<String>),
}

impl Default for AllowList {
    fn default() -> Self {
        Self::Origins(Vec::new())
    }
}

impl AllowList {
    /// Whether CORS headers should be computed at all
    pub fn is_disabled(&self) -> bool {
        matches!(self, Self::Origins(origins) if origins.is_empty())
    }

    /// Whether `origin` is a member of the list
    pub fn contains(&self, origin: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Origins(origins) => origins.iter().any(|allowed| allowed == origin),
        }
    }
}

impl From<Vec<String>> for AllowList {
    fn from(origins: Vec<String>) -> Self {
        if origins.iter().any(|o| o == "*") {
            Self::Any
        } else {
            Self::Origins(origins)
        }
    }
}

impl<'de> Deserialize<'de> for AllowList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de;

        struct AllowListVisitor;

        impl<'de> de::Visitor<'de> for AllowListVisitor {
            type Value = AllowList;

            fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                formatter.write_str("\"*\", an origin, or an array of origins")
            }

            fn visit_str<E>(self, v: &str) -> Result<AllowList, E>
            where
                E: de::Error,
            {
                Ok(AllowList::from(vec![v.to_owned()]))
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<AllowList, A::Error>
            where
                A: de::SeqAccess<'de>,
            {
                let mut origins = Vec::new();
                while let Some(origin) = seq.next_element::<String>()? {
                    origins.push(origin);
                }
                Ok(AllowList::from(origins))
            }
        }

        deserializer.deserialize_any(AllowListVisitor)
    }
}
