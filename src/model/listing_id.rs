use snafu::Snafu;

use super::*;

/// Length of a listing identifier: a 12-byte object id rendered as hex.
pub const LISTING_ID_LEN: usize = 24;

/// Identifier of a listing owned by the listing service.
///
/// Only the format is checked; the listing itself may not exist.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ListingId(String);

impl ListingId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for ListingId {
    type Err = ParseListingId;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let valid = input.len() == LISTING_ID_LEN && input.bytes().all(|b| b.is_ascii_hexdigit());

        if !valid {
            return Err(ParseListingId::new(input.to_string()));
        }

        Ok(ListingId(input.to_ascii_lowercase()))
    }
}

impl TryFrom<String> for ListingId {
    type Error = ParseListingId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ListingId> for String {
    fn from(value: ListingId) -> Self {
        value.0
    }
}

impl std::fmt::Display for ListingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::convert::AsRef<str> for ListingId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Snafu, new)]
#[snafu(display("`{}` is not a valid listing id", text))]
pub struct ParseListingId {
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_object_ids() {
        let id: ListingId = "65F1A2B3C4D5E6F708192A3B".parse().unwrap();
        assert_eq!(id.as_str(), "65f1a2b3c4d5e6f708192a3b", "ids are normalized to lowercase");
    }

    #[test]
    fn rejects_malformed_ids() {
        for text in ["", "65f1a2b3", "65f1a2b3c4d5e6f708192a3bff", "zzf1a2b3c4d5e6f708192a3b", "65f1a2b3c4d5e6f7 8192a3b"] {
            let err = text.parse::<ListingId>().unwrap_err();
            assert_eq!(err.text, text);
        }
    }

    #[test]
    fn deserializing_validates() {
        let ok: Result<ListingId, _> = serde_json::from_str("\"65f1a2b3c4d5e6f708192a3b\"");
        assert!(ok.is_ok());

        let err: Result<ListingId, _> = serde_json::from_str("\"not-an-id\"");
        assert!(err.is_err());
    }
}
