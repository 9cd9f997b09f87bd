/// Decides whether a candidate stream holds the XFA form data.
///
/// Producers differ in how the data packet starts, so the test is
/// configurable. The default looks for `datasets xmlns` anywhere in the
/// stream, which catches the `<xfa:datasets xmlns:xfa=...>` packet regardless
/// of leading whitespace or a preceding XML declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadSignature {
    /// The bytes occur anywhere in the stream.
    Contains(Vec<u8>),
    /// The stream starts with the bytes.
    Prefix(Vec<u8>),
    /// Any of the inner signatures matches, tried in order.
    AnyOf(Vec<PayloadSignature>),
}

impl PayloadSignature {
    /// Substring match on `datasets xmlns`.
    pub fn datasets() -> Self {
        PayloadSignature::Contains(b"datasets xmlns".to_vec())
    }

    /// Prefix match on a newline followed by `<xfa`, the layout older Adobe
    /// producers write.
    pub fn xfa_prefix() -> Self {
        PayloadSignature::Prefix(b"\n<xfa".to_vec())
    }

    pub fn matches(&self, data: &[u8]) -> bool {
        match self {
            PayloadSignature::Contains(needle) => contains(data, needle),
            PayloadSignature::Prefix(prefix) => data.starts_with(prefix),
            PayloadSignature::AnyOf(signatures) => signatures.iter().any(|s| s.matches(data)),
        }
    }
}

impl Default for PayloadSignature {
    fn default() -> Self {
        Self::datasets()
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}
