use nanoid::nanoid;

/// Canonical alphabet for document identifiers (no ambiguous glyphs, no `_`,
/// which is reserved as the separator in derived pair ids).
const DOC_ID_ALPHABET: &[char] = &[
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L', 'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y',
    'Z', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'j', 'm', 'n', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];
/// Default document id length.
const DOC_ID_LENGTH: usize = 20;

/// Generates a new document identifier using the configured alphabet and length.
pub fn generate_doc_id() -> String {
    nanoid!(DOC_ID_LENGTH, DOC_ID_ALPHABET)
}
