//! Base64url decoding as used by compact JWS and JWK key material

use base64::{
    alphabet,
    engine::{general_purpose::GeneralPurpose, DecodePaddingMode, GeneralPurposeConfig},
    Engine,
};

// Compact serialization omits padding, but some key publishers emit it anyway.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub(crate) fn decode(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_LENIENT.decode(encoded)
}

#[cfg(any(test, feature = "test-util"))]
pub(crate) fn encode(data: impl AsRef<[u8]>) -> String {
    URL_SAFE_LENIENT.encode(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_with_and_without_padding() -> color_eyre::Result<()> {
        assert_eq!(decode("AQAB")?, vec![1, 0, 1]);
        assert_eq!(decode("YQ")?, b"a".to_vec());
        assert_eq!(decode("YQ==")?, b"a".to_vec());
        Ok(())
    }

    #[test]
    fn rejects_standard_alphabet() {
        assert!(decode("+/8=").is_err());
    }

    #[test]
    fn encodes_without_padding() {
        assert_eq!(encode(b"a"), "YQ");
    }
}
