// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token encoders used to measure and slice text by token count.

use anyhow::{anyhow, Result};
use once_cell::sync::OnceCell;
use tiktoken_rs::CoreBPE;

static CL100K: OnceCell<CoreBPE> = OnceCell::new();

/// Maps text to token ids and back.
pub trait TokenEncoder {
    /// Encodes text into an ordered token sequence.
    fn encode(&self, text: &str) -> Vec<u32>;

    /// Decodes a token slice back into text.
    ///
    /// A slice that starts or ends inside a multi-byte character decodes
    /// with U+FFFD in place of the partial bytes.
    fn decode(&self, tokens: &[u32]) -> String;
}

/// The `cl100k_base` byte-pair encoding.
pub struct Cl100kEncoder {
    bpe: &'static CoreBPE,
}

impl Cl100kEncoder {
    pub fn new() -> Result<Self> {
        let bpe = CL100K.get_or_try_init(|| {
            tiktoken_rs::cl100k_base().map_err(|e| anyhow!("Failed to load cl100k_base: {}", e))
        })?;
        Ok(Self { bpe })
    }
}

impl TokenEncoder for Cl100kEncoder {
    fn encode(&self, text: &str) -> Vec<u32> {
        self.bpe
            .encode_ordinary(text)
            .into_iter()
            .map(|t| t as u32)
            .collect()
    }

    fn decode(&self, tokens: &[u32]) -> String {
        let bytes: Vec<u8> = self
            .bpe
            ._decode_native_and_split(tokens.iter().map(|&t| t as _).collect())
            .flatten()
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_ascii() {
        let encoder = Cl100kEncoder::new().unwrap();
        let text = "The quick brown fox jumps over the lazy dog.";
        let tokens = encoder.encode(text);
        assert!(!tokens.is_empty());
        assert!(tokens.len() < text.len());
        assert_eq!(encoder.decode(&tokens), text);
    }

    #[test]
    fn test_empty_text() {
        let encoder = Cl100kEncoder::new().unwrap();
        assert!(encoder.encode("").is_empty());
        assert_eq!(encoder.decode(&[]), "");
    }

    #[test]
    fn test_multibyte_roundtrip() {
        let encoder = Cl100kEncoder::new().unwrap();
        let text = "😀🎉🚀 漢字テスト 𝔘𝔫𝔦𝔠𝔬𝔡𝔢";
        assert_eq!(encoder.decode(&encoder.encode(text)), text);
    }

    #[test]
    fn test_split_character_decodes_lossily() {
        let encoder = Cl100kEncoder::new().unwrap();
        let text = "😀🎉🚀 漢字テスト 𝔘𝔫𝔦𝔠𝔬𝔡𝔢";
        let tokens = encoder.encode(text);
        // Several of these characters span more than one byte-level token.
        assert!(tokens.len() > text.chars().count());

        let lossy = (1..tokens.len())
            .map(|end| encoder.decode(&tokens[..end]))
            .filter(|prefix| prefix.ends_with('\u{FFFD}'))
            .count();
        assert!(lossy > 0);
    }
}
