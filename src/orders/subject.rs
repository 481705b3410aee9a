use base64::{engine::general_purpose, Engine as _};
use encoding_rs::{Encoding, UTF_8};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

use crate::config::OutputDirs;

pub const DELIVERY_PREFIX: &str = "Invio BL-";
pub const EXCHANGE_CREDIT_PREFIX: &str = "Invio XC-";
pub const ORDER_CONFIRMATION_PREFIX: &str = "Notifica ordine cliente (201614 G)";

/// Classification bucket derived from a decoded subject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Delivery,
    ExchangeCredit,
    OrderConfirmation,
    Unclassified,
}

impl Category {
    /// Categories whose attachments are saved to disk
    pub fn saves_attachments(self) -> bool {
        matches!(self, Category::Delivery | Category::ExchangeCredit)
    }

    pub fn output_dir(self, dirs: &OutputDirs) -> Option<&Path> {
        match self {
            Category::Delivery => Some(dirs.bolle.as_path()),
            Category::ExchangeCredit => Some(dirs.xc.as_path()),
            Category::OrderConfirmation => Some(dirs.gomme.as_path()),
            Category::Unclassified => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Delivery => "delivery note",
            Category::ExchangeCredit => "exchange credit",
            Category::OrderConfirmation => "order confirmation",
            Category::Unclassified => "unclassified",
        }
    }
}

pub fn classify(subject: &str) -> Category {
    if subject.starts_with(DELIVERY_PREFIX) {
        Category::Delivery
    } else if subject.starts_with(EXCHANGE_CREDIT_PREFIX) {
        Category::ExchangeCredit
    } else if subject.starts_with(ORDER_CONFIRMATION_PREFIX) {
        Category::OrderConfirmation
    } else {
        Category::Unclassified
    }
}

fn encoded_word() -> Option<&'static Regex> {
    static ENCODED_WORD: OnceLock<Option<Regex>> = OnceLock::new();
    ENCODED_WORD
        .get_or_init(|| Regex::new(r"=\?([^?\s]+)\?([bBqQ])\?([^?\s]*)\?=").ok())
        .as_ref()
}

/// Decode an RFC 2047 header value into plain text.
///
/// Encoded words are decoded with their declared charset (UTF-8 when the
/// label is unknown). Adjacent encoded words sharing a charset are decoded
/// as one byte run, so a character split across them survives. Bytes that
/// do not decode are dropped, so this never fails. Whitespace between two
/// adjacent encoded words is not part of the text. The result is trimmed.
pub fn decode(raw_header: &str) -> String {
    let Some(encoded_word) = encoded_word() else {
        return raw_header.trim().to_string();
    };

    let mut decoded = String::with_capacity(raw_header.len());
    let mut last_end = 0;
    // (charset, bytes) of the encoded words not yet flushed into `decoded`
    let mut pending: Option<(String, Vec<u8>)> = None;

    for caps in encoded_word.captures_iter(raw_header) {
        let (Some(whole), Some(charset), Some(encoding), Some(text)) =
            (caps.get(0), caps.get(1), caps.get(2), caps.get(3))
        else {
            continue;
        };

        let bytes = match encoding.as_str() {
            "B" | "b" => decode_b(text.as_str()),
            _ => decode_q(text.as_str()),
        };
        let charset = charset.as_str().to_ascii_lowercase();
        let between = &raw_header[last_end..whole.start()];
        last_end = whole.end();

        if pending.is_some() && between.trim().is_empty() {
            if let Some((run_charset, run)) = pending.as_mut() {
                if *run_charset == charset {
                    run.extend_from_slice(&bytes);
                    continue;
                }
            }
        } else {
            flush(&mut decoded, pending.take());
            decoded.push_str(between);
        }

        flush(&mut decoded, pending.replace((charset, bytes)));
    }

    flush(&mut decoded, pending);
    decoded.push_str(&raw_header[last_end..]);
    decoded.trim().to_string()
}

fn flush(decoded: &mut String, run: Option<(String, Vec<u8>)>) {
    if let Some((charset, bytes)) = run {
        decoded.push_str(&decode_charset(&bytes, &charset));
    }
}

fn decode_b(text: &str) -> Vec<u8> {
    let trimmed = text.trim_end_matches('=');
    general_purpose::STANDARD_NO_PAD
        .decode(trimmed)
        .unwrap_or_default()
}

fn decode_q(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'_' => out.push(b' '),
            b'=' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3])
                    .ok()
                    .and_then(|h| u8::from_str_radix(h, 16).ok());
                match hex {
                    Some(byte) => {
                        out.push(byte);
                        i += 2;
                    }
                    None => out.push(b'='),
                }
            }
            other => out.push(other),
        }
        i += 1;
    }

    out
}

fn decode_charset(bytes: &[u8], charset: &str) -> String {
    // RFC 2231 language suffix: =?utf-8*it?Q?...?=
    let label = charset.split('*').next().unwrap_or(charset);
    let encoding = Encoding::for_label(label.as_bytes()).unwrap_or(UTF_8);
    let (text, _) = encoding.decode_without_bom_handling(bytes);
    text.chars().filter(|c| *c != char::REPLACEMENT_CHARACTER).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify("Invio BL-2024-1"), Category::Delivery);
        assert_eq!(classify("Invio XC-99"), Category::ExchangeCredit);
        assert_eq!(classify("Notifica ordine cliente (201614 G) #7"), Category::OrderConfirmation);
        assert_eq!(classify("Random subject"), Category::Unclassified);
        assert_eq!(classify(""), Category::Unclassified);
    }

    #[test]
    fn test_classify_is_case_sensitive_prefix() {
        assert_eq!(classify("invio BL-1"), Category::Unclassified);
        assert_eq!(classify("Re: Invio BL-1"), Category::Unclassified);
        assert_eq!(classify("Notifica ordine cliente (201615 G)"), Category::Unclassified);
    }

    #[test]
    fn test_decode_plain_ascii_is_identity() {
        assert_eq!(decode("Invio BL-2024-1"), "Invio BL-2024-1");
        assert_eq!(decode("Notifica ordine cliente (201614 G) #7"), "Notifica ordine cliente (201614 G) #7");
    }

    #[test]
    fn test_decode_trims() {
        assert_eq!(decode("  Invio XC-5 \t"), "Invio XC-5");
    }

    #[test]
    fn test_decode_base64_word() {
        assert_eq!(decode("=?UTF-8?B?SW52aW8gQkwtMjAyNC0x?="), "Invio BL-2024-1");
    }

    #[test]
    fn test_decode_quoted_printable_latin1() {
        assert_eq!(decode("=?iso-8859-1?Q?Consegna_gi=E0_effettuata?="), "Consegna già effettuata");
    }

    #[test]
    fn test_decode_adjacent_words_drop_separating_space() {
        assert_eq!(
            decode("=?utf-8?B?SW52aW8=?= =?utf-8?B?IEJMLTE=?="),
            "Invio BL-1"
        );
    }

    #[test]
    fn test_decode_character_split_across_words() {
        assert_eq!(decode("=?UTF-8?Q?Invio_BL-1_gi=C3?= =?UTF-8?Q?=A0?="), "Invio BL-1 già");
        assert_eq!(decode("=?utf-8?B?SW52aW8gWEMtMiBnacM=?=\r\n =?UTF-8?B?oA==?="), "Invio XC-2 già");
    }

    #[test]
    fn test_decode_adjacent_words_with_different_charsets() {
        assert_eq!(
            decode("=?iso-8859-1?Q?Consegna_gi=E0?= =?utf-8?Q?_ok?="),
            "Consegna già ok"
        );
    }

    #[test]
    fn test_decode_mixed_plain_and_encoded() {
        assert_eq!(decode("Re: =?utf-8?Q?Invio_XC-7?= urgente"), "Re: Invio XC-7 urgente");
    }

    #[test]
    fn test_decode_drops_invalid_bytes() {
        // 0xFF is not valid UTF-8
        assert_eq!(decode("=?utf-8?Q?Invio=FF_BL-3?="), "Invio BL-3");
    }

    #[test]
    fn test_decode_unknown_charset_falls_back_to_utf8() {
        assert_eq!(decode("=?x-unknown?Q?Invio_BL-4?="), "Invio BL-4");
    }
}
