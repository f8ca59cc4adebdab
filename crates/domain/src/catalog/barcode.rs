//! Barcode shape detection for scanned values.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarcodeType {
    #[serde(rename = "EAN-13")]
    Ean13,
    #[serde(rename = "UPC-A")]
    UpcA,
    #[serde(rename = "CODE128")]
    Code128,
}

impl BarcodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BarcodeType::Ean13 => "EAN-13",
            BarcodeType::UpcA => "UPC-A",
            BarcodeType::Code128 => "CODE128",
        }
    }
}

impl std::fmt::Display for BarcodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Best-guess symbology for a normalized scanned value.
///
/// 13 digits is EAN-13, 8 to 12 digits is UPC-A (12 is the full code, shorter
/// runs are the compressed variants), and any other 6 to 20 character
/// alphanumeric run is CODE128. Anything else is not barcode-shaped.
pub fn detect_barcode(value: &str) -> Option<BarcodeType> {
    let len = value.len();
    let all_digits = !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit());

    if all_digits {
        match len {
            13 => return Some(BarcodeType::Ean13),
            8..=12 => return Some(BarcodeType::UpcA),
            _ => {}
        }
    }

    if (6..=20).contains(&len) && value.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Some(BarcodeType::Code128);
    }

    None
}
