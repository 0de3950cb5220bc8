//! Pattern signatures: fixed-length, scale-free encodings of a candle window.
//!
//! Prices are min-max normalized across the whole window so a signature does
//! not depend on absolute price level. Values are laid out per candle as
//! `[open, high, low, close]` in time order, optionally followed by one
//! volume value per candle normalized by the window's max volume.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::series::Candle;
use crate::{validate_bars, MatchError, OHLCVExt, Result, WindowLength, OHLCV};

/// Value assigned to every price of a flat window (max == min)
pub const FLAT_PRICE: f64 = 0.5;

/// Price fields per candle in a signature
pub const PRICE_FIELDS: usize = 4;

// ============================================================
// LAYOUT
// ============================================================

/// Shape of a signature. Two signatures are comparable only with equal layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignatureLayout {
    pub window_length: WindowLength,
    pub volume_channel: bool,
}

impl SignatureLayout {
    pub fn new(window_length: WindowLength, volume_channel: bool) -> Self {
        Self {
            window_length,
            volume_channel,
        }
    }

    /// Number of values in a signature of this layout
    #[inline]
    pub fn len(&self) -> usize {
        let per_candle = PRICE_FIELDS + usize::from(self.volume_channel);
        self.window_length.get() * per_candle
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for SignatureLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let volume = if self.volume_channel { "on" } else { "off" };
        write!(f, "L={} volume={}", self.window_length.get(), volume)
    }
}

// ============================================================
// SIGNATURE
// ============================================================

/// Normalized feature vector of one window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternSignature {
    layout: SignatureLayout,
    values: Vec<f64>,
}

impl PatternSignature {
    /// Wrap externally produced values (e.g. from an image pipeline).
    pub fn from_values(layout: SignatureLayout, values: Vec<f64>) -> Result<Self> {
        if values.len() != layout.len() {
            return Err(MatchError::InvalidSignature(format!(
                "expected {} values for {}, got {}",
                layout.len(),
                layout,
                values.len()
            )));
        }
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(MatchError::InvalidSignature(format!(
                "value at position {i} is not finite"
            )));
        }
        Ok(Self { layout, values })
    }

    #[inline]
    pub fn layout(&self) -> SignatureLayout {
        self.layout
    }

    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The `4 * L` price values
    pub fn prices(&self) -> &[f64] {
        &self.values[..self.layout.window_length.get() * PRICE_FIELDS]
    }

    /// The `L` volume values, if the layout carries a volume channel
    pub fn volumes(&self) -> Option<&[f64]> {
        self.layout
            .volume_channel
            .then(|| &self.values[self.layout.window_length.get() * PRICE_FIELDS..])
    }
}

impl<'de> Deserialize<'de> for PatternSignature {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            layout: SignatureLayout,
            values: Vec<f64>,
        }

        let raw = Raw::deserialize(d)?;
        PatternSignature::from_values(raw.layout, raw.values).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// EXTRACTOR
// ============================================================

/// Converts candle windows (or images, via a plugin) into signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternExtractor {
    layout: SignatureLayout,
}

impl PatternExtractor {
    pub fn new(layout: SignatureLayout) -> Self {
        Self { layout }
    }

    #[inline]
    pub fn layout(&self) -> SignatureLayout {
        self.layout
    }

    /// Extract the signature of `window`, which must hold exactly `L` valid bars.
    pub fn extract<T: OHLCV>(&self, window: &[T]) -> Result<PatternSignature> {
        self.check_length(window.len())?;
        validate_bars(window)?;

        let mut values = Vec::with_capacity(self.layout.len());
        self.normalize_into(window, &mut values);
        Ok(PatternSignature {
            layout: self.layout,
            values,
        })
    }

    /// Extract a signature through an external image pipeline.
    pub fn extract_from_image(
        &self,
        extractor: &dyn ImageFeatureExtractor,
        image: &[u8],
    ) -> Result<PatternSignature> {
        let signature = extractor.extract(image, self.layout)?;
        self.check_compatible(&signature)?;
        Ok(signature)
    }

    /// Fail unless `signature` was produced with this extractor's layout
    pub fn check_compatible(&self, signature: &PatternSignature) -> Result<()> {
        if signature.layout() != self.layout {
            return Err(MatchError::SignatureMismatch {
                expected: self.layout,
                got: signature.layout(),
            });
        }
        Ok(())
    }

    fn check_length(&self, got: usize) -> Result<()> {
        let expected = self.layout.window_length.get();
        if got != expected {
            return Err(MatchError::InvalidWindow { expected, got });
        }
        Ok(())
    }

    /// Write the normalized values of `window` into `out`, replacing its contents.
    ///
    /// `window` must already have the configured length and hold finite values.
    pub(crate) fn normalize_into<T: OHLCV>(&self, window: &[T], out: &mut Vec<f64>) {
        out.clear();

        let (min, max) = window.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), b| {
            (lo.min(b.price_min()), hi.max(b.price_max()))
        });
        // Halved so the span stays finite for prices near f64::MAX
        let half_span = max * 0.5 - min * 0.5;

        for bar in window {
            for price in [bar.open(), bar.high(), bar.low(), bar.close()] {
                out.push(if half_span > 0.0 {
                    (price * 0.5 - min * 0.5) / half_span
                } else {
                    FLAT_PRICE
                });
            }
        }

        if self.layout.volume_channel {
            let max_volume = window.iter().map(|b| b.volume()).fold(0.0, f64::max);
            for bar in window {
                out.push(if max_volume > 0.0 {
                    bar.volume() / max_volume
                } else {
                    0.0
                });
            }
        }
    }
}

// ============================================================
// QUERY SOURCES
// ============================================================

/// Pluggable image-to-signature capability.
///
/// Implementations must return a signature with the requested layout.
pub trait ImageFeatureExtractor: Send + Sync {
    fn extract(&self, image: &[u8], layout: SignatureLayout) -> Result<PatternSignature>;
}

/// Where a query pattern comes from
#[derive(Debug, Clone)]
pub enum QuerySource {
    /// Raw image bytes, handled by an [`ImageFeatureExtractor`]
    Image(Vec<u8>),
    /// A literal candle window used as the query
    Series(Vec<Candle>),
    /// A ready-made signature
    Signature(PatternSignature),
}

// ============================================================
// TESTS
// ============================================================
